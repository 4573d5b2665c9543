//! Per-host connection pool.
//!
//! # Responsibilities
//! - Bound concurrent in-flight requests per host
//! - Reuse released slots before creating new ones
//! - Reclaim idle slots on a periodic task

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::lifecycle::PeriodicTask;
use crate::net::connection::{ConnectionId, PooledConnection};
use crate::observability::metrics;

#[derive(Debug, Default)]
struct HostSlots {
    connections: Vec<PooledConnection>,
    /// Signalled once per release.
    available: Arc<Notify>,
}

#[derive(Debug)]
struct PoolState {
    hosts: Mutex<HashMap<String, HostSlots>>,
    max_connections: usize,
    max_idle: Duration,
}

impl PoolState {
    /// Claim or create a slot, or hand back the host's notifier to wait on.
    fn try_claim(&self, host: &str) -> Result<ConnectionId, Arc<Notify>> {
        let mut hosts = self.hosts.lock();
        let slots = hosts.entry(host.to_string()).or_default();

        if let Some(conn) = slots.connections.iter_mut().find(|c| !c.in_use) {
            conn.claim();
            return Ok(conn.id);
        }

        if slots.connections.len() < self.max_connections {
            let conn = PooledConnection::new();
            let id = conn.id;
            slots.connections.push(conn);
            metrics::record_pool_size(host, slots.connections.len());
            tracing::trace!(host, connection = %id, "Created pooled connection");
            return Ok(id);
        }

        Err(Arc::clone(&slots.available))
    }

    fn release(&self, id: ConnectionId) -> bool {
        let mut hosts = self.hosts.lock();
        for slots in hosts.values_mut() {
            if let Some(conn) = slots.connections.iter_mut().find(|c| c.id == id) {
                conn.release();
                slots.available.notify_one();
                return true;
            }
        }
        tracing::warn!(connection = %id, "Release of unknown connection");
        false
    }

    fn cleanup(&self) -> usize {
        let now = Instant::now();
        let max_idle = self.max_idle;
        let mut removed = 0;

        let mut hosts = self.hosts.lock();
        hosts.retain(|host, slots| {
            let before = slots.connections.len();
            slots
                .connections
                .retain(|c| c.in_use || c.idle_for(now) <= max_idle);
            removed += before - slots.connections.len();
            if before != slots.connections.len() {
                metrics::record_pool_size(host, slots.connections.len());
            }
            !slots.connections.is_empty()
        });
        removed
    }
}

/// Pool occupancy snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hosts: usize,
    pub connections: usize,
    pub in_use: usize,
}

/// Bounded per-host admission pool.
#[derive(Debug)]
pub struct ConnectionPool {
    state: Arc<PoolState>,
    cleanup_interval: Duration,
    cleanup: Mutex<Option<PeriodicTask>>,
}

impl ConnectionPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            state: Arc::new(PoolState {
                hosts: Mutex::new(HashMap::new()),
                max_connections: config.max_connections.max(1),
                max_idle: config.max_idle(),
            }),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
            cleanup: Mutex::new(None),
        }
    }

    /// Claim a slot for `host`, waiting for a release if the host is saturated.
    ///
    /// There is no internal deadline; wrap in `tokio::time::timeout` to bound the wait.
    pub async fn acquire(&self, host: &str) -> ConnectionId {
        loop {
            let available = match self.state.try_claim(host) {
                Ok(id) => return id,
                Err(available) => available,
            };

            let notified = available.notified();
            tokio::pin!(notified);
            // Register before re-checking so a release in between is not missed.
            notified.as_mut().enable();
            if let Ok(id) = self.state.try_claim(host) {
                return id;
            }

            tracing::trace!(host, "Pool saturated, waiting for a free connection");
            notified.await;
        }
    }

    /// Like `acquire`, returning a guard that releases on drop.
    pub async fn acquire_guard(&self, host: &str) -> PoolGuard {
        let id = self.acquire(host).await;
        PoolGuard {
            state: Arc::clone(&self.state),
            id,
        }
    }

    /// Mark a connection free. Returns false for unknown IDs.
    pub fn release(&self, id: ConnectionId) -> bool {
        self.state.release(id)
    }

    /// Drop free connections idle longer than `max_idle`, and empty hosts.
    pub fn cleanup(&self) -> usize {
        self.state.cleanup()
    }

    pub fn stats(&self) -> PoolStats {
        let hosts = self.state.hosts.lock();
        PoolStats {
            hosts: hosts.len(),
            connections: hosts.values().map(|s| s.connections.len()).sum(),
            in_use: hosts
                .values()
                .flat_map(|s| s.connections.iter())
                .filter(|c| c.in_use)
                .count(),
        }
    }

    /// (total, in use) for one host.
    pub fn host_stats(&self, host: &str) -> (usize, usize) {
        let hosts = self.state.hosts.lock();
        hosts.get(host).map_or((0, 0), |s| {
            (
                s.connections.len(),
                s.connections.iter().filter(|c| c.in_use).count(),
            )
        })
    }

    /// Start the periodic idle sweep. Replaces a running sweep.
    pub fn start_cleanup(&self) {
        if self.cleanup_interval.is_zero() {
            return;
        }
        let state = Arc::clone(&self.state);
        let task = PeriodicTask::spawn("pool-cleanup", self.cleanup_interval, move || {
            let removed = state.cleanup();
            if removed > 0 {
                tracing::debug!(removed, "Reclaimed idle pooled connections");
            }
        });
        *self.cleanup.lock() = Some(task);
    }

    /// Stop the periodic sweep.
    pub fn destroy(&self) {
        if let Some(mut task) = self.cleanup.lock().take() {
            task.stop();
        }
    }
}

/// A RAII guard that releases its connection on drop.
#[derive(Debug)]
pub struct PoolGuard {
    state: Arc<PoolState>,
    id: ConnectionId,
}

impl PoolGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.state.release(self.id);
    }
}
