//! Pooled connection bookkeeping.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track in-use state and last release time per slot

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One admission slot for a host.
#[derive(Debug, Clone)]
pub struct PooledConnection {
    pub id: ConnectionId,
    pub in_use: bool,
    /// Last time the slot was released (or created).
    pub last_used: Instant,
    /// Whether the transport may reuse the underlying socket.
    pub keep_alive: bool,
}

impl PooledConnection {
    /// A new slot, already claimed by its creator.
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            in_use: true,
            last_used: Instant::now(),
            keep_alive: true,
        }
    }

    pub fn claim(&mut self) {
        self.in_use = true;
    }

    pub fn release(&mut self) {
        self.in_use = false;
        self.last_used = Instant::now();
    }

    /// Idle duration, or zero while in use.
    pub fn idle_for(&self, now: Instant) -> Duration {
        if self.in_use {
            Duration::ZERO
        } else {
            now.duration_since(self.last_used)
        }
    }
}

impl Default for PooledConnection {
    fn default() -> Self {
        Self::new()
    }
}
