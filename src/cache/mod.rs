//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Query key ("domain:example.com")
//!     → ResponseCache (fail-open wrapper)
//!     → backend resolved at construction:
//!         - memory.rs (LRU + TTL)
//!         - caller-supplied CacheBackend
//!         - NoopCache
//!     → hit: short-circuits discovery and fetch
//! ```
//!
//! # Design Decisions
//! - Strategy is resolved once in `from_config`; unknown or unimplemented
//!   backends fail there, never on first use
//! - Every runtime backend error is logged and treated as a miss/no-op
//! - Expired-entry sweeps run on a component-owned periodic task

pub mod backend;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{CacheConfig, CacheStrategy};
use crate::error::{RdapError, Result};
use crate::lifecycle::PeriodicTask;
use crate::observability::metrics;

pub use backend::{CacheBackend, CacheError, NoopCache};
pub use memory::MemoryCache;

/// Fail-open cache front end.
pub struct ResponseCache<V> {
    backend: Arc<dyn CacheBackend<V>>,
    default_ttl: Duration,
    cleanup: Mutex<Option<PeriodicTask>>,
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("backend", &self.backend.name())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    /// Wrap an already-built backend.
    pub fn new(backend: Arc<dyn CacheBackend<V>>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            cleanup: Mutex::new(None),
        }
    }

    /// Build the backend selected by `config.strategy`.
    ///
    /// `custom` is required for `CacheStrategy::Custom` and ignored otherwise.
    pub fn from_config(
        config: &CacheConfig,
        custom: Option<Arc<dyn CacheBackend<V>>>,
    ) -> Result<Self> {
        let backend: Arc<dyn CacheBackend<V>> = match config.strategy {
            CacheStrategy::Memory => Arc::new(MemoryCache::new(config.max_size)),
            CacheStrategy::None => Arc::new(NoopCache),
            CacheStrategy::Custom => custom.ok_or_else(|| RdapError::CacheBackendUnavailable {
                backend: CacheStrategy::Custom.as_str().to_string(),
                reason: "no custom backend was supplied".to_string(),
            })?,
            CacheStrategy::Redis => {
                return Err(RdapError::CacheBackendUnavailable {
                    backend: CacheStrategy::Redis.as_str().to_string(),
                    reason: "not implemented in this build".to_string(),
                })
            }
        };

        tracing::debug!(
            backend = backend.name(),
            max_size = config.max_size,
            ttl_secs = config.ttl_secs,
            "Response cache initialized"
        );
        Ok(Self::new(backend, config.ttl()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        match self.backend.get(key) {
            Ok(Some(value)) => {
                metrics::record_cache_event("hit");
                Some(value)
            }
            Ok(None) => {
                metrics::record_cache_event("miss");
                None
            }
            Err(e) => {
                self.swallow("get", key, &e);
                None
            }
        }
    }

    /// Store with the default TTL.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        if let Err(e) = self.backend.set(key, value, ttl) {
            self.swallow("set", key, &e);
            // A failed write may have left a partial entry behind.
            if let Err(e) = self.backend.delete(key) {
                tracing::debug!(key, error = %e, "Cache cleanup after failed write also failed");
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.backend.delete(key).unwrap_or_else(|e| {
            self.swallow("delete", key, &e);
            false
        })
    }

    pub fn clear(&self) {
        if let Err(e) = self.backend.clear() {
            self.swallow("clear", "*", &e);
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.backend.has(key).unwrap_or_else(|e| {
            self.swallow("has", key, &e);
            false
        })
    }

    pub fn size(&self) -> usize {
        self.backend.size().unwrap_or_else(|e| {
            self.swallow("size", "*", &e);
            0
        })
    }

    /// Start sweeping expired entries every `interval`. Replaces a running sweep.
    pub fn start_cleanup(&self, interval: Duration) {
        let backend = Arc::clone(&self.backend);
        let task = PeriodicTask::spawn("cache-cleanup", interval, move || {
            match backend.purge_expired() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Purged expired cache entries"),
                Err(e) => tracing::warn!(error = %e, "Cache cleanup failed"),
            }
        });
        *self.cleanup.lock() = Some(task);
    }

    /// Stop the background sweep.
    pub fn destroy(&self) {
        if let Some(mut task) = self.cleanup.lock().take() {
            task.stop();
        }
    }

    fn swallow(&self, op: &'static str, key: &str, err: &CacheError) {
        metrics::record_cache_event("error");
        tracing::warn!(op, key, error = %err, "Cache operation failed, continuing without cache");
    }
}
