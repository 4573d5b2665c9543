//! Cache backend abstraction.

use std::time::Duration;

use thiserror::Error;

/// Runtime failure inside a cache backend.
///
/// Never escapes `ResponseCache`; it is logged and treated as a miss.
#[derive(Debug, Error)]
#[error("{backend} cache: {message}")]
pub struct CacheError {
    pub backend: &'static str,
    pub message: String,
}

impl CacheError {
    pub fn new(backend: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
        }
    }
}

/// Key/value store with per-entry TTL.
///
/// Implementations are resolved once when the cache is built; the hot path
/// never re-inspects the configured strategy.
pub trait CacheBackend<V>: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key was present.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    fn has(&self, key: &str) -> Result<bool, CacheError>;

    /// Live entry count.
    fn size(&self) -> Result<usize, CacheError>;

    /// Physically remove expired entries, returning how many were removed.
    fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

/// Sink that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl<V> CacheBackend<V> for NoopCache {
    fn name(&self) -> &'static str {
        "none"
    }

    fn get(&self, _key: &str) -> Result<Option<V>, CacheError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: V, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn has(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn size(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
