//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NetworkErrorKind;

/// Root configuration for the RDAP client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request construction and redirect handling.
    pub fetch: FetchConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Per-host admission pool.
    pub pool: PoolConfig,

    /// Response cache.
    pub cache: CacheConfig,

    /// Bootstrap registry discovery.
    pub bootstrap: BootstrapConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on one request/response exchange in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 10_000 }
    }
}

/// Request construction and redirect handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of redirect hops followed per attempt.
    pub max_redirects: u32,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            user_agent: format!("rdap-client/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
        }
    }
}

/// Delay function used between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    ExponentialJitter,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries. When disabled every fetch makes exactly one attempt.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay function.
    pub strategy: BackoffStrategy,

    /// Base delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Upper bound for any computed delay in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor for exponential strategies.
    pub backoff_factor: f64,

    /// HTTP statuses that may be retried.
    pub retryable_status_codes: Vec<u16>,

    /// Network error identifiers that may be retried.
    pub retryable_errors: Vec<NetworkErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            strategy: BackoffStrategy::ExponentialJitter,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            retryable_status_codes: vec![429, 500, 502, 503, 504],
            retryable_errors: vec![
                NetworkErrorKind::ConnectionReset,
                NetworkErrorKind::ConnectionRefused,
                NetworkErrorKind::DnsFailure,
                NetworkErrorKind::Connect,
                NetworkErrorKind::Timeout,
                NetworkErrorKind::Body,
            ],
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable the breaker. Disabled means plain attempt-bounded retry.
    pub enabled: bool,

    /// Failure count that opens the circuit.
    pub threshold: u32,

    /// Time in milliseconds an open circuit waits before going half-open.
    pub timeout_ms: u64,

    /// Trial attempts allowed while half-open.
    pub half_open_requests: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 5,
            timeout_ms: 60_000,
            half_open_requests: 1,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per key within the window.
    pub max_requests: u32,

    /// Sliding window length in milliseconds.
    pub window_ms: u64,

    /// Interval between stale-key purges in seconds.
    pub cleanup_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 60_000,
            cleanup_interval_secs: 60,
        }
    }
}

/// Per-host admission pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Enable the pool. Disabled means no per-host concurrency bound.
    pub enabled: bool,

    /// Maximum concurrent connections per host.
    pub max_connections: usize,

    /// Idle time in milliseconds after which a free connection is dropped.
    pub max_idle_ms: u64,

    /// Interval between idle sweeps in seconds.
    pub cleanup_interval_secs: u64,
}

impl PoolConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_connections: 10,
            max_idle_ms: 60_000,
            cleanup_interval_secs: 30,
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// In-process LRU with TTL.
    Memory,
    /// Caller-supplied backend.
    Custom,
    /// Store nothing.
    None,
    /// Shared Redis cache (not available in this build).
    Redis,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Custom => "custom",
            Self::None => "none",
            Self::Redis => "redis",
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend selection.
    pub strategy: CacheStrategy,

    /// Maximum number of live entries (memory backend).
    pub max_size: usize,

    /// Default time-to-live for responses in seconds.
    pub ttl_secs: u64,

    /// Interval between expired-entry sweeps in seconds.
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::Memory,
            max_size: 1_000,
            ttl_secs: 3_600,
            cleanup_interval_secs: 60,
        }
    }
}

/// Bootstrap registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Base URL the `dns.json`, `ipv4.json`, `ipv6.json` and `asn.json` documents live under.
    pub base_url: String,

    /// Freshness window for fetched datasets in seconds.
    pub ttl_secs: u64,
}

impl BootstrapConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.iana.org/rdap/".to_string(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.retryable_status_codes, vec![429, 500, 502, 503, 504]);
        assert_eq!(config.bootstrap.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.cache.strategy, CacheStrategy::Memory);
    }

    #[test]
    fn test_partial_section_override() {
        let config: ClientConfig = toml::from_str(
            r#"
            [retries]
            strategy = "linear"
            retryable_errors = ["dns_failure"]

            [cache]
            strategy = "none"
            "#,
        )
        .unwrap();

        assert_eq!(config.retries.strategy, BackoffStrategy::Linear);
        assert_eq!(config.retries.retryable_errors, vec![NetworkErrorKind::DnsFailure]);
        // Untouched fields keep their defaults.
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.cache.strategy, CacheStrategy::None);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str(
            r#"
            [cache]
            strategy = "memcached"
            "#,
        );
        assert!(result.is_err());
    }
}
