//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0, factors >= 1)
//! - Check that URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// Upper bound for TTLs, in seconds (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Upper bound for the rate-limit window, in milliseconds (one day).
pub const MAX_RATE_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if retries.initial_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.initial_delay_ms",
            format!("exceeds max_delay_ms ({})", retries.max_delay_ms),
        ));
    }
    if !retries.backoff_factor.is_finite() || retries.backoff_factor < 1.0 {
        errors.push(ValidationError::new("retries.backoff_factor", "must be a finite number >= 1.0"));
    }
    for status in &retries.retryable_status_codes {
        if !(100..=599).contains(status) {
            errors.push(ValidationError::new(
                "retries.retryable_status_codes",
                format!("{status} is not an HTTP status"),
            ));
        }
    }

    let breaker = &config.circuit_breaker;
    if breaker.enabled {
        if breaker.threshold == 0 {
            errors.push(ValidationError::new("circuit_breaker.threshold", "must be at least 1"));
        }
        if breaker.half_open_requests == 0 {
            errors.push(ValidationError::new("circuit_breaker.half_open_requests", "must be at least 1"));
        }
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
        } else if config.rate_limit.window_ms > MAX_RATE_WINDOW_MS {
            errors.push(ValidationError::new(
                "rate_limit.window_ms",
                format!("must not exceed {MAX_RATE_WINDOW_MS}"),
            ));
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be at least 1"));
        }
    }

    if config.pool.enabled && config.pool.max_connections == 0 {
        errors.push(ValidationError::new("pool.max_connections", "must be at least 1"));
    }

    if config.cache.max_size == 0 {
        errors.push(ValidationError::new("cache.max_size", "must be at least 1"));
    }
    if config.cache.ttl_secs > MAX_TTL_SECS {
        errors.push(ValidationError::new(
            "cache.ttl_secs",
            format!("must not exceed {MAX_TTL_SECS}"),
        ));
    }
    if config.bootstrap.ttl_secs > MAX_TTL_SECS {
        errors.push(ValidationError::new(
            "bootstrap.ttl_secs",
            format!("must not exceed {MAX_TTL_SECS}"),
        ));
    }

    match Url::parse(&config.bootstrap.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "bootstrap.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("bootstrap.base_url", e.to_string())),
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig::default();
        config.timeouts.request_ms = 0;
        config.retries.max_attempts = 0;
        config.bootstrap.base_url = "ftp://data.iana.org/rdap/".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["timeouts.request_ms", "retries.max_attempts", "bootstrap.base_url"]
        );
    }

    #[test]
    fn test_rejects_unbounded_durations() {
        let mut config = ClientConfig::default();
        config.cache.ttl_secs = i64::MAX as u64;
        config.bootstrap.ttl_secs = MAX_TTL_SECS + 1;
        config.rate_limit.window_ms = u64::MAX;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["rate_limit.window_ms", "cache.ttl_secs", "bootstrap.ttl_secs"]
        );

        config.cache.ttl_secs = MAX_TTL_SECS;
        config.bootstrap.ttl_secs = MAX_TTL_SECS;
        config.rate_limit.window_ms = MAX_RATE_WINDOW_MS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_sections_skip_checks() {
        let mut config = ClientConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.window_ms = 0;
        config.circuit_breaker.enabled = false;
        config.circuit_breaker.threshold = 0;
        assert!(validate_config(&config).is_ok());
    }
}
