//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retried
//! - Compute the delay before the next attempt
//! - Own the circuit breaker that gates every attempt
//!
//! # Design Decisions
//! - The breaker is claimed only after attempt count and error kind pass,
//!   in one locked step
//! - Only attempt failures (timeout, network, upstream status) are candidates;
//!   admission and security errors are never retried
//! - Every attempt runs under an `AttemptPermit`; the attempt's outcome is
//!   recorded through it, and a permit dropped unrecorded releases its slot
//! - Disabling the breaker degrades to plain count-bounded retry

use std::time::Duration;

use tokio::time::Instant;

use crate::config::{CircuitBreakerConfig, RetryConfig};
use crate::error::{FailureKind, NetworkErrorKind, RdapError, Result};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerStats};

/// Inputs for one retry decision.
#[derive(Debug)]
pub struct RetryContext<'a> {
    /// Attempts made so far, including the one that just failed.
    pub attempt: u32,
    pub error: &'a RdapError,
    pub status_code: Option<u16>,
    /// When the first attempt started.
    pub start_time: Instant,
}

impl<'a> RetryContext<'a> {
    pub fn new(attempt: u32, error: &'a RdapError, start_time: Instant) -> Self {
        Self {
            attempt,
            error,
            status_code: error.status(),
            start_time,
        }
    }
}

/// Retry decisions plus the embedded circuit breaker.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    breaker: Option<CircuitBreaker>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig, breaker: CircuitBreakerConfig) -> Self {
        let breaker = breaker.enabled.then(|| CircuitBreaker::new(breaker));
        Self { config, breaker }
    }

    /// Attempts allowed per fetch, including the first.
    pub fn max_attempts(&self) -> u32 {
        if self.config.enabled {
            self.config.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Gate the first attempt of a fetch.
    pub fn admit(&self) -> Result<AttemptPermit<'_>> {
        match &self.breaker {
            Some(breaker) => breaker
                .try_acquire()
                .map(|permit| AttemptPermit(Some(permit)))
                .map_err(|last_failure| RdapError::CircuitOpen { last_failure }),
            None => Ok(AttemptPermit(None)),
        }
    }

    /// Permit for the attempt after the failure described by `ctx`, or `None`
    /// when it must not be retried.
    ///
    /// The breaker is claimed last and in one step, so in Half-Open no more
    /// than `half_open_requests` retries are ever in flight.
    pub fn retry_permit(&self, ctx: &RetryContext<'_>) -> Option<AttemptPermit<'_>> {
        if ctx.attempt >= self.max_attempts() || !self.is_retryable(ctx) {
            return None;
        }
        self.admit().ok()
    }

    /// Whether the failed attempt described by `ctx` should be retried.
    pub fn should_retry(&self, ctx: &RetryContext<'_>) -> bool {
        self.retry_permit(ctx).is_some()
    }

    fn is_retryable(&self, ctx: &RetryContext<'_>) -> bool {
        let by_status = ctx
            .status_code
            .is_some_and(|s| self.config.retryable_status_codes.contains(&s));
        let by_kind = match ctx.error.failure_kind() {
            Some(FailureKind::Timeout) => self
                .config
                .retryable_errors
                .contains(&NetworkErrorKind::Timeout),
            Some(FailureKind::Network(kind)) => self.config.retryable_errors.contains(&kind),
            _ => false,
        };
        by_status || by_kind
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(&self.config, attempt)
    }

    /// `None` when the breaker is disabled.
    pub fn circuit_stats(&self) -> Option<CircuitBreakerStats> {
        self.breaker.as_ref().map(CircuitBreaker::stats)
    }
}

/// Breaker claim for one attempt. Always granted when the breaker is disabled.
#[must_use = "dropping a permit releases its trial slot"]
#[derive(Debug)]
pub struct AttemptPermit<'a>(Option<BreakerPermit<'a>>);

impl AttemptPermit<'_> {
    pub fn record_success(self) {
        if let Some(permit) = self.0 {
            permit.record_success();
        }
    }

    pub fn record_failure(self, kind: FailureKind) {
        if let Some(permit) = self.0 {
            permit.record_failure(kind);
        }
    }
}
