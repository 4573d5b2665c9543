//! Circuit breaker guarding the upstream fetch path.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: upstream assumed down, attempts are refused without I/O
//! - Half-Open: a bounded number of trial attempts test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: timeout elapsed since last failure (checked on every state read)
//! Half-Open → Closed: a trial succeeds
//! Half-Open → Open: a trial fails
//! ```
//!
//! # Design Decisions
//! - Success in Closed decrements the failure count instead of resetting it
//! - Fail fast in Open (no waiting for the timeout)
//! - All counters sit behind one mutex so transitions are totally ordered
//! - A half-open trial slot is held by a `BreakerPermit`; a permit dropped
//!   without a recorded outcome hands its slot back

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::FailureKind;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::HalfOpen => 1,
            Self::Open => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        })
    }
}

/// Point-in-time breaker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_attempts: u32,
    pub last_failure: Option<FailureKind>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    last_failure: Option<FailureKind>,
    half_open_attempts: u32,
    /// Bumped on every entry to Half-Open.
    half_open_epoch: u64,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        metrics::record_circuit_state(to.gauge());
        match to {
            CircuitState::Open => tracing::warn!(
                %from,
                failures = self.failure_count,
                last_failure = ?self.last_failure,
                "Circuit opened"
            ),
            _ => tracing::info!(%from, to = %to, "Circuit state changed"),
        }
    }

    /// Open → Half-Open once the cool-down has elapsed.
    fn refresh(&mut self, now: Instant, timeout: Duration) {
        if self.state != CircuitState::Open {
            return;
        }
        let cooled = self
            .last_failure_time
            .map_or(true, |t| now.duration_since(t) >= timeout);
        if cooled {
            self.half_open_attempts = 0;
            self.half_open_epoch = self.half_open_epoch.wrapping_add(1);
            self.transition(CircuitState::HalfOpen);
        }
    }
}

/// Three-state failure isolation.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                last_failure: None,
                half_open_attempts: 0,
                half_open_epoch: 0,
            }),
        }
    }

    /// Current state, applying the passive Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now(), self.config.timeout());
        inner.state
    }

    /// Claim permission for one attempt.
    ///
    /// In Half-Open each granted permit holds one trial slot until its outcome
    /// is recorded or it is dropped. On refusal returns the failure that last
    /// opened the circuit.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, FailureKind> {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now(), self.config.timeout());
        let refused = inner
            .last_failure
            .unwrap_or(FailureKind::Upstream(503));
        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit {
                breaker: self,
                trial: None,
            }),
            CircuitState::Open => Err(refused),
            CircuitState::HalfOpen => {
                if inner.half_open_attempts >= self.config.half_open_requests {
                    return Err(refused);
                }
                inner.half_open_attempts += 1;
                Ok(BreakerPermit {
                    breaker: self,
                    trial: Some(inner.half_open_epoch),
                })
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.failure_count = 0;
                inner.half_open_attempts = 0;
                inner.transition(CircuitState::Closed);
            }
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(Instant::now());
        inner.last_failure = Some(kind);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_attempts = 0;
                inner.transition(CircuitState::Open);
            }
            CircuitState::Closed if inner.failure_count >= self.config.threshold => {
                inner.transition(CircuitState::Open);
            }
            _ => {}
        }
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now(), self.config.timeout());
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_attempts: inner.half_open_attempts,
            last_failure: inner.last_failure,
        }
    }

    /// Give back a trial slot claimed in the Half-Open period `epoch`.
    fn release_trial(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_epoch == epoch {
            inner.half_open_attempts = inner.half_open_attempts.saturating_sub(1);
            tracing::debug!(
                in_flight = inner.half_open_attempts,
                "Half-open trial released without outcome"
            );
        }
    }
}

/// Permission for one attempt, returned by [`CircuitBreaker::try_acquire`].
#[must_use = "dropping a permit releases its trial slot"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Half-Open period of the held trial slot.
    trial: Option<u64>,
}

impl BreakerPermit<'_> {
    /// Whether this permit holds a Half-Open trial slot.
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }

    pub fn record_success(mut self) {
        self.trial = None;
        self.breaker.record_success();
    }

    pub fn record_failure(mut self, kind: FailureKind) {
        self.trial = None;
        self.breaker.record_failure(kind);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if let Some(epoch) = self.trial.take() {
            self.breaker.release_trial(epoch);
        }
    }
}
