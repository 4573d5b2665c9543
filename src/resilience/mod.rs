//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch:
//!     → retries.rs admit() → AttemptPermit (circuit_breaker.rs refuses when open)
//!     → timeouts.rs (bound each attempt)
//!     → outcome recorded through the permit; an unrecorded permit frees its slot
//!     → retries.rs retry_permit() (attempt count, error kind, then breaker claim)
//!     → backoff.rs delay, then the next attempt
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Only GET is ever issued, so every attempt is safe to repeat
//! - Circuit breaker prevents hammering a failing upstream

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use retries::{AttemptPermit, RetryContext, RetryPolicy};
pub use timeouts::with_timeout;
