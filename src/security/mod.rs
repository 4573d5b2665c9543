//! Security and admission subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request:
//!     → ssrf.rs (validate initial URL and every redirect hop)
//!     → rate_limit.rs (sliding-window admission per host)
//!     → Pass to connection pool and transport
//! ```
//!
//! # Design Decisions
//! - Defense in depth: the guard runs on every hop, not just the first
//! - Fail closed: reject on any guard failure
//! - Rate limiting signals the caller; it never waits

pub mod rate_limit;
pub mod ssrf;

pub use rate_limit::{RateLimitUsage, RateLimiter};
pub use ssrf::{AllowAllGuard, BasicUrlGuard, UrlGuard};
