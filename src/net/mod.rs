//! Per-host admission pool.
//!
//! # Data Flow
//! ```text
//! Fetch attempt for host H:
//!     → pool.rs acquire(H)
//!         - free slot for H?        → claim it
//!         - fewer than max for H?   → create connection.rs entry
//!         - otherwise               → park on H's Notify until release
//!     → transport request (reqwest owns sockets and keep-alive)
//!     → PoolGuard dropped → release → wake one waiter
//! ```
//!
//! # Design Decisions
//! - The pool tracks admission slots, not sockets
//! - In-use connections are never reclaimed by idle cleanup
//! - Host entries disappear once their last connection is reclaimed

pub mod connection;
pub mod pool;

pub use connection::{ConnectionId, PooledConnection};
pub use pool::{ConnectionPool, PoolGuard, PoolStats};
