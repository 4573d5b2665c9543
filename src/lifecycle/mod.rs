//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Component start (task.rs):
//!     start_cleanup() → PeriodicTask::spawn → ticker loop
//!
//! Component teardown (shutdown.rs):
//!     destroy() → Shutdown::trigger → loop exits → task joined
//! ```
//!
//! # Design Decisions
//! - Every background timer is owned by the component it cleans
//! - No global timer state survives instance teardown
//! - Dropping a task handle stops the task

pub mod shutdown;
pub mod task;

pub use shutdown::{Shutdown, ShutdownListener};
pub use task::PeriodicTask;
