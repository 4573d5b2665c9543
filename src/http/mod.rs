//! HTTP fetch subsystem.
//!
//! # Data Flow
//! ```text
//! Query URL
//!     → fetcher.rs (guard, admission, timeout, redirects, retry loop)
//!     → reqwest (sockets, TLS, keep-alive)
//!     → response.rs (RawResponse, or typed error with decoded body)
//! ```

pub mod fetcher;
pub mod response;

pub use fetcher::{SecureFetcher, RDAP_ACCEPT};
pub use response::{RawResponse, ResponseBody};
