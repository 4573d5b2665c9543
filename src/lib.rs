//! Resilient RDAP client library.
//!
//! Locates the authoritative RDAP server for a domain, IP address/prefix or
//! AS number via IANA bootstrap documents, then fetches the registration
//! object through a guarded, rate-limited, retrying HTTP layer with a
//! response cache in front.

// Core pipeline
pub mod bootstrap;
pub mod client;
pub mod http;

// Admission and resilience
pub mod net;
pub mod resilience;
pub mod security;

// Storage
pub mod cache;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use bootstrap::{BootstrapKind, BootstrapResolver, Query};
pub use client::{ClientStats, RdapClient, RdapClientBuilder, RdapResponse};
pub use config::ClientConfig;
pub use error::{ErrorKind, RdapError, Result};
pub use http::{RawResponse, SecureFetcher};
pub use security::{AllowAllGuard, BasicUrlGuard, UrlGuard};
