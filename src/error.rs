//! Error taxonomy for the query pipeline.
//!
//! # Responsibilities
//! - One typed error per failure category so callers can branch on kind
//! - Classify transport failures into stable network error identifiers
//! - Tag circuit-breaker refusals without hiding the underlying category
//!
//! # Design Decisions
//! - Errors propagate unmodified from fetcher, resolver, limiter and pool
//! - Cache errors never appear here at runtime; the cache is fail-open
//! - `CacheBackendUnavailable` is a construction-time error only

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bootstrap::BootstrapKind;
use crate::http::response::ResponseBody;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RdapError>;

/// Stable identifier for a network-level failure.
///
/// The retry policy matches these against its configured retryable set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// Peer reset the connection.
    ConnectionReset,
    /// Peer refused the connection.
    ConnectionRefused,
    /// Host name could not be resolved.
    DnsFailure,
    /// Any other failure while establishing the connection.
    Connect,
    /// The transport reported a timeout.
    Timeout,
    /// Reading the response body failed.
    Body,
    /// The response was not a JSON object.
    InvalidResponse,
    /// Redirect could not be followed (missing Location, too many hops).
    Redirect,
    /// Anything else.
    Other,
}

impl NetworkErrorKind {
    /// Classify a transport error.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_body() || err.is_decode() {
            return Self::Body;
        }
        if err.is_redirect() {
            return Self::Redirect;
        }

        // Walk the source chain looking for an io::Error or a resolver message.
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(e) = source {
            if let Some(io) = e.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                        return Self::ConnectionReset
                    }
                    std::io::ErrorKind::ConnectionRefused => return Self::ConnectionRefused,
                    std::io::ErrorKind::TimedOut => return Self::Timeout,
                    _ => {}
                }
            }
            let text = e.to_string();
            if text.contains("dns error") || text.contains("failed to lookup address") {
                return Self::DnsFailure;
            }
            source = e.source();
        }

        if err.is_connect() {
            Self::Connect
        } else {
            Self::Other
        }
    }

    /// Short name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionRefused => "connection_refused",
            Self::DnsFailure => "dns_failure",
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Body => "body",
            Self::InvalidResponse => "invalid_response",
            Self::Redirect => "redirect",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an attempt failure, as seen by the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Attempt exceeded the request timeout.
    Timeout,
    /// Connectivity or parse failure.
    Network(NetworkErrorKind),
    /// Non-2xx upstream status.
    Upstream(u16),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Network(kind) => write!(f, "network error ({kind})"),
            Self::Upstream(status) => write!(f, "upstream status {status}"),
        }
    }
}

/// Coarse error category for caller branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Network,
    Upstream,
    RateLimited,
    SecurityRejected,
    NoServerFound,
    CacheBackendUnavailable,
    InvalidIdentifier,
}

/// Errors produced by the query pipeline.
#[derive(Debug, Error)]
pub enum RdapError {
    /// The request did not complete within its bound.
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// Connectivity or response parse failure.
    #[error("network error ({kind}) for {url}: {message}")]
    Network {
        url: String,
        kind: NetworkErrorKind,
        message: String,
    },

    /// Upstream answered with a non-2xx status.
    #[error("upstream {url} returned status {status}")]
    Upstream {
        url: String,
        status: u16,
        /// Best-effort parsed body (JSON, else text).
        body: Option<ResponseBody>,
        /// `Retry-After` advertised by the server, informational only.
        retry_after: Option<Duration>,
    },

    /// Local admission control denied the request.
    #[error("rate limit exceeded for {key}, retry after {retry_after:?}")]
    RateLimited { key: String, retry_after: Duration },

    /// The URL guard rejected a request or redirect target.
    #[error("request to {url} rejected: {reason}")]
    SecurityRejected { url: String, reason: String },

    /// No bootstrap service entry advertises the resource.
    #[error("no RDAP server found for {kind} '{identifier}'")]
    NoServerFound {
        kind: BootstrapKind,
        identifier: String,
    },

    /// The configured cache backend cannot be constructed.
    #[error("cache backend '{backend}' unavailable: {reason}")]
    CacheBackendUnavailable { backend: String, reason: String },

    /// The circuit breaker refused the attempt.
    #[error("circuit open after repeated failures (last: {last_failure})")]
    CircuitOpen { last_failure: FailureKind },

    /// The query identifier could not be parsed.
    #[error("invalid {kind} identifier '{input}': {reason}")]
    InvalidIdentifier {
        kind: BootstrapKind,
        input: String,
        reason: String,
    },
}

impl RdapError {
    /// Build a network error from a transport failure.
    pub fn network(url: impl Into<String>, err: &reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            kind: NetworkErrorKind::classify(err),
            message: err.to_string(),
        }
    }

    /// Error category. Circuit refusals report the category that opened the circuit.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network { .. } => ErrorKind::Network,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::SecurityRejected { .. } => ErrorKind::SecurityRejected,
            Self::NoServerFound { .. } => ErrorKind::NoServerFound,
            Self::CacheBackendUnavailable { .. } => ErrorKind::CacheBackendUnavailable,
            Self::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            Self::CircuitOpen { last_failure } => match last_failure {
                FailureKind::Timeout => ErrorKind::Timeout,
                FailureKind::Network(_) => ErrorKind::Network,
                FailureKind::Upstream(_) => ErrorKind::Upstream,
            },
        }
    }

    /// True when this error is a circuit-breaker refusal rather than a real attempt.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Breaker-relevant failure category, if this error came from an attempt.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Timeout { .. } => Some(FailureKind::Timeout),
            Self::Network { kind, .. } => Some(FailureKind::Network(*kind)),
            Self::Upstream { status, .. } => Some(FailureKind::Upstream(*status)),
            _ => None,
        }
    }

    /// HTTP status, for upstream errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_open_reports_underlying_kind() {
        let err = RdapError::CircuitOpen {
            last_failure: FailureKind::Upstream(503),
        };
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.is_circuit_open());

        let err = RdapError::CircuitOpen {
            last_failure: FailureKind::Timeout,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_failure_kind_only_for_attempt_errors() {
        let err = RdapError::RateLimited {
            key: "rdap.example".into(),
            retry_after: Duration::from_millis(10),
        };
        assert!(err.failure_kind().is_none());

        let err = RdapError::Network {
            url: "https://rdap.example/".into(),
            kind: NetworkErrorKind::DnsFailure,
            message: "lookup failed".into(),
        };
        assert_eq!(
            err.failure_kind(),
            Some(FailureKind::Network(NetworkErrorKind::DnsFailure))
        );
    }

    #[test]
    fn test_display() {
        let err = RdapError::NoServerFound {
            kind: BootstrapKind::Dns,
            identifier: "example.invalid".into(),
        };
        assert_eq!(
            err.to_string(),
            "no RDAP server found for dns 'example.invalid'"
        );
    }
}
