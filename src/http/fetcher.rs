//! Guarded, resilient GET.
//!
//! # Responsibilities
//! - Validate every URL (initial and each redirect hop) against the `UrlGuard`
//! - Bound each exchange with the request timeout
//! - Follow redirects manually, up to `max_redirects`
//! - Classify non-2xx and non-object responses into typed errors
//! - Drive the retry policy and circuit breaker between attempts
//!
//! # Data Flow
//! ```text
//! fetch(url)
//!     → guard.validate(url)                 (fatal on reject)
//!     → policy.admit()                      (CircuitOpen on refuse, else permit)
//!     → attempt:
//!         → rate limiter check(host)        (fatal on reject)
//!         → pool slot for host              (waits if saturated)
//!         → GET with timeout
//!         → 3xx: join Location, validate, loop
//!         → non-2xx: Upstream; 2xx non-object: Network(InvalidResponse)
//!     → on failure: record through the permit, retry_permit?, sleep(delay)
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, LOCATION};
use serde_json::Value;
use tokio::time::Instant;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{FailureKind, NetworkErrorKind, RdapError, Result};
use crate::http::response::{parse_retry_after, RawResponse, ResponseBody};
use crate::net::ConnectionPool;
use crate::observability::metrics;
use crate::resilience::{with_timeout, CircuitBreakerStats, RetryContext, RetryPolicy};
use crate::security::{RateLimiter, UrlGuard};

pub const RDAP_ACCEPT: &str = "application/rdap+json, application/json";

enum Exchange {
    Done(RawResponse),
    Redirect(String),
}

/// One resilient HTTP exchange per call.
pub struct SecureFetcher {
    client: reqwest::Client,
    guard: Arc<dyn UrlGuard>,
    policy: RetryPolicy,
    pool: Option<Arc<ConnectionPool>>,
    limiter: Option<Arc<RateLimiter>>,
    timeout: Duration,
    max_redirects: u32,
}

impl std::fmt::Debug for SecureFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureFetcher")
            .field("policy", &self.policy)
            .field("pool", &self.pool.is_some())
            .field("limiter", &self.limiter.is_some())
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl SecureFetcher {
    pub fn new(config: &ClientConfig, guard: Arc<dyn UrlGuard>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(RDAP_ACCEPT));
        for (name, value) in &config.fetch.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid configured header"),
            }
        }

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.fetch.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| RdapError::network("<client>", &e))?;

        Ok(Self {
            client,
            guard,
            policy: RetryPolicy::new(config.retries.clone(), config.circuit_breaker.clone()),
            pool: None,
            limiter: None,
            timeout: config.timeouts.request(),
            max_redirects: config.fetch.max_redirects,
        })
    }

    pub fn with_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn circuit_stats(&self) -> Option<CircuitBreakerStats> {
        self.policy.circuit_stats()
    }

    /// Fetch `url` and return its top-level JSON object.
    pub async fn fetch(&self, url: &str) -> Result<RawResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!("fetch", %request_id, url);
        let started = std::time::Instant::now();

        let result = self.fetch_inner(url).instrument(span).await;
        metrics::record_fetch(outcome(&result), started);
        result
    }

    async fn fetch_inner(&self, url: &str) -> Result<RawResponse> {
        let target = Url::parse(url).map_err(|e| RdapError::SecurityRejected {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;
        self.validate(&target)?;
        let mut permit = self.policy.admit()?;

        let start_time = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(attempt, "Issuing request");

            let err = match self.attempt(&target).await {
                Ok(response) => {
                    permit.record_success();
                    return Ok(response);
                }
                Err(err) => err,
            };

            match breaker_outcome(&err) {
                Some(Ok(())) => permit.record_success(),
                Some(Err(kind)) => permit.record_failure(kind),
                // Admission or security errors never reach the upstream. The
                // unrecorded permit hands back any half-open trial slot.
                None => return Err(err),
            }

            let ctx = RetryContext::new(attempt, &err, start_time);
            permit = match self.policy.retry_permit(&ctx) {
                Some(next) => next,
                None => {
                    tracing::debug!(attempt, error = %err, "Not retrying");
                    return Err(err);
                }
            };

            let delay = self.policy.delay_for(attempt);
            metrics::record_retry();
            tracing::warn!(attempt, delay = ?delay, error = %err, "Attempt failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt, including any redirect hops.
    async fn attempt(&self, target: &Url) -> Result<RawResponse> {
        let mut current = target.clone();
        let mut redirects = 0u32;

        loop {
            let host = host_key(&current);
            if let Some(limiter) = &self.limiter {
                limiter.check_limit(&host)?;
            }
            let _slot = match &self.pool {
                Some(pool) => Some(pool.acquire_guard(&host).await),
                None => None,
            };

            let exchange = with_timeout(current.as_str(), self.timeout, self.exchange(&current)).await?;
            let location = match exchange {
                Exchange::Done(response) => return Ok(response),
                Exchange::Redirect(location) => location,
            };

            redirects += 1;
            if redirects > self.max_redirects {
                return Err(RdapError::Network {
                    url: current.to_string(),
                    kind: NetworkErrorKind::Redirect,
                    message: format!("more than {} redirects", self.max_redirects),
                });
            }

            let next = current.join(&location).map_err(|e| RdapError::Network {
                url: current.to_string(),
                kind: NetworkErrorKind::Redirect,
                message: format!("invalid Location '{location}': {e}"),
            })?;
            self.validate(&next)?;
            tracing::debug!(from = %current, to = %next, hop = redirects, "Following redirect");
            current = next;
        }
    }

    async fn exchange(&self, url: &Url) -> Result<Exchange> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RdapError::network(url.as_str(), &e))?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            return location.map(Exchange::Redirect).ok_or_else(|| RdapError::Network {
                url: url.to_string(),
                kind: NetworkErrorKind::Redirect,
                message: format!("status {status} without Location"),
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RdapError::network(url.as_str(), &e))?;

        if !status.is_success() {
            return Err(RdapError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
                body: ResponseBody::parse(&bytes),
                retry_after,
            });
        }

        let invalid = |message: String| RdapError::Network {
            url: url.to_string(),
            kind: NetworkErrorKind::InvalidResponse,
            message,
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(data)) => Ok(Exchange::Done(RawResponse {
                url: url.to_string(),
                status: status.as_u16(),
                data,
            })),
            Ok(_) => Err(invalid("response is not a JSON object".to_string())),
            Err(e) => Err(invalid(format!("response is not JSON: {e}"))),
        }
    }

    fn validate(&self, url: &Url) -> Result<()> {
        self.guard.validate(url).map_err(|reason| {
            tracing::warn!(url = %url, reason = %reason, "URL rejected by guard");
            RdapError::SecurityRejected {
                url: url.to_string(),
                reason,
            }
        })
    }
}

/// How an attempt error feeds the breaker: `Ok` counts as healthy, `Err`
/// as a failure, `None` when no upstream exchange happened.
fn breaker_outcome(err: &RdapError) -> Option<std::result::Result<(), FailureKind>> {
    match err.failure_kind()? {
        // The upstream answered; client errors say nothing about its health.
        FailureKind::Upstream(status) if status < 500 && status != 429 => Some(Ok(())),
        kind => Some(Err(kind)),
    }
}

/// Rate-limit and pool key: host, plus port when explicit.
pub(crate) fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn outcome(result: &Result<RawResponse>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(RdapError::CircuitOpen { .. }) => "circuit_open",
        Err(RdapError::Timeout { .. }) => "timeout",
        Err(RdapError::Network { .. }) => "network_error",
        Err(RdapError::Upstream { .. }) => "upstream_error",
        Err(RdapError::RateLimited { .. }) => "rate_limited",
        Err(RdapError::SecurityRejected { .. }) => "rejected",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{AllowAllGuard, BasicUrlGuard};

    #[test]
    fn test_host_key() {
        let url = Url::parse("https://rdap.example/domain/x").unwrap();
        assert_eq!(host_key(&url), "rdap.example");
        let url = Url::parse("http://127.0.0.1:8080/ip/1.1.1.1").unwrap();
        assert_eq!(host_key(&url), "127.0.0.1:8080");
    }

    #[test]
    fn test_breaker_outcome() {
        let upstream = |status| RdapError::Upstream {
            url: "u".into(),
            status,
            body: None,
            retry_after: None,
        };
        assert_eq!(breaker_outcome(&upstream(404)), Some(Ok(())));
        assert_eq!(
            breaker_outcome(&upstream(503)),
            Some(Err(FailureKind::Upstream(503)))
        );
        assert_eq!(
            breaker_outcome(&upstream(429)),
            Some(Err(FailureKind::Upstream(429)))
        );
        let limited = RdapError::RateLimited {
            key: "h".into(),
            retry_after: Duration::from_secs(1),
        };
        assert_eq!(breaker_outcome(&limited), None);
    }

    #[tokio::test]
    async fn test_guard_rejects_before_any_io() {
        let fetcher = SecureFetcher::new(&ClientConfig::default(), Arc::new(BasicUrlGuard::new())).unwrap();
        let err = fetcher.fetch("http://169.254.169.254/latest").await.unwrap_err();
        assert!(matches!(err, RdapError::SecurityRejected { .. }));
        // Never counted against the breaker.
        assert_eq!(fetcher.circuit_stats().unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_unparseable_url_is_rejected() {
        let fetcher = SecureFetcher::new(&ClientConfig::default(), Arc::new(AllowAllGuard)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, RdapError::SecurityRejected { .. }));
    }
}
