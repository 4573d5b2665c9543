//! Query facade.
//!
//! # Responsibilities
//! - Compose cache, bootstrap resolution and the secure fetcher per lookup
//! - Own every component's background cleanup lifecycle
//!
//! # Data Flow
//! ```text
//! domain("example.com")
//!     → ResponseCache.get("domain:example.com")   hit → cached = true
//!     → BootstrapResolver (server base URL)
//!     → {base}domain/example.com
//!     → SecureFetcher.fetch
//!     → ResponseCache.set
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bootstrap::{BootstrapResolver, BootstrapStats, Query};
use crate::cache::{CacheBackend, ResponseCache};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::{RawResponse, SecureFetcher};
use crate::net::{ConnectionPool, PoolStats};
use crate::resilience::CircuitBreakerStats;
use crate::security::{BasicUrlGuard, RateLimiter, UrlGuard};

/// A lookup result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RdapResponse {
    pub data: Map<String, Value>,
    /// URL the object was served from, after redirects.
    pub source_url: String,
    /// True when served from the response cache.
    pub cached: bool,
}

impl RdapResponse {
    fn from_raw(raw: RawResponse, cached: bool) -> Self {
        Self {
            data: raw.data,
            source_url: raw.url,
            cached,
        }
    }
}

/// Component diagnostics.
#[derive(Debug, Clone)]
pub struct ClientStats {
    pub bootstrap: BootstrapStats,
    pub pool: Option<PoolStats>,
    pub cache_backend: &'static str,
    pub cache_size: usize,
    pub circuit: Option<CircuitBreakerStats>,
}

/// Builder for [`RdapClient`].
pub struct RdapClientBuilder {
    config: ClientConfig,
    guard: Option<Arc<dyn UrlGuard>>,
    cache_backend: Option<Arc<dyn CacheBackend<RawResponse>>>,
}

impl RdapClientBuilder {
    /// Replace the default `BasicUrlGuard`.
    pub fn guard(mut self, guard: Arc<dyn UrlGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Backend for `cache.strategy = "custom"`.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend<RawResponse>>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<RdapClient> {
        let config = self.config;
        let guard = self
            .guard
            .unwrap_or_else(|| Arc::new(BasicUrlGuard::new()));

        let cache = ResponseCache::from_config(&config.cache, self.cache_backend)?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let pool = config
            .pool
            .enabled
            .then(|| Arc::new(ConnectionPool::new(&config.pool)));

        let mut fetcher = SecureFetcher::new(&config, guard)?.with_rate_limiter(Arc::clone(&limiter));
        if let Some(pool) = &pool {
            fetcher = fetcher.with_pool(Arc::clone(pool));
        }
        let fetcher = Arc::new(fetcher);
        let resolver = BootstrapResolver::new(Arc::clone(&fetcher), &config.bootstrap);

        tracing::debug!(
            cache = cache.backend_name(),
            pool = pool.is_some(),
            rate_limit = limiter.is_enabled(),
            "RDAP client built"
        );

        Ok(RdapClient {
            cache,
            resolver,
            fetcher,
            limiter,
            pool,
            cache_cleanup: Duration::from_secs(config.cache.cleanup_interval_secs),
        })
    }
}

/// Resilient RDAP lookups.
#[derive(Debug)]
pub struct RdapClient {
    cache: ResponseCache<RawResponse>,
    resolver: BootstrapResolver,
    fetcher: Arc<SecureFetcher>,
    limiter: Arc<RateLimiter>,
    pool: Option<Arc<ConnectionPool>>,
    cache_cleanup: Duration,
}

impl RdapClient {
    pub fn builder(config: ClientConfig) -> RdapClientBuilder {
        RdapClientBuilder {
            config,
            guard: None,
            cache_backend: None,
        }
    }

    /// Client with the default URL guard and a built-in cache backend.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub async fn domain(&self, name: &str) -> Result<RdapResponse> {
        self.lookup(&Query::domain(name)?).await
    }

    /// IPv4/IPv6 address or prefix.
    pub async fn ip(&self, address: &str) -> Result<RdapResponse> {
        self.lookup(&Query::ip(address)?).await
    }

    pub async fn autnum(&self, asn: &str) -> Result<RdapResponse> {
        self.lookup(&Query::asn(asn)?).await
    }

    /// Resolve, fetch and cache one query.
    pub async fn lookup(&self, query: &Query) -> Result<RdapResponse> {
        let key = cache_key(query);
        if let Some(raw) = self.cache.get(&key) {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(RdapResponse::from_raw(raw, true));
        }

        let server = self.resolver.resolve(query).await?;
        let url = query_url(&server, query);
        let raw = self.fetcher.fetch(&url).await?;

        self.cache.set(&key, raw.clone());
        Ok(RdapResponse::from_raw(raw, false))
    }

    pub fn resolver(&self) -> &BootstrapResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ResponseCache<RawResponse> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Start every background cleanup task.
    pub fn start(&self) {
        self.limiter.start_cleanup();
        if let Some(pool) = &self.pool {
            pool.start_cleanup();
        }
        if !self.cache_cleanup.is_zero() {
            self.cache.start_cleanup(self.cache_cleanup);
        }
        tracing::debug!("RDAP client background tasks started");
    }

    /// Stop every background cleanup task.
    pub fn destroy(&self) {
        self.limiter.destroy();
        if let Some(pool) = &self.pool {
            pool.destroy();
        }
        self.cache.destroy();
        tracing::debug!("RDAP client background tasks stopped");
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            bootstrap: self.resolver.stats(),
            pool: self.pool.as_ref().map(|p| p.stats()),
            cache_backend: self.cache.backend_name(),
            cache_size: self.cache.size(),
            circuit: self.fetcher.circuit_stats(),
        }
    }
}

impl Drop for RdapClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn cache_key(query: &Query) -> String {
    match query {
        Query::Domain(name) => format!("domain:{name}"),
        Query::Ip(prefix) => format!("ip:{prefix}"),
        Query::Asn(n) => format!("autnum:{n}"),
    }
}

/// `{base}/domain/{name}`, `{base}/ip/{addr}` or `{base}/autnum/{n}`.
fn query_url(base: &str, query: &Query) -> String {
    let sep = if base.ends_with('/') { "" } else { "/" };
    match query {
        Query::Domain(name) => format!("{base}{sep}domain/{name}"),
        Query::Ip(prefix) => format!("{base}{sep}ip/{prefix}"),
        Query::Asn(n) => format!("{base}{sep}autnum/{n}"),
    }
}
