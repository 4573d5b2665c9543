//! Identifier → authoritative server resolution.
//!
//! # Responsibilities
//! - Fetch and cache one bootstrap dataset per kind
//! - Refetch when a dataset is older than the configured TTL or was cleared
//! - Match a normalized query and return the first advertised server URL
//!
//! # Design Decisions
//! - Datasets live in per-kind `ArcSwapOption` slots; readers never block
//! - Concurrent refreshes of the same kind are not coalesced, the last
//!   completed fetch wins
//! - A miss is `NoServerFound`, never retried

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use tokio::time::Instant;

use crate::bootstrap::dataset::BootstrapDataset;
use crate::bootstrap::matcher::Query;
use crate::bootstrap::BootstrapKind;
use crate::config::BootstrapConfig;
use crate::error::{RdapError, Result};
use crate::http::SecureFetcher;
use crate::observability::metrics;

/// Dataset cache diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapStats {
    pub dataset_count: usize,
    pub kinds: Vec<BootstrapKind>,
}

/// Resolves identifiers against IANA-style bootstrap documents.
#[derive(Debug)]
pub struct BootstrapResolver {
    fetcher: Arc<SecureFetcher>,
    base_url: String,
    ttl: Duration,
    slots: [ArcSwapOption<BootstrapDataset>; 4],
}

impl BootstrapResolver {
    pub fn new(fetcher: Arc<SecureFetcher>, config: &BootstrapConfig) -> Self {
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            fetcher,
            base_url,
            ttl: config.ttl(),
            slots: Default::default(),
        }
    }

    /// URL of the bootstrap document for `kind`.
    pub fn document_url(&self, kind: BootstrapKind) -> String {
        format!("{}{}", self.base_url, kind.file_name())
    }

    /// Resolve a parsed query to its server base URL.
    pub async fn resolve(&self, query: &Query) -> Result<String> {
        let kind = query.kind();
        let dataset = self.dataset(kind).await?;
        match dataset.lookup(query) {
            Some(url) => {
                tracing::debug!(%kind, query = %query, server = url, "Resolved bootstrap server");
                Ok(url.to_string())
            }
            None => Err(RdapError::NoServerFound {
                kind,
                identifier: query.to_string(),
            }),
        }
    }

    pub async fn resolve_domain(&self, domain: &str) -> Result<String> {
        self.resolve(&Query::domain(domain)?).await
    }

    /// IPv4 or IPv6 address or prefix.
    pub async fn resolve_ip(&self, ip: &str) -> Result<String> {
        self.resolve(&Query::ip(ip)?).await
    }

    pub async fn resolve_asn(&self, asn: &str) -> Result<String> {
        self.resolve(&Query::asn(asn)?).await
    }

    /// Cached dataset for `kind`, fetching it when absent or stale.
    pub async fn dataset(&self, kind: BootstrapKind) -> Result<Arc<BootstrapDataset>> {
        let slot = &self.slots[kind.index()];
        if let Some(dataset) = slot.load_full() {
            if dataset.is_fresh(Instant::now(), self.ttl) {
                return Ok(dataset);
            }
            tracing::debug!(%kind, "Bootstrap dataset stale, refreshing");
        }

        let url = self.document_url(kind);
        let response = self.fetcher.fetch(&url).await?;
        let dataset = Arc::new(BootstrapDataset::from_json(kind, &url, response.data)?);

        metrics::record_bootstrap_fetch(kind.as_str());
        tracing::info!(
            %kind,
            entries = dataset.entries.len(),
            publication = dataset.publication.as_deref().unwrap_or("unknown"),
            "Loaded bootstrap dataset"
        );
        slot.store(Some(Arc::clone(&dataset)));
        Ok(dataset)
    }

    /// Install a dataset directly, e.g. from a bundled snapshot.
    pub fn insert_dataset(&self, dataset: BootstrapDataset) {
        self.slots[dataset.kind.index()].store(Some(Arc::new(dataset)));
    }

    /// Drop every cached dataset; the next lookup refetches.
    pub fn clear_cache(&self) {
        for slot in &self.slots {
            slot.store(None);
        }
        tracing::debug!("Bootstrap dataset cache cleared");
    }

    pub fn stats(&self) -> BootstrapStats {
        let kinds: Vec<BootstrapKind> = BootstrapKind::ALL
            .into_iter()
            .filter(|kind| self.slots[kind.index()].load().is_some())
            .collect();
        BootstrapStats {
            dataset_count: kinds.len(),
            kinds,
        }
    }
}
