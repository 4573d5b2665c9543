//! Parsed bootstrap documents.

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::bootstrap::matcher::{compile, Matcher, Query};
use crate::bootstrap::BootstrapKind;
use crate::error::{NetworkErrorKind, RdapError, Result};

/// Wire shape of a bootstrap document.
#[derive(Debug, Deserialize)]
struct BootstrapDocument {
    #[serde(default)]
    publication: Option<String>,
    services: Vec<(Vec<String>, Vec<String>)>,
}

/// One `[patterns, urls]` pair, with its patterns compiled.
#[derive(Debug)]
pub struct ServiceEntry {
    pub patterns: Vec<String>,
    pub urls: Vec<String>,
    matcher: Box<dyn Matcher>,
}

impl ServiceEntry {
    pub fn new(kind: BootstrapKind, patterns: Vec<String>, urls: Vec<String>) -> Self {
        let matcher = compile(kind, &patterns);
        Self {
            patterns,
            urls,
            matcher,
        }
    }

    pub fn matches(&self, query: &Query) -> bool {
        self.matcher.matches(query)
    }
}

/// A bootstrap dataset for one kind, stamped with its fetch time.
#[derive(Debug)]
pub struct BootstrapDataset {
    pub kind: BootstrapKind,
    pub publication: Option<String>,
    pub entries: Vec<ServiceEntry>,
    pub fetched_at: Instant,
}

impl BootstrapDataset {
    /// Parse the top-level object of a bootstrap document.
    pub fn from_json(kind: BootstrapKind, source: &str, data: Map<String, Value>) -> Result<Self> {
        let doc: BootstrapDocument =
            serde_json::from_value(Value::Object(data)).map_err(|e| RdapError::Network {
                url: source.to_string(),
                kind: NetworkErrorKind::InvalidResponse,
                message: format!("malformed {kind} bootstrap document: {e}"),
            })?;

        let entries = doc
            .services
            .into_iter()
            .map(|(patterns, urls)| ServiceEntry::new(kind, patterns, urls))
            .collect();

        Ok(Self {
            kind,
            publication: doc.publication,
            entries,
            fetched_at: Instant::now(),
        })
    }

    /// First URL of the first matching entry, in document order.
    pub fn lookup(&self, query: &Query) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(query))
            .find_map(|entry| entry.urls.first())
            .map(String::as_str)
    }

    pub fn is_fresh(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.duration_since(self.fetched_at) < ttl
    }
}
