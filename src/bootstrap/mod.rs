//! Registry discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Identifier ("example.com", "198.51.100.7", "AS701")
//!     → matcher.rs (normalize into Query, pick dataset kind)
//!     → resolver.rs (cached dataset, or fetch {base_url}{kind}.json)
//!     → dataset.rs (service entries in document order)
//!     → first matching entry's first URL
//! ```

pub mod dataset;
pub mod matcher;
pub mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use dataset::{BootstrapDataset, ServiceEntry};
pub use matcher::{IpPrefix, Query};
pub use resolver::{BootstrapResolver, BootstrapStats};

/// Which bootstrap document a lookup uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapKind {
    Dns,
    Ipv4,
    Ipv6,
    Asn,
}

impl BootstrapKind {
    pub const ALL: [BootstrapKind; 4] = [Self::Dns, Self::Ipv4, Self::Ipv6, Self::Asn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dns => "dns",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Asn => "asn",
        }
    }

    /// Document file name under the bootstrap base URL.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Dns => "dns.json",
            Self::Ipv4 => "ipv4.json",
            Self::Ipv6 => "ipv6.json",
            Self::Asn => "asn.json",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Dns => 0,
            Self::Ipv4 => 1,
            Self::Ipv6 => 2,
            Self::Asn => 3,
        }
    }
}

impl fmt::Display for BootstrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
