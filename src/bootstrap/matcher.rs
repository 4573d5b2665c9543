//! Bootstrap pattern matching.
//!
//! # Responsibilities
//! - Normalize query identifiers into a typed `Query`
//! - Compile each service entry's patterns into a `Matcher`
//!
//! # Design Decisions
//! - Domains match on the rightmost label, exact and case-insensitive
//! - IP queries may be a prefix; a pattern matches only if it contains the
//!   whole query prefix
//! - ASN patterns are inclusive ranges; a bare number is a one-element range
//! - Unparseable patterns are skipped, never fatal for the dataset

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use crate::bootstrap::BootstrapKind;
use crate::error::{RdapError, Result};

/// A normalized lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Full normalized domain name.
    Domain(String),
    Ip(IpPrefix),
    Asn(u32),
}

impl Query {
    /// Lowercase, strip a trailing dot, reject empty labels.
    pub fn domain(input: &str) -> Result<Self> {
        let name = input.trim().trim_end_matches('.').to_lowercase();
        let invalid = |reason: &str| RdapError::InvalidIdentifier {
            kind: BootstrapKind::Dns,
            input: input.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("empty domain name"));
        }
        if name.split('.').any(str::is_empty) {
            return Err(invalid("empty label"));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(invalid("illegal character"));
        }
        Ok(Self::Domain(name))
    }

    /// An address, or a `prefix/len` network.
    pub fn ip(input: &str) -> Result<Self> {
        IpPrefix::parse(input.trim()).map(Self::Ip).map_err(|reason| {
            RdapError::InvalidIdentifier {
                kind: if input.contains(':') {
                    BootstrapKind::Ipv6
                } else {
                    BootstrapKind::Ipv4
                },
                input: input.to_string(),
                reason,
            }
        })
    }

    /// A number with an optional `AS` prefix.
    pub fn asn(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = match trimmed.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("as") => &trimmed[2..],
            _ => trimmed,
        };
        digits
            .parse::<u32>()
            .map(Self::Asn)
            .map_err(|e| RdapError::InvalidIdentifier {
                kind: BootstrapKind::Asn,
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// Dataset this query is resolved against.
    pub fn kind(&self) -> BootstrapKind {
        match self {
            Self::Domain(_) => BootstrapKind::Dns,
            Self::Ip(prefix) if prefix.addr.is_ipv4() => BootstrapKind::Ipv4,
            Self::Ip(_) => BootstrapKind::Ipv6,
            Self::Asn(_) => BootstrapKind::Asn,
        }
    }

    /// The domain's top-level label.
    pub fn tld(&self) -> Option<&str> {
        match self {
            Self::Domain(name) => name.rsplit('.').next(),
            _ => None,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(name) => f.write_str(name),
            Self::Ip(prefix) => write!(f, "{prefix}"),
            Self::Asn(n) => write!(f, "{n}"),
        }
    }
}

/// An address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    pub fn parse(input: &str) -> std::result::Result<Self, String> {
        let (addr, len) = match input.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (input, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("'{addr}' is not an IP address"))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let len = match len {
            Some(len) => len
                .parse::<u8>()
                .map_err(|_| format!("'{len}' is not a prefix length"))?,
            None => max,
        };
        if len > max {
            return Err(format!("prefix length {len} exceeds {max}"));
        }
        Ok(Self { addr, len })
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &IpPrefix) -> bool {
        if self.len > other.len {
            return false;
        }
        match (self.addr, other.addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.len);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.len);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = if self.addr.is_ipv4() { 32 } else { 128 };
        if self.len == full {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.len)
        }
    }
}

fn mask_u32(len: u8) -> u32 {
    match len {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n)),
    }
}

fn mask_u128(len: u8) -> u128 {
    match len {
        0 => 0,
        n => u128::MAX << (128 - u32::from(n)),
    }
}

/// A compiled service-entry pattern set.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn matches(&self, query: &Query) -> bool;
}

/// Exact top-level label membership.
#[derive(Debug, Clone, Default)]
pub struct TldMatcher {
    tlds: HashSet<String>,
}

impl TldMatcher {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            tlds: patterns
                .into_iter()
                .map(|p| p.trim().trim_end_matches('.').to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl Matcher for TldMatcher {
    fn matches(&self, query: &Query) -> bool {
        query.tld().is_some_and(|tld| self.tlds.contains(tld))
    }
}

/// CIDR containment.
#[derive(Debug, Clone, Default)]
pub struct CidrMatcher {
    networks: Vec<IpPrefix>,
}

impl CidrMatcher {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        let networks = patterns
            .into_iter()
            .filter_map(|p| match IpPrefix::parse(p.trim()) {
                Ok(net) => Some(net),
                Err(reason) => {
                    tracing::debug!(pattern = p, %reason, "Skipping bootstrap CIDR pattern");
                    None
                }
            })
            .collect();
        Self { networks }
    }
}

impl Matcher for CidrMatcher {
    fn matches(&self, query: &Query) -> bool {
        match query {
            Query::Ip(prefix) => self.networks.iter().any(|net| net.contains(prefix)),
            _ => false,
        }
    }
}

/// Inclusive AS number ranges.
#[derive(Debug, Clone, Default)]
pub struct AsnRangeMatcher {
    ranges: Vec<(u32, u32)>,
}

impl AsnRangeMatcher {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        let ranges = patterns
            .into_iter()
            .filter_map(|p| {
                let range = parse_asn_range(p.trim());
                if range.is_none() {
                    tracing::debug!(pattern = p, "Skipping bootstrap ASN pattern");
                }
                range
            })
            .collect();
        Self { ranges }
    }
}

fn parse_asn_range(pattern: &str) -> Option<(u32, u32)> {
    let (start, end) = match pattern.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let n = pattern.parse().ok()?;
            (n, n)
        }
    };
    (start <= end).then_some((start, end))
}

impl Matcher for AsnRangeMatcher {
    fn matches(&self, query: &Query) -> bool {
        match query {
            Query::Asn(n) => self.ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(n)),
            _ => false,
        }
    }
}

/// Compile patterns for one dataset kind.
pub fn compile(kind: BootstrapKind, patterns: &[String]) -> Box<dyn Matcher> {
    let patterns = patterns.iter().map(String::as_str);
    match kind {
        BootstrapKind::Dns => Box::new(TldMatcher::new(patterns)),
        BootstrapKind::Ipv4 | BootstrapKind::Ipv6 => Box::new(CidrMatcher::new(patterns)),
        BootstrapKind::Asn => Box::new(AsnRangeMatcher::new(patterns)),
    }
}
