//! Outbound URL guard.
//!
//! # Responsibilities
//! - Define the capability the fetcher consults before every request and redirect
//! - Provide a basic literal-address policy for callers without their own
//!
//! # Design Decisions
//! - Fail closed: a rejection is final and never retried
//! - The basic policy inspects the URL only; it does not resolve host names

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

/// Validates outbound URLs.
pub trait UrlGuard: Send + Sync {
    /// `Ok(())` to allow, `Err(reason)` to reject.
    fn validate(&self, url: &Url) -> Result<(), String>;
}

/// Allows every URL. For tests and fully trusted environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGuard;

impl UrlGuard for AllowAllGuard {
    fn validate(&self, _url: &Url) -> Result<(), String> {
        Ok(())
    }
}

/// Scheme and literal-address policy.
///
/// Rejects non-HTTP schemes, `localhost`, and IP literals in loopback,
/// private, link-local, unique-local or unspecified ranges. An optional
/// allow-list restricts hosts further.
#[derive(Debug, Clone, Default)]
pub struct BasicUrlGuard {
    allowed_hosts: Option<Vec<String>>,
}

impl BasicUrlGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only allow these host names (case-insensitive, exact match).
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(hosts.into_iter().map(|h| h.into().to_lowercase()).collect());
        self
    }
}

impl UrlGuard for BasicUrlGuard {
    fn validate(&self, url: &Url) -> Result<(), String> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("scheme '{}' is not allowed", url.scheme()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err("embedded credentials are not allowed".to_string());
        }

        let host = url.host().ok_or_else(|| "URL has no host".to_string())?;
        match host {
            Host::Domain(name) => {
                let name = name.trim_end_matches('.').to_lowercase();
                if name == "localhost" || name.ends_with(".localhost") {
                    return Err(format!("host '{name}' is local"));
                }
                if let Some(allowed) = &self.allowed_hosts {
                    if !allowed.iter().any(|h| *h == name) {
                        return Err(format!("host '{name}' is not in the allow-list"));
                    }
                }
            }
            Host::Ipv4(ip) => check_ip(IpAddr::V4(ip))?,
            Host::Ipv6(ip) => check_ip(IpAddr::V6(ip))?,
        }
        Ok(())
    }
}

fn check_ip(ip: IpAddr) -> Result<(), String> {
    let blocked = match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
    };
    if blocked {
        Err(format!("address {ip} is internal"))
    } else {
        Ok(())
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64)
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // fc00::/7 unique local
        || (first & 0xffc0) == 0xfe80 // fe80::/10 link local
}
