//! Pod addresses.

use std::fmt;
use std::net::IpAddr;

/// Network address of a registered pod (IP or DNS name, no port).
///
/// Ordering is lexicographic over the textual form, which gives the
/// deterministic tie-break used by pod selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PodAddr(String);

impl PodAddr {
    /// Parse a pod address, returning `None` if it is not a valid host.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Some(Self(ip.to_string()));
        }
        match url::Host::parse(raw) {
            Ok(url::Host::Domain(domain)) => Some(Self(domain)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `host:port` authority, bracketing IPv6 literals.
    pub fn authority(&self, port: u16) -> String {
        if self.0.contains(':') {
            format!("[{}]:{}", self.0, port)
        } else {
            format!("{}:{}", self.0, port)
        }
    }
}

impl fmt::Display for PodAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
