//! Request classification.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A tunnel path starts with the configured prefix and ends in `/ws`
//! - No regex to guarantee O(n) matching

/// What kind of traffic a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// WebSocket session tunneled to a pod.
    Tunnel,
    /// Ordinary request reverse proxied to a pod.
    Plain,
}

/// Matches the WebSocket tunnel path pattern `<prefix>*/ws`.
#[derive(Debug, Clone)]
pub struct TunnelMatcher {
    prefix: String,
}

impl TunnelMatcher {
    const SUFFIX: &'static str = "/ws";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.len() >= self.prefix.len() + Self::SUFFIX.len()
            && path.starts_with(&self.prefix)
            && path.ends_with(Self::SUFFIX)
    }

    pub fn classify(&self, path: &str) -> RequestKind {
        if self.matches(path) {
            RequestKind::Tunnel
        } else {
            RequestKind::Plain
        }
    }
}
