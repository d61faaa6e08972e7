//! Least Connections load balancing strategy.

use crate::load_balancer::{LoadBalancer, PodAddr, PodLoad};

/// Least connections selector.
/// Selects the pod with the minimum number of live connections; ties go to
/// the lexicographically smallest address, independent of scan order.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_pod(&self, candidates: &[PodLoad]) -> Option<PodAddr> {
        candidates
            .iter()
            // Negative counts come from mismatched decrements; treat as idle
            .min_by(|a, b| {
                a.connections
                    .max(0)
                    .cmp(&b.connections.max(0))
                    .then_with(|| a.addr.cmp(&b.addr))
            })
            .map(|load| load.addr.clone())
    }
}
