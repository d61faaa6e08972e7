//! Session placement.
//!
//! # Responsibilities
//! - Resolve a session to the pod already serving it, renewing the mapping
//! - Otherwise select the least loaded pod and record the new mapping
//!
//! # Design Decisions
//! - A failed mapping write is logged and counted; the request still goes to
//!   the selected pod, only future stickiness is at risk
//! - Concurrent first placements of one session race; last write wins

use crate::error::DistributorError;
use crate::load_balancer::{PodAddr, PodRegistry};
use crate::observability::metrics;
use crate::routing::affinity::AffinityResolver;

/// How a placement was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// Existing affinity mapping, renewed.
    Affinity,
    /// New pod selected and mapping recorded.
    Selected,
    /// New pod selected but no mapping recorded (anonymous or write failure).
    Unmapped,
}

impl PlacementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementKind::Affinity => "affinity",
            PlacementKind::Selected => "selected",
            PlacementKind::Unmapped => "unmapped",
        }
    }
}

/// Outcome of resolving a session to a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub pod: PodAddr,
    pub kind: PlacementKind,
}

/// Resolving step shared by tunnels and plain requests.
#[derive(Debug)]
pub struct SessionRouter {
    resolver: AffinityResolver,
    registry: PodRegistry,
}

impl SessionRouter {
    pub fn new(resolver: AffinityResolver, registry: PodRegistry) -> Self {
        Self { resolver, registry }
    }

    pub fn resolver(&self) -> &AffinityResolver {
        &self.resolver
    }

    /// Find or choose the pod for `session`.
    pub async fn place(&self, session: &str) -> Result<Placement, DistributorError> {
        if let Some(pod) = self.resolver.resolve(session).await {
            tracing::debug!(session = %session, pod = %pod, "Found existing mapping");
            self.resolver.renew(session).await;
            metrics::record_placement(PlacementKind::Affinity.as_str());
            return Ok(Placement {
                pod,
                kind: PlacementKind::Affinity,
            });
        }

        let pod = self.registry.select_pod().await.inspect_err(|e| {
            tracing::warn!(session = %session, error = %e, "No pod available for session");
        })?;

        let kind = if session.is_empty() {
            PlacementKind::Unmapped
        } else {
            match self.resolver.register(session, &pod).await {
                Ok(()) => {
                    tracing::info!(session = %session, pod = %pod, "New mapping");
                    PlacementKind::Selected
                }
                Err(source) => {
                    let err = DistributorError::MappingWriteFailure {
                        session: session.to_string(),
                        source,
                    };
                    tracing::error!(pod = %pod, error = %err, "Proceeding without affinity mapping");
                    metrics::record_store_error("set");
                    PlacementKind::Unmapped
                }
            }
        };

        metrics::record_placement(kind.as_str());
        Ok(Placement { pod, kind })
    }
}
