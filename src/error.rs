//! Error kinds surfaced by the distributor.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::load_balancer::PodAddr;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("coordination store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("no available pods")]
    NoAvailablePods,

    #[error("failed to register mapping for session {session}: {source}")]
    MappingWriteFailure {
        session: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to connect to pod {pod}: {reason}")]
    TunnelDialFailure { pod: PodAddr, reason: String },

    #[error("websocket upgrade failed: {0}")]
    UpgradeFailure(String),

    #[error("{0} parameter required")]
    MissingSession(String),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("upstream request to pod {pod} failed: {reason}")]
    Upstream { pod: PodAddr, reason: String },
}

impl DistributorError {
    pub fn status(&self) -> StatusCode {
        match self {
            DistributorError::StoreUnavailable(_) | DistributorError::NoAvailablePods => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DistributorError::MappingWriteFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DistributorError::TunnelDialFailure { .. } | DistributorError::Upstream { .. } => {
                StatusCode::BAD_GATEWAY
            }
            DistributorError::UpgradeFailure(_) | DistributorError::MissingSession(_) => {
                StatusCode::BAD_REQUEST
            }
            DistributorError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for DistributorError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            DistributorError::StoreUnavailable(_) | DistributorError::NoAvailablePods => {
                "No available pods".to_string()
            }
            DistributorError::MappingWriteFailure { .. } => "Failed to register mapping".to_string(),
            DistributorError::TunnelDialFailure { .. } | DistributorError::Upstream { .. } => {
                "Upstream pod unreachable".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}
