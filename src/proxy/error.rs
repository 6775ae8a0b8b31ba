//! Error taxonomy for the forwarding path.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Everything that can go wrong while forwarding one request.
///
/// Transport- and rewriting-level failures are converted into one of these
/// kinds at the handler boundary; raw network errors never cross it.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connect, TLS handshake, or authentication failure towards the proxy
    /// or the backend, including a connection dropped mid-body.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The end-to-end forwarding deadline expired.
    #[error("upstream did not complete within {0:?}")]
    Timeout(Duration),

    /// The upstream response violated HTTP framing expectations.
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// The inbound request body exceeded the configured cap.
    #[error("request body exceeds the {limit}-byte limit")]
    RequestTooLarge { limit: usize },

    /// A local processing fault that is not the upstream's doing.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status answered to the caller for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamUnavailable(_) | GatewayError::MalformedUpstreamResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind for the structured error body.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            GatewayError::RequestTooLarge { .. } => "request_too_large",
            GatewayError::Internal(_) => "internal",
        }
    }
}
