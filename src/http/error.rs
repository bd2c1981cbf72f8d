//! Request-path failures and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::DenyReason;
use crate::controller::RoutingError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("authorization denied: {0}")]
    AuthorizationDenied(#[from] DenyReason),
    #[error("invalid upstream request: {0}")]
    InvalidUpstreamRequest(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(std::time::Duration),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Routing(RoutingError::NoMatchingRoute { .. }) => StatusCode::NOT_FOUND,
            GatewayError::Routing(RoutingError::NoDestinationForCluster { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::AuthorizationDenied(reason) if reason.is_unauthenticated() => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidUpstreamRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Body sent to the client; never leaks token or upstream details.
    fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Routing(RoutingError::NoMatchingRoute { .. }) => "No matching route found",
            GatewayError::Routing(RoutingError::NoDestinationForCluster { .. }) => {
                "No destination available for service"
            }
            GatewayError::AuthorizationDenied(reason) if reason.is_unauthenticated() => "Unauthorized",
            GatewayError::AuthorizationDenied(_) => "Forbidden",
            GatewayError::InvalidUpstreamRequest(_) => "Bad request",
            GatewayError::Upstream(_) => "Upstream request failed",
            GatewayError::UpstreamTimeout(_) => "Upstream timed out",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, self.public_message()).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
