use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminState;

/// Reject requests that do not carry `Authorization: Bearer <api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|key| key == &*state.api_key);

    if authorized {
        return Ok(next.run(request).await);
    }
    tracing::warn!(path = %request.uri().path(), "Rejected admin request");
    Err(StatusCode::UNAUTHORIZED)
}
