//! Admin API.
//!
//! Bearer-key protected endpoints for inspecting the published routing
//! snapshot and forcing a reconciliation cycle. Served on its own listener.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::controller::ConfigProvider;

use self::auth::admin_auth_middleware;
use self::handlers::{get_snapshot, get_status, post_reconcile};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub provider: Arc<ConfigProvider>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/snapshot", get(get_snapshot))
        .route("/admin/reconcile", post(post_reconcile))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
