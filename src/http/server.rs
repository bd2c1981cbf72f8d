//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum Router with the greeting and proxy handlers
//! - Wire up middleware (CORS, tracing, limits, request ID, timeout)
//! - Resolve each request against the current snapshot
//! - Enforce the route's authorization policy
//! - Forward to the destination and transform the response
//!
//! # Design Decisions
//! - The snapshot is loaded once per request and held until the response
//!   head is produced, so a request never mixes two generations
//! - Connect info is optional, so the router also works without a socket

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{AuthDecision, AuthorizationGate};
use crate::config::schema::GatewayConfig;
use crate::controller::ConfigProvider;
use crate::http::error::GatewayError;
use crate::http::forward::Forwarder;
use crate::http::request::{request_id, MakeGatewayRequestId, X_REQUEST_ID};
use crate::http::response::{apply_header_transforms, finalize_headers};
use crate::observability::metrics;
use crate::routing::Route;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ConfigProvider>,
    pub gate: Arc<dyn AuthorizationGate>,
    pub forwarder: Forwarder,
}

/// The public gateway listener.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, provider: Arc<ConfigProvider>, gate: Arc<dyn AuthorizationGate>) -> Self {
        let state = AppState {
            provider,
            gate,
            forwarder: Forwarder::new(&config.timeouts),
        };
        Self {
            router: build_router(config, state),
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<std::net::SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    Router::new()
        .route("/", get(hello).fallback(proxy_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeGatewayRequestId))
}

async fn hello() -> &'static str {
    "Hello"
}

/// Match, authorize, pick the destination, forward.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).to_string();

    let snapshot = state.provider.current();
    let matched = match snapshot.match_route(&method, &path) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                generation = snapshot.generation(),
                error = %e,
                "Request not routed"
            );
            let error = GatewayError::from(e);
            metrics::record_request(method.as_str(), error.status().as_u16(), "none", start);
            return error.into_response();
        }
    };
    let route = matched.route;

    if let Some(policy) = route.authorization_policy() {
        if let AuthDecision::Deny(reason) = state.gate.authorize(policy, request.headers()) {
            tracing::info!(
                request_id = %request_id,
                route = route.id(),
                policy = policy,
                reason = %reason,
                "Authorization denied"
            );
            return route_failure(route, GatewayError::from(reason), method.as_str(), start);
        }
    }

    let destination = match snapshot.destination_for(route) {
        Ok(destination) => destination,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                route = route.id(),
                generation = snapshot.generation(),
                error = %e,
                "No destination for route"
            );
            let error = GatewayError::from(e);
            metrics::record_request(method.as_str(), error.status().as_u16(), route.id(), start);
            return error.into_response();
        }
    };
    let upstream_path = route.upstream_path(&path, &matched.values);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = route.id(),
        destination = %destination.address,
        upstream_path = %upstream_path,
        generation = snapshot.generation(),
        "Proxying request"
    );

    match state
        .forwarder
        .forward(request, destination, &upstream_path)
        .await
    {
        Ok(mut response) => {
            let status = response.status();
            finalize_headers(status, response.headers_mut(), route.response_headers());
            metrics::record_request(method.as_str(), status.as_u16(), route.id(), start);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                route = route.id(),
                destination = %destination.address,
                error = %e,
                "Upstream error"
            );
            route_failure(route, e, method.as_str(), start)
        }
    }
}

/// Error response for a request that matched `route`.
fn route_failure(route: &Route, error: GatewayError, method: &str, start: Instant) -> Response {
    let status: StatusCode = error.status();
    let mut response = error.into_response();
    apply_header_transforms(status, response.headers_mut(), route.response_headers());
    metrics::record_request(method, status.as_u16(), route.id(), start);
    response
}
