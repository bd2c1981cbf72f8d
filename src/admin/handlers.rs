use std::time::{Instant, UNIX_EPOCH};

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::cluster::Cluster;
use crate::controller::UpdateOutcome;
use crate::observability::metrics;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub generation: u64,
    pub routes: usize,
    pub clusters: usize,
    pub degraded: bool,
    pub reconciling: bool,
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct RouteView {
    pub id: String,
    pub cluster_id: String,
    pub path: String,
    pub methods: Option<Vec<String>>,
    pub authorization_policy: Option<String>,
    pub path_transform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub generation: u64,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    pub degraded: bool,
    pub superseded: bool,
    pub routes: Vec<RouteView>,
    pub clusters: Vec<Cluster>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.provider.current();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        generation: snapshot.generation(),
        routes: snapshot.routes().len(),
        clusters: snapshot.clusters().len(),
        degraded: snapshot.is_degraded(),
        reconciling: state.provider.is_running(),
        stopped: state.provider.is_stopped(),
    })
}

pub async fn get_snapshot(State(state): State<AdminState>) -> Json<SnapshotView> {
    let snapshot = state.provider.current();
    let routes = snapshot
        .routes()
        .routes()
        .iter()
        .map(|route| RouteView {
            id: route.id().to_string(),
            cluster_id: route.cluster_id().to_string(),
            path: route.pattern().as_str().to_string(),
            methods: route
                .methods()
                .map(|methods| methods.iter().map(ToString::to_string).collect()),
            authorization_policy: route.authorization_policy().map(str::to_string),
            path_transform: route.path_transform().map(|t| t.as_str().to_string()),
        })
        .collect();

    Json(SnapshotView {
        generation: snapshot.generation(),
        created_at: snapshot
            .created_at()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        degraded: snapshot.is_degraded(),
        superseded: snapshot.is_superseded(),
        routes,
        clusters: snapshot.clusters().to_vec(),
    })
}

/// Run one reconciliation cycle now.
pub async fn post_reconcile(State(state): State<AdminState>) -> Json<UpdateOutcome> {
    let start = Instant::now();
    let outcome = state.provider.update().await;
    metrics::record_reconcile(&outcome, start.elapsed());
    tracing::info!(outcome = ?outcome, "Manual reconciliation requested");
    Json(outcome)
}
