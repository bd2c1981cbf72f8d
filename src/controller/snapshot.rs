//! Immutable routing snapshot.
//!
//! # Responsibilities
//! - Bundle the route table, this cycle's clusters, and a change signal
//! - Resolve (method, path) to a route, destination, and upstream path
//!
//! # Design Decisions
//! - Never mutated after construction; a new cycle builds a new snapshot
//! - The route table is shared by every snapshot
//! - Resolution failures are explicit (`RoutingError`), never a silent default

use std::sync::Arc;
use std::time::SystemTime;

use axum::http::Method;

use crate::cluster::{Cluster, Destination};
use crate::controller::signal::{ChangeSignal, ChangeToken};
use crate::routing::{Route, RouteMatch, RouteTable};

/// Why a request could not be resolved against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("no route matches {method} {path}")]
    NoMatchingRoute { method: Method, path: String },
    #[error("cluster `{cluster_id}` has no destination (route `{route_id}`)")]
    NoDestinationForCluster { route_id: String, cluster_id: String },
}

/// A request resolved to a concrete upstream.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub route: &'a Route,
    pub destination: &'a Destination,
    /// Upstream path after the route's transform, without query.
    pub upstream_path: String,
}

/// Routes and clusters valid until superseded.
#[derive(Debug)]
pub struct ConfigSnapshot {
    generation: u64,
    routes: Arc<RouteTable>,
    clusters: Arc<Vec<Cluster>>,
    degraded: bool,
    created_at: SystemTime,
    signal: ChangeSignal,
}

impl ConfigSnapshot {
    pub fn new(generation: u64, routes: Arc<RouteTable>, clusters: Arc<Vec<Cluster>>, degraded: bool) -> Self {
        Self {
            generation,
            routes,
            clusters,
            degraded,
            created_at: SystemTime::now(),
            signal: ChangeSignal::new(),
        }
    }

    /// Monotonic publish counter; the first snapshot is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub(crate) fn shared_clusters(&self) -> Arc<Vec<Cluster>> {
        Arc::clone(&self.clusters)
    }

    /// True when the registry query of the cycle that built this snapshot failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Handle that resolves once a newer snapshot has been published.
    pub fn change_token(&self) -> ChangeToken {
        self.signal.token()
    }

    pub fn is_superseded(&self) -> bool {
        self.signal.is_fired()
    }

    /// Fired by the provider when this snapshot is replaced.
    pub(crate) fn signal_change(&self) -> bool {
        self.signal.fire()
    }

    /// Select the route for a request without looking at clusters.
    pub fn match_route(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, RoutingError> {
        self.routes
            .match_request(method, path)
            .ok_or_else(|| RoutingError::NoMatchingRoute {
                method: method.clone(),
                path: path.to_string(),
            })
    }

    /// The destination currently serving `route`'s cluster.
    pub fn destination_for(&self, route: &Route) -> Result<&Destination, RoutingError> {
        self.cluster(route.cluster_id())
            .and_then(Cluster::destination)
            .ok_or_else(|| RoutingError::NoDestinationForCluster {
                route_id: route.id().to_string(),
                cluster_id: route.cluster_id().to_string(),
            })
    }

    /// Resolve a request to its route, destination and upstream path.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Resolution<'_>, RoutingError> {
        let matched = self.match_route(method, path)?;
        let route = matched.route;
        Ok(Resolution {
            route,
            destination: self.destination_for(route)?,
            upstream_path: route.upstream_path(path, &matched.values),
        })
    }
}
