//! Published routing state.
//!
//! # Responsibilities
//! - Hold the current `ConfigSnapshot` behind an atomic pointer
//! - Rebuild and publish snapshots (`update`)
//! - Own the reconciliation loop (`start` / `stop`)
//!
//! # Design Decisions
//! - Readers never lock: `current()` is an `ArcSwap` load
//! - Single writer: the cycle lock rejects overlapping updates instead of queueing them
//! - `stop` takes the cycle lock, so no snapshot is published once it returns
//! - The previous snapshot's signal fires only after the swap

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::cluster::{Cluster, ClusterBuilder, ClusterPass};
use crate::config::schema::RegistryFailurePolicy;
use crate::controller::reconcile::ReconciliationLoop;
use crate::controller::snapshot::ConfigSnapshot;
use crate::observability::metrics;
use crate::routing::RouteTable;

/// What a call to [`ConfigProvider::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Published {
        generation: u64,
        clusters: usize,
        degraded: bool,
    },
    /// Another update was in flight.
    Skipped,
    /// The provider has been stopped.
    Stopped,
}

/// Process-wide holder of the current routing snapshot.
pub struct ConfigProvider {
    current: ArcSwap<ConfigSnapshot>,
    routes: Arc<RouteTable>,
    builder: ClusterBuilder,
    failure_policy: RegistryFailurePolicy,
    generation: AtomicU64,
    cycle: tokio::sync::Mutex<()>,
    stopped: AtomicBool,
    scheduler: Mutex<Option<ReconciliationLoop>>,
}

impl std::fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("failure_policy", &self.failure_policy)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn settle_pass(
    pass: ClusterPass,
    policy: RegistryFailurePolicy,
    previous: Option<&ConfigSnapshot>,
) -> (Arc<Vec<Cluster>>, bool) {
    let Some(error) = pass.error else {
        return (Arc::new(pass.clusters), false);
    };

    metrics::record_registry_error();
    match (policy, previous) {
        (RegistryFailurePolicy::StaleOnError, Some(previous)) => {
            tracing::warn!(
                error = %error,
                kept_clusters = previous.clusters().len(),
                "Registry query failed, keeping last known clusters"
            );
            (previous.shared_clusters(), true)
        }
        _ => {
            tracing::warn!(
                error = %error,
                clusters = pass.clusters.len(),
                "Registry query failed, publishing degraded cluster set"
            );
            (Arc::new(pass.clusters), true)
        }
    }
}

impl ConfigProvider {
    /// Build the first snapshot eagerly so routing never sees an unconfigured provider.
    pub async fn new(routes: RouteTable, builder: ClusterBuilder, failure_policy: RegistryFailurePolicy) -> Self {
        let routes = Arc::new(routes);
        let (clusters, degraded) = settle_pass(builder.build().await, failure_policy, None);
        let first = ConfigSnapshot::new(1, Arc::clone(&routes), clusters, degraded);

        tracing::info!(
            routes = routes.len(),
            clusters = first.clusters().len(),
            degraded,
            "Initial routing snapshot built"
        );
        metrics::record_snapshot(&first);

        Self {
            current: ArcSwap::from_pointee(first),
            routes,
            builder,
            failure_policy,
            generation: AtomicU64::new(1),
            cycle: tokio::sync::Mutex::new(()),
            stopped: AtomicBool::new(false),
            scheduler: Mutex::new(None),
        }
    }

    /// The presently published snapshot. Never blocks.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn failure_policy(&self) -> RegistryFailurePolicy {
        self.failure_policy
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .map(|scheduler| scheduler.is_some())
            .unwrap_or(false)
    }

    /// Rebuild clusters from the registry and publish a new snapshot.
    pub async fn update(&self) -> UpdateOutcome {
        if self.is_stopped() {
            return UpdateOutcome::Stopped;
        }
        let Ok(_cycle) = self.cycle.try_lock() else {
            tracing::debug!("Update already in flight, skipping");
            return UpdateOutcome::Skipped;
        };
        // stop() may have run between the first check and taking the lock.
        if self.is_stopped() {
            return UpdateOutcome::Stopped;
        }

        let pass = self.builder.build().await;
        let previous = self.current();
        let (clusters, degraded) = settle_pass(pass, self.failure_policy, Some(previous.as_ref()));
        drop(previous);

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let next = Arc::new(ConfigSnapshot::new(generation, Arc::clone(&self.routes), clusters, degraded));
        let cluster_count = next.clusters().len();
        metrics::record_snapshot(&next);

        let previous = self.current.swap(next);
        previous.signal_change();

        tracing::debug!(
            generation,
            clusters = cluster_count,
            degraded,
            "Published routing snapshot"
        );
        UpdateOutcome::Published {
            generation,
            clusters: cluster_count,
            degraded,
        }
    }

    /// Begin periodic reconciliation. Has no effect if already started or stopped.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.is_stopped() {
            tracing::warn!("Provider already stopped, not starting reconciliation");
            return;
        }
        let Ok(mut scheduler) = self.scheduler.lock() else {
            return;
        };
        if scheduler.is_none() {
            *scheduler = Some(ReconciliationLoop::spawn(Arc::clone(self), interval));
        }
    }

    /// Halt reconciliation and release the registry client.
    ///
    /// Waits for an update already in flight to publish. Afterwards
    /// `current()` keeps serving the last published snapshot.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let scheduler = self.scheduler.lock().ok().and_then(|mut s| s.take());
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        let _cycle = self.cycle.lock().await;
        self.builder.registry().shutdown().await;
        tracing::info!(
            generation = self.current().generation(),
            "Routing configuration provider stopped"
        );
    }
}
