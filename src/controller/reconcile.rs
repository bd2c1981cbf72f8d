//! Periodic reconciliation.
//!
//! # Responsibilities
//! - Call `ConfigProvider::update` once per interval
//! - Stop on request, letting an in-flight update finish
//!
//! # Design Decisions
//! - One task awaits each cycle before the next tick: cycles never overlap
//! - Missed ticks are skipped, not queued
//! - The task holds a weak reference; dropping the provider ends the loop

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::controller::provider::{ConfigProvider, UpdateOutcome};
use crate::observability::metrics;

/// Handle to the running reconciliation task.
#[derive(Debug)]
pub struct ReconciliationLoop {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconciliationLoop {
    /// Spawn the loop. The first tick fires one `interval` from now.
    pub fn spawn(provider: Arc<ConfigProvider>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let provider = Arc::downgrade(&provider);
        let task = tokio::spawn(run(provider, interval, stop_rx));
        Self { stop_tx, task }
    }

    /// Cancel future ticks and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconciliation task failed");
        }
    }
}

async fn run(provider: Weak<ConfigProvider>, interval: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = interval.as_secs(), "Reconciliation loop started");

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => {
                tracing::info!("Reconciliation loop received stop signal, exiting");
                break;
            }
            _ = ticker.tick() => {
                let Some(provider) = provider.upgrade() else {
                    break;
                };
                let started = Instant::now();
                let outcome = provider.update().await;
                metrics::record_reconcile(&outcome, started.elapsed());
                match outcome {
                    UpdateOutcome::Published { generation, clusters, degraded } => {
                        tracing::debug!(generation, clusters, degraded, "Reconciliation cycle complete");
                    }
                    UpdateOutcome::Skipped => {
                        tracing::debug!("Reconciliation tick skipped, update in flight");
                    }
                    UpdateOutcome::Stopped => break,
                }
            }
        }
    }
}
