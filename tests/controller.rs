//! Reconciliation, publication and change-notification behavior.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use gateway::cluster::ClusterBuilder;
use gateway::config::schema::{default_routes, RegistryFailurePolicy};
use gateway::controller::{ConfigProvider, RoutingError, UpdateOutcome};
use gateway::registry::{RegistryClient, RegistryError, ServiceInstance};
use gateway::routing::RouteTable;

/// Registry whose n-th listing serves `food-cluster` on port `1000 + n`.
#[derive(Debug, Default)]
struct ScriptedRegistry {
    calls: AtomicUsize,
    failing: AtomicBool,
    gated: AtomicBool,
    release: Notify,
    shut_down: AtomicBool,
}

impl RegistryClient for ScriptedRegistry {
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<ServiceInstance>, RegistryError>> {
        async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.gated.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(RegistryError::Unavailable("agent down".to_string()));
            }
            Ok(vec![ServiceInstance::new("food-cluster", "127.0.0.1", 1000 + n as u16)])
        }
        .boxed()
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.shut_down.store(true, Ordering::SeqCst);
        futures_util::future::ready(()).boxed()
    }
}

async fn provider(policy: RegistryFailurePolicy) -> (Arc<ConfigProvider>, Arc<ScriptedRegistry>) {
    let registry = Arc::new(ScriptedRegistry::default());
    let client: Arc<dyn RegistryClient> = registry.clone();
    let routes = RouteTable::from_config(&default_routes()).unwrap();
    let provider = ConfigProvider::new(routes, ClusterBuilder::new(client, "consul"), policy).await;
    (Arc::new(provider), registry)
}

fn food_port(provider: &ConfigProvider) -> Option<u16> {
    provider
        .current()
        .cluster("food-cluster")
        .and_then(|c| c.destination())
        .and_then(|d| d.address.port())
}

#[tokio::test(start_paused = true)]
async fn test_loop_ticks_until_stopped() {
    let (provider, registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

    provider.start(Duration::from_secs(10));
    assert!(provider.is_running());

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(registry.calls.load(Ordering::SeqCst), 4);
    assert_eq!(provider.current().generation(), 4);
    assert_eq!(food_port(&provider), Some(1004));

    provider.stop().await;
    assert!(provider.is_stopped());
    assert!(!provider.is_running());
    assert!(registry.shut_down.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(registry.calls.load(Ordering::SeqCst), 4);
    assert_eq!(provider.update().await, UpdateOutcome::Stopped);
    assert_eq!(provider.current().generation(), 4);
}

#[tokio::test]
async fn test_overlapping_update_is_skipped() {
    let (provider, registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    registry.gated.store(true, Ordering::SeqCst);

    let (first, second) = tokio::join!(provider.update(), async {
        let outcome = provider.update().await;
        registry.release.notify_one();
        outcome
    });

    assert!(matches!(first, UpdateOutcome::Published { generation: 2, .. }));
    assert_eq!(second, UpdateOutcome::Skipped);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stop_waits_for_update_in_flight() {
    let (provider, registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    registry.gated.store(true, Ordering::SeqCst);

    let in_flight = tokio::spawn({
        let provider = provider.clone();
        async move { provider.update().await }
    });
    while registry.calls.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    let stopping = tokio::spawn({
        let provider = provider.clone();
        async move { provider.stop().await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!stopping.is_finished());
    assert!(!registry.shut_down.load(Ordering::SeqCst));

    registry.release.notify_one();
    stopping.await.unwrap();

    let generation = provider.current().generation();
    assert_eq!(generation, 2);
    assert!(matches!(in_flight.await.unwrap(), UpdateOutcome::Published { generation: 2, .. }));
    assert!(registry.shut_down.load(Ordering::SeqCst));

    assert_eq!(provider.update().await, UpdateOutcome::Stopped);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.current().generation(), generation);
}

#[tokio::test]
async fn test_change_token_wakes_waiter() {
    let (provider, _registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    let original = provider.current();
    let mut token = original.change_token();
    assert!(!token.has_changed());

    let waiter = tokio::spawn(async move {
        token.changed().await;
    });
    tokio::task::yield_now().await;

    provider.update().await;
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter not woken")
        .unwrap();

    assert!(original.is_superseded());
    assert!(!provider.current().change_token().has_changed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_mixed_snapshots() {
    let (provider, _registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let provider = provider.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) {
                    let snapshot = provider.current();
                    let resolution = snapshot.resolve(&Method::GET, "/foodservice/menu").unwrap();
                    assert_eq!(
                        u64::from(resolution.destination.address.port().unwrap()),
                        1000 + snapshot.generation()
                    );
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            })
        })
        .collect();

    for _ in 0..50 {
        provider.update().await;
        tokio::task::yield_now().await;
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(provider.current().generation(), 51);
}

#[tokio::test]
async fn test_registry_failure_empties_clusters() {
    let (provider, registry) = provider(RegistryFailurePolicy::EmptyOnError).await;
    assert!(provider.current().resolve(&Method::GET, "/foodservice/menu").is_ok());

    registry.failing.store(true, Ordering::SeqCst);
    let outcome = provider.update().await;
    assert_eq!(
        outcome,
        UpdateOutcome::Published {
            generation: 2,
            clusters: 0,
            degraded: true
        }
    );

    let snapshot = provider.current();
    assert!(matches!(
        snapshot.resolve(&Method::GET, "/foodservice/menu"),
        Err(RoutingError::NoDestinationForCluster { .. })
    ));

    registry.failing.store(false, Ordering::SeqCst);
    provider.update().await;
    assert!(!provider.current().is_degraded());
    assert_eq!(food_port(&provider), Some(1003));
}

#[tokio::test]
async fn test_registry_failure_keeps_stale_clusters() {
    let (provider, registry) = provider(RegistryFailurePolicy::StaleOnError).await;
    registry.failing.store(true, Ordering::SeqCst);

    provider.update().await;
    let snapshot = provider.current();
    assert_eq!(snapshot.generation(), 2);
    assert!(snapshot.is_degraded());
    assert_eq!(food_port(&provider), Some(1001));
}
