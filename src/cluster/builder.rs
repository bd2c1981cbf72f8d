//! Registry listing to cluster conversion.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cluster::Cluster;
use crate::registry::{RegistryClient, RegistryError, ServiceInstance};

/// Result of one build pass.
///
/// `error` is set when the registry query failed; `clusters` then holds what the
/// pass accumulated before aborting.
#[derive(Debug)]
pub struct ClusterPass {
    pub clusters: Vec<Cluster>,
    pub error: Option<RegistryError>,
}

/// Converts the registry's live instances into clusters.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    registry: Arc<dyn RegistryClient>,
    infrastructure_service_id: String,
}

impl ClusterBuilder {
    pub fn new(registry: Arc<dyn RegistryClient>, infrastructure_service_id: impl Into<String>) -> Self {
        Self {
            registry,
            infrastructure_service_id: infrastructure_service_id.into(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn RegistryClient> {
        &self.registry
    }

    /// Query the registry and build this cycle's clusters. Never propagates errors.
    pub async fn build(&self) -> ClusterPass {
        match self.registry.list_instances().await {
            Ok(instances) => ClusterPass {
                clusters: clusters_from_instances(&instances, &self.infrastructure_service_id),
                error: None,
            },
            Err(e) => ClusterPass {
                clusters: Vec::new(),
                error: Some(e),
            },
        }
    }
}

/// Newest registration first; the first instance seen for a service id wins.
pub fn clusters_from_instances(instances: &[ServiceInstance], infrastructure_service_id: &str) -> Vec<Cluster> {
    let mut seen = HashSet::new();
    let mut clusters = Vec::new();

    for instance in instances.iter().rev() {
        if instance.service_id == infrastructure_service_id || seen.contains(instance.service_id.as_str()) {
            continue;
        }
        match Cluster::single(instance) {
            Ok(cluster) => {
                seen.insert(instance.service_id.as_str());
                clusters.push(cluster);
            }
            Err(e) => {
                tracing::warn!(
                    service_id = %instance.service_id,
                    host = %instance.host,
                    port = instance.port,
                    error = %e,
                    "Skipping instance with invalid address"
                );
            }
        }
    }

    clusters
}
