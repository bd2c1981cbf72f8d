//! Registry backed by a fixed instance list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::config::schema::StaticInstanceConfig;
use crate::registry::{RegistryClient, RegistryError, ServiceInstance};

/// Serves instances from configuration. The listing can be replaced at runtime.
#[derive(Debug)]
pub struct StaticRegistry {
    instances: ArcSwap<Vec<ServiceInstance>>,
    closed: AtomicBool,
}

impl StaticRegistry {
    pub fn new(instances: Vec<ServiceInstance>) -> Self {
        Self {
            instances: ArcSwap::from_pointee(instances),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(configs: &[StaticInstanceConfig]) -> Self {
        Self::new(
            configs
                .iter()
                .map(|c| ServiceInstance::new(&c.service_id, &c.host, c.port))
                .collect(),
        )
    }

    /// Replace the listing returned by subsequent queries.
    pub fn replace(&self, instances: Vec<ServiceInstance>) {
        self.instances.store(Arc::new(instances));
    }
}

impl RegistryClient for StaticRegistry {
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<ServiceInstance>, RegistryError>> {
        let result = if self.closed.load(Ordering::Acquire) {
            Err(RegistryError::ShutDown)
        } else {
            Ok(self.instances.load().as_ref().clone())
        };
        future::ready(result).boxed()
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.closed.store(true, Ordering::Release);
        future::ready(()).boxed()
    }
}
