//! Service registry clients.
//!
//! # Data Flow
//! ```text
//! Reconciliation cycle
//!     → RegistryClient::list_instances()
//!         - static_list.rs (instances from config)
//!         - consul.rs (Consul catalog + health API)
//!     → Vec<ServiceInstance> in registration order, or RegistryError
//! ```
//!
//! # Design Decisions
//! - One trait object seam; any discovery mechanism can satisfy it
//! - Errors are transient by contract; callers never treat them as fatal
//! - Boxed futures keep the trait object-safe

pub mod consul;
pub mod static_list;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::config::schema::{RegistryConfig, RegistryKind};

pub use consul::ConsulRegistry;
pub use static_list::StaticRegistry;

/// A live instance of a registered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service_id: service_id.into(),
            host: host.into(),
            port,
        }
    }
}

/// Failure to obtain a listing from the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed registry response: {0}")]
    Malformed(String),
    #[error("registry client has been shut down")]
    ShutDown,
}

/// Anything that can list currently registered service instances.
pub trait RegistryClient: Send + Sync + fmt::Debug {
    /// List instances, oldest registration first.
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<ServiceInstance>, RegistryError>>;

    /// Release the client. Later listings fail with [`RegistryError::ShutDown`].
    fn shutdown(&self) -> BoxFuture<'_, ()>;
}

/// Build the registry client selected by configuration.
pub fn from_config(config: &RegistryConfig) -> Result<Arc<dyn RegistryClient>, RegistryError> {
    match config.kind {
        RegistryKind::Static => Ok(Arc::new(StaticRegistry::from_config(&config.static_instances))),
        RegistryKind::Consul => Ok(Arc::new(ConsulRegistry::new(&config.consul)?)),
    }
}
