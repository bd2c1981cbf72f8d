//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile the route table from validated configuration
//! - Build the registry client and the cluster builder
//! - Publish the first snapshot before any listener binds
//! - Build the authorization gate
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The reconciliation loop is started by the caller, after listeners bind

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthorizationGate, JwtGate};
use crate::cluster::ClusterBuilder;
use crate::config::schema::GatewayConfig;
use crate::controller::ConfigProvider;
use crate::registry::{self, RegistryError};
use crate::routing::{RouteError, RouteTable};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid route: {0}")]
    Route(#[from] RouteError),
    #[error("cannot create registry client: {0}")]
    Registry(#[from] RegistryError),
}

/// Everything the listeners need, built from one configuration.
pub struct Gateway {
    pub config: GatewayConfig,
    pub provider: Arc<ConfigProvider>,
    pub gate: Arc<dyn AuthorizationGate>,
}

impl Gateway {
    /// Interval between reconciliation cycles.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.config.registry.refresh_interval_secs)
    }
}

/// Build the controller and gate. The first snapshot is published before this returns.
pub async fn build(config: GatewayConfig) -> Result<Gateway, StartupError> {
    let routes = RouteTable::from_config(&config.routes)?;
    let client = registry::from_config(&config.registry)?;
    let builder = ClusterBuilder::new(client, config.registry.infrastructure_service_id.clone());

    tracing::info!(
        routes = routes.len(),
        registry = ?config.registry.kind,
        on_error = ?config.registry.on_error,
        "Building routing controller"
    );
    let provider = Arc::new(ConfigProvider::new(routes, builder, config.registry.on_error).await);
    let gate: Arc<dyn AuthorizationGate> = Arc::new(JwtGate::new(&config.auth));

    Ok(Gateway {
        config,
        provider,
        gate,
    })
}
