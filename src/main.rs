//! API gateway with registry-driven routing.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                   GATEWAY                     │
//!     Client Request      │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!     ────────────────────┼─▶│  http   │──▶│ snapshot │──▶│   auth    │  │
//!                         │  │ server  │   │ resolve  │   │   gate    │  │
//!                         │  └─────────┘   └────▲─────┘   └─────┬─────┘  │
//!                         │                     │ ArcSwap       │        │
//!                         │               ┌─────┴──────┐  ┌─────▼─────┐  │
//!                         │               │ controller │  │  forward  │──┼──▶ Service
//!                         │               │  provider  │  └───────────┘  │
//!                         │               └─────▲──────┘                 │
//!                         │                     │ every N seconds        │
//!                         │               ┌─────┴──────┐                 │
//!                         │               │  registry  │◀────────────────┼──── Consul / static
//!                         │               └────────────┘                 │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use gateway::admin::{setup_admin_router, AdminState};
use gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use gateway::http::GatewayServer;
use gateway::lifecycle::{self, signals, Shutdown};
use gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "API gateway routing to services discovered in a registry", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when absent.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = lifecycle::build(config).await?;
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind(&gateway.config.listener.bind_address).await?;
    let server = GatewayServer::new(&gateway.config, gateway.provider.clone(), gateway.gate.clone());
    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(server.run(listener, shutdown.subscribe()));

    if gateway.config.admin.enabled {
        let admin_listener = TcpListener::bind(&gateway.config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let app = setup_admin_router(AdminState {
            provider: gateway.provider.clone(),
            api_key: Arc::from(gateway.config.admin.api_key.as_str()),
        });
        let mut signal = shutdown.subscribe();
        tasks.spawn(async move {
            axum::serve(admin_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.recv().await;
                })
                .await
        });
    }

    gateway.provider.start(gateway.refresh_interval());

    tokio::select! {
        name = signals::wait_for_termination() => {
            tracing::info!(signal = name, "Shutdown signal received");
        }
        Some(result) = tasks.join_next() => {
            tracing::error!(result = ?result, "Listener exited unexpectedly");
        }
    }

    shutdown.trigger();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Err(e)) => tracing::error!(error = %e, "Listener failed during shutdown"),
            Err(e) => tracing::error!(error = %e, "Listener task panicked"),
            Ok(Ok(())) => {}
        }
    }
    gateway.provider.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
