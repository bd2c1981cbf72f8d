//! Dynamic routing gateway library.

pub mod admin;
pub mod auth;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use controller::{ConfigProvider, ConfigSnapshot};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
