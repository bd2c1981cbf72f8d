//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Value of the `Gateway` response header stamped by the default routes.
pub const GATEWAY_HEADER_VALUE: &str = concat!("gateway/", env!("CARGO_PKG_VERSION"));

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Service registry and reconciliation settings.
    pub registry: RegistryConfig,

    /// Bearer token validation and named policies.
    pub auth: AuthConfig,

    /// Route definitions, fixed for the lifetime of the process.
    pub routes: Vec<RouteConfig>,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API configuration.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            registry: RegistryConfig::default(),
            auth: AuthConfig::default(),
            routes: default_routes(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Which registry integration backs the reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Instances listed in `registry.static_instances`.
    Static,
    /// Consul catalog + health API.
    Consul,
}

/// What a reconciliation cycle publishes when the registry query fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryFailurePolicy {
    /// Publish whatever the failed pass accumulated (usually nothing).
    #[default]
    EmptyOnError,
    /// Keep serving the clusters of the last published snapshot.
    StaleOnError,
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry integration.
    pub kind: RegistryKind,

    /// Seconds between reconciliation cycles.
    pub refresh_interval_secs: u64,

    /// Service id of the registry itself, never turned into a cluster.
    pub infrastructure_service_id: String,

    /// Behavior when the registry cannot be queried.
    pub on_error: RegistryFailurePolicy,

    /// Instances served by the static registry, in registration order.
    pub static_instances: Vec<StaticInstanceConfig>,

    /// Consul connection parameters.
    pub consul: ConsulConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::Static,
            refresh_interval_secs: 30,
            infrastructure_service_id: "consul".to_string(),
            on_error: RegistryFailurePolicy::default(),
            static_instances: Vec::new(),
            consul: ConsulConfig::default(),
        }
    }
}

/// One statically registered service instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticInstanceConfig {
    pub service_id: String,
    pub host: String,
    pub port: u16,
}

/// Consul agent connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Base URL of the Consul HTTP API.
    pub address: String,

    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Only list instances whose health checks are passing.
    pub passing_only: bool,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8500".to_string(),
            token: None,
            timeout_secs: 5,
            passing_only: true,
        }
    }
}

/// Bearer token validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Symmetric HS256 signing key shared with the authentication service.
    pub jwt_key: String,

    /// Expected `iss` claim, validated only when set.
    pub issuer: Option<String>,

    /// Expected `aud` claim, validated only when set.
    pub audience: Option<String>,

    /// Named authorization policies routes may reference.
    pub policies: Vec<PolicyConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_key: String::new(),
            issuer: None,
            audience: None,
            policies: vec![PolicyConfig {
                name: "Default".to_string(),
                required_claims: Default::default(),
            }],
        }
    }
}

/// An authorization policy: an authenticated caller plus optional claim checks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    pub name: String,

    /// Claim name -> required value. Array claims match if any element equals the value.
    #[serde(default)]
    pub required_claims: std::collections::BTreeMap<String, String>,
}

/// Route configuration mapping requests to clusters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub id: String,

    /// Cluster (registry service id) to forward to.
    pub cluster_id: String,

    /// Path pattern, e.g. `foodservice/{**catchall}`.
    pub path: String,

    /// HTTP methods this route accepts; absent means all.
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// Authorization policy name; absent means the route is open.
    #[serde(default)]
    pub authorization_policy: Option<String>,

    /// Upstream path template, e.g. `api/{**catchall}`. Absent keeps the path.
    #[serde(default)]
    pub path_transform: Option<String>,

    /// Headers applied to the upstream response.
    #[serde(default)]
    pub response_headers: Vec<ResponseHeaderConfig>,
}

/// When a response header transform applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCondition {
    Always,
    #[default]
    Success,
    Failure,
}

/// Response header transform.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseHeaderConfig {
    pub name: String,
    pub value: String,

    /// Replace existing values instead of appending.
    #[serde(default = "default_true")]
    pub overwrite: bool,

    #[serde(default)]
    pub when: ResponseCondition,
}

fn default_true() -> bool {
    true
}

/// Request limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log formatter.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Shipped admin key. Rejected by validation when the admin API is enabled.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

fn gateway_header() -> Vec<ResponseHeaderConfig> {
    vec![ResponseHeaderConfig {
        name: "Gateway".to_string(),
        value: GATEWAY_HEADER_VALUE.to_string(),
        overwrite: true,
        when: ResponseCondition::Success,
    }]
}

/// The four routes of the food/drink/authentication deployment.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            id: "food-route".to_string(),
            cluster_id: "food-cluster".to_string(),
            path: "foodservice/{**catchall}".to_string(),
            methods: None,
            authorization_policy: Some("Default".to_string()),
            path_transform: Some("{**catchall}".to_string()),
            response_headers: gateway_header(),
        },
        RouteConfig {
            id: "drink-route".to_string(),
            cluster_id: "drink-cluster".to_string(),
            path: "drinkservice/{**catchall}".to_string(),
            methods: None,
            authorization_policy: Some("Default".to_string()),
            path_transform: Some("{**catchall}".to_string()),
            response_headers: gateway_header(),
        },
        RouteConfig {
            id: "authentication-route-authorize".to_string(),
            cluster_id: "authentication-cluster".to_string(),
            path: "authenticationservice/{**catchall}".to_string(),
            methods: None,
            authorization_policy: Some("Default".to_string()),
            path_transform: Some("api/{**catchall}".to_string()),
            response_headers: gateway_header(),
        },
        RouteConfig {
            id: "authentication-route".to_string(),
            cluster_id: "authentication-cluster".to_string(),
            path: "authenticationservice/{**catchall}".to_string(),
            methods: Some(vec!["POST".to_string()]),
            authorization_policy: None,
            path_transform: Some("api/{**catchall}".to_string()),
            response_headers: gateway_header(),
        },
    ]
}
