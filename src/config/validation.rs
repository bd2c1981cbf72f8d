//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing policies)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Compile every route once so bad patterns fail before startup
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{GatewayConfig, RegistryKind, PLACEHOLDER_ADMIN_KEY};
use crate::routing::Route;

/// A single semantic problem, located by its config path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty when admin is enabled"));
        } else if config.admin.api_key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new("admin.api_key", "must be changed from the placeholder"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than zero"));
    }

    let registry = &config.registry;
    if registry.refresh_interval_secs == 0 {
        errors.push(ValidationError::new("registry.refresh_interval_secs", "must be greater than zero"));
    }
    match registry.kind {
        RegistryKind::Static => {
            for (i, instance) in registry.static_instances.iter().enumerate() {
                if instance.service_id.is_empty() {
                    errors.push(ValidationError::new(
                        format!("registry.static_instances[{}].service_id", i),
                        "must not be empty",
                    ));
                }
                if instance.host.is_empty() {
                    errors.push(ValidationError::new(
                        format!("registry.static_instances[{}].host", i),
                        "must not be empty",
                    ));
                }
            }
        }
        RegistryKind::Consul => {
            if let Err(e) = Url::parse(&registry.consul.address) {
                errors.push(ValidationError::new("registry.consul.address", e.to_string()));
            }
            if registry.consul.timeout_secs == 0 {
                errors.push(ValidationError::new("registry.consul.timeout_secs", "must be greater than zero"));
            }
        }
    }

    let policies: HashSet<&str> = config.auth.policies.iter().map(|p| p.name.as_str()).collect();
    let mut seen = HashSet::new();
    let mut uses_policy = false;

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if route.id.is_empty() {
            errors.push(ValidationError::new(format!("{}.id", field), "must not be empty"));
        } else if !seen.insert(route.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.id", field),
                format!("duplicate route id `{}`", route.id),
            ));
        }
        if route.cluster_id.is_empty() {
            errors.push(ValidationError::new(format!("{}.cluster_id", field), "must not be empty"));
        }
        if let Err(e) = Route::from_config(route) {
            errors.push(ValidationError::new(field.clone(), e.to_string()));
        }
        if let Some(policy) = &route.authorization_policy {
            uses_policy = true;
            if !policies.contains(policy.as_str()) {
                errors.push(ValidationError::new(
                    format!("{}.authorization_policy", field),
                    format!("unknown policy `{}`", policy),
                ));
            }
        }
    }

    if uses_policy && config.auth.jwt_key.is_empty() {
        errors.push(ValidationError::new(
            "auth.jwt_key",
            "must be set when any route requires authorization",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address `{}`", value)));
    }
}
