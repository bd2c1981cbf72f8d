//! Cluster subsystem.
//!
//! # Data Flow
//! ```text
//! Registry listing (Vec<ServiceInstance>)
//!     → builder.rs (reverse pass, skip infrastructure, first-seen-wins)
//!     → Vec<Cluster>, one Destination each
//!     → embedded in the next ConfigSnapshot
//! ```
//!
//! # Design Decisions
//! - Clusters are immutable once built; a new cycle builds new ones
//! - Cluster id == registry service id == destination id
//! - Exactly one destination per cluster; multi-instance balancing is not handled

pub mod builder;

use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;

use crate::registry::ServiceInstance;

pub use builder::{ClusterBuilder, ClusterPass};

/// One concrete address able to serve a cluster's traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub id: String,
    pub address: Url,
}

impl Destination {
    /// Derive a destination from an instance: `http://{host}:{port}`.
    pub fn from_instance(instance: &ServiceInstance) -> Result<Self, url::ParseError> {
        let host = if instance.host.contains(':') && !instance.host.starts_with('[') {
            format!("[{}]", instance.host)
        } else {
            instance.host.clone()
        };
        let address = Url::parse(&format!("http://{}:{}", host, instance.port))?;
        Ok(Self {
            id: instance.service_id.clone(),
            address,
        })
    }

    /// `host:port` authority of the address.
    pub fn authority(&self) -> String {
        let host = self.address.host_str().unwrap_or_default();
        match self.address.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

/// A named group of destinations implementing one logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub destinations: BTreeMap<String, Destination>,
}

impl Cluster {
    /// A cluster holding only the destination derived from `instance`.
    pub fn single(instance: &ServiceInstance) -> Result<Self, url::ParseError> {
        let destination = Destination::from_instance(instance)?;
        Ok(Self {
            id: instance.service_id.clone(),
            destinations: BTreeMap::from([(destination.id.clone(), destination)]),
        })
    }

    /// The destination requests are sent to, if any.
    pub fn destination(&self) -> Option<&Destination> {
        self.destinations.values().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_address() {
        let destination =
            Destination::from_instance(&ServiceInstance::new("food-cluster", "10.0.0.1", 5001)).unwrap();
        assert_eq!(destination.id, "food-cluster");
        assert_eq!(destination.address.as_str(), "http://10.0.0.1:5001/");
        assert_eq!(destination.authority(), "10.0.0.1:5001");
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let destination =
            Destination::from_instance(&ServiceInstance::new("drink-cluster", "::1", 8080)).unwrap();
        assert_eq!(destination.address.as_str(), "http://[::1]:8080/");
        assert_eq!(destination.authority(), "[::1]:8080");
    }

    #[test]
    fn test_invalid_host_rejected() {
        assert!(Cluster::single(&ServiceInstance::new("bad", "not a host", 80)).is_err());
    }
}
