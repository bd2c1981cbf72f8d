//! Consul registry client.
//!
//! # Responsibilities
//! - List service names from the catalog
//! - Query each service's instances from the health endpoint
//! - Order instances by registration (`CreateIndex`)
//!
//! # Design Decisions
//! - Instances with failing checks are skipped unless `passing_only = false`
//! - The service address wins over the node address when both are present
//! - Every request carries the configured timeout; a timeout fails the whole listing

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Deserialize;
use url::Url;

use crate::config::schema::ConsulConfig;
use crate::registry::{RegistryClient, RegistryError, ServiceInstance};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeEntry,
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    service: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    create_index: u64,
}

impl HealthEntry {
    fn into_instance(self) -> (u64, ServiceInstance) {
        let host = if self.service.address.is_empty() {
            self.node.address
        } else {
            self.service.address
        };
        (
            self.service.create_index,
            ServiceInstance::new(self.service.service, host, self.service.port),
        )
    }
}

/// Lists instances through the Consul HTTP API.
#[derive(Debug)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
    passing_only: bool,
    closed: AtomicBool,
}

impl ConsulRegistry {
    pub fn new(config: &ConsulConfig) -> Result<Self, RegistryError> {
        let base = Url::parse(&config.address)
            .map_err(|e| RegistryError::Unavailable(format!("invalid consul address: {}", e)))?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
            timeout,
            passing_only: config.passing_only,
            closed: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::Unavailable(format!("invalid consul address: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn map_error(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout(self.timeout)
        } else if err.is_decode() {
            RegistryError::Malformed(err.to_string())
        } else {
            RegistryError::Unavailable(err.to_string())
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, RegistryError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("X-Consul-Token", token);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Unavailable(format!("consul returned {}", status)));
        }
        response.json().await.map_err(|e| self.map_error(e))
    }

    async fn service_instances(&self, name: &str) -> Result<Vec<(u64, ServiceInstance)>, RegistryError> {
        let mut url = self.endpoint(&["v1", "health", "service", name])?;
        if self.passing_only {
            url.query_pairs_mut().append_pair("passing", "true");
        }
        let entries: Vec<HealthEntry> = self.get_json(url).await?;
        Ok(entries.into_iter().map(HealthEntry::into_instance).collect())
    }

    async fn list(&self) -> Result<Vec<ServiceInstance>, RegistryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::ShutDown);
        }

        let services: BTreeMap<String, Vec<String>> =
            self.get_json(self.endpoint(&["v1", "catalog", "services"])?).await?;

        let per_service =
            future::try_join_all(services.keys().map(|name| self.service_instances(name))).await?;

        let mut indexed: Vec<(u64, ServiceInstance)> = per_service.into_iter().flatten().collect();
        indexed.sort_by_key(|(create_index, _)| *create_index);

        tracing::debug!(services = services.len(), instances = indexed.len(), "Consul listing fetched");
        Ok(indexed.into_iter().map(|(_, instance)| instance).collect())
    }
}

impl RegistryClient for ConsulRegistry {
    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<ServiceInstance>, RegistryError>> {
        self.list().boxed()
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.closed.store(true, Ordering::Release);
        tracing::info!(address = %self.base, "Consul registry client released");
        future::ready(()).boxed()
    }
}
