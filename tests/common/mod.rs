//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use gateway::auth::JwtGate;
use gateway::cluster::ClusterBuilder;
use gateway::config::schema::{default_routes, GatewayConfig, RegistryFailurePolicy};
use gateway::controller::ConfigProvider;
use gateway::http::GatewayServer;
use gateway::lifecycle::Shutdown;
use gateway::registry::{RegistryClient, ServiceInstance, StaticRegistry};
use gateway::routing::RouteTable;

pub const JWT_KEY: &str = "integration-test-signing-key";

/// Start a backend that echoes what it received as JSON.
///
/// Responds 500 when the query string contains `fail`. Always sets
/// `gateway: upstream` so overwrite behavior is observable.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(request: Request) -> Response {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let body = json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "host": header("host"),
        "authorization": header("authorization"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_forwarded_host": header("x-forwarded-host"),
        "x_request_id": header("x-request-id"),
    });
    let status = if request.uri().query().is_some_and(|q| q.contains("fail")) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, [("gateway", "upstream")], Json(body)).into_response()
}

/// Start a backend that writes a fixed raw response and closes.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn instance(service_id: &str, addr: SocketAddr) -> ServiceInstance {
    ServiceInstance::new(service_id, addr.ip().to_string(), addr.port())
}

/// Sign a token the gateway under test accepts.
pub fn token(extra: serde_json::Value) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 300;
    let mut claims = json!({ "sub": "test", "exp": exp });
    if let (Some(claims), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        claims.extend(extra.clone());
    }
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_KEY.as_bytes())).unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A running gateway wired to a static registry the test controls.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub provider: Arc<ConfigProvider>,
    pub registry: Arc<StaticRegistry>,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(instances: Vec<ServiceInstance>) -> Self {
        Self::start_with(instances, RegistryFailurePolicy::EmptyOnError).await
    }

    pub async fn start_with(instances: Vec<ServiceInstance>, policy: RegistryFailurePolicy) -> Self {
        let mut config = GatewayConfig::default();
        config.auth.jwt_key = JWT_KEY.to_string();

        let registry = Arc::new(StaticRegistry::new(instances));
        let client: Arc<dyn RegistryClient> = registry.clone();
        let routes = RouteTable::from_config(&default_routes()).unwrap();
        let provider = Arc::new(
            ConfigProvider::new(routes, ClusterBuilder::new(client, "consul"), policy).await,
        );

        let server = GatewayServer::new(&config, provider.clone(), Arc::new(JwtGate::new(&config.auth)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, signal).await;
        });

        Self {
            addr,
            provider,
            registry,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
