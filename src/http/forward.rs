//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI to the resolved destination
//! - Prepare forwarding headers
//! - Bound connect and total upstream time
//!
//! # Design Decisions
//! - One pooled hyper client shared by every request
//! - Bodies are streamed in both directions, never buffered

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::cluster::Destination;
use crate::config::schema::TimeoutConfig;
use crate::http::error::GatewayError;
use crate::http::request::prepare_upstream_headers;

/// Sends resolved requests to their destinations.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }

    /// Forward `request` to `destination`, replacing its path with `upstream_path`.
    ///
    /// The query string is carried over unchanged.
    pub async fn forward(
        &self,
        request: Request<Body>,
        destination: &Destination,
        upstream_path: &str,
    ) -> Result<Response<Body>, GatewayError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let (mut parts, body) = request.into_parts();

        parts.uri = upstream_uri(destination, upstream_path, parts.uri.query())?;
        parts.version = Version::HTTP_11;
        prepare_upstream_headers(&mut parts.headers, client_addr);

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout(self.request_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => Ok(into_client_response(response)),
            Ok(Err(e)) => Err(GatewayError::Upstream(e.to_string())),
            Err(_) => Err(GatewayError::UpstreamTimeout(self.request_timeout)),
        }
    }
}

fn into_client_response(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

fn upstream_uri(destination: &Destination, path: &str, query: Option<&str>) -> Result<Uri, GatewayError> {
    let mut target = format!(
        "{}://{}{}",
        destination.address.scheme(),
        destination.authority(),
        path
    );
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| GatewayError::InvalidUpstreamRequest(e.to_string()))
}
