//! End-to-end request handling through a running gateway.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{client, closed_port, instance, start_echo_backend, start_raw_backend, token, TestGateway};
use gateway::config::schema::{GatewayConfig, RegistryFailurePolicy, GATEWAY_HEADER_VALUE};
use gateway::registry::RegistryClient;

#[tokio::test]
async fn test_login_is_open_and_rewritten() {
    let backend = start_echo_backend().await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", backend)]).await;

    let res = client()
        .post(gw.url("/authenticationservice/login"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("gateway").unwrap(), GATEWAY_HEADER_VALUE);
    assert!(res.headers().get("x-request-id").is_some());

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/api/login");
    assert_eq!(body["host"], backend.to_string());
    assert_eq!(body["x_forwarded_host"], gw.addr.to_string());
    assert_eq!(body["x_forwarded_for"], "127.0.0.1");
    assert!(body["x_request_id"].is_string());
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let backend = start_echo_backend().await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", backend)]).await;

    let res = client()
        .get(gw.url("/authenticationservice/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get("www-authenticate").unwrap(), "Bearer");

    let res = client()
        .get(gw.url("/authenticationservice/profile"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorized_request_forwarded_with_query() {
    let backend = start_echo_backend().await;
    let gw = TestGateway::start(vec![instance("food-cluster", backend)]).await;
    let bearer = token(json!({}));

    let res = client()
        .get(gw.url("/foodservice/menu/today?lang=en"))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/menu/today");
    assert_eq!(body["query"], "lang=en");
    assert_eq!(body["authorization"], format!("Bearer {}", bearer));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let gw = TestGateway::start(vec![]).await;
    let res = client().get(gw.url("/nowhere/at/all")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unregistered_service_is_503() {
    let gw = TestGateway::start(vec![]).await;
    let res = client()
        .post(gw.url("/authenticationservice/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_protected_route_without_destination_still_requires_token() {
    let gw = TestGateway::start(vec![]).await;

    let res = client().get(gw.url("/foodservice/menu")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client()
        .get(gw.url("/foodservice/menu"))
        .bearer_auth(token(json!({})))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_root_greeting() {
    let gw = TestGateway::start(vec![]).await;
    let res = client().get(gw.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Hello");
}

#[tokio::test]
async fn test_upstream_failure_keeps_upstream_header() {
    let backend = start_echo_backend().await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", backend)]).await;

    let res = client()
        .post(gw.url("/authenticationservice/login?fail=1"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers().get("gateway").unwrap(), "upstream");
}

#[tokio::test]
async fn test_unreachable_destination_is_502() {
    let dead = closed_port().await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", dead)]).await;

    let res = client()
        .post(gw.url("/authenticationservice/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_hop_by_hop_response_headers_stripped() {
    let backend = start_raw_backend(
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close, x-hop\r\nx-hop: 1\r\nx-kept: 1\r\n\r\nok",
    )
    .await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", backend)]).await;

    let res = client()
        .post(gw.url("/authenticationservice/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-hop").is_none());
    assert_eq!(res.headers().get("x-kept").unwrap(), "1");
    assert_eq!(res.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_registry_change_picked_up_after_update() {
    let first = start_echo_backend().await;
    let second = start_echo_backend().await;
    let gw = TestGateway::start(vec![instance("authentication-cluster", first)]).await;

    let res = client().post(gw.url("/authenticationservice/login")).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["host"], first.to_string());

    gw.registry.replace(vec![instance("authentication-cluster", second)]);
    gw.provider.update().await;

    let res = client().post(gw.url("/authenticationservice/login")).send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["host"], second.to_string());
}

#[tokio::test]
async fn test_stale_policy_survives_registry_outage() {
    let backend = start_echo_backend().await;
    let gw = TestGateway::start_with(
        vec![instance("authentication-cluster", backend)],
        RegistryFailurePolicy::StaleOnError,
    )
    .await;

    gw.registry.shutdown().await;
    gw.provider.update().await;
    let snapshot = gw.provider.current();
    assert!(snapshot.is_degraded());
    assert!(snapshot.cluster("authentication-cluster").is_some());

    let res = client().post(gw.url("/authenticationservice/login")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_graceful_shutdown_stops_listener() {
    let gw = TestGateway::start(vec![]).await;
    assert_eq!(client().get(gw.url("/")).send().await.unwrap().status(), 200);

    gw.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client().get(gw.url("/")).send().await.is_err());
}

#[tokio::test]
async fn test_router_without_socket() {
    let gw = TestGateway::start(vec![]).await;
    let server = gateway::http::GatewayServer::new(
        &GatewayConfig::default(),
        gw.provider.clone(),
        std::sync::Arc::new(gateway::auth::JwtGate::new(&GatewayConfig::default().auth)),
    );

    let response = server
        .router()
        .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let preflight = server
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/foodservice/menu")
                .header("origin", "http://example.com")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(preflight.headers().get("access-control-allow-origin").unwrap(), "*");
}
