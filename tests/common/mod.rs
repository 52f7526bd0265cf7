#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use collect_gateway::app::dispatch::{DispatchClient, RetryPolicy};
use collect_gateway::app::gateway::IngestionGateway;
use collect_gateway::app::status::StatusReader;
use collect_gateway::infra::{InMemoryChannel, InMemoryStatusStore};
use collect_gateway::server::create_server;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub channel: Arc<InMemoryChannel>,
    pub store: Arc<InMemoryStatusStore>,
}

pub fn test_app() -> TestApp {
    let channel = Arc::new(InMemoryChannel::new());
    let store = Arc::new(InMemoryStatusStore::new());
    let policy = RetryPolicy {
        max_attempts: 5,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        publish_timeout: Duration::from_secs(5),
    };
    let gateway = IngestionGateway::new(
        DispatchClient::new(channel.clone(), "webfront-kafka", policy),
        StatusReader::new(store.clone()),
    );
    TestApp {
        router: create_server(gateway, "/api/v1"),
        channel,
        store,
    }
}

pub async fn send(router: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, bytes.to_vec())
}

pub async fn send_json(router: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let (status, bytes) = send(router, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

pub const VALID_REQUEST: &str = r#"{"project_github_url":"https://github.com/a/b","build_command":"make","build_out_dir":"dist"}"#;
