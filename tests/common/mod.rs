// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use link_preview_server::{
    config::{ExtractConfig, FetchConfig},
    fetch::Fetcher,
    handlers,
    state::AppState,
};

pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Fetch settings for tests: short timeout, loopback allowed so that
/// wiremock servers on 127.0.0.1 are reachable.
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        timeout: TEST_TIMEOUT,
        allow_private_hosts: true,
        ..FetchConfig::default()
    }
}

pub fn test_state(fetch: FetchConfig) -> AppState {
    AppState {
        fetcher: Fetcher::new(fetch).expect("Failed to build test HTTP client"),
        extract: Arc::new(ExtractConfig::default()),
    }
}

/// Build the full application router with loopback targets permitted.
pub fn create_test_app() -> Router {
    handlers::router(test_state(test_fetch_config()))
}

/// `/preview?url=...` with `target` percent-encoded.
pub fn preview_uri(target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/preview?url={encoded}")
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = request(app, Method::GET, uri).await;
    (status, body)
}

pub async fn request(app: Router, method: Method, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ORIGIN, "https://cards.example.org")
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "response body is not JSON: {}",
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, headers, body)
}
