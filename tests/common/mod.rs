#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use bookmarks::config::ListConfig;
use bookmarks::handler::AppState;
use bookmarks::repository::BookmarkStore;
use bookmarks::repository::memory::InMemoryStore;
use bookmarks::routes;
use serde_json::Value;
use tower::ServiceExt;

pub const PREFIX: &str = "/api/v1";

pub fn list_config() -> ListConfig {
    ListConfig {
        default_limit: 3,
        max_limit: 10,
    }
}

pub fn build_app(store: Arc<dyn BookmarkStore>) -> Router {
    routes::app(AppState::new(store, list_config()), PREFIX)
}

/// An app over a fresh in-memory store, plus a handle on that store.
pub fn memory_app() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    (build_app(Arc::new(store.clone())), store)
}

pub fn route(path: &str) -> String {
    format!("{PREFIX}{path}")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send_raw(app: &Router, method: Method, uri: &str, body: Body) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    send_raw(app, method, uri, body).await
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Method::GET, uri, None).await
}
