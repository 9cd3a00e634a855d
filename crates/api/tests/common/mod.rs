#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use codevoice_api::config::{ServerConfig, StoreBackend};
use codevoice_api::router::build_app_router;
use codevoice_api::state::AppState;
use codevoice_api::ws::WsManager;
use codevoice_db::store::{InMemoryTaskStore, TaskStore};
use codevoice_events::{InProcessBroker, Notifier, TaskBroker};
use codevoice_worker::Metrics;
use http_body_util::BodyExt;
use tokio::sync::Notify;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses the in-memory store, a 50ms relay poll and no embedded worker.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        relay_poll_interval: Duration::from_millis(50),
        task_retention_hours: 24,
        stale_task_minutes: 15,
        embedded_worker: false,
        store_backend: StoreBackend::Memory,
        database_url: None,
    }
}

/// Application state over an in-memory store and an optional broker.
pub fn test_state(broker: Option<Arc<dyn TaskBroker>>) -> AppState {
    AppState {
        store: Arc::new(InMemoryTaskStore::new()) as Arc<dyn TaskStore>,
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
        notifier: Notifier::new(broker),
        worker_signal: Arc::new(Notify::new()),
        metrics: Arc::new(Metrics::new().unwrap()),
    }
}

/// State with an in-process broker attached.
pub fn test_state_with_broker() -> (AppState, Arc<InProcessBroker>) {
    let broker = Arc::new(InProcessBroker::default());
    let state = test_state(Some(broker.clone() as Arc<dyn TaskBroker>));
    (state, broker)
}

/// Build the full application router with all middleware layers.
///
/// Goes through [`build_app_router`] so the tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
