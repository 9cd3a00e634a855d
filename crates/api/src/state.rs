use std::sync::Arc;

use codevoice_db::store::TaskStore;
use codevoice_events::{Notifier, TaskBroker};
use codevoice_worker::Metrics;
use tokio::sync::Notify;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Task records (Postgres or in-memory).
    pub store: Arc<dyn TaskStore>,
    pub config: Arc<ServerConfig>,
    /// Open relay WebSocket connections.
    pub ws_manager: Arc<WsManager>,
    /// Best-effort publisher wrapping the optional broker.
    pub notifier: Notifier,
    /// Wakes the embedded worker when a task is enqueued.
    pub worker_signal: Arc<Notify>,
    /// Prometheus counters, shared with the embedded worker.
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// The configured broker, if any. Relays poll the store without one.
    pub fn broker(&self) -> Option<Arc<dyn TaskBroker>> {
        self.notifier.broker().cloned()
    }
}
