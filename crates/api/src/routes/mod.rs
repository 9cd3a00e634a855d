pub mod generation;
pub mod health;
pub mod metrics;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /generation/tasks                     enqueue (POST), list (GET)
/// /generation/tasks/{id}                get
/// /generation/tasks/{id}/retry          retry a failed task (POST)
/// /generation/tasks/{id}/ws             status relay (WebSocket)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/generation", generation::router())
}
