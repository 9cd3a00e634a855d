use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/generation`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tasks",
            post(generation::enqueue).get(generation::list_tasks),
        )
        .route("/tasks/{id}", get(generation::get_task))
        .route("/tasks/{id}/retry", post(generation::retry_task))
        .route("/tasks/{id}/ws", get(ws::task_ws_handler))
}
