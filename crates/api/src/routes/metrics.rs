use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use codevoice_worker::metrics;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /metrics
///
/// Prometheus text exposition of the task and model-call counters.
async fn render_metrics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::InternalError(format!("Failed to encode metrics: {e}")))?;
    Ok(([(CONTENT_TYPE, metrics::CONTENT_TYPE)], body))
}

/// Mount the metrics route (root level, next to `/health`).
pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(render_metrics))
}
