use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use codevoice_core::types::TaskId;
use futures::{SinkExt, StreamExt};

use crate::handlers::generation::{ensure_task_exists, parse_task_id};
use crate::relay::{RelayOutcome, TaskRelay};
use crate::state::AppState;

/// How long queued frames may take to flush once the relay is done.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /api/v1/generation/tasks/{id}/ws
///
/// Unknown ids are answered with 404 before any upgrade happens.
pub async fn task_ws_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let task_id = match parse_task_id(&id) {
        Ok(task_id) => task_id,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = ensure_task_exists(&state, task_id).await {
        return e.into_response();
    }

    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, task_id))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// Drive one relay connection.
///
/// The relay runs on its own task and writes through the connection's
/// channel; the current task watches the inbound side for a disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, task_id: TaskId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = state.ws_manager.add(conn_id.clone(), task_id).await;
    tracing::info!(%conn_id, %task_id, "Relay connected");

    let (mut sink, mut stream) = socket.split();

    // Writer: forward channel messages to the socket, stopping after Close.
    let writer_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %writer_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let relay = TaskRelay::new(
        state.store.clone(),
        state.broker(),
        state.config.relay_poll_interval,
    );
    let relay_tx = tx.clone();
    let mut relay_task = tokio::spawn(async move {
        let outcome = relay
            .run(task_id, |payload| {
                relay_tx.send(Message::Text(payload.into())).is_ok()
            })
            .await;
        let _ = relay_tx.send(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        })));
        outcome
    });

    loop {
        tokio::select! {
            outcome = &mut relay_task => {
                let outcome = outcome.unwrap_or(RelayOutcome::Disconnected);
                tracing::info!(%conn_id, %task_id, ?outcome, "Relay finished");
                break;
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    relay_task.abort();
                    tracing::info!(%conn_id, %task_id, "Relay client disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    relay_task.abort();
                    tracing::debug!(%conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    drop(tx);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
}
