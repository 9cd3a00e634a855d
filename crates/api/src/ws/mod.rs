//! WebSocket infrastructure for task relays.
//!
//! Provides connection management, heartbeat monitoring, and the upgrade
//! handler mounted at `/generation/tasks/{id}/ws`.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::task_ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
