//! Domain types shared by every CodeVoice backend crate.
//!
//! - [`generation`]: task status state machine and the validated
//!   generation request accepted by the enqueuer.
//! - [`task_events`]: the per-task notification message and broker channel
//!   naming.
//! - [`error`]: the domain error type surfaced by handlers.
//! - [`config`]: typed environment parsing shared by the config structs.

pub mod config;
pub mod error;
pub mod generation;
pub mod task_events;
pub mod types;
