//! CodeVoice generation worker.
//!
//! [`GenerationWorker`] drains the task queue: it claims `queued` tasks,
//! calls the configured [`Generator`] and records `completed`/`failed`.
//! It runs embedded in the API server or standalone via the
//! `codevoice-worker` binary.

pub mod config;
pub mod generator;
pub mod metrics;
pub mod runner;
pub mod telemetry;

pub use config::{GeneratorConfig, Provider, WorkerConfig};
pub use generator::{build_generator, GenerationError, Generator};
pub use metrics::Metrics;
pub use runner::GenerationWorker;
