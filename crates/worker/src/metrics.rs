//! Prometheus counters for generation tasks and upstream model calls.
//!
//! The API server owns one [`Metrics`] registry, renders it on
//! `GET /metrics` and hands it to the embedded worker. A standalone worker
//! has nowhere to expose counters and runs without them.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Content type of [`Metrics::render`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

pub struct Metrics {
    registry: Registry,
    tasks: IntCounterVec,
    ai_requests: IntCounterVec,
    ai_errors: IntCounterVec,
}

impl Metrics {
    /// Create and register every counter in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tasks = IntCounterVec::new(
            Opts::new("generation_tasks_total", "Total generation tasks by status"),
            &["status"],
        )?;
        let ai_requests = IntCounterVec::new(
            Opts::new("ai_requests_total", "Total AI generation requests"),
            &["provider", "model"],
        )?;
        let ai_errors = IntCounterVec::new(
            Opts::new("ai_errors_total", "Total AI generation errors"),
            &["provider", "model"],
        )?;

        registry.register(Box::new(tasks.clone()))?;
        registry.register(Box::new(ai_requests.clone()))?;
        registry.register(Box::new(ai_errors.clone()))?;

        Ok(Self {
            registry,
            tasks,
            ai_requests,
            ai_errors,
        })
    }

    /// Count a task entering `status` (`queued`, `completed`, `failed`).
    pub fn task(&self, status: &str) {
        self.tasks.with_label_values(&[status]).inc();
    }

    pub fn ai_request(&self, provider: &str, model: &str) {
        self.ai_requests.with_label_values(&[provider, model]).inc();
    }

    pub fn ai_error(&self, provider: &str, model: &str) {
        self.ai_errors.with_label_values(&[provider, model]).inc();
    }

    /// Current value of `generation_tasks_total{status}`.
    pub fn task_count(&self, status: &str) -> u64 {
        self.tasks.with_label_values(&[status]).get()
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
