use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codevoice_core::generation::GenerationRequest;
use codevoice_worker::{GenerationError, Generator};

/// What a [`FakeGenerator`] does with every request.
#[derive(Clone)]
pub enum Behaviour {
    Succeed(serde_json::Value),
    TimeOut,
    Fail(u16),
}

/// In-process stand-in for a hosted model API.
pub struct FakeGenerator {
    behaviour: Behaviour,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Self::with_delay(behaviour, Duration::ZERO)
    }

    pub fn with_delay(behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.behaviour {
            Behaviour::Succeed(value) => {
                let mut value = value.clone();
                value["spec"] = request.spec.clone().into();
                Ok(value)
            }
            Behaviour::TimeOut => Err(GenerationError::Timeout),
            Behaviour::Fail(status) => Err(GenerationError::Api {
                status: *status,
                body: "upstream unavailable".into(),
            }),
        }
    }
}
