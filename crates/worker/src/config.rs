use std::time::Duration;

use codevoice_core::config::{parse_or, string, ConfigError};

/// Worker loop configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum tasks executing at once (default: `4`).
    pub concurrency: usize,
    /// How often the store is polled for queued tasks (default: `500ms`).
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl WorkerConfig {
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `WORKER_CONCURRENCY`      | `4`     |
    /// | `WORKER_POLL_INTERVAL_MS` | `500`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let concurrency: usize = parse_or(&lookup, "WORKER_CONCURRENCY", defaults.concurrency)?;
        let poll_ms: u64 = parse_or(
            &lookup,
            "WORKER_POLL_INTERVAL_MS",
            defaults.poll_interval.as_millis() as u64,
        )?;

        Ok(Self {
            concurrency: concurrency.max(1),
            poll_interval: Duration::from_millis(poll_ms.max(10)),
        })
    }
}

/// Which hosted model API generates task results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Groq,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            _ => Err("expected 'gemini' or 'groq'".to_string()),
        }
    }
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// External generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    /// HTTP timeout for one generation call (default: `120s`).
    pub timeout: Duration,
}

impl GeneratorConfig {
    /// | Env Var                   | Default                   |
    /// |---------------------------|---------------------------|
    /// | `GENERATION_PROVIDER`     | `gemini`                  |
    /// | `GEMINI_API_KEY`          | unset                     |
    /// | `GEMINI_MODEL`            | `gemini-2.0-flash`        |
    /// | `GEMINI_BASE_URL`         | Google endpoint           |
    /// | `GROQ_API_KEY`            | unset                     |
    /// | `GROQ_MODEL`              | `llama-3.3-70b-versatile` |
    /// | `GROQ_BASE_URL`           | Groq endpoint             |
    /// | `GENERATION_TIMEOUT_SECS` | `120`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = parse_or(&lookup, "GENERATION_PROVIDER", Provider::Gemini)?;
        let timeout_secs: u64 = parse_or(
            &lookup,
            "GENERATION_TIMEOUT_SECS",
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?;

        Ok(Self {
            provider,
            gemini_api_key: string(&lookup, "GEMINI_API_KEY"),
            gemini_model: string(&lookup, "GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: string(&lookup, "GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            groq_api_key: string(&lookup, "GROQ_API_KEY"),
            groq_model: string(&lookup, "GROQ_MODEL")
                .unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            groq_base_url: string(&lookup, "GROQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}
