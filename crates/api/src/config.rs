use std::time::Duration;

use codevoice_core::config::{flag_or, parse_or, string, ConfigError};
use codevoice_worker::config::DEFAULT_GENERATION_TIMEOUT_SECS;

/// Headroom past the generation timeout before a running task counts as
/// abandoned. Covers the store writes and publishes around the call.
pub const STALE_MARGIN_SECS: u64 = 120;

/// Default age after which the sweep fails a `running` task.
const DEFAULT_STALE_TASK_MINUTES: i64 = 15;

/// Where task records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process memory; records are lost on restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err("expected 'postgres' or 'memory'".to_string()),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background tasks to stop after a signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// How often a relay without a broker re-reads the task (default: `800ms`).
    pub relay_poll_interval: Duration,
    /// Terminal tasks older than this are deleted (default: `24`).
    pub task_retention_hours: i64,
    /// Running tasks older than this are failed by the sweep (default: `15`).
    ///
    /// Always longer than `GENERATION_TIMEOUT_SECS` plus [`STALE_MARGIN_SECS`],
    /// so a live worker is never overtaken by the sweep.
    pub stale_task_minutes: i64,
    /// Run the generation worker inside the API process (default: `true`).
    pub embedded_worker: bool,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                                   |
    /// |--------------------------|-------------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                                 |
    /// | `PORT`                   | `3000`                                    |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`                   |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                                      |
    /// | `RELAY_POLL_INTERVAL_MS` | `800`                                     |
    /// | `TASK_RETENTION_HOURS`   | `24`                                      |
    /// | `STALE_TASK_MINUTES`     | `15`, or more for long generation timeouts |
    /// | `EMBEDDED_WORKER`        | `true`                                    |
    /// | `TASK_STORE`             | `postgres` if `DATABASE_URL` set, else `memory` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = string(&lookup, "HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = string(&lookup, "CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let relay_poll_ms = parse_or(&lookup, "RELAY_POLL_INTERVAL_MS", 800u64)?;
        let task_retention_hours = parse_or(&lookup, "TASK_RETENTION_HOURS", 24i64)?;
        let stale_task_minutes = stale_task_minutes(&lookup)?;
        let embedded_worker = flag_or(&lookup, "EMBEDDED_WORKER", true)?;

        let database_url = string(&lookup, "DATABASE_URL");
        let default_backend = if database_url.is_some() {
            StoreBackend::Postgres
        } else {
            StoreBackend::Memory
        };
        let store_backend = parse_or(&lookup, "TASK_STORE", default_backend)?;
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError {
                key: "TASK_STORE".into(),
                value: "postgres".into(),
                reason: "DATABASE_URL must be set".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            relay_poll_interval: Duration::from_millis(relay_poll_ms.max(10)),
            task_retention_hours: task_retention_hours.max(1),
            stale_task_minutes,
            embedded_worker,
            store_backend,
            database_url,
        })
    }
}

/// Read `STALE_TASK_MINUTES`, enforcing that it outlasts one generation call.
///
/// The generation timeout bounds how long a live worker keeps a task
/// `running`; a shorter threshold would let the sweep fail tasks that are
/// still being worked on.
fn stale_task_minutes(lookup: &impl Fn(&str) -> Option<String>) -> Result<i64, ConfigError> {
    let timeout_secs: u64 = parse_or(
        lookup,
        "GENERATION_TIMEOUT_SECS",
        DEFAULT_GENERATION_TIMEOUT_SECS,
    )?;
    let minimum = ((timeout_secs.max(1) + STALE_MARGIN_SECS) / 60 + 1) as i64;

    let minutes = parse_or(
        lookup,
        "STALE_TASK_MINUTES",
        DEFAULT_STALE_TASK_MINUTES.max(minimum),
    )?;
    if minutes < minimum {
        return Err(ConfigError {
            key: "STALE_TASK_MINUTES".into(),
            value: minutes.to_string(),
            reason: format!(
                "must be at least {minimum} to outlast GENERATION_TIMEOUT_SECS={timeout_secs}"
            ),
        });
    }
    Ok(minutes)
}
