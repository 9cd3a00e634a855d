use std::sync::Arc;

use codevoice_core::task_events::DEFAULT_CHANNEL_PREFIX;

use crate::broker::{BrokerError, TaskBroker};
use crate::{InProcessBroker, RedisBroker};

/// Which pub/sub broker to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Redis,
    /// In-process broadcast; only reaches relays in the same process.
    Memory,
    /// No broker; relays poll the store.
    None,
}

impl std::str::FromStr for BrokerKind {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "" => Ok(Self::None),
            other => Err(BrokerError::Config(format!(
                "TASK_BROKER must be one of redis, memory, none (got '{other}')"
            ))),
        }
    }
}

/// Broker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub redis_url: Option<String>,
    /// Channel prefix; channels are `{prefix}:{task_id}`.
    pub prefix: String,
}

impl BrokerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                      | Default                              |
    /// |------------------------------|--------------------------------------|
    /// | `TASK_BROKER`                | `redis` if a Redis URL is set, else `none` |
    /// | `REDIS_URL` / `REDIS_URI`    | unset                                |
    /// | `PROJECT_TASKS_REDIS_PREFIX` | `project_tasks`                      |
    pub fn from_env() -> Result<Self, BrokerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BrokerError> {
        let redis_url = lookup("REDIS_URL")
            .or_else(|| lookup("REDIS_URI"))
            .filter(|url| !url.trim().is_empty());

        let kind = match lookup("TASK_BROKER") {
            Some(value) => value.parse()?,
            None if redis_url.is_some() => BrokerKind::Redis,
            None => BrokerKind::None,
        };

        if kind == BrokerKind::Redis && redis_url.is_none() {
            return Err(BrokerError::Config(
                "TASK_BROKER=redis requires REDIS_URL or REDIS_URI".into(),
            ));
        }

        let prefix = lookup("PROJECT_TASKS_REDIS_PREFIX")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL_PREFIX.to_string());

        Ok(Self {
            kind,
            redis_url,
            prefix,
        })
    }
}

/// Build the configured broker.
///
/// Returns `None` when no broker is configured or the Redis connection
/// cannot be established; relays then fall back to polling the store.
pub async fn connect_broker(config: &BrokerConfig) -> Option<Arc<dyn TaskBroker>> {
    match config.kind {
        BrokerKind::None => {
            tracing::info!("No task broker configured, relays will poll the store");
            None
        }
        BrokerKind::Memory => {
            tracing::info!(prefix = %config.prefix, "Using in-process task broker");
            Some(Arc::new(InProcessBroker::new(config.prefix.clone())))
        }
        BrokerKind::Redis => {
            let url = config.redis_url.as_deref()?;
            match RedisBroker::connect(url, config.prefix.clone()).await {
                Ok(broker) => {
                    tracing::info!(prefix = %config.prefix, "Connected to Redis task broker");
                    Some(Arc::new(broker))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis broker unavailable, relays will poll the store");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<BrokerConfig, BrokerError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BrokerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_no_broker() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.kind, BrokerKind::None);
        assert_eq!(cfg.prefix, "project_tasks");
    }

    #[test]
    fn redis_url_implies_redis() {
        let cfg = config(&[("REDIS_URL", "redis://localhost:6379")]).unwrap();
        assert_eq!(cfg.kind, BrokerKind::Redis);
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn redis_uri_is_accepted() {
        let cfg = config(&[("REDIS_URI", "redis://cache:6379/1")]).unwrap();
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://cache:6379/1"));
    }

    #[test]
    fn explicit_kind_overrides_url() {
        let cfg = config(&[("REDIS_URL", "redis://x"), ("TASK_BROKER", "memory")]).unwrap();
        assert_eq!(cfg.kind, BrokerKind::Memory);
    }

    #[test]
    fn redis_without_url_is_rejected() {
        assert_matches!(config(&[("TASK_BROKER", "redis")]), Err(BrokerError::Config(_)));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_matches!(config(&[("TASK_BROKER", "kafka")]), Err(BrokerError::Config(_)));
    }

    #[test]
    fn custom_prefix() {
        let cfg = config(&[("PROJECT_TASKS_REDIS_PREFIX", "staging_tasks")]).unwrap();
        assert_eq!(cfg.prefix, "staging_tasks");
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_to_none() {
        let cfg = BrokerConfig {
            kind: BrokerKind::Redis,
            redis_url: Some("not-a-redis-url".into()),
            prefix: "project_tasks".into(),
        };
        assert!(connect_broker(&cfg).await.is_none());
    }

    #[tokio::test]
    async fn memory_broker_is_built() {
        let cfg = config(&[("TASK_BROKER", "memory")]).unwrap();
        let broker = connect_broker(&cfg).await.unwrap();
        assert_eq!(broker.name(), "memory");
    }
}
