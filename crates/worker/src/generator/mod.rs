//! External generator clients.
//!
//! A [`Generator`] turns a validated [`GenerationRequest`] into a JSON
//! result by calling a hosted model API. The worker treats every
//! [`GenerationError`] as a task failure and records its display message.

pub mod gemini;
pub mod groq;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use codevoice_core::generation::GenerationRequest;

pub use gemini::GeminiGenerator;
pub use groq::GroqGenerator;

use crate::config::{GeneratorConfig, Provider};

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The call did not finish within the configured timeout.
    #[error("timeout")]
    Timeout,

    #[error("Generator request failed: {0}")]
    Request(String),

    #[error("Generator returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed generator response: {0}")]
    MalformedResponse(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid stored request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl GenerationError {
    /// Build an [`Api`](Self::Api) error, truncating long bodies.
    pub(crate) fn api(status: reqwest::StatusCode, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_ERROR_BODY) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Api {
            status: status.as_u16(),
            body,
        }
    }
}

/// Produces the result for one generation request.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Upstream model identifier, used as a metrics label.
    fn model(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError>;
}

/// Build the configured provider's client.
///
/// Fails when the selected provider has no API key.
pub fn build_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    match config.provider {
        Provider::Gemini => {
            let key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| GenerationError::NotConfigured("GEMINI_API_KEY is not set".into()))?;
            Ok(Arc::new(GeminiGenerator::new(
                config.gemini_base_url.clone(),
                key,
                config.gemini_model.clone(),
                config.timeout,
            )?))
        }
        Provider::Groq => {
            let key = config
                .groq_api_key
                .clone()
                .ok_or_else(|| GenerationError::NotConfigured("GROQ_API_KEY is not set".into()))?;
            Ok(Arc::new(GroqGenerator::new(
                config.groq_base_url.clone(),
                key,
                config.groq_model.clone(),
                config.timeout,
            )?))
        }
    }
}

/// Shared reqwest client construction.
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config(provider: Provider) -> GeneratorConfig {
        let mut cfg = GeneratorConfig::from_lookup(|_| None).unwrap();
        cfg.provider = provider;
        cfg
    }

    #[test]
    fn timeout_displays_as_timeout() {
        assert_eq!(GenerationError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn api_error_body_is_truncated() {
        let body = "x".repeat(2_000);
        let err = GenerationError::api(reqwest::StatusCode::BAD_GATEWAY, &body);
        assert_matches!(err, GenerationError::Api { status: 502, ref body } if body.len() == MAX_ERROR_BODY + 3);
    }

    #[test]
    fn missing_key_is_not_configured() {
        assert_matches!(
            build_generator(&config(Provider::Gemini)).err(),
            Some(GenerationError::NotConfigured(_))
        );
        assert_matches!(
            build_generator(&config(Provider::Groq)).err(),
            Some(GenerationError::NotConfigured(_))
        );
    }

    #[test]
    fn builds_selected_provider() {
        let mut cfg = config(Provider::Groq);
        cfg.groq_api_key = Some("gsk_test".into());
        let generator = build_generator(&cfg).unwrap();
        assert_eq!(generator.name(), "groq");
    }
}
