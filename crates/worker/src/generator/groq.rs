//! Groq client (OpenAI-compatible chat completions).

use std::time::Duration;

use async_trait::async_trait;
use codevoice_core::generation::{GenerationKind, GenerationRequest};
use serde::Deserialize;

use super::prompt::{build_prompt, parse_output};
use super::{http_client, GenerationError, Generator};

/// Completion budget for prose answers.
const SHORT_MAX_TOKENS: u32 = 1024;

/// Completion budget for code and project output.
const LONG_MAX_TOKENS: u32 = 8192;

pub struct GroqGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GroqGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/openai/v1/chat/completions", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Extract the first choice's message content.
fn response_text(body: &str) -> Result<String, GenerationError> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid Groq body: {e}")))?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| GenerationError::MalformedResponse("Groq returned no choices".into()))
}

#[async_trait]
impl Generator for GroqGenerator {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError> {
        let max_tokens = match request.kind {
            GenerationKind::Explain => SHORT_MAX_TOKENS,
            _ => LONG_MAX_TOKENS,
        };

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(request) }],
            "temperature": 0.2,
            "max_tokens": max_tokens,
        });
        if request.kind == GenerationKind::Project {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::api(status, &text));
        }

        parse_output(request.kind, &response_text(&text)?)
    }
}
