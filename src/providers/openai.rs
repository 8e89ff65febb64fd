//! OpenAI-compatible chat completions source.
//!
//! Works with any endpoint speaking `/chat/completions`, including ones
//! that return a top-level `citations` array.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::providers::{classify_send_error, classify_status, RawResponse};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    id: String,
    url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: Option<String>,
    temperature: f32,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::auth(&config.id, format!("invalid HTTP client: {}", e)))?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            if let Some(ref var) = config.api_key_env {
                warn!(source = %config.id, env = %var, "API key environment variable is not set");
            }
        }

        Ok(Self {
            id: config.id.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }

    /// Use an explicit API key instead of the environment.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a single user prompt and return the first choice.
    pub async fn call(&self, prompt: &str) -> Result<RawResponse, ProviderError> {
        let Some(ref api_key) = self.api_key else {
            let var = self.api_key_env.as_deref().unwrap_or("api_key_env");
            return Err(ProviderError::auth(
                &self.id,
                format!("no API key configured ({} is unset)", var),
            ));
        };

        let url = format!("{}/chat/completions", self.url);
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!(source = %self.id, model = %self.model, "Sending chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(&self.id, &self.url, self.timeout_seconds, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.id, status, &body));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::transient(&self.id, format!("failed to parse completion: {}", e))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::transient(&self.id, "completion contained no choices"))?;

        Ok(RawResponse {
            text,
            sources: completion.citations,
        })
    }
}
