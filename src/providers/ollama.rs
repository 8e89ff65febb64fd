//! Ollama chat source.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::providers::{classify_send_error, classify_status, RawResponse};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Client for a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    id: String,
    url: String,
    model: String,
    temperature: f32,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::auth(&config.id, format!("invalid HTTP client: {}", e)))?;

        Ok(Self {
            id: config.id.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            http_client,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a single user prompt and return the assistant reply.
    pub async fn call(&self, prompt: &str) -> Result<RawResponse, ProviderError> {
        let url = format!("{}/api/chat", self.url);

        let request = OllamaChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!(source = %self.id, model = %self.model, "Sending Ollama chat request");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(&self.id, &self.url, self.timeout_seconds, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.id, status, &body));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            ProviderError::transient(&self.id, format!("failed to parse Ollama response: {}", e))
        })?;

        Ok(RawResponse::text(chat_response.message.content))
    }
}
