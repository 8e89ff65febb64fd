//! Text sources queried with analysis prompts.
//!
//! Every source exposes the same capability through [`TextSource`]. The
//! configured sources form a closed set of variants in [`Provider`].

pub mod ollama;
pub mod openai;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// A successful answer from a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    /// URLs the source cited, when it reports any.
    pub sources: Vec<String>,
}

impl RawResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Capability shared by all text sources.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Unique id of this source within a run.
    fn id(&self) -> &str;

    /// Send one prompt and return the answer.
    async fn call(&self, prompt: &str) -> Result<RawResponse, ProviderError>;
}

/// The configured source variants.
#[derive(Debug, Clone)]
pub enum Provider {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl Provider {
    /// Build a provider from its configuration entry.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        match config.kind {
            ProviderKind::Ollama => Ok(Self::Ollama(OllamaClient::new(config)?)),
            ProviderKind::OpenAi => Ok(Self::OpenAi(OpenAiClient::new(config)?)),
        }
    }
}

#[async_trait]
impl TextSource for Provider {
    fn id(&self) -> &str {
        match self {
            Provider::Ollama(client) => client.id(),
            Provider::OpenAi(client) => client.id(),
        }
    }

    async fn call(&self, prompt: &str) -> Result<RawResponse, ProviderError> {
        match self {
            Provider::Ollama(client) => client.call(prompt).await,
            Provider::OpenAi(client) => client.call(prompt).await,
        }
    }
}

/// Build every configured provider, shared for concurrent use.
pub fn build_providers(
    configs: &[ProviderConfig],
) -> Result<Vec<Arc<dyn TextSource>>, ProviderError> {
    configs
        .iter()
        .map(|c| Provider::from_config(c).map(|p| Arc::new(p) as Arc<dyn TextSource>))
        .collect()
}

/// Map a transport error to a task failure.
pub(crate) fn classify_send_error(
    source_id: &str,
    url: &str,
    timeout_seconds: u64,
    e: reqwest::Error,
) -> ProviderError {
    if e.is_timeout() {
        ProviderError::transient(source_id, format!("request timed out after {}s", timeout_seconds))
    } else if e.is_connect() {
        ProviderError::transient(source_id, format!("cannot connect to {}", url))
    } else {
        ProviderError::transient(source_id, format!("failed to send request: {}", e))
    }
}

/// Map a non-success HTTP status to a task failure.
pub(crate) fn classify_status(source_id: &str, status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::auth(source_id, format!("API error {}: {}", status, body))
        }
        _ => ProviderError::transient(source_id, format!("API error {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            id: "test".to_string(),
            kind,
            url: "http://localhost:1".to_string(),
            model: "m".to_string(),
            api_key_env: None,
            temperature: 0.1,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status("x", StatusCode::UNAUTHORIZED, "").is_auth());
        assert!(classify_status("x", StatusCode::FORBIDDEN, "").is_auth());
        assert!(!classify_status("x", StatusCode::TOO_MANY_REQUESTS, "").is_auth());
        assert!(!classify_status("x", StatusCode::BAD_GATEWAY, "").is_auth());
    }

    #[test]
    fn test_build_providers_keeps_ids() {
        let providers =
            build_providers(&[config(ProviderKind::Ollama), {
                let mut c = config(ProviderKind::OpenAi);
                c.id = "gpt".to_string();
                c
            }])
            .unwrap();
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["test", "gpt"]);
    }
}
