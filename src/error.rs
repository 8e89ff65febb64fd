//! Error types.
//!
//! Task-level failures (`ProviderError`) are recorded by the pipeline and never
//! abort a run. Only `PipelineError` is fatal.

use thiserror::Error;

/// Failure building the multi-pattern matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to build alias automaton: {0}")]
    Build(#[from] aho_corasick::BuildError),
}

/// Failure returned by a text source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Authentication or configuration problem. The source is skipped for
    /// the rest of the run and the failure is not counted as an error.
    #[error("authentication failed for {source_id}: {message}")]
    Auth { source_id: String, message: String },

    /// Anything else: network errors, timeouts, 5xx, malformed bodies.
    #[error("{source_id} request failed: {message}")]
    Transient { source_id: String, message: String },
}

impl ProviderError {
    pub fn auth(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn transient(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Failure resolving aliases for a brand.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("alias lookup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("no aliases could be extracted for {0}")]
    NoAliases(String),
}

/// Fatal pipeline failure. Raised before any task is scheduled.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no text sources are available")]
    NoSourcesAvailable,

    #[error(transparent)]
    Matcher(#[from] MatcherError),
}
