//! MentionScope - brand mention analysis across AI-generated answers.
//!
//! The library finds brand aliases in free text, derives per-response
//! mention, ranking and sentiment facts, and aggregates many responses into
//! comparable visibility scores. The [`pipeline`] module runs the whole
//! flow concurrently against a set of text sources.

pub mod aliases;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod report;

pub use analysis::{aggregate, analyze_response};
pub use error::{AliasError, MatcherError, PipelineError, ProviderError};
pub use matcher::find_matches;
pub use pipeline::{run_analysis, AnalysisRequest, Orchestrator, PipelineConfig};
