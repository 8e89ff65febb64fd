//! Data models for brand mention analysis.
//!
//! This module contains the core data structures shared by the matcher,
//! the response analyzer, the aggregator and the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// One searchable alias owned by a brand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrandEntry {
    pub brand_id: String,
    pub alias: String,
}

impl BrandEntry {
    pub fn new(brand_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            brand_id: brand_id.into(),
            alias: alias.into(),
        }
    }
}

/// A found occurrence of an alias.
///
/// `start..end` is a byte range into the original text and `surface`
/// is exactly that slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub brand_id: String,
    pub alias_matched: String,
    pub start: usize,
    pub end: usize,
    pub surface: String,
}

/// Sentiment attached to a brand mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    /// Numeric score used by the aggregator.
    pub fn score(&self) -> f64 {
        match self {
            Sentiment::Positive => 100.0,
            Sentiment::Neutral => 50.0,
            Sentiment::Negative => 0.0,
        }
    }

    /// Label for an aggregated score.
    pub fn from_score(score: f64) -> Self {
        if score >= 60.0 {
            Sentiment::Positive
        } else if score <= 40.0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Sentiment::Positive => "🟢",
            Sentiment::Neutral => "🟡",
            Sentiment::Negative => "🔴",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Negative => write!(f, "Negative"),
        }
    }
}

/// A list position extracted from a single response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRanking {
    pub position: usize,
    pub company: String,
}

/// The analyzed output of one text source for one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    pub source_id: String,
    pub prompt: String,
    pub text: String,
    pub rankings: Vec<CompanyRanking>,
    pub brand_mentioned: bool,
    /// Competitors with at least one occurrence, in tracking order.
    pub competitors: Vec<String>,
    pub brand_position: Option<usize>,
    pub sentiment: Sentiment,
    pub confidence: f64,
    /// Raw occurrence count for every tracked brand, zero entries included.
    pub mention_counts: BTreeMap<String, usize>,
    /// Sentiment per mentioned brand.
    pub brand_sentiments: BTreeMap<String, Sentiment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cited_sources: Vec<String>,
}

impl ResponseAnalysis {
    /// Whether `brand` occurs at least once in this response.
    pub fn mentions(&self, brand: &str) -> bool {
        self.mention_counts.get(brand).copied().unwrap_or(0) > 0
    }

    /// Ranking position assigned to `brand`, if any.
    pub fn position_of(&self, brand: &str) -> Option<usize> {
        self.rankings
            .iter()
            .find(|r| r.company == brand)
            .map(|r| r.position)
    }

    /// Sentiment for `brand`, falling back to the response sentiment.
    pub fn sentiment_for(&self, brand: &str) -> Sentiment {
        self.brand_sentiments
            .get(brand)
            .copied()
            .unwrap_or(self.sentiment)
    }
}

/// A brand tracked by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBrand {
    pub name: String,
    pub is_own: bool,
}

impl TrackedBrand {
    pub fn own(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_own: true,
        }
    }

    pub fn competitor(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_own: false,
        }
    }
}

/// Aggregated standing of one tracked brand across a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRanking {
    pub name: String,
    /// Number of responses mentioning the brand at least once.
    pub mentions: usize,
    pub average_position: f64,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub share_of_voice: f64,
    pub visibility_score: f64,
    pub is_own: bool,
}

/// Per-source slice of the aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBreakdown {
    pub source_id: String,
    pub responses: usize,
    pub competitors: Vec<CompetitorRanking>,
}

/// One unit of orchestrated work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTask {
    pub prompt: String,
    pub source_id: String,
}

/// A task that failed with a non-authentication error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub source_id: String,
    pub prompt: String,
    pub message: String,
}

/// Call counters for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUsage {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// The terminal output of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub responses: Vec<ResponseAnalysis>,
    pub competitors: Vec<CompetitorRanking>,
    pub provider_breakdown: Vec<ProviderBreakdown>,
    pub errors: Vec<TaskError>,
    /// Sources skipped after an authentication/configuration failure.
    pub skipped_sources: Vec<String>,
    pub usage: BTreeMap<String, SourceUsage>,
    pub cancelled: bool,
}

impl AnalysisResult {
    /// The aggregated entry for the target brand.
    pub fn own_brand(&self) -> Option<&CompetitorRanking> {
        self.competitors.iter().find(|c| c.is_own)
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> ResponseAnalysis {
        ResponseAnalysis {
            source_id: "ollama".to_string(),
            prompt: "best watches".to_string(),
            text: "1. Rolex".to_string(),
            rankings: vec![CompanyRanking {
                position: 1,
                company: "Rolex".to_string(),
            }],
            brand_mentioned: true,
            competitors: vec![],
            brand_position: Some(1),
            sentiment: Sentiment::Neutral,
            confidence: 0.3,
            mention_counts: BTreeMap::from([("Rolex".to_string(), 1), ("Omega".to_string(), 0)]),
            brand_sentiments: BTreeMap::from([("Rolex".to_string(), Sentiment::Positive)]),
            cited_sources: vec![],
        }
    }

    #[test]
    fn test_sentiment_scores() {
        assert_eq!(Sentiment::Positive.score(), 100.0);
        assert_eq!(Sentiment::Neutral.score(), 50.0);
        assert_eq!(Sentiment::Negative.score(), 0.0);
        assert_eq!(Sentiment::from_score(75.0), Sentiment::Positive);
        assert_eq!(Sentiment::from_score(50.0), Sentiment::Neutral);
        assert_eq!(Sentiment::from_score(10.0), Sentiment::Negative);
    }

    #[test]
    fn test_response_lookups() {
        let response = analysis();
        assert!(response.mentions("Rolex"));
        assert!(!response.mentions("Omega"));
        assert!(!response.mentions("Seiko"));
        assert_eq!(response.position_of("Rolex"), Some(1));
        assert_eq!(response.position_of("Omega"), None);
        assert_eq!(response.sentiment_for("Rolex"), Sentiment::Positive);
        assert_eq!(response.sentiment_for("Omega"), Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_serializes_lowercase() {
        let json = serde_json::to_string(&Sentiment::Negative).unwrap();
        assert_eq!(json, "\"negative\"");
    }
}
