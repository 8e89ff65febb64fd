//! Response analysis and cross-response aggregation.

pub mod aggregator;
pub mod ranking;
pub mod response;
pub mod sentiment;

pub use aggregator::{aggregate, aggregate_by_source, UNRANKED_POSITION};
pub use ranking::{ListMarkerRanking, NoRanking, RankingStrategy};
pub use response::{analyze_response, BrandSet, ConfidenceModel, ResponseAnalyzer};
pub use sentiment::{LexiconSentiment, NeutralSentiment, SentimentClassifier};
