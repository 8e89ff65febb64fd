//! Per-response brand analysis.
//!
//! Runs the alias matcher over one source's answer and derives mention
//! counts, list rankings, sentiment and a confidence score.

use crate::analysis::ranking::{ListMarkerRanking, RankingStrategy};
use crate::analysis::sentiment::{NeutralSentiment, SentimentClassifier};
use crate::error::MatcherError;
use crate::matcher::{BrandMatcher, MatcherOptions};
use crate::models::{BrandEntry, Match, ResponseAnalysis, Sentiment, TrackedBrand};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// The brands a run tracks and the aliases used to find them.
#[derive(Debug, Clone, Default)]
pub struct BrandSet {
    pub target: String,
    pub competitors: Vec<String>,
    /// Brand name -> aliases. Brands without an entry are matched by name.
    pub aliases: HashMap<String, Vec<String>>,
}

impl BrandSet {
    pub fn new(target: impl Into<String>, competitors: Vec<String>) -> Self {
        Self {
            target: target.into(),
            competitors,
            aliases: HashMap::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: HashMap<String, Vec<String>>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Target first, then competitors; duplicates and blanks dropped.
    pub fn tracked(&self) -> Vec<TrackedBrand> {
        let mut seen = HashSet::new();
        std::iter::once(TrackedBrand::own(self.target.trim()))
            .chain(
                self.competitors
                    .iter()
                    .map(|c| TrackedBrand::competitor(c.trim())),
            )
            .filter(|b| !b.name.is_empty() && seen.insert(b.name.clone()))
            .collect()
    }

    /// Matcher entries in registration order: the target's aliases first.
    pub fn entries(&self) -> Vec<BrandEntry> {
        let mut entries = Vec::new();
        for brand in self.tracked() {
            match self.aliases.get(&brand.name) {
                Some(aliases) if !aliases.is_empty() => {
                    entries.extend(aliases.iter().map(|a| BrandEntry::new(&brand.name, a)));
                }
                _ => entries.push(BrandEntry::new(&brand.name, &brand.name)),
            }
        }
        entries
    }
}

/// Confidence that a response carries a meaningful brand signal.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceModel {
    pub floor: f64,
    /// Hit count (plus one) at which confidence reaches 1.0.
    pub saturation: f64,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self {
            floor: 0.2,
            saturation: 10.0,
        }
    }
}

impl ConfidenceModel {
    /// `clamp(ln(1 + hits) / ln(saturation), floor, 1.0)`
    pub fn score(&self, total_hits: usize) -> f64 {
        let floor = self.floor.clamp(0.0, 1.0);
        if self.saturation <= 1.0 {
            return if total_hits > 0 { 1.0 } else { floor };
        }
        let raw = (1.0 + total_hits as f64).ln() / self.saturation.ln();
        raw.clamp(floor, 1.0)
    }
}

/// Analyzes responses against a fixed brand set.
///
/// Built once per run and shared by all tasks.
pub struct ResponseAnalyzer {
    tracked: Vec<TrackedBrand>,
    matcher: BrandMatcher,
    ranking: Box<dyn RankingStrategy>,
    sentiment: Box<dyn SentimentClassifier>,
    confidence: ConfidenceModel,
}

impl ResponseAnalyzer {
    pub fn new(brands: &BrandSet, options: MatcherOptions) -> Result<Self, MatcherError> {
        let matcher = BrandMatcher::with_options(&brands.entries(), options)?;
        Ok(Self {
            tracked: brands.tracked(),
            matcher,
            ranking: Box::new(ListMarkerRanking),
            sentiment: Box::new(NeutralSentiment),
            confidence: ConfidenceModel::default(),
        })
    }

    pub fn with_ranking(mut self, ranking: Box<dyn RankingStrategy>) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Box<dyn SentimentClassifier>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_confidence(mut self, confidence: ConfidenceModel) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn tracked(&self) -> &[TrackedBrand] {
        &self.tracked
    }

    pub fn matcher(&self) -> &BrandMatcher {
        &self.matcher
    }

    /// Analyze one source's answer to one prompt.
    pub fn analyze(&self, source_id: &str, prompt: &str, text: &str) -> ResponseAnalysis {
        let matches = self.matcher.find(text);

        let mut by_brand: BTreeMap<String, Vec<&Match>> = BTreeMap::new();
        for m in &matches {
            by_brand.entry(m.brand_id.clone()).or_default().push(m);
        }

        let mention_counts: BTreeMap<String, usize> = self
            .tracked
            .iter()
            .map(|b| (b.name.clone(), by_brand.get(&b.name).map_or(0, Vec::len)))
            .collect();

        let brand_sentiments: BTreeMap<String, Sentiment> = by_brand
            .iter()
            .map(|(brand, mentions)| {
                let sentiment = self.sentiment.classify(text, brand, mentions);
                (brand.clone(), sentiment)
            })
            .collect();

        let target = self.tracked.iter().find(|b| b.is_own);
        let brand_mentioned =
            target.is_some_and(|t| mention_counts.get(&t.name).copied().unwrap_or(0) > 0);

        let competitors: Vec<String> = self
            .tracked
            .iter()
            .filter(|b| !b.is_own && mention_counts.get(&b.name).copied().unwrap_or(0) > 0)
            .map(|b| b.name.clone())
            .collect();

        let rankings = self.ranking.extract(text, &self.matcher);
        let brand_position = target.and_then(|t| {
            rankings
                .iter()
                .find(|r| r.company == t.name)
                .map(|r| r.position)
        });

        let sentiment = target
            .and_then(|t| brand_sentiments.get(&t.name).copied())
            .unwrap_or_default();

        let confidence = self.confidence.score(matches.len());

        debug!(
            source = source_id,
            hits = matches.len(),
            brand_mentioned,
            competitors = competitors.len(),
            ranked = rankings.len(),
            "Analyzed response"
        );

        ResponseAnalysis {
            source_id: source_id.to_string(),
            prompt: prompt.to_string(),
            text: text.to_string(),
            rankings,
            brand_mentioned,
            competitors,
            brand_position,
            sentiment,
            confidence,
            mention_counts,
            brand_sentiments,
            cited_sources: Vec::new(),
        }
    }
}

/// One-shot analysis of a single text with default settings.
///
/// `alias_map` maps brand names to aliases; brands missing from it are
/// matched by name.
pub fn analyze_response(
    raw_text: &str,
    target_brand: &str,
    competitors: &[String],
    alias_map: &HashMap<String, Vec<String>>,
) -> Result<ResponseAnalysis, MatcherError> {
    let brands =
        BrandSet::new(target_brand, competitors.to_vec()).with_aliases(alias_map.clone());
    let analyzer = ResponseAnalyzer::new(&brands, MatcherOptions::default())?;
    Ok(analyzer.analyze("", "", raw_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ranking::NoRanking;
    use crate::analysis::sentiment::LexiconSentiment;
    use crate::models::CompanyRanking;

    fn competitors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranked_list_scenario() {
        let result = analyze_response(
            "1. Rolex leads. 2. Omega is close.",
            "Rolex",
            &competitors(&["Omega"]),
            &HashMap::new(),
        )
        .unwrap();

        assert_eq!(
            result.rankings,
            vec![
                CompanyRanking {
                    position: 1,
                    company: "Rolex".to_string()
                },
                CompanyRanking {
                    position: 2,
                    company: "Omega".to_string()
                },
            ]
        );
        assert!(result.brand_mentioned);
        assert_eq!(result.competitors, vec!["Omega"]);
        assert_eq!(result.brand_position, Some(1));
    }

    #[test]
    fn test_common_word_target_counts_capitalized_only() {
        let result = analyze_response(
            "the radical decision to rebrand Radical",
            "Radical",
            &[],
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(result.mention_counts.get("Radical"), Some(&1));
        assert!(result.brand_mentioned);
    }

    #[test]
    fn test_alias_map_is_used() {
        let aliases = HashMap::from([(
            "Coca-Cola".to_string(),
            vec!["Coca-Cola".to_string(), "Coke".to_string()],
        )]);
        let result = analyze_response(
            "Coke and Pepsi dominate; Coca Cola is older.",
            "Coca-Cola",
            &competitors(&["Pepsi"]),
            &aliases,
        )
        .unwrap();
        assert_eq!(result.mention_counts.get("Coca-Cola"), Some(&2));
        assert_eq!(result.mention_counts.get("Pepsi"), Some(&1));
    }

    #[test]
    fn test_zero_mentions_are_recorded() {
        let result =
            analyze_response("Nothing here.", "Rolex", &competitors(&["Omega"]), &HashMap::new())
                .unwrap();
        assert!(!result.brand_mentioned);
        assert!(result.competitors.is_empty());
        assert_eq!(result.mention_counts.len(), 2);
        assert!(result.mention_counts.values().all(|&c| c == 0));
        assert_eq!(result.confidence, 0.2);
        assert_eq!(result.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_confidence_is_monotonic_and_bounded() {
        let model = ConfidenceModel::default();
        let mut previous = 0.0;
        for hits in 0..50 {
            let score = model.score(hits);
            assert!(score >= previous);
            assert!((0.2..=1.0).contains(&score));
            previous = score;
        }
        assert_eq!(model.score(9), 1.0);
        assert_eq!(model.score(1000), 1.0);
    }

    #[test]
    fn test_custom_strategies() {
        let brands = BrandSet::new("Rolex", competitors(&["Omega"]));
        let analyzer = ResponseAnalyzer::new(&brands, MatcherOptions::default())
            .unwrap()
            .with_ranking(Box::new(NoRanking))
            .with_sentiment(Box::new(LexiconSentiment));
        let result = analyzer.analyze("ollama", "q", "1. Rolex is the best and most trusted.");
        assert!(result.rankings.is_empty());
        assert_eq!(result.brand_position, None);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.source_id, "ollama");
    }

    #[test]
    fn test_tracked_brands_are_deduplicated() {
        let brands = BrandSet::new("Rolex", competitors(&["Omega", "Rolex", " ", "Omega"]));
        let tracked = brands.tracked();
        assert_eq!(tracked.len(), 2);
        assert!(tracked[0].is_own);
        assert_eq!(tracked[1].name, "Omega");
    }
}
