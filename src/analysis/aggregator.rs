//! Cross-response aggregation and scoring.
//!
//! This module combines analyzed responses into per-brand competitor
//! rankings, both across the whole run and per text source.

use crate::models::{CompetitorRanking, ProviderBreakdown, ResponseAnalysis, Sentiment, TrackedBrand};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Average position reported for brands no response ranked.
pub const UNRANKED_POSITION: f64 = 99.0;

/// Aggregate responses into one ranking entry per tracked brand.
///
/// A brand counts once per response that mentions it, however many times
/// it occurs there. Every tracked brand is present in the output, sorted
/// by visibility (highest first) and then by name.
pub fn aggregate(responses: &[ResponseAnalysis], tracked: &[TrackedBrand]) -> Vec<CompetitorRanking> {
    let refs: Vec<&ResponseAnalysis> = responses.iter().collect();
    aggregate_refs(&refs, tracked)
}

fn aggregate_refs(responses: &[&ResponseAnalysis], tracked: &[TrackedBrand]) -> Vec<CompetitorRanking> {
    let brands = dedup_brands(tracked);
    let total_responses = responses.len();

    let mentions: Vec<usize> = brands
        .iter()
        .map(|b| responses.iter().filter(|r| r.mentions(&b.name)).count())
        .collect();
    let total_mentions: usize = mentions.iter().sum();

    let mut rankings: Vec<CompetitorRanking> = brands
        .iter()
        .zip(&mentions)
        .map(|(brand, &mention_count)| {
            let positions: Vec<usize> = responses
                .iter()
                .filter_map(|r| r.position_of(&brand.name))
                .collect();
            let average_position = mean(positions.iter().map(|&p| p as f64))
                .unwrap_or(UNRANKED_POSITION);

            let sentiment_score = mean(
                responses
                    .iter()
                    .filter(|r| r.mentions(&brand.name))
                    .map(|r| r.sentiment_for(&brand.name).score()),
            )
            .unwrap_or(Sentiment::Neutral.score());

            CompetitorRanking {
                name: brand.name.clone(),
                mentions: mention_count,
                average_position,
                sentiment: Sentiment::from_score(sentiment_score),
                sentiment_score,
                share_of_voice: percentage(mention_count, total_mentions),
                visibility_score: percentage(mention_count, total_responses),
                is_own: brand.is_own,
            }
        })
        .collect();

    sort_by_visibility(&mut rankings);
    rankings
}

/// Per-source aggregation: one breakdown per source id, in the given
/// order, including sources without responses.
pub fn aggregate_by_source(
    responses: &[ResponseAnalysis],
    tracked: &[TrackedBrand],
    source_ids: &[String],
) -> Vec<ProviderBreakdown> {
    let grouped = group_by_source(responses);

    source_ids
        .iter()
        .map(|source_id| {
            let source_responses = grouped.get(source_id).cloned().unwrap_or_default();
            ProviderBreakdown {
                source_id: source_id.clone(),
                responses: source_responses.len(),
                competitors: aggregate_refs(&source_responses, tracked),
            }
        })
        .collect()
}

/// Group responses by source id.
pub fn group_by_source(responses: &[ResponseAnalysis]) -> BTreeMap<String, Vec<&ResponseAnalysis>> {
    let mut grouped: BTreeMap<String, Vec<&ResponseAnalysis>> = BTreeMap::new();

    for response in responses {
        grouped
            .entry(response.source_id.clone())
            .or_default()
            .push(response);
    }

    grouped
}

/// Sort rankings by visibility (highest first), ties by name.
pub fn sort_by_visibility(rankings: &mut [CompetitorRanking]) {
    rankings.sort_by(|a, b| {
        b.visibility_score
            .partial_cmp(&a.visibility_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Brands ranked by average list position (best first), unranked last.
pub fn leaders_by_position(rankings: &[CompetitorRanking]) -> Vec<&CompetitorRanking> {
    let mut ranked: Vec<&CompetitorRanking> = rankings.iter().collect();
    ranked.sort_by(|a, b| {
        a.average_position
            .partial_cmp(&b.average_position)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

fn dedup_brands(tracked: &[TrackedBrand]) -> Vec<&TrackedBrand> {
    let mut seen = HashSet::new();
    tracked
        .iter()
        .filter(|b| seen.insert(b.name.as_str()))
        .collect()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompanyRanking;

    fn tracked(names: &[&str]) -> Vec<TrackedBrand> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                if i == 0 {
                    TrackedBrand::own(*n)
                } else {
                    TrackedBrand::competitor(*n)
                }
            })
            .collect()
    }

    fn response(source: &str, counts: &[(&str, usize)], ranked: &[&str]) -> ResponseAnalysis {
        ResponseAnalysis {
            source_id: source.to_string(),
            prompt: "q".to_string(),
            text: String::new(),
            rankings: ranked
                .iter()
                .enumerate()
                .map(|(i, c)| CompanyRanking {
                    position: i + 1,
                    company: c.to_string(),
                })
                .collect(),
            brand_mentioned: false,
            competitors: vec![],
            brand_position: None,
            sentiment: Sentiment::Neutral,
            confidence: 0.5,
            mention_counts: counts.iter().map(|(b, c)| (b.to_string(), *c)).collect(),
            brand_sentiments: BTreeMap::new(),
            cited_sources: vec![],
        }
    }

    fn find<'a>(rankings: &'a [CompetitorRanking], name: &str) -> &'a CompetitorRanking {
        rankings.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_empty_input_keeps_all_brands_at_zero() {
        let rankings = aggregate(&[], &tracked(&["A", "B"]));
        assert_eq!(rankings.len(), 2);
        for r in &rankings {
            assert_eq!(r.mentions, 0);
            assert_eq!(r.visibility_score, 0.0);
            assert_eq!(r.share_of_voice, 0.0);
            assert_eq!(r.average_position, UNRANKED_POSITION);
            assert_eq!(r.sentiment_score, 50.0);
        }
        assert_eq!(rankings[0].name, "A");
        assert!(rankings[0].is_own);
    }

    #[test]
    fn test_mentions_count_once_per_response() {
        let responses = vec![
            response("s", &[("A", 7), ("B", 1)], &[]),
            response("s", &[("A", 0), ("B", 1)], &[]),
        ];
        let rankings = aggregate(&responses, &tracked(&["A", "B"]));
        assert_eq!(find(&rankings, "A").mentions, 1);
        assert_eq!(find(&rankings, "B").mentions, 2);
        assert_eq!(find(&rankings, "A").visibility_score, 50.0);
        assert_eq!(find(&rankings, "B").visibility_score, 100.0);
        assert_eq!(rankings[0].name, "B");
    }

    #[test]
    fn test_share_of_voice_sums_to_hundred() {
        let responses = vec![
            response("s", &[("A", 1), ("B", 2), ("C", 0)], &[]),
            response("s", &[("A", 1), ("B", 0), ("C", 3)], &[]),
            response("s", &[("A", 1), ("B", 0), ("C", 0)], &[]),
        ];
        let rankings = aggregate(&responses, &tracked(&["A", "B", "C", "D"]));
        let total: f64 = rankings
            .iter()
            .filter(|r| r.mentions > 0)
            .map(|r| r.share_of_voice)
            .sum();
        assert!((total - 100.0).abs() < 0.1);
        assert_eq!(find(&rankings, "D").share_of_voice, 0.0);
        assert_eq!(find(&rankings, "A").share_of_voice, 60.0);
    }

    #[test]
    fn test_average_position_and_sentinel() {
        let responses = vec![
            response("s", &[("A", 1), ("B", 1)], &["A", "B"]),
            response("s", &[("A", 1), ("B", 1)], &["B", "A"]),
            response("s", &[("A", 1)], &["A"]),
        ];
        let rankings = aggregate(&responses, &tracked(&["A", "B", "C"]));
        assert!((find(&rankings, "A").average_position - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(find(&rankings, "B").average_position, 1.5);
        assert_eq!(find(&rankings, "C").average_position, UNRANKED_POSITION);

        let leaders = leaders_by_position(&rankings);
        assert_eq!(leaders[0].name, "A");
        assert_eq!(leaders[2].name, "C");
    }

    #[test]
    fn test_sentiment_score_over_mentioning_responses() {
        let mut positive = response("s", &[("A", 1)], &[]);
        positive
            .brand_sentiments
            .insert("A".to_string(), Sentiment::Positive);
        let neutral = response("s", &[("A", 1)], &[]);
        let not_mentioned = response("s", &[("A", 0)], &[]);

        let rankings = aggregate(&[positive, neutral, not_mentioned], &tracked(&["A"]));
        assert_eq!(rankings[0].sentiment_score, 75.0);
        assert_eq!(rankings[0].sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_ties_sorted_by_name() {
        let responses = vec![response("s", &[("Zeta", 1), ("Alpha", 1)], &[])];
        let rankings = aggregate(&responses, &tracked(&["Zeta", "Alpha", "Mid"]));
        let names: Vec<&str> = rankings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta", "Mid"]);
    }

    #[test]
    fn test_visibility_non_decreasing_in_mentions() {
        let brands = tracked(&["A"]);
        let mut previous = -1.0;
        for mentioned in 0..=5 {
            let responses: Vec<ResponseAnalysis> = (0..5)
                .map(|i| response("s", &[("A", usize::from(i < mentioned))], &[]))
                .collect();
            let score = aggregate(&responses, &brands)[0].visibility_score;
            assert!(score >= previous);
            assert!((0.0..=100.0).contains(&score));
            previous = score;
        }
    }

    #[test]
    fn test_duplicate_tracked_brands_emitted_once() {
        let brands = vec![
            TrackedBrand::own("A"),
            TrackedBrand::competitor("A"),
            TrackedBrand::competitor("B"),
        ];
        let rankings = aggregate(&[], &brands);
        assert_eq!(rankings.len(), 2);
        assert!(find(&rankings, "A").is_own);
    }

    #[test]
    fn test_aggregate_by_source() {
        let responses = vec![
            response("openai", &[("A", 1), ("B", 0)], &[]),
            response("ollama", &[("A", 0), ("B", 1)], &[]),
            response("ollama", &[("A", 1), ("B", 1)], &[]),
        ];
        let sources = vec![
            "openai".to_string(),
            "ollama".to_string(),
            "perplexity".to_string(),
        ];
        let breakdown = aggregate_by_source(&responses, &tracked(&["A", "B"]), &sources);

        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].source_id, "openai");
        assert_eq!(breakdown[0].responses, 1);
        assert_eq!(find(&breakdown[0].competitors, "A").visibility_score, 100.0);
        assert_eq!(breakdown[1].responses, 2);
        assert_eq!(find(&breakdown[1].competitors, "B").visibility_score, 100.0);
        assert_eq!(find(&breakdown[1].competitors, "A").visibility_score, 50.0);
        assert_eq!(breakdown[2].responses, 0);
        assert_eq!(breakdown[2].competitors.len(), 2);
    }

    #[test]
    fn test_group_by_source() {
        let responses = vec![
            response("b", &[], &[]),
            response("a", &[], &[]),
            response("b", &[], &[]),
        ];
        let grouped = group_by_source(&responses);
        assert_eq!(grouped.get("a").map(Vec::len), Some(1));
        assert_eq!(grouped.get("b").map(Vec::len), Some(2));
    }
}
