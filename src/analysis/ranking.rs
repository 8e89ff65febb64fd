//! Best-effort ranking extraction from list-shaped answers.
//!
//! LLM answers to "what are the best X" usually come back as numbered or
//! bulleted lists. The extractor splits text into items, finds the first
//! known alias in each item and hands out ascending positions.

use crate::matcher::BrandMatcher;
use crate::models::CompanyRanking;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Leading ordinal (`1.`, `2)`) or bullet (`-`, `*`, `+`, `•`), optionally
/// behind a markdown heading or bold marker.
static ITEM_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#{1,6}\s*)?(?:\*\*)?(?:\d{1,2}[.)]|[-*+•])\s+")
        .expect("item marker pattern is valid")
});

/// Ordinal appearing mid-line, e.g. the "2." in "1. A leads. 2. B follows."
static INLINE_ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[.)]\s").expect("ordinal pattern is valid")
});

/// Strategy for pulling list positions out of a response.
pub trait RankingStrategy: Send + Sync {
    fn extract(&self, text: &str, matcher: &BrandMatcher) -> Vec<CompanyRanking>;
}

/// Numbered/bulleted list heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListMarkerRanking;

/// Disables ranking extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRanking;

impl RankingStrategy for NoRanking {
    fn extract(&self, _text: &str, _matcher: &BrandMatcher) -> Vec<CompanyRanking> {
        Vec::new()
    }
}

impl RankingStrategy for ListMarkerRanking {
    fn extract(&self, text: &str, matcher: &BrandMatcher) -> Vec<CompanyRanking> {
        let mut rankings = Vec::new();
        let mut ranked: HashSet<String> = HashSet::new();

        for segment in text.lines().flat_map(split_inline_ordinals) {
            if !ITEM_MARKER.is_match(segment) {
                continue;
            }
            let Some(company) = first_alias(segment, matcher) else {
                continue;
            };
            if ranked.insert(company.clone()) {
                rankings.push(CompanyRanking {
                    position: rankings.len() + 1,
                    company,
                });
            }
        }

        rankings
    }
}

/// Split a line at every ordinal that starts a new item.
///
/// Mid-line ordinals only count when they continue the numbering, so a
/// stray "9. " in prose is not an item.
fn split_inline_ordinals(line: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = Vec::new();
    let mut expected: Option<u32> = None;

    for caps in INLINE_ORDINAL.captures_iter(line) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let start = whole.start();
        let after_space = line[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let Ok(number) = digits.as_str().parse::<u32>() else {
            continue;
        };
        let leading = line[..start].trim().is_empty();
        if after_space && (leading || number == expected.unwrap_or(1)) {
            cuts.push(start);
            expected = Some(number + 1);
        }
    }
    if cuts.first() != Some(&0) {
        cuts.insert(0, 0);
    }

    cuts.iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = cuts.get(i + 1).copied().unwrap_or(line.len());
            &line[start..end]
        })
        .collect()
}

/// Brand of the earliest alias the matcher accepts in `segment`.
///
/// Uses the same boundary and casing rules as mention counting, so a
/// brand is never ranked from an item that does not mention it.
fn first_alias(segment: &str, matcher: &BrandMatcher) -> Option<String> {
    matcher
        .find(segment)
        .into_iter()
        .next()
        .map(|m| m.brand_id)
}
