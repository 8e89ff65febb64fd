//! Aho-Corasick brand alias matcher.
//!
//! All aliases are compiled into one automaton and the normalized text is
//! scanned in a single pass. Candidates are then filtered on word
//! boundaries, checked against the common-word case policy, resolved with
//! a longest-match-wins sweep over their original-text spans.

use crate::error::MatcherError;
use crate::matcher::common_words::common_word_set;
use crate::matcher::normalize::{fold_preserving_case, is_word_char, normalize};
use crate::models::{BrandEntry, Match};
use aho_corasick::{AhoCorasick, MatchKind};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Matching behavior switches.
#[derive(Debug, Clone)]
pub struct MatcherOptions {
    /// Drop occurrences glued to a letter or digit on either side.
    pub word_boundary: bool,
    /// Resolve overlaps greedily, favoring earlier then longer spans.
    pub longest_match_wins: bool,
    /// Match common-word aliases with their original casing only.
    pub case_sensitive_common_words: bool,
    pub common_words: HashSet<String>,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            word_boundary: true,
            longest_match_wins: true,
            case_sensitive_common_words: true,
            common_words: common_word_set(std::iter::empty::<&str>()),
        }
    }
}

/// An occurrence expressed as a byte span of the original text.
///
/// Decomposition can spread one original character over several normalized
/// ones, so overlap is decided on original offsets.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    entry: usize,
}

/// A compiled multi-pattern matcher over a set of brand entries.
#[derive(Debug, Clone)]
pub struct BrandMatcher {
    automaton: Option<AhoCorasick>,
    entries: Vec<BrandEntry>,
    /// Entry indices owning each pattern id, in registration order.
    owners: Vec<Vec<usize>>,
    /// Case-preserving form for entries subject to the common-word policy.
    case_forms: Vec<Option<String>>,
    options: MatcherOptions,
}

impl BrandMatcher {
    /// Build a matcher with default options.
    pub fn build(entries: &[BrandEntry]) -> Result<Self, MatcherError> {
        Self::with_options(entries, MatcherOptions::default())
    }

    /// Build a matcher with explicit options.
    pub fn with_options(
        entries: &[BrandEntry],
        options: MatcherOptions,
    ) -> Result<Self, MatcherError> {
        let mut kept: Vec<BrandEntry> = Vec::with_capacity(entries.len());
        let mut case_forms = Vec::with_capacity(entries.len());
        let mut patterns: Vec<String> = Vec::new();
        let mut owners: Vec<Vec<usize>> = Vec::new();
        let mut pattern_ids: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for entry in entries {
            let key = normalize(&entry.alias).text.trim().to_string();
            if key.is_empty() {
                debug!(brand = %entry.brand_id, alias = %entry.alias, "Skipping empty alias");
                continue;
            }
            // One entry per (brand, normalized alias)
            if !seen.insert((entry.brand_id.clone(), key.clone())) {
                continue;
            }

            let index = kept.len();
            let pattern_id = *pattern_ids.entry(key.clone()).or_insert_with(|| {
                patterns.push(key.clone());
                owners.push(Vec::new());
                patterns.len() - 1
            });
            owners[pattern_id].push(index);

            let case_form = (options.case_sensitive_common_words
                && options.common_words.contains(&key))
            .then(|| fold_preserving_case(entry.alias.trim()));

            kept.push(entry.clone());
            case_forms.push(case_form);
        }

        let automaton = if patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::Standard)
                    .build(&patterns)?,
            )
        };

        debug!(
            entries = kept.len(),
            patterns = patterns.len(),
            "Built alias automaton"
        );

        Ok(Self {
            automaton,
            entries: kept,
            owners,
            case_forms,
            options,
        })
    }

    /// Whether the matcher has no usable aliases.
    pub fn is_empty(&self) -> bool {
        self.automaton.is_none()
    }

    /// Find all brand occurrences in `text`.
    pub fn find(&self, text: &str) -> Vec<Match> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };

        let normalized = normalize(text);
        let haystack = normalized.text.as_str();

        let mut candidates: Vec<Candidate> = Vec::new();
        for found in automaton.find_overlapping_iter(haystack) {
            let (start, end) = (found.start(), found.end());
            if self.options.word_boundary && !is_bounded(haystack, start, end) {
                continue;
            }

            let (orig_start, orig_end) = normalized.original_span(start, end, text);
            for &entry in &self.owners[found.pattern().as_usize()] {
                if let Some(form) = &self.case_forms[entry] {
                    if fold_preserving_case(&text[orig_start..orig_end]) != *form {
                        continue;
                    }
                }
                candidates.push(Candidate {
                    start: orig_start,
                    end: orig_end,
                    entry,
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.end.cmp(&a.end))
                .then(a.entry.cmp(&b.entry))
        });

        let kept = if self.options.longest_match_wins {
            resolve_overlaps(candidates)
        } else {
            candidates
        };

        kept.into_iter()
            .map(|c| {
                let entry = &self.entries[c.entry];
                Match {
                    brand_id: entry.brand_id.clone(),
                    alias_matched: entry.alias.clone(),
                    start: c.start,
                    end: c.end,
                    surface: text[c.start..c.end].to_string(),
                }
            })
            .collect()
    }
}

/// Greedy left-to-right sweep over sorted candidates.
fn resolve_overlaps(sorted: Vec<Candidate>) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(sorted.len());
    let mut last_end = 0;

    for candidate in sorted {
        if kept.is_empty() || candidate.start >= last_end {
            last_end = candidate.end;
            kept.push(candidate);
        }
    }

    kept
}

fn is_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Build a matcher for `entries` and scan `text` once.
pub fn find_matches(text: &str, entries: &[BrandEntry]) -> Result<Vec<Match>, MatcherError> {
    Ok(BrandMatcher::build(entries)?.find(text))
}
