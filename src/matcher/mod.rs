//! Brand alias matching.
//!
//! This module provides the text normalizer and the multi-pattern matcher
//! that finds brand aliases in free text.

pub mod automaton;
pub mod common_words;
pub mod normalize;

pub use automaton::{find_matches, BrandMatcher, MatcherOptions};
pub use common_words::common_word_set;
pub use normalize::{normalize, Normalized};
