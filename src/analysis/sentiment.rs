//! Pluggable sentiment classification for brand mentions.
//!
//! The default classifier reports every mention as neutral. A lexicon
//! classifier is available for rough polarity when no model is wired in.

use crate::models::{Match, Sentiment};

/// Classifies how favorably a response talks about one brand.
pub trait SentimentClassifier: Send + Sync {
    /// `mentions` holds the occurrences of `brand` inside `text`.
    fn classify(&self, text: &str, brand: &str, mentions: &[&Match]) -> Sentiment;
}

/// Always neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSentiment;

impl SentimentClassifier for NeutralSentiment {
    fn classify(&self, _text: &str, _brand: &str, _mentions: &[&Match]) -> Sentiment {
        Sentiment::Neutral
    }
}

/// Word weights. Positive values favor the brand, negative values count
/// against it.
const LEXICON: &[(&str, f32)] = &[
    ("best", 0.5),
    ("excellent", 0.5),
    ("leading", 0.4),
    ("leader", 0.4),
    ("great", 0.4),
    ("reliable", 0.4),
    ("recommend", 0.4),
    ("recommended", 0.4),
    ("popular", 0.3),
    ("trusted", 0.4),
    ("innovative", 0.3),
    ("quality", 0.3),
    ("affordable", 0.2),
    ("favorite", 0.4),
    ("top", 0.3),
    ("strong", 0.2),
    ("worst", -0.6),
    ("poor", -0.5),
    ("bad", -0.4),
    ("expensive", -0.2),
    ("overpriced", -0.4),
    ("unreliable", -0.5),
    ("complaints", -0.4),
    ("lawsuit", -0.5),
    ("recall", -0.5),
    ("scandal", -0.6),
    ("avoid", -0.5),
    ("declining", -0.3),
    ("weak", -0.3),
    ("issues", -0.3),
];

const POLARITY_THRESHOLD: f32 = 0.2;

/// Scores the sentences that mention the brand against a small lexicon.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    /// Score text in `[-1.0, 1.0]`.
    pub fn score(text: &str) -> f32 {
        let mut score = 0.0_f32;
        for word in text.split_whitespace() {
            let w = word
                .trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase();
            if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
                score += weight;
            }
        }
        score.clamp(-1.0, 1.0)
    }
}

impl SentimentClassifier for LexiconSentiment {
    fn classify(&self, text: &str, _brand: &str, mentions: &[&Match]) -> Sentiment {
        let mut sentences: Vec<(usize, usize)> = mentions
            .iter()
            .map(|m| sentence_around(text, m.start, m.end))
            .collect();
        sentences.sort_unstable();
        sentences.dedup();

        let total: f32 = sentences
            .iter()
            .map(|&(start, end)| Self::score(&text[start..end]))
            .sum();

        if total >= POLARITY_THRESHOLD {
            Sentiment::Positive
        } else if total <= -POLARITY_THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }
}

fn is_sentence_break(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

/// Byte range of the sentence containing `start..end`.
fn sentence_around(text: &str, start: usize, end: usize) -> (usize, usize) {
    let from = text[..start]
        .rfind(is_sentence_break)
        .map_or(0, |i| i + 1);
    let to = text[end..]
        .find(is_sentence_break)
        .map_or(text.len(), |i| end + i);
    (from, to)
}
