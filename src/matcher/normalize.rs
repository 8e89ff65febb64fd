//! Offset-preserving text normalization.
//!
//! Every character is decomposed and stripped of diacritics, smart quotes
//! are folded to ASCII, hyphen and dash variants become a space, and the
//! result is lowercased. Whitespace is never collapsed, so each normalized
//! byte can be traced back to the original character that produced it.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalized text plus the map back to the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    /// `index_map[i]` is the byte offset in the original text of the
    /// character that produced normalized byte `i`.
    pub index_map: Vec<usize>,
}

impl Normalized {
    /// Original byte offset where normalized byte `start` begins.
    pub fn original_start(&self, start: usize) -> usize {
        self.index_map.get(start).copied().unwrap_or(0)
    }

    /// Original byte offset just past the character that produced
    /// normalized byte `end - 1`.
    pub fn original_end(&self, end: usize, original: &str) -> usize {
        if end == 0 {
            return 0;
        }
        match self.index_map.get(end - 1) {
            Some(&last) => {
                let width = original[last..].chars().next().map_or(0, char::len_utf8);
                last + width
            }
            None => original.len(),
        }
    }

    /// Map a normalized byte span to an original byte span.
    pub fn original_span(&self, start: usize, end: usize, original: &str) -> (usize, usize) {
        (self.original_start(start), self.original_end(end, original))
    }
}

/// Normalize `text` for matching.
pub fn normalize(text: &str) -> Normalized {
    fold(text, true)
}

/// Fold diacritics, quotes and dashes but keep letter case.
///
/// Used for case-sensitive comparisons of common-word aliases.
pub fn fold_preserving_case(text: &str) -> String {
    fold(text, false).text
}

fn fold(text: &str, lowercase: bool) -> Normalized {
    let mut out = String::with_capacity(text.len());
    let mut index_map = Vec::with_capacity(text.len());

    for (offset, ch) in text.char_indices() {
        if let Some(replacement) = fold_punctuation(ch) {
            push_char(&mut out, &mut index_map, replacement, offset);
            continue;
        }

        for decomposed in std::iter::once(ch).nfd() {
            if lowercase {
                for lower in decomposed.to_lowercase() {
                    if !is_combining_mark(lower) {
                        push_char(&mut out, &mut index_map, lower, offset);
                    }
                }
            } else if !is_combining_mark(decomposed) {
                push_char(&mut out, &mut index_map, decomposed, offset);
            }
        }
    }

    Normalized {
        text: out,
        index_map,
    }
}

fn push_char(out: &mut String, index_map: &mut Vec<usize>, ch: char, offset: usize) {
    out.push(ch);
    index_map.extend(std::iter::repeat(offset).take(ch.len_utf8()));
}

fn fold_punctuation(ch: char) -> Option<char> {
    match ch {
        // hyphen-minus, hyphen, non-breaking hyphen, figure/en/em dash,
        // horizontal bar, minus sign, small/fullwidth hyphen-minus
        '-' | '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}' => {
            Some(' ')
        }
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => Some('"'),
        _ => None,
    }
}

/// Whether `ch` counts as part of a word for boundary checks.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}
