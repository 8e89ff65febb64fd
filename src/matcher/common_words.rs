//! Common English words that are also plausible brand names.
//!
//! Aliases in this list are matched case-sensitively so that "the radical
//! decision" does not count as a mention of a brand called "Radical".

use std::collections::HashSet;

pub(crate) const COMMON_WORDS: &[&str] = &[
    "able", "ace", "action", "active", "advance", "alpha", "amazon", "anchor", "apex", "apple",
    "arrow", "atlas", "balance", "basic", "beacon", "bloom", "blue", "bold", "bright", "bridge",
    "brilliant", "call", "capital", "care", "case", "center", "champion", "chase", "choice",
    "circle", "classic", "clear", "cloud", "coach", "compass", "core", "crest", "crown", "current",
    "dash", "delta", "direct", "dove", "dream", "drive", "eagle", "echo", "edge", "element",
    "elite", "ember", "empire", "energy", "epic", "essential", "ever", "evolve", "express",
    "fashion", "fidelity", "first", "flash", "focus", "forge", "fortune", "forward", "fresh",
    "frontier", "fusion", "genesis", "giant", "glory", "gold", "grace", "grand", "guardian",
    "harbor", "harmony", "harvest", "haven", "heritage", "horizon", "icon", "ideal", "impact",
    "infinite", "insight", "instant", "jet", "journey", "key", "kind", "legacy", "liberty",
    "light", "lime", "link", "live", "lotus", "loyal", "lucky", "lush", "magic", "main", "mark",
    "matrix", "max", "meta", "mint", "mission", "modern", "monarch", "motion", "native",
    "nature", "nest", "next", "noble", "north", "notion", "nova", "oak", "oasis", "ocean",
    "omega", "one", "orbit", "orange", "origin", "pacific", "peak", "pilot", "pinnacle",
    "pioneer", "pixel", "planet", "plus", "prime", "pulse", "pure", "quest", "quick", "radiant",
    "radical", "rapid", "real", "rebel", "ripple", "rise", "rocket", "root", "royal", "sage",
    "savvy", "scout", "shell", "signal", "simple", "smart", "snap", "solid", "spark", "spirit",
    "square", "star", "sterling", "stride", "strong", "summit", "sun", "superior", "swift",
    "target", "thrive", "titan", "total", "tribe", "true", "trust", "twist", "ultra", "union",
    "unity", "urban", "valor", "vanguard", "venture", "vertex", "vibe", "victory", "vision",
    "vital", "vivid", "wave", "wise", "wonder", "zen", "zenith", "zest",
];

/// Build the lookup set from the built-in list plus configured extras.
pub fn common_word_set<I, S>(extra: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    COMMON_WORDS
        .iter()
        .map(|w| (*w).to_string())
        .chain(extra.into_iter().map(|w| w.as_ref().trim().to_lowercase()))
        .filter(|w| !w.is_empty())
        .collect()
}
