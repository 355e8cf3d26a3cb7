// src/analyze/mod.rs
//! Signal analysis: text normalization, classification and scoring.
//!
//! Both the classifier and the scorer read text through [`normalize_text`], so a
//! keyword that matches in one matches in the other. All matching is plain substring
//! containment on normalized text; there is no word-boundary check, so "cto" also
//! hits inside "director" and "segment" inside "segmentation". That is a known
//! property of the keyword model, not something callers should expect to be filtered.

pub mod classify;
pub mod scoring;
pub mod weights;

pub use crate::analyze::classify::Classifier;
pub use crate::analyze::scoring::{SignalScorer, UNIFIED_DATA_CONCEPTS};
pub use crate::analyze::weights::ScoringWeights;

/// Characters replaced by a space before matching.
pub const STRIP_PUNCTUATION: &[char] = &[
    ',', '.', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Lowercase, turn the fixed punctuation set into spaces, collapse whitespace.
/// Idempotent: `normalize_text(&normalize_text(s)) == normalize_text(s)`.
pub fn normalize_text(input: &str) -> String {
    let lowered = input.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| if STRIP_PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True if `text` contains any of `needles`. Expects already-normalized text.
pub fn contains_any<S: AsRef<str>>(text: &str, needles: &[S]) -> bool {
    needles
        .iter()
        .map(AsRef::as_ref)
        .any(|n| !n.is_empty() && text.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        let out = normalize_text("  We're HIRING: a (Director),\tData   Platform! ");
        assert_eq!(out, "we re hiring a director data platform");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [
            "",
            "   ",
            "ACME Corp selects Segment as its Customer Data Platform.",
            "\"Quoted\" [brackets] {braces}; semi: colon? bang!",
            "Real-Time Personalization — data-driven",
        ] {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn hyphens_survive_normalization() {
        assert_eq!(
            normalize_text("Real-Time Personalization"),
            "real-time personalization"
        );
    }

    #[test]
    fn contains_any_is_substring_based() {
        let t = normalize_text("Customer segmentation roadmap");
        assert!(contains_any(&t, &["segment"]));
        assert!(!contains_any(&t, &["mparticle"]));
        assert!(!contains_any(&t, &[""]));
        let none: [&str; 0] = [];
        assert!(!contains_any(&t, &none));
    }
}
