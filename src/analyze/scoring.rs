//! Additive point scoring for classified signals.
//!
//! score = category base points + unified-data bonus, floored to 1 for any
//! non-`other` signal that would otherwise score 0.
//!
//! | category                | base                                               |
//! |-------------------------|----------------------------------------------------|
//! | hiring_target_persona   | `hiring_target_persona_with_cdp_keywords` if any cdp_related keyword, else 2 |
//! | executive_move          | `executive_move_target_persona`                    |
//! | technology_signal       | `explicit_cdp_vendor_mention` if any vendor, else 2 |
//! | growth_funding          | `funding_or_expansion`                             |
//! | other                   | 0                                                  |

use crate::analyze::{contains_any, normalize_text, Classifier, ScoringWeights};
use crate::config::Keywords;
use crate::signal::{Category, Signal};

/// Fixed phrase list for the unified-data bonus (exact phrases, no fuzzy matching).
pub const UNIFIED_DATA_CONCEPTS: &[&str] = &[
    "customer 360",
    "unified data",
    "real-time personalization",
    "single view of customer",
    "data unification",
    "identity resolution",
];

const HIRING_WITHOUT_CDP_POINTS: u32 = 2;
const TECHNOLOGY_WITHOUT_VENDOR_POINTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct SignalScorer {
    weights: ScoringWeights,
    classifier: Classifier,
}

impl SignalScorer {
    pub fn new(weights: ScoringWeights, keywords: Keywords) -> Self {
        tracing::debug!(?weights, "initialized signal scorer");
        Self {
            weights,
            classifier: Classifier::new(keywords),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Score for an explicit category + snippet. Pure.
    pub fn score(&self, category: Category, snippet: &str) -> u32 {
        let text = normalize_text(snippet);
        let kw = self.classifier.keywords();
        let w = &self.weights;

        let mut score = match category {
            Category::HiringTargetPersona => {
                if contains_any(&text, &kw.cdp_related) {
                    w.hiring_target_persona_with_cdp_keywords
                } else {
                    HIRING_WITHOUT_CDP_POINTS
                }
            }
            Category::ExecutiveMove => w.executive_move_target_persona,
            Category::TechnologySignal => {
                if contains_any(&text, &kw.cdp_vendors) {
                    w.explicit_cdp_vendor_mention
                } else {
                    TECHNOLOGY_WITHOUT_VENDOR_POINTS
                }
            }
            Category::GrowthFunding => w.funding_or_expansion,
            Category::Other => 0,
        };

        if contains_any(&text, UNIFIED_DATA_CONCEPTS) {
            score = score.saturating_add(w.unified_data_concepts);
        }

        if score == 0 && category != Category::Other {
            score = 1;
        }

        tracing::trace!(category = %category, score, "scored signal");
        score
    }

    /// Score a signal, classifying it first when no category is set.
    /// Does not mutate the signal.
    pub fn score_signal(&self, signal: &Signal) -> u32 {
        let category = signal
            .signal_category
            .unwrap_or_else(|| self.classifier.classify(&signal.snippet));
        self.score(category, &signal.snippet)
    }

    /// Classify (if needed) and score in place.
    pub fn enrich(&self, signal: &mut Signal) {
        let category = self.classifier.ensure_category(signal);
        signal.score = Some(self.score(category, &signal.snippet));
    }
}
