//! Signal classifier: ordered keyword rules, first match wins.
//!
//! 1. persona + hiring context ("job", "hiring", "career")     → hiring_target_persona
//! 2. move verb ("join", "hired", "appointed", "named") + persona → executive_move
//! 3. any data-tech keyword or CDP vendor                         → technology_signal
//! 4. growth word ("series", "funding", "raised", ...)            → growth_funding
//! 5. otherwise                                                   → other

use crate::analyze::{contains_any, normalize_text};
use crate::config::Keywords;
use crate::signal::{Category, Signal};

pub const HIRING_CONTEXT: &[&str] = &["job", "hiring", "career"];
pub const MOVE_VERBS: &[&str] = &["join", "hired", "appointed", "named"];
pub const GROWTH_WORDS: &[&str] = &[
    "series",
    "funding",
    "raised",
    "investment",
    "launch",
    "expand",
];

#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Keywords,
}

impl Classifier {
    pub fn new(keywords: Keywords) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    /// Classify free text. Empty text is `Other`.
    pub fn classify(&self, snippet: &str) -> Category {
        let text = normalize_text(snippet);
        let kw = &self.keywords;
        let has_persona = contains_any(&text, &kw.target_personas);

        if has_persona && contains_any(&text, HIRING_CONTEXT) {
            return Category::HiringTargetPersona;
        }
        if contains_any(&text, MOVE_VERBS) && has_persona {
            return Category::ExecutiveMove;
        }
        if contains_any(&text, &kw.data_tech) || contains_any(&text, &kw.cdp_vendors) {
            return Category::TechnologySignal;
        }
        if contains_any(&text, GROWTH_WORDS) {
            return Category::GrowthFunding;
        }
        Category::Other
    }

    /// Fill in `signal_category` if the connector left it empty; returns the category.
    pub fn ensure_category(&self, signal: &mut Signal) -> Category {
        *signal
            .signal_category
            .get_or_insert_with(|| self.classify(&signal.snippet))
    }
}
