//! signal.rs: the record every connector produces and the scoring pipeline enriches.
//!
//! A `Signal` is created by a connector, gets its category from the classifier (unless
//! the connector already set one), its score from the scorer, and its `account` during
//! aggregation. After that it is only sorted and serialized.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of signal categories. Declaration order is classification precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HiringTargetPersona,
    ExecutiveMove,
    TechnologySignal,
    GrowthFunding,
    #[serde(other)]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::HiringTargetPersona,
        Category::ExecutiveMove,
        Category::TechnologySignal,
        Category::GrowthFunding,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::HiringTargetPersona => "hiring_target_persona",
            Category::ExecutiveMove => "executive_move",
            Category::TechnologySignal => "technology_signal",
            Category::GrowthFunding => "growth_funding",
            Category::Other => "other",
        }
    }

    /// Lenient parse; anything unrecognised is `Other`.
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so width/alignment specs work in table output.
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Human-readable origin, e.g. "Greenhouse", "Google CSE".
    pub source: String,
    /// Where the evidence was found; dedup key within one connector.
    #[serde(default)]
    pub source_url: String,
    /// The only field keyword matching reads.
    #[serde(default)]
    pub snippet: String,
    /// Connector-specific passthrough fields.
    #[serde(default = "empty_object")]
    pub raw_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Signal {
    pub fn new(
        source: impl Into<String>,
        source_url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_url: source_url.into(),
            snippet: snippet.into(),
            raw_data: empty_object(),
            signal_category: None,
            score: None,
            account: None,
        }
    }

    /// Builder: attach connector passthrough fields.
    pub fn raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_data = raw;
        self
    }

    /// Builder: preset the category (skips classification later).
    pub fn category(mut self, c: Category) -> Self {
        self.signal_category = Some(c);
        self
    }
}

/// Keep the first signal per non-empty `source_url`, preserving order.
/// Signals without a URL are dropped.
pub fn dedup_by_url(signals: Vec<Signal>) -> Vec<Signal> {
    let mut seen = std::collections::HashSet::new();
    signals
        .into_iter()
        .filter(|s| !s.source_url.is_empty() && seen.insert(s.source_url.clone()))
        .collect()
}
