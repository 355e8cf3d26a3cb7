//! Scoring weights: the five named point values the scorer hands out.
//!
//! JSON/TOML shape (every key optional, missing keys keep their default):
//! {
//!   "hiring_target_persona_with_cdp_keywords": 5,
//!   "executive_move_target_persona": 4,
//!   "explicit_cdp_vendor_mention": 4,
//!   "unified_data_concepts": 3,
//!   "funding_or_expansion": 2
//! }

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_hiring_with_cdp")]
    pub hiring_target_persona_with_cdp_keywords: u32,
    #[serde(default = "default_executive_move")]
    pub executive_move_target_persona: u32,
    #[serde(default = "default_vendor_mention")]
    pub explicit_cdp_vendor_mention: u32,
    #[serde(default = "default_unified_data")]
    pub unified_data_concepts: u32,
    #[serde(default = "default_funding")]
    pub funding_or_expansion: u32,
}

fn default_hiring_with_cdp() -> u32 {
    5
}
fn default_executive_move() -> u32 {
    4
}
fn default_vendor_mention() -> u32 {
    4
}
fn default_unified_data() -> u32 {
    3
}
fn default_funding() -> u32 {
    2
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            hiring_target_persona_with_cdp_keywords: default_hiring_with_cdp(),
            executive_move_target_persona: default_executive_move(),
            explicit_cdp_vendor_mention: default_vendor_mention(),
            unified_data_concepts: default_unified_data(),
            funding_or_expansion: default_funding(),
        }
    }
}

/// Load weights directly from a JSON file (no caching). Public for tests/tools.
pub fn load_weights_file(path: &Path) -> Result<ScoringWeights> {
    let bytes = fs::read(path).with_context(|| format!("reading weights from {}", path.display()))?;
    let w: ScoringWeights = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing weights in {}", path.display()))?;
    Ok(w)
}
