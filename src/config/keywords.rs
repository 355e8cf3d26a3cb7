// src/config/keywords.rs
use serde::{Deserialize, Serialize};

/// Keyword lists used for plain substring containment after normalization.
/// Entries are expected lowercase; `normalized()` enforces it for user-supplied files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keywords {
    #[serde(default = "default_cdp_vendors")]
    pub cdp_vendors: Vec<String>,
    #[serde(default = "default_target_personas")]
    pub target_personas: Vec<String>,
    #[serde(default = "default_cdp_related")]
    pub cdp_related: Vec<String>,
    #[serde(default = "default_data_tech")]
    pub data_tech: Vec<String>,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            cdp_vendors: default_cdp_vendors(),
            target_personas: default_target_personas(),
            cdp_related: default_cdp_related(),
            data_tech: default_data_tech(),
        }
    }
}

impl Keywords {
    /// Lowercase + trim every entry and drop blanks. Order is kept.
    pub fn normalized(self) -> Self {
        fn clean(v: Vec<String>) -> Vec<String> {
            v.into_iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            cdp_vendors: clean(self.cdp_vendors),
            target_personas: clean(self.target_personas),
            cdp_related: clean(self.cdp_related),
            data_tech: clean(self.data_tech),
        }
    }

    /// `cdp_related` followed by `cdp_vendors`; the set document scrapers look for.
    pub fn cdp_terms(&self) -> Vec<&str> {
        self.cdp_related
            .iter()
            .chain(self.cdp_vendors.iter())
            .map(String::as_str)
            .collect()
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_cdp_vendors() -> Vec<String> {
    owned(&[
        "segment",
        "mparticle",
        "rudderstack",
        "tealium",
        "adobe real-time cdp",
        "blueconic",
        "lytics",
        "treasure data",
    ])
}

fn default_target_personas() -> Vec<String> {
    owned(&[
        "director data platform",
        "vp marketing",
        "growth marketing manager",
        "cto",
        "vp engineering",
        "director security",
        "marketing ops",
        "chief marketing officer",
        "chief digital officer",
        "vp product",
        "head of analytics",
        "head of data",
    ])
}

fn default_cdp_related() -> Vec<String> {
    owned(&[
        "customer data platform",
        "cdp",
        "data integration",
        "customer 360",
        "unified data",
        "real-time personalization",
        "data orchestration",
        "customer journey",
        "omnichannel",
        "first-party data",
    ])
}

fn default_data_tech() -> Vec<String> {
    owned(&[
        "snowflake",
        "dbt",
        "fivetran",
        "bigquery",
        "redshift",
        "databricks",
        "data lakehouse",
        "data warehouse",
    ])
}
