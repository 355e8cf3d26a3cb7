// src/config/mod.rs
//! Scanner configuration: scoring weights, keyword lists, API pacing and scraping knobs.
//!
//! Every field carries a serde default, so a file only needs the keys it overrides
//! (nested tables merge key-by-key with the built-in defaults). Credentials never live
//! here; connectors read them from the environment.

pub mod keywords;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::analyze::weights::ScoringWeights;
pub use keywords::Keywords;

pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/scanner.toml";
pub const DEFAULT_JSON_PATH: &str = "config/scanner.json";

pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_GOOGLE_CSE_ID: &str = "GOOGLE_CSE_ID";
pub const ENV_SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub keywords: Keywords,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_serpapi")]
    pub serpapi: RateLimit,
    #[serde(default = "default_google_cse")]
    pub google_cse: RateLimit,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            serpapi: default_serpapi(),
            google_cse: default_google_cse(),
        }
    }
}

/// Pacing for a metered API. `rate_limit` units differ per API:
/// SerpApi is requests/second, Google CSE is requests/minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub rate_limit: f64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RateLimit {
    /// `rate_limit`, or 1.0 when it is zero, negative or not finite.
    pub fn effective_rate(&self) -> f64 {
        if self.rate_limit.is_finite() && self.rate_limit > 0.0 {
            self.rate_limit
        } else {
            1.0
        }
    }

    /// Gap between two requests when `rate_limit` counts requests per `window`.
    pub fn interval(&self, window: Duration) -> Duration {
        Duration::try_from_secs_f64(window.as_secs_f64() / self.effective_rate())
            .unwrap_or(window)
    }
}

fn default_serpapi() -> RateLimit {
    RateLimit {
        rate_limit: 5.0,
        backoff_factor: 1.5,
        max_retries: 3,
    }
}

fn default_google_cse() -> RateLimit {
    RateLimit {
        rate_limit: 10.0,
        backoff_factor: 2.0,
        max_retries: 3,
    }
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "CDP Signal Scanner/0.1.0 (research tool, contact hello@example.com)".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_max_docs")]
    pub max_docs_per_source: usize,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_docs_per_source: default_max_docs(),
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_max_docs() -> usize {
    5
}

fn default_max_age_days() -> i64 {
    365
}

impl ScannerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ScannerConfig = toml::from_str(s).context("parsing scanner config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: ScannerConfig = serde_json::from_str(s).context("parsing scanner config json")?;
        Ok(cfg.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.keywords = self.keywords.normalized();
        for rl in [&mut self.api.serpapi, &mut self.api.google_cse] {
            rl.rate_limit = rl.effective_rate();
        }
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON (picked by extension,
/// JSON first for `.json`, TOML otherwise).
pub fn load_config_from(path: &Path) -> Result<ScannerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading scanner config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => ScannerConfig::from_json_str(&content),
        _ => ScannerConfig::from_toml_str(&content),
    }
}

/// Resolve the config path:
/// 1) $CONFIG_PATH (error if it points nowhere)
/// 2) config/scanner.toml
/// 3) config/scanner.json
/// Returns `Ok(None)` when nothing is configured.
pub fn resolve_config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("CONFIG_PATH points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

/// Load the effective config. Never fails: a missing or broken file is logged and
/// the built-in defaults are used instead.
pub fn load_config() -> ScannerConfig {
    let path = match resolve_config_path() {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::warn!("no scanner config file found, using defaults");
            return ScannerConfig::default();
        }
        Err(e) => {
            tracing::warn!(error = %e, "scanner config path invalid, using defaults");
            return ScannerConfig::default();
        }
    };
    match load_config_from(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "loaded scanner config");
            cfg
        }
        Err(e) => {
            tracing::warn!(
                error = ?e,
                path = %path.display(),
                "error loading scanner config, using defaults"
            );
            ScannerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn nested_override_merges_with_defaults() {
        let cfg = ScannerConfig::from_toml_str(
            r#"
[scoring]
unified_data_concepts = 6

[api.google_cse]
rate_limit = 30

[keywords]
data_tech = ["Snowflake", " "]
"#,
        )
        .unwrap();
        assert_eq!(cfg.scoring.unified_data_concepts, 6);
        assert_eq!(cfg.scoring.funding_or_expansion, 2);
        assert_eq!(cfg.api.google_cse.rate_limit, 30.0);
        assert_eq!(cfg.api.google_cse.max_retries, 3);
        assert_eq!(cfg.api.serpapi, default_serpapi());
        assert_eq!(cfg.keywords.data_tech, vec!["snowflake".to_string()]);
        assert_eq!(cfg.keywords.cdp_vendors, Keywords::default().cdp_vendors);
        assert_eq!(cfg.scraping.timeout_secs, 10);
        assert_eq!(cfg.documents.max_docs_per_source, 5);
    }

    #[test]
    fn json_and_empty_documents_parse() {
        let cfg = ScannerConfig::from_json_str(r#"{"documents": {"max_age_days": 30}}"#).unwrap();
        assert_eq!(cfg.documents.max_age_days, 30);
        assert_eq!(ScannerConfig::from_toml_str("").unwrap(), ScannerConfig::default());
    }

    #[test]
    fn non_positive_rate_limit_is_clamped() {
        let cfg = ScannerConfig::from_toml_str("[api.serpapi]\nrate_limit = 0").unwrap();
        assert_eq!(cfg.api.serpapi.rate_limit, 1.0);
    }

    #[test]
    fn interval_survives_unusable_rates_built_in_code() {
        let mut rl = default_google_cse();
        assert_eq!(rl.interval(Duration::from_secs(60)), Duration::from_secs(6));
        for bad in [0.0, -4.0, f64::NAN, f64::INFINITY] {
            rl.rate_limit = bad;
            assert_eq!(rl.interval(Duration::from_secs(60)), Duration::from_secs(60));
        }
        rl.rate_limit = 1e-300;
        assert_eq!(rl.interval(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[serial_test::serial]
    #[test]
    fn default_load_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // Nothing on disk → defaults.
        assert_eq!(load_config(), ScannerConfig::default());

        // Fallback TOML in ./config/
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join(DEFAULT_TOML_PATH),
            "[scoring]\nexecutive_move_target_persona = 8",
        )
        .unwrap();
        assert_eq!(load_config().scoring.executive_move_target_persona, 8);

        // Env wins.
        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"scoring": {"executive_move_target_persona": 1}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(load_config().scoring.executive_move_target_persona, 1);

        // Broken env path → defaults, not a crash.
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
        assert_eq!(load_config(), ScannerConfig::default());

        env::remove_var(ENV_CONFIG_PATH);
        env::set_current_dir(&old).unwrap();
    }

    #[test]
    fn unparsable_file_is_an_error_for_explicit_load() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("bad.toml");
        fs::write(&p, "scoring = [").unwrap();
        assert!(load_config_from(&p).is_err());
    }
}
