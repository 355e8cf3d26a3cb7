// src/sources/providers/greenhouse.rs
//! Greenhouse public job-board API. Board tokens aren't discoverable, so we try a
//! handful of guesses derived from the company name and use the first that answers 200.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;

use crate::analyze::{contains_any, normalize_text};
use crate::signal::{dedup_by_url, Category, Signal};
use crate::sources::{clean_markup, company_slugs, dedup_preserving, SignalSource, SourceContext};

pub const GREENHOUSE_API_URL: &str = "https://boards-api.greenhouse.io/v1/boards";
const COMMON_TOKENS: [&str; 5] = ["company", "main", "careers", "jobs", "hiring"];
const RELEVANT_DEPARTMENTS: [&str; 5] =
    ["marketing", "data", "analytics", "engineering", "product"];
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    title: String,
    #[serde(default)]
    absolute_url: String,
    #[serde(default)]
    location: Option<Named>,
    #[serde(default)]
    departments: Vec<Named>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

pub struct GreenhouseSource {
    ctx: SourceContext,
    base_url: String,
}

impl GreenhouseSource {
    pub fn new(ctx: SourceContext) -> Self {
        Self {
            ctx,
            base_url: GREENHOUSE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn jobs_url(&self, token: &str) -> String {
        format!("{}/{token}/jobs", self.base_url)
    }

    /// Candidate board tokens, most likely first.
    pub fn candidate_tokens(company: &str) -> Vec<String> {
        let (slug, dashed) = company_slugs(company);
        if slug.is_empty() {
            return Vec::new();
        }
        let mut out = vec![slug.clone(), dashed.clone()];
        for base in [&slug, &dashed] {
            out.extend(COMMON_TOKENS.iter().map(|t| format!("{base}{t}")));
        }
        for base in [&slug, &dashed] {
            out.extend(COMMON_TOKENS.iter().map(|t| format!("{t}{base}")));
        }
        dedup_preserving(out)
    }

    async fn find_board_token(&self, company: &str) -> Option<String> {
        for token in Self::candidate_tokens(company) {
            match self.ctx.http.try_get(&self.jobs_url(&token), CHECK_TIMEOUT).await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!(company, token = %token, "found greenhouse board");
                    return Some(token);
                }
                _ => continue,
            }
        }
        tracing::info!(company, "no greenhouse board found");
        None
    }

    pub fn is_target_persona(&self, title: &str) -> bool {
        contains_any(
            &normalize_text(title),
            &self.ctx.classifier.keywords().target_personas,
        )
    }

    /// Persona titles always count; otherwise a relevant department plus a CDP term in
    /// the title.
    pub fn is_relevant_job(&self, title: &str, department: &str) -> bool {
        if self.is_target_persona(title) {
            return true;
        }
        let dept = normalize_text(department);
        if !contains_any(&dept, &RELEVANT_DEPARTMENTS) {
            return false;
        }
        contains_any(
            &normalize_text(title),
            &self.ctx.classifier.keywords().cdp_terms(),
        )
    }
}

#[async_trait]
impl SignalSource for GreenhouseSource {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>> {
        let Some(token) = self.find_board_token(company).await else {
            return Ok(Vec::new());
        };

        let url = format!("{}?content=true", self.jobs_url(&token));
        let board: Board = self
            .ctx
            .http
            .get_json(&url)
            .await
            .with_context(|| format!("fetching greenhouse jobs for {company}"))?;

        let mut out = Vec::new();
        for job in board.jobs {
            let department = job
                .departments
                .first()
                .map(|d| d.name.clone())
                .unwrap_or_default();
            let location = job.location.map(|l| l.name).unwrap_or_default();
            if !self.is_relevant_job(&job.title, &department) {
                continue;
            }

            let snippet = format!("{} - {} - {}", job.title, department, location);
            let category = if self.is_target_persona(&job.title) {
                Category::HiringTargetPersona
            } else {
                Category::Other
            };
            let signal = Signal::new("Greenhouse", job.absolute_url, snippet).raw(json!({
                "title": job.title,
                "department": department,
                "location": location,
                "board_token": token,
                "content": job.content.as_deref().map(clean_markup).unwrap_or_default(),
            }));
            out.push(signal.category(category));
        }

        let out = dedup_by_url(out);
        counter!("scan_source_signals_total", "source" => "greenhouse").increment(out.len() as u64);
        tracing::info!(company, count = out.len(), "greenhouse signals");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Greenhouse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use std::sync::Arc;

    fn source() -> GreenhouseSource {
        let ctx = SourceContext::new(Arc::new(ScannerConfig::default())).unwrap();
        GreenhouseSource::new(ctx)
    }

    #[test]
    fn tokens_cover_prefixes_and_suffixes() {
        let t = GreenhouseSource::candidate_tokens("Big Co.");
        assert_eq!(t[0], "bigco");
        assert_eq!(t[1], "big-co");
        assert!(t.contains(&"bigcocareers".to_string()));
        assert!(t.contains(&"jobsbig-co".to_string()));
        assert_eq!(t.len(), 22);

        // Single word: dashed == plain, duplicates dropped.
        assert_eq!(GreenhouseSource::candidate_tokens("Acme").len(), 11);
        assert!(GreenhouseSource::candidate_tokens("").is_empty());
    }

    #[test]
    fn relevance_rules() {
        let s = source();
        assert!(s.is_relevant_job("Director, Data Platform", "Engineering"));
        assert!(s.is_relevant_job("VP Marketing, EMEA", "Sales"));
        assert!(s.is_relevant_job("Segment Integration Engineer", "Data"));
        assert!(!s.is_relevant_job("Segment Integration Engineer", "Finance"));
        assert!(!s.is_relevant_job("Software Engineer", "Data"));
    }
}
