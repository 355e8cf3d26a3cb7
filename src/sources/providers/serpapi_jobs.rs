// src/sources/providers/serpapi_jobs.rs
//! Job listings through SerpApi's `google_jobs` engine (Indeed and friends). One query
//! per persona, CDP term and vendor, paced by `api.serpapi.rate_limit` (requests/sec).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use crate::analyze::{contains_any, normalize_text};
use crate::signal::{dedup_by_url, Signal};
use crate::sources::{combined_text, truncate_chars, SignalSource, SourceContext};

pub const SERPAPI_URL: &str = "https://serpapi.com/search.json";
const DESCRIPTION_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs_results: Vec<JobResult>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    location: String,
    #[serde(default, alias = "share_link")]
    job_link: String,
    #[serde(default)]
    description: String,
}

pub struct SerpApiJobsSource {
    ctx: SourceContext,
    api_key: String,
    base_url: String,
}

impl SerpApiJobsSource {
    pub fn new(ctx: SourceContext, api_key: impl Into<String>) -> Self {
        Self {
            ctx,
            api_key: api_key.into(),
            base_url: SERPAPI_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn queries(&self, company: &str) -> Vec<String> {
        let kw = self.ctx.classifier.keywords();
        kw.target_personas
            .iter()
            .chain(kw.cdp_related.iter())
            .chain(kw.cdp_vendors.iter())
            .map(|term| format!("{term} {company}"))
            .collect()
    }

    fn pause(&self) -> Duration {
        self.ctx.config.api.serpapi.interval(Duration::from_secs(1))
    }

    /// Persona in the title, or any CDP/vendor/data-tech term in title + description.
    pub fn is_relevant_job(&self, title: &str, description: &str) -> bool {
        let kw = self.ctx.classifier.keywords();
        if contains_any(&normalize_text(title), &kw.target_personas) {
            return true;
        }
        let text = combined_text(title, description);
        contains_any(&text, &kw.cdp_related)
            || contains_any(&text, &kw.cdp_vendors)
            || contains_any(&text, &kw.data_tech)
    }

    async fn search(&self, query: &str) -> Result<Vec<Signal>> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("engine", "google_jobs"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .context("building serpapi url")?;

        let resp: JobsResponse = self.ctx.http.get_json(url.as_str()).await?;
        let mut out = Vec::new();
        for job in resp.jobs_results {
            if !self.is_relevant_job(&job.title, &job.description) {
                continue;
            }
            let category = self
                .ctx
                .classifier
                .classify(&format!("{} {}", job.title, job.description));
            let snippet = format!("{} at {} - {}", job.title, job.company_name, job.location);
            out.push(
                Signal::new("Indeed", job.job_link, snippet)
                    .raw(json!({
                        "title": job.title,
                        "company": job.company_name,
                        "location": job.location,
                        "description": truncate_chars(&job.description, DESCRIPTION_CHARS),
                        "query": query,
                    }))
                    .category(category),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl SignalSource for SerpApiJobsSource {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>> {
        let mut all = Vec::new();
        for (i, query) in self.queries(company).iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause()).await;
            }
            // One bad query shouldn't sink the rest.
            match self.search(query).await {
                Ok(mut hits) => all.append(&mut hits),
                Err(e) => tracing::warn!(error = %e, query = %query, "serpapi query failed"),
            }
        }

        let out = dedup_by_url(all);
        counter!("scan_source_signals_total", "source" => "indeed").increment(out.len() as u64);
        tracing::info!(company, count = out.len(), "serpapi job signals");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Indeed"
    }
}
