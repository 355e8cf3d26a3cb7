// src/sources/providers/google_cse.rs
//! News, press and product pages via the Google Custom Search JSON API.
//!
//! With an API key we run one query per vendor/concept/tech term plus a few executive
//! and funding queries, spaced `60 / rate_limit` seconds apart. If the quota runs out
//! mid-scan we fall back to a single combined query. With only a CSE id we scrape the
//! public CSE page instead (best effort; it is mostly script-rendered).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;

use crate::analyze::contains_any;
use crate::signal::{dedup_by_url, Signal};
use crate::sources::{combined_text, SignalSource, SourceContext};

pub const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";
pub const PUBLIC_CSE_URL: &str = "https://cse.google.com/cse";
const SCRAPE_PAUSE: Duration = Duration::from_secs(2);

const CUSTOMER_TERMS: &[&str] = &[
    "customer",
    "user",
    "experience",
    "journey",
    "personalization",
    "segment",
];
const EXEC_KEYWORDS: &[&str] = &[
    "appoint", "hire", "join", "name", "chief", "vp", "director", "head of",
];
const TARGET_DEPARTMENTS: &[&str] = &[
    "data",
    "analytics",
    "marketing",
    "digital",
    "customer experience",
    "technology",
];
const GROWTH_KEYWORDS: &[&str] = &[
    "funding",
    "series",
    "raised",
    "expansion",
    "launches",
    "growth",
];
const TECH_INDICATORS: &[&str] = &[
    "platform",
    "solution",
    "technology",
    "software",
    "data-driven",
    "analytics",
];
const STRONG_INDICATORS: &[&str] = &[
    "unified customer data",
    "customer 360",
    "single customer view",
    "first-party data strategy",
    "data activation",
    "personalization strategy",
];
const PERSONALIZATION_TERMS: &[&str] = &[
    "real-time personalization",
    "customer journey",
    "personalized experience",
];

#[derive(Debug, Default, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
    #[serde(default)]
    error: Option<CseError>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct CseError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

/// A search either yields hits or tells us the daily quota is gone.
#[derive(Debug)]
pub enum SearchOutcome {
    Hits(Vec<Signal>),
    QuotaExceeded(String),
}

/// How we talk to Google: the JSON API (key + cx) or the public page (cx only).
#[derive(Debug, Clone)]
pub enum CseAccess {
    Api { api_key: String, cse_id: String },
    PublicPage { cse_id: String },
}

pub struct GoogleCseSource {
    ctx: SourceContext,
    access: CseAccess,
    base_url: String,
}

impl GoogleCseSource {
    pub fn new(ctx: SourceContext, access: CseAccess) -> Self {
        let base_url = match access {
            CseAccess::Api { .. } => GOOGLE_CSE_URL,
            CseAccess::PublicPage { .. } => PUBLIC_CSE_URL,
        };
        Self {
            ctx,
            access,
            base_url: base_url.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn queries(&self, company: &str) -> Vec<String> {
        let kw = self.ctx.classifier.keywords();
        let mut out: Vec<String> = kw
            .cdp_vendors
            .iter()
            .chain(kw.cdp_related.iter())
            .chain(kw.data_tech.iter())
            .map(|term| format!("\"{company}\" \"{term}\""))
            .collect();
        out.push(format!(r#""{company}" "appoints" "chief" OR "vp" OR "director""#));
        out.push(format!(r#""{company}" "hires" "chief" OR "vp" OR "director""#));
        out.push(format!(r#""{company}" "funding" OR "series" OR "raised""#));
        out.push(format!(r#""{company}" "expansion" OR "launches" OR "growth""#));
        out
    }

    /// The one query we spend once the quota is exhausted.
    pub fn quota_fallback_query(&self, company: &str) -> String {
        let kw = self.ctx.classifier.keywords();
        let or_list = |terms: &[String]| {
            terms
                .iter()
                .take(3)
                .map(|t| format!("\"{t}\""))
                .collect::<Vec<_>>()
                .join(" OR ")
        };
        format!(
            "\"{company}\" ({}) OR ({})",
            or_list(&kw.cdp_vendors),
            or_list(&kw.cdp_related)
        )
    }

    fn pause(&self) -> Duration {
        self.ctx.config.api.google_cse.interval(Duration::from_secs(60))
    }

    /// Multi-rule relevance over title + snippet.
    pub fn is_relevant_result(&self, title: &str, snippet: &str) -> bool {
        let kw = self.ctx.classifier.keywords();
        let text = combined_text(title, snippet);

        contains_any(&text, &kw.cdp_vendors)
            || contains_any(&text, &kw.cdp_related)
            || (contains_any(&text, &kw.data_tech) && contains_any(&text, CUSTOMER_TERMS))
            || (contains_any(&text, EXEC_KEYWORDS) && contains_any(&text, TARGET_DEPARTMENTS))
            || (contains_any(&text, GROWTH_KEYWORDS) && contains_any(&text, TECH_INDICATORS))
            || contains_any(&text, STRONG_INDICATORS)
    }

    fn to_signal(
        &self,
        source: &str,
        title: String,
        snippet: String,
        link: String,
        extra: serde_json::Value,
    ) -> Signal {
        let category = self.ctx.classifier.classify(&format!("{title} {snippet}"));
        let mut raw = json!({ "title": title, "snippet": snippet });
        if let (Some(obj), serde_json::Value::Object(more)) = (raw.as_object_mut(), extra) {
            obj.extend(more);
        }
        Signal::new(source, link, format!("{title} - {snippet}"))
            .raw(raw)
            .category(category)
    }

    async fn search_api(&self, api_key: &str, cse_id: &str, query: &str) -> Result<SearchOutcome> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[("key", api_key), ("cx", cse_id), ("q", query)],
        )
        .context("building google cse url")?;

        let resp = self.ctx.http.send_with_retry(|| self.ctx.http.client().get(url.clone())).await?;
        let status = resp.status();
        let body: CseResponse = resp.json().await.unwrap_or_default();

        if let Some(err) = &body.error {
            if err.code == 429 || err.message.to_lowercase().contains("quota") {
                return Ok(SearchOutcome::QuotaExceeded(err.message.clone()));
            }
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(SearchOutcome::QuotaExceeded(status.to_string()));
        }
        if !status.is_success() {
            anyhow::bail!("google cse returned {status}");
        }

        let hits = body
            .items
            .into_iter()
            .filter(|it| self.is_relevant_result(&it.title, &it.snippet))
            .map(|it| {
                let extra = json!({ "query": query });
                self.to_signal("Google CSE", it.title, it.snippet, it.link, extra)
            })
            .collect();
        Ok(SearchOutcome::Hits(hits))
    }

    async fn gather_via_api(
        &self,
        company: &str,
        api_key: &str,
        cse_id: &str,
    ) -> Result<Vec<Signal>> {
        let mut all = Vec::new();
        for (i, query) in self.queries(company).iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause()).await;
            }
            match self.search_api(api_key, cse_id, query).await {
                Ok(SearchOutcome::Hits(mut hits)) => all.append(&mut hits),
                Ok(SearchOutcome::QuotaExceeded(msg)) => {
                    tracing::warn!(
                        company,
                        message = %msg,
                        "google cse quota exceeded, trying single fallback query"
                    );
                    counter!("scan_cse_quota_exhausted_total").increment(1);
                    let fallback = self.quota_fallback_query(company);
                    match self.search_api(api_key, cse_id, &fallback).await {
                        Ok(SearchOutcome::Hits(mut hits)) => all.append(&mut hits),
                        Ok(SearchOutcome::QuotaExceeded(_)) => {}
                        Err(e) => tracing::warn!(error = %e, "google cse fallback query failed"),
                    }
                    break;
                }
                Err(e) => tracing::warn!(error = %e, query = %query, "google cse query failed"),
            }
        }
        Ok(all)
    }

    /// Pull result blocks out of a rendered CSE page.
    pub fn parse_public_results(html: &str) -> Vec<(String, String, String)> {
        let doc = Html::parse_document(html);
        let (Ok(title_sel), Ok(snippet_sel), Ok(link_sel)) = (
            Selector::parse(".gs-title"),
            Selector::parse(".gs-snippet"),
            Selector::parse("a.gs-title"),
        ) else {
            return Vec::new();
        };

        let mut containers = Vec::new();
        for css in [".gsc-webResult .gsc-result", ".gs-result", ".gsc-result"] {
            if let Ok(sel) = Selector::parse(css) {
                containers = doc.select(&sel).collect();
            }
            if !containers.is_empty() {
                break;
            }
        }

        containers
            .into_iter()
            .filter_map(|el| {
                let title = el.select(&title_sel).next()?.text().collect::<String>();
                let link = el.select(&link_sel).next()?.value().attr("href")?.to_string();
                let snippet = el
                    .select(&snippet_sel)
                    .next()
                    .map(|s| s.text().collect::<String>())
                    .unwrap_or_default();
                let title = title.trim().to_string();
                if title.is_empty() || link.is_empty() {
                    return None;
                }
                Some((title, snippet.trim().to_string(), link))
            })
            .collect()
    }

    async fn gather_via_public_page(&self, company: &str, cse_id: &str) -> Result<Vec<Signal>> {
        let kw = self.ctx.classifier.keywords();
        let groups: [(&str, Vec<&str>); 4] = [
            ("CDP Vendors", kw.cdp_vendors.iter().take(8).map(String::as_str).collect()),
            ("CDP Concepts", kw.cdp_related.iter().take(8).map(String::as_str).collect()),
            ("Data Technologies", kw.data_tech.iter().take(5).map(String::as_str).collect()),
            ("Personalization", PERSONALIZATION_TERMS.to_vec()),
        ];

        let mut all = Vec::new();
        let mut first = true;
        for (group, terms) in groups {
            for term in terms {
                if !first {
                    tokio::time::sleep(SCRAPE_PAUSE).await;
                }
                first = false;

                let query = format!("{company} {term}");
                let params = [("cx", cse_id), ("q", query.as_str())];
                let url = Url::parse_with_params(&self.base_url, &params)
                    .context("building public cse url")?;
                let html = match self.ctx.http.get_text(url.as_str()).await {
                    Ok(h) => h,
                    Err(e) => {
                        tracing::warn!(error = %e, query = %query, "public cse fetch failed");
                        continue;
                    }
                };
                for (title, snippet, link) in Self::parse_public_results(&html) {
                    if self.is_relevant_result(&title, &snippet) {
                        all.push(self.to_signal(
                            "Google CSE (Fallback)",
                            title,
                            snippet,
                            link,
                            json!({ "keywords": format!("{term} (from {group})") }),
                        ));
                    }
                }
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl SignalSource for GoogleCseSource {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>> {
        let all = match &self.access {
            CseAccess::Api { api_key, cse_id } => {
                self.gather_via_api(company, api_key, cse_id).await?
            }
            CseAccess::PublicPage { cse_id } => {
                tracing::info!(company, "google cse without api key, scraping public page");
                self.gather_via_public_page(company, cse_id).await?
            }
        };
        let out = dedup_by_url(all);
        counter!("scan_source_signals_total", "source" => "google_cse").increment(out.len() as u64);
        tracing::info!(company, count = out.len(), "google cse signals");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Google CSE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use std::sync::Arc;

    fn source() -> GoogleCseSource {
        let ctx = SourceContext::new(Arc::new(ScannerConfig::default())).unwrap();
        GoogleCseSource::new(
            ctx,
            CseAccess::Api {
                api_key: "k".into(),
                cse_id: "cx".into(),
            },
        )
    }

    #[test]
    fn query_set_and_fallback() {
        let s = source();
        let q = s.queries("Acme");
        assert_eq!(q[0], r#""Acme" "segment""#);
        assert!(q.last().is_some_and(|l| l.contains("expansion")));
        assert_eq!(
            s.quota_fallback_query("Acme"),
            r#""Acme" ("segment" OR "mparticle" OR "rudderstack") OR ("customer data platform" OR "cdp" OR "data integration")"#
        );
    }

    #[test]
    fn relevance_rules() {
        let s = source();
        assert!(s.is_relevant_result("Acme picks mParticle", ""));
        assert!(s.is_relevant_result("Acme moves to Snowflake", "to improve customer insight"));
        assert!(!s.is_relevant_result("Acme moves to Snowflake", "to cut costs"));
        assert!(s.is_relevant_result("Acme appoints new Chief Marketing Officer", ""));
        assert!(s.is_relevant_result("Acme raised $20M", "for its software"));
        assert!(!s.is_relevant_result("Acme opens new office", "in Boston"));
    }

    #[test]
    fn pause_is_per_minute_and_tolerates_zero() {
        assert_eq!(source().pause(), Duration::from_secs(6));

        let mut cfg = ScannerConfig::default();
        cfg.api.google_cse.rate_limit = 0.0;
        let ctx = SourceContext::new(Arc::new(cfg)).unwrap();
        let access = CseAccess::PublicPage { cse_id: "cx".into() };
        assert_eq!(GoogleCseSource::new(ctx, access).pause(), Duration::from_secs(60));
    }

    #[test]
    fn parses_public_result_blocks() {
        let html = r#"
            <div class="gsc-webResult gsc-result">
              <a class="gs-title" href="https://news.test/acme-segment">Acme <b>Segment</b> rollout</a>
              <div class="gs-snippet">Acme standardizes on Segment.</div>
            </div>
            <div class="gsc-webResult gsc-result">
              <a class="gs-title">No link here</a>
            </div>"#;
        let rows = GoogleCseSource::parse_public_results(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "Acme Segment rollout");
        assert_eq!(rows[0].2, "https://news.test/acme-segment");
    }
}
