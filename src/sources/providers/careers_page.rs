// src/sources/providers/careers_page.rs
//! Company careers pages. Guess the homepage, find the careers page (common paths,
//! then homepage links), honour robots.txt, and pull job-looking entries out of the
//! HTML. When a site yields nothing, fall back to job URLs listed in its sitemap.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::json;

use crate::analyze::{contains_any, normalize_text};
use crate::signal::{dedup_by_url, Signal};
use crate::sources::providers::google_cse::GOOGLE_CSE_URL;
use crate::sources::robots::RobotsCache;
use crate::sources::{
    candidate_websites, clean_company_name, combined_text, dedup_preserving,
    is_likely_company_domain, join_url, truncate_chars, SignalSource, SourceContext,
};

pub const CAREERS_PATHS: &[&str] = &[
    "/careers",
    "/jobs",
    "/work-with-us",
    "/join-us",
    "/join-our-team",
    "/about/careers",
    "/about/jobs",
    "/company/careers",
    "/company/jobs",
    "/en/careers",
    "/en/jobs",
];
const CAREERS_LINK_WORDS: &[&str] = &["career", "job", "join", "work with us", "position"];
const JOB_CLASS_WORDS: &[&str] = &["job", "position", "opening", "vacancy", "career"];
const SITEMAP_JOB_WORDS: &[&str] = &["career", "job", "position", "opening", "vacancy"];
const JOB_TITLE_WORDS: &[&str] = &[
    "manager", "director", "engineer", "developer", "specialist", "analyst", "coordinator",
    "lead", "head", "chief", "vp", "president", "officer", "cto", "ceo", "cmo", "cio",
    "marketing", "data", "product", "senior", "junior", "associate", "principal", "staff",
    "intern",
];
const DATA_ROLES: &[&str] = &[
    "data",
    "analytics",
    "customer insights",
    "audience",
    "segmentation",
];
const CUSTOMER_TERMS: &[&str] = &[
    "customer",
    "user",
    "audience",
    "segment",
    "profile",
    "personalization",
];
const SPECIALIST_FOCUS: &[&str] = &["growth", "marketing", "customer"];

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
const SITEMAP_URL_LIMIT: usize = 20;
const DESCRIPTION_CHARS: usize = 300;

/// A job-looking entry on a careers page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListing {
    pub title: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
struct SitemapDoc {
    #[serde(default)]
    url: Vec<Loc>,
    #[serde(default)]
    sitemap: Vec<Loc>,
}

#[derive(Debug, Deserialize)]
struct Loc {
    loc: String,
}

/// Page URLs and nested sitemap URLs from a `<urlset>` or `<sitemapindex>` document.
pub fn parse_sitemap(xml: &str) -> (Vec<String>, Vec<String>) {
    match quick_xml::de::from_str::<SitemapDoc>(xml) {
        Ok(doc) => (
            doc.url.into_iter().map(|l| l.loc.trim().to_string()).collect(),
            doc.sitemap.into_iter().map(|l| l.loc.trim().to_string()).collect(),
        ),
        Err(e) => {
            tracing::debug!(error = %e, "unparsable sitemap");
            (Vec::new(), Vec::new())
        }
    }
}

pub fn is_likely_job_title(text: &str) -> bool {
    contains_any(&normalize_text(text), JOB_TITLE_WORDS)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn link_of(el: ElementRef<'_>, a_sel: &Selector) -> Option<String> {
    let own = (el.value().name() == "a").then_some(el);
    let parent = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|p| p.value().name() == "a");
    own.or(parent)
        .or_else(|| el.select(a_sel).next())
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

fn first_href(el: ElementRef<'_>, a_sel: &Selector) -> Option<String> {
    el.select(a_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// First `<p>` after `el` among its following siblings (or inside them).
fn following_paragraph(el: ElementRef<'_>, p_sel: &Selector) -> Option<String> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find_map(|sib| {
            if sib.value().name() == "p" {
                Some(sib)
            } else {
                sib.select(p_sel).next()
            }
        })
        .map(element_text)
}

/// Job-looking entries from headings, list items and job-ish classed elements.
/// Links resolve against `page_url`; entries without a link point at the page itself.
pub fn extract_job_listings(html: &str, page_url: &str) -> Vec<JobListing> {
    let doc = Html::parse_document(html);
    let (Some(headings), Some(li), Some(classed), Some(a_sel), Some(p_sel)) = (
        selector("h1, h2, h3, h4, h5"),
        selector("li"),
        selector("[class]"),
        selector("a[href]"),
        selector("p"),
    ) else {
        return Vec::new();
    };
    let resolve = |href: Option<String>| {
        href.and_then(|h| join_url(page_url, &h))
            .unwrap_or_else(|| page_url.to_string())
    };

    let mut out = Vec::new();

    for h in doc.select(&headings) {
        let title = element_text(h);
        if !is_likely_job_title(&title) {
            continue;
        }
        out.push(JobListing {
            url: resolve(link_of(h, &a_sel)),
            description: following_paragraph(h, &p_sel).unwrap_or_default(),
            title,
        });
    }

    for item in doc.select(&li) {
        let title = element_text(item);
        if !is_likely_job_title(&title) {
            continue;
        }
        out.push(JobListing {
            url: resolve(first_href(item, &a_sel)),
            description: String::new(),
            title,
        });
    }

    for el in doc.select(&classed) {
        let class = el.value().attr("class").unwrap_or_default().to_lowercase();
        if !JOB_CLASS_WORDS.iter().any(|w| class.contains(w)) {
            continue;
        }
        let title_el = el.select(&headings).next().unwrap_or(el);
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }
        out.push(JobListing {
            url: resolve(first_href(el, &a_sel)),
            description: el.select(&p_sel).next().map(element_text).unwrap_or_default(),
            title,
        });
    }

    // An entry that fell back to the page URL loses to a linked entry with the same title.
    let linked: HashSet<String> = out
        .iter()
        .filter(|j| j.url != page_url)
        .map(|j| j.title.clone())
        .collect();
    out.retain(|j| j.url != page_url || !linked.contains(&j.title));

    let mut seen = HashSet::new();
    out.retain(|j| seen.insert((j.title.clone(), j.url.clone())));
    out
}

/// `href`s of homepage links whose text mentions careers/jobs.
pub fn careers_links(html: &str, page_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(a_sel) = selector("a[href]") else {
        return Vec::new();
    };
    doc.select(&a_sel)
        .filter(|a| {
            let text = element_text(*a).to_lowercase();
            CAREERS_LINK_WORDS.iter().any(|w| text.contains(w))
        })
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| join_url(page_url, href))
        .collect()
}

/// `<title>` and meta description of a page.
pub fn page_title_and_description(html: &str) -> (String, String) {
    let doc = Html::parse_document(html);
    let title = selector("title")
        .and_then(|s| doc.select(&s).next().map(element_text))
        .unwrap_or_default();
    let description = selector(r#"meta[name="description"]"#)
        .and_then(|s| doc.select(&s).next())
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    (title, description)
}

#[derive(Debug, Deserialize)]
struct SearchItems {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: String,
}

pub struct CareersPageSource {
    ctx: SourceContext,
    robots: RobotsCache,
    /// (api_key, cse_id) for "official website" lookups.
    website_search: Option<(String, String)>,
    websites_override: Option<Vec<String>>,
}

impl CareersPageSource {
    pub fn new(ctx: SourceContext) -> Self {
        let robots = RobotsCache::new(ctx.http.clone());
        Self {
            ctx,
            robots,
            website_search: None,
            websites_override: None,
        }
    }

    pub fn with_website_search(mut self, api_key: String, cse_id: String) -> Self {
        self.website_search = Some((api_key, cse_id));
        self
    }

    /// Skip homepage guessing and scan exactly these sites.
    pub fn with_websites(mut self, sites: Vec<String>) -> Self {
        self.websites_override = Some(sites);
        self
    }

    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    /// Carries the same relevance rules job boards use, plus two data-role heuristics.
    pub fn is_relevant_job(&self, title: &str, description: &str) -> bool {
        let kw = self.ctx.classifier.keywords();
        let clean_title = normalize_text(title);
        let clean_desc = normalize_text(description);

        if contains_any(&clean_title, &kw.target_personas) {
            return true;
        }
        if (clean_title.contains("analytics engineer") || clean_title.contains("data scientist"))
            && (contains_any(&clean_title, SPECIALIST_FOCUS)
                || contains_any(&clean_desc, SPECIALIST_FOCUS))
        {
            return true;
        }
        if contains_any(&clean_title, DATA_ROLES) && contains_any(&clean_desc, CUSTOMER_TERMS) {
            return true;
        }
        let text = combined_text(title, description);
        contains_any(&text, &kw.cdp_related)
            || contains_any(&text, &kw.cdp_vendors)
            || contains_any(&text, &kw.data_tech)
    }

    async fn company_websites(&self, company: &str) -> Vec<String> {
        if let Some(sites) = &self.websites_override {
            return sites.clone();
        }
        let mut urls = candidate_websites(company);
        if let Some((key, cx)) = &self.website_search {
            let query = format!("{} official website", clean_company_name(company));
            let params = [
                ("key", key.as_str()),
                ("cx", cx.as_str()),
                ("q", query.as_str()),
            ];
            let found = match Url::parse_with_params(GOOGLE_CSE_URL, &params) {
                Ok(url) => self.ctx.http.get_json::<SearchItems>(url.as_str()).await,
                Err(e) => Err(e.into()),
            };
            match found {
                Ok(res) => {
                    let hits: Vec<String> = res
                        .items
                        .into_iter()
                        .map(|i| i.link)
                        .filter(|l| is_likely_company_domain(l, company))
                        .collect();
                    urls = hits.into_iter().chain(urls).collect();
                }
                Err(e) => tracing::warn!(error = %e, company, "website lookup failed"),
            }
        }
        dedup_preserving(urls)
    }

    async fn find_careers_page(&self, site: &str) -> Option<String> {
        for path in CAREERS_PATHS {
            let Some(url) = join_url(site, path) else {
                continue;
            };
            if self.ctx.http.head_ok(&url, CHECK_TIMEOUT).await {
                return Some(url);
            }
        }

        let resp = self.ctx.http.try_get(site, PAGE_TIMEOUT).await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let html = resp.text().await.ok()?;
        careers_links(&html, site).into_iter().next()
    }

    /// One signal per job URL; the first relevant listing for a URL wins.
    fn listing_signals(&self, company: &str, listings: Vec<JobListing>) -> Vec<Signal> {
        let signals = listings
            .into_iter()
            .filter(|j| self.is_relevant_job(&j.title, &j.description))
            .map(|j| {
                let category = self
                    .ctx
                    .classifier
                    .classify(&format!("{} {}", j.title, j.description));
                Signal::new(
                    "Company Careers Page",
                    j.url,
                    format!("{} - {company} Careers", j.title),
                )
                .raw(json!({
                    "title": j.title,
                    "description": truncate_chars(&j.description, DESCRIPTION_CHARS),
                }))
                .category(category)
            })
            .collect();
        dedup_by_url(signals)
    }

    async fn fetch_ok_text(&self, url: &str) -> Option<String> {
        let resp = self.ctx.http.try_get(url, PAGE_TIMEOUT).await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }

    async fn scan_sitemap(&self, site: &str) -> Vec<Signal> {
        let mut body = None;
        for path in ["/sitemap.xml", "/sitemap_index.xml"] {
            if let Some(url) = join_url(site, path) {
                body = self.fetch_ok_text(&url).await;
            }
            if body.is_some() {
                break;
            }
        }
        let Some(body) = body else {
            return Vec::new();
        };

        let (mut pages, nested) = parse_sitemap(&body);
        for sub in nested {
            if let Some(xml) = self.fetch_ok_text(&sub).await {
                pages.extend(parse_sitemap(&xml).0);
            }
        }

        let job_urls = pages
            .into_iter()
            .filter(|u| {
                let lower = u.to_lowercase();
                SITEMAP_JOB_WORDS.iter().any(|w| lower.contains(w))
            })
            .take(SITEMAP_URL_LIMIT);

        let mut out = Vec::new();
        for url in job_urls {
            if !self.robots.allowed(&url).await {
                continue;
            }
            let Some(html) = self.fetch_ok_text(&url).await else {
                continue;
            };
            let (title, description) = page_title_and_description(&html);
            if !self.is_relevant_job(&title, &description) {
                continue;
            }
            let category = self.ctx.classifier.classify(&format!("{title} {description}"));
            out.push(
                Signal::new("Company Sitemap", url, title.clone())
                    .raw(json!({ "title": title, "description": description }))
                    .category(category),
            );
        }
        dedup_by_url(out)
    }

    async fn scan_site(&self, company: &str, site: &str) -> Result<Vec<Signal>> {
        if let Some(careers) = self.find_careers_page(site).await {
            if self.robots.allowed(&careers).await {
                tracing::info!(company, url = %careers, "scraping careers page");
                let html = self.ctx.http.get_text(&careers).await?;
                let signals = self.listing_signals(company, extract_job_listings(&html, &careers));
                if !signals.is_empty() {
                    return Ok(signals);
                }
            } else {
                // A site that turns us away from its careers page is skipped entirely.
                tracing::info!(url = %careers, "robots.txt disallows careers page, skipping site");
                return Ok(Vec::new());
            }
        }
        Ok(self.scan_sitemap(site).await)
    }
}

#[async_trait]
impl SignalSource for CareersPageSource {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>> {
        let sites = self.company_websites(company).await;
        if sites.is_empty() {
            tracing::info!(company, "no website candidates, skipping careers page scan");
            return Ok(Vec::new());
        }

        for site in &sites {
            match self.scan_site(company, site).await {
                Ok(signals) if !signals.is_empty() => {
                    counter!("scan_source_signals_total", "source" => "careers_page")
                        .increment(signals.len() as u64);
                    tracing::info!(company, site = %site, count = signals.len(), "careers signals");
                    return Ok(signals);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    error = %e,
                    site = %site,
                    company,
                    "careers scan failed for site"
                ),
            }
        }
        tracing::info!(company, "no careers signals found");
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "Company Careers Page"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use std::sync::Arc;

    fn source() -> CareersPageSource {
        let ctx = SourceContext::new(Arc::new(ScannerConfig::default())).unwrap();
        CareersPageSource::new(ctx)
    }

    const PAGE: &str = r#"
      <html><body>
        <h1>Join our team</h1>
        <section>
          <h3><a href="/jobs/42">Director, Data Platform</a></h3>
          <p>Own our customer data platform roadmap.</p>
        </section>
        <ul>
          <li><a href="https://jobs.example.test/7">Senior Barista</a></li>
          <li>Free snacks</li>
        </ul>
        <div class="job-card">
          <h4>Analytics Engineer, Growth</h4>
          <a href="/jobs/99">Apply</a>
          <p>Build dbt models.</p>
        </div>
      </body></html>"#;

    #[test]
    fn extracts_listings_from_headings_lists_and_classes() {
        let jobs = extract_job_listings(PAGE, "https://acme.test/careers");
        let director = jobs
            .iter()
            .find(|j| j.title == "Director, Data Platform")
            .unwrap();
        assert_eq!(director.url, "https://acme.test/jobs/42");
        assert_eq!(director.description, "Own our customer data platform roadmap.");

        assert!(jobs
            .iter()
            .any(|j| j.title == "Senior Barista" && j.url == "https://jobs.example.test/7"));
        assert!(!jobs.iter().any(|j| j.title == "Free snacks"));

        let card = jobs
            .iter()
            .find(|j| j.title == "Analytics Engineer, Growth")
            .unwrap();
        assert_eq!(card.description, "Build dbt models.");
    }

    #[test]
    fn relevance_filters_listings() {
        let s = source();
        assert!(s.is_relevant_job("Director, Data Platform", ""));
        assert!(s.is_relevant_job("Analytics Engineer, Growth", ""));
        assert!(s.is_relevant_job("Data Analyst", "Build audience segments"));
        assert!(s.is_relevant_job("Engineer", "Experience with Snowflake"));
        assert!(!s.is_relevant_job("Senior Barista", "Espresso"));

        let signals = s.listing_signals(
            "Acme",
            extract_job_listings(PAGE, "https://acme.test/careers"),
        );
        assert!(signals.iter().all(|sig| sig.source == "Company Careers Page"));
        assert!(signals
            .iter()
            .any(|sig| sig.snippet == "Director, Data Platform - Acme Careers"));
        assert!(!signals.iter().any(|sig| sig.snippet.contains("Barista")));
    }

    #[test]
    fn one_signal_per_job_url() {
        let jobs = extract_job_listings(PAGE, "https://acme.test/careers");
        let cards: Vec<&JobListing> = jobs
            .iter()
            .filter(|j| j.title == "Analytics Engineer, Growth")
            .collect();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].url, "https://acme.test/jobs/99");

        // Heading and list item describe the same posting with different text.
        let nested = r#"
          <ul>
            <li><h3><a href="/jobs/5">VP Marketing</a></h3><span>Remote</span></li>
          </ul>"#;
        let listings = extract_job_listings(nested, "https://acme.test/careers");
        assert_eq!(listings.len(), 2);

        let signals = source().listing_signals("Acme", listings);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source_url, "https://acme.test/jobs/5");
        assert_eq!(signals[0].snippet, "VP Marketing - Acme Careers");

        let all = source().listing_signals("Acme", jobs);
        let mut urls: Vec<&str> = all.iter().map(|s| s.source_url.as_str()).collect();
        let total = urls.len();
        urls.sort_unstable();
        urls.dedup();
        assert_eq!(urls.len(), total);
    }

    #[test]
    fn careers_link_discovery() {
        let html = r#"<a href="/about">About</a><a href="/work">Work with us</a>"#;
        assert_eq!(
            careers_links(html, "https://acme.test"),
            vec!["https://acme.test/work".to_string()]
        );
    }

    #[test]
    fn sitemap_urlset_and_index() {
        let urlset = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://acme.test/careers/data-lead</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://acme.test/blog </loc></url>
</urlset>"#;
        let (pages, nested) = parse_sitemap(urlset);
        assert_eq!(pages, vec!["https://acme.test/careers/data-lead", "https://acme.test/blog"]);
        assert!(nested.is_empty());

        let index = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://acme.test/sitemap-jobs.xml</loc></sitemap>
</sitemapindex>"#;
        let (pages, nested) = parse_sitemap(index);
        assert!(pages.is_empty());
        assert_eq!(nested, vec!["https://acme.test/sitemap-jobs.xml"]);

        assert_eq!(parse_sitemap("not xml at all <"), (vec![], vec![]));
    }

    #[test]
    fn title_and_meta_description() {
        let html = r#"<html><head><title> Data Lead | Acme </title>
            <meta name="description" content="Lead our Segment rollout"></head></html>"#;
        let (t, d) = page_title_and_description(html);
        assert_eq!(t, "Data Lead | Acme");
        assert_eq!(d, "Lead our Segment rollout");
    }
}
