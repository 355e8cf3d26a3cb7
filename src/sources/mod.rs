// src/sources/mod.rs
//! Data-source connectors. Each one turns a company name into a list of raw
//! [`Signal`](crate::signal::Signal)s through the [`SignalSource`] trait; everything
//! scraping- or API-specific stays behind that one method.

pub mod http;
pub mod providers;
pub mod robots;
pub mod types;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Url;

use crate::analyze::{normalize_text, Classifier};
use crate::config::ScannerConfig;
use crate::sources::http::HttpFetcher;

pub use crate::sources::types::SignalSource;

/// Cap for snippets/descriptions pulled out of markup.
const MARKUP_CHAR_CAP: usize = 1500;

/// What every connector is built from: config, the shared classifier and an HTTP client.
#[derive(Clone)]
pub struct SourceContext {
    pub config: Arc<ScannerConfig>,
    pub classifier: Classifier,
    pub http: HttpFetcher,
}

impl SourceContext {
    pub fn new(config: Arc<ScannerConfig>) -> anyhow::Result<Self> {
        let http = HttpFetcher::from_config(&config.scraping)?;
        let classifier = Classifier::new(config.keywords.clone());
        Ok(Self {
            config,
            classifier,
            http,
        })
    }
}

/// Turn an HTML-ish fragment into plain text: decode entities, strip tags,
/// ASCII-fy typographic quotes, collapse whitespace, cap length.
pub fn clean_markup(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Length cap
    if out.chars().count() > MARKUP_CHAR_CAP {
        out = out.chars().take(MARKUP_CHAR_CAP).collect();
    }
    out
}

/// Truncate to `max` chars, appending "..." when something was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Strip legal suffixes and punctuation from a company name for searches and URLs.
pub fn clean_company_name(company: &str) -> String {
    static RE_SUFFIX: OnceCell<Regex> = OnceCell::new();
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re_suffix = RE_SUFFIX.get_or_init(|| {
        Regex::new(r"(?i)\b(?:inc|corp|llc|l\.l\.c|ltd|limited|corporation)\b")
            .expect("suffix regex")
    });
    let re_punct = RE_PUNCT.get_or_init(|| Regex::new(r#"[,.'"]"#).expect("punct regex"));

    let out = re_suffix.replace_all(company, "");
    let out = re_punct.replace_all(&out, "");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase slug with separators removed ("Acme Corp" → "acmecorp") and dashed
/// ("acme-corp").
pub fn company_slugs(company: &str) -> (String, String) {
    let base = company
        .replace([',', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (base.replace(' ', ""), base.replace(' ', "-"))
}

/// Host of a URL without a leading `www.`; `None` for anything that doesn't parse.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Keywords (as given) that occur in `text`, case-insensitively.
pub fn extract_keywords<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .map(AsRef::as_ref)
        .filter(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Resolve `href` against `base`; absolute links pass through.
pub fn join_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(String::from)
}

/// Guess homepages for a company: .com/.ai/.co/.io with and without `www.`, plus the
/// dashed .com variants. Duplicates removed, order kept.
pub fn candidate_websites(company: &str) -> Vec<String> {
    let (slug, dashed) = company_slugs(company);
    if slug.is_empty() {
        return Vec::new();
    }
    let mut urls = Vec::new();
    for tld in ["com", "ai", "co", "io"] {
        urls.push(format!("https://{slug}.{tld}"));
        urls.push(format!("https://www.{slug}.{tld}"));
    }
    urls.push(format!("https://{dashed}.com"));
    urls.push(format!("https://www.{dashed}.com"));
    dedup_preserving(urls)
}

/// True if `url`'s domain looks like it belongs to `company`.
pub fn is_likely_company_domain(url: &str, company: &str) -> bool {
    let Some(domain) = extract_domain(url) else {
        return false;
    };
    let domain = domain.to_lowercase();
    let (slug, _) = company_slugs(company);
    if slug.is_empty() {
        return false;
    }
    let first_label = domain.split('.').next().unwrap_or_default();
    domain.contains(&slug) || (!first_label.is_empty() && slug.contains(first_label))
}

pub(crate) fn dedup_preserving(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Normalize `title` and `body` separately and join them, the shape relevance checks use.
pub(crate) fn combined_text(title: &str, body: &str) -> String {
    format!("{} {}", normalize_text(title), normalize_text(body))
}

/// Paragraphs (>= 20 chars) that mention any of `terms`, at most `limit`.
pub fn relevant_paragraphs<S: AsRef<str>>(
    paragraphs: &[String],
    terms: &[S],
    limit: usize,
) -> Vec<String> {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| p.chars().count() >= 20)
        .filter(|p| crate::analyze::contains_any(&normalize_text(p), terms))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// First three paragraphs joined by " ... ", capped at 800 chars.
pub fn document_snippet(paragraphs: &[String]) -> String {
    let joined = paragraphs
        .iter()
        .take(3)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ... ");
    if joined.chars().count() > 800 {
        let mut out: String = joined.chars().take(797).collect();
        out.push_str("...");
        out
    } else {
        joined
    }
}
