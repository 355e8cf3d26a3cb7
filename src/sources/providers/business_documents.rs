// src/sources/providers/business_documents.rs
//! Filings, investor-relations material, company news and public analyst commentary.
//! The four sub-scans run concurrently; a failing one is logged and the others still
//! contribute. Every document is reduced to the paragraphs that mention a CDP term.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use metrics::counter;
use reqwest::header::USER_AGENT;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;

use crate::signal::{dedup_by_url, Signal};
use crate::sources::providers::google_cse::{GoogleCseSource, PUBLIC_CSE_URL};
use crate::sources::{
    company_slugs, document_snippet, join_url, relevant_paragraphs, SignalSource, SourceContext,
};

pub const EDGAR_SEARCH_URL: &str = "https://www.sec.gov/cgi-bin/browse-edgar";
const SEC_BASE: &str = "https://www.sec.gov";
/// EDGAR rejects anonymous clients; it wants a contact in the UA.
const SEC_USER_AGENT: &str = "CDPSignalScanner research.tool@example.com";
const FILING_TYPES: &[&str] = &["10-K", "10-Q", "8-K", "S-1"];

pub const IR_PATHS: &[&str] = &[
    "/investor-relations",
    "/investors",
    "/investor",
    "/ir",
    "/financials",
    "/annual-reports",
    "/quarterly-results",
    "/financial-information",
    "/about/investors",
    "/about/investor-relations",
];
pub const NEWS_PATHS: &[&str] = &[
    "/news",
    "/press",
    "/press-releases",
    "/newsroom",
    "/press-room",
    "/media",
    "/media-center",
    "/about/news",
    "/about/press",
    "/corporate/news",
];
const IR_DOC_WORDS: &[&str] = &[
    "annual report",
    "annual-report",
    "10-k",
    "10k",
    "investor presentation",
    "investor-presentation",
    "earnings",
    "financial results",
    "quarterly report",
    "investor day",
    "shareholder",
];
const DOC_EXTENSIONS: &[&str] = &[".pdf", ".ppt", ".pptx", ".doc", ".docx"];
const ANALYST_WORDS: &[&str] = &["analyst", "research", "report", "perspective", "opinion"];

const POLITE_PAUSE: Duration = Duration::from_secs(1);
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PARAGRAPHS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filing {
    pub filing_type: String,
    pub date: String,
    pub index_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Pdf,
    Presentation,
    Document,
}

impl DocKind {
    fn from_href(href: &str) -> Self {
        let lower = href.to_lowercase();
        if lower.contains(".pdf") {
            DocKind::Pdf
        } else if lower.contains(".ppt") {
            DocKind::Presentation
        } else {
            DocKind::Document
        }
    }

    fn label(self) -> &'static str {
        match self {
            DocKind::Pdf => "PDF",
            DocKind::Presentation => "Presentation",
            DocKind::Document => "Document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrDocument {
    pub url: String,
    pub title: String,
    pub kind: DocKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsArticle {
    pub url: String,
    pub title: String,
    pub date: String,
}

fn sel(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recent filings of interest from an EDGAR company search page, newest first as listed.
pub fn parse_edgar_filings(
    html: &str,
    today: NaiveDate,
    max_age_days: i64,
    max_docs: usize,
) -> Vec<Filing> {
    let doc = Html::parse_document(html);
    let (Some(rows), Some(cells), Some(button)) = (
        sel(".tableFile2 tr"),
        sel("td"),
        sel("a[id^='documentsbutton']"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for row in doc.select(&rows) {
        let tds: Vec<ElementRef<'_>> = row.select(&cells).collect();
        if tds.len() < 4 {
            continue;
        }
        let filing_type = text_of(tds[0]);
        if !FILING_TYPES.contains(&filing_type.as_str()) {
            continue;
        }
        let date = text_of(tds[3]);
        let Ok(parsed) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
            continue;
        };
        if (today - parsed).num_days() > max_age_days {
            continue;
        }
        let Some(href) = row.select(&button).next().and_then(|a| a.value().attr("href")) else {
            continue;
        };
        let Some(index_url) = join_url(SEC_BASE, href) else {
            continue;
        };
        out.push(Filing {
            filing_type,
            date,
            index_url,
        });
        if out.len() >= max_docs {
            break;
        }
    }
    out
}

/// Primary HTML document of a filing index page (skips XBRL `_def` files).
pub fn filing_document_link(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let links = sel("table.tableFile a[href]")?;
    doc.select(&links)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| {
            let lower = href.to_lowercase();
            lower.contains(".htm") && !lower.contains("_def")
        })
        .and_then(|href| join_url(SEC_BASE, href))
}

/// Paragraph-ish text blocks of a page: `<p>`/`<li>` text, or the raw text split on
/// newlines when the page has neither.
pub fn document_paragraphs(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let blocks: Vec<String> = sel("p, li")
        .map(|s| doc.select(&s).map(text_of).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();
    if !blocks.is_empty() {
        return blocks;
    }
    doc.root_element()
        .text()
        .collect::<String>()
        .split('\n')
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect()
}

/// Report/presentation links on an investor-relations page.
pub fn investor_document_links(html: &str, page_url: &str, max: usize) -> Vec<IrDocument> {
    let doc = Html::parse_document(html);
    let Some(a_sel) = sel("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    doc.select(&a_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }
            let text = text_of(a).to_lowercase();
            let href_lower = href.to_lowercase();
            let is_doc_link = IR_DOC_WORDS
                .iter()
                .any(|w| text.contains(w) || href_lower.contains(w));
            let is_doc_format = DOC_EXTENSIONS.iter().any(|e| href_lower.contains(e));
            if !(is_doc_link || is_doc_format) {
                return None;
            }
            let url = join_url(page_url, href)?;
            if !seen.insert(url.clone()) {
                return None;
            }
            Some(IrDocument {
                url,
                title: if text.is_empty() { "Document".to_string() } else { text },
                kind: DocKind::from_href(href),
            })
        })
        .take(max)
        .collect()
}

/// Article links on a news/press page: structured containers first, then any link
/// whose path has a news-ish segment and a real title.
pub fn news_article_links(html: &str, page_url: &str, max: usize) -> Vec<NewsArticle> {
    let doc = Html::parse_document(html);
    let (Some(a_sel), Some(heading), Some(date_sel)) = (
        sel("a[href]"),
        sel("h2, h3"),
        sel(".date, .time, [class*=date], [class*=time], time"),
    ) else {
        return Vec::new();
    };

    let mut containers = Vec::new();
    for css in [
        ".news-item, .press-release, .article, article, .news-article",
        "[class*=news], [class*=article], [class*=press]",
        ".post, .entry, .media-item",
    ] {
        if let Some(s) = sel(css) {
            containers = doc.select(&s).collect::<Vec<_>>();
        }
        if !containers.is_empty() {
            break;
        }
    }

    let mut out: Vec<NewsArticle> = Vec::new();
    let mut seen = HashSet::new();
    if !containers.is_empty() {
        for c in containers {
            if out.len() >= max {
                break;
            }
            let Some(link) = c.select(&a_sel).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|h| join_url(page_url, h)) else {
                continue;
            };
            let mut title = text_of(link);
            if title.is_empty() {
                title = c.select(&heading).next().map(text_of).unwrap_or_default();
            }
            if !seen.insert(url.clone()) {
                continue;
            }
            let date = c.select(&date_sel).next().map(text_of).unwrap_or_default();
            out.push(NewsArticle { url, title, date });
        }
    } else {
        for a in doc.select(&a_sel) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let newsy = href
                .split('/')
                .any(|part| matches!(part, "news" | "press" | "release" | "article"));
            let title = text_of(a);
            if !newsy || title.chars().count() <= 10 {
                continue;
            }
            if let Some(url) = join_url(page_url, href).filter(|u| seen.insert(u.clone())) {
                out.push(NewsArticle {
                    url,
                    title,
                    date: String::new(),
                });
            }
        }
    }
    out.truncate(max);
    out
}

pub struct BusinessDocumentsSource {
    ctx: SourceContext,
    cse_id: Option<String>,
    edgar_url: String,
}

impl BusinessDocumentsSource {
    pub fn new(ctx: SourceContext) -> Self {
        Self {
            ctx,
            cse_id: None,
            edgar_url: EDGAR_SEARCH_URL.to_string(),
        }
    }

    /// Enables the analyst-commentary sub-scan (public CSE page).
    pub fn with_cse_id(mut self, cse_id: String) -> Self {
        self.cse_id = Some(cse_id);
        self
    }

    fn max_docs(&self) -> usize {
        self.ctx.config.documents.max_docs_per_source
    }

    fn cdp_paragraphs(&self, html: &str) -> Vec<String> {
        let terms = self.ctx.classifier.keywords().cdp_terms();
        relevant_paragraphs(&document_paragraphs(html), &terms, MAX_PARAGRAPHS)
    }

    async fn sec_get(&self, url: &str) -> Result<String> {
        let resp = self
            .ctx
            .http
            .send_with_retry(|| self.ctx.http.client().get(url).header(USER_AGENT, SEC_USER_AGENT))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        resp.text().await.with_context(|| format!("reading {url}"))
    }

    async fn find_company_website(&self, company: &str) -> Option<String> {
        let (slug, dashed) = company_slugs(company);
        if slug.is_empty() {
            return None;
        }
        let candidates = [
            format!("https://{slug}.com"),
            format!("https://www.{slug}.com"),
            format!("https://{dashed}.com"),
            format!("https://www.{dashed}.com"),
        ];
        for url in candidates {
            if self.ctx.http.head_ok(&url, CHECK_TIMEOUT).await {
                return Some(url);
            }
        }
        None
    }

    async fn first_live_path(&self, site: &str, paths: &[&str]) -> Option<String> {
        for path in paths {
            let Some(url) = join_url(site, path) else {
                continue;
            };
            if self.ctx.http.head_ok(&url, CHECK_TIMEOUT).await {
                return Some(url);
            }
        }
        None
    }

    async fn gather_sec_filings(&self, company: &str) -> Result<Vec<Signal>> {
        let search = Url::parse_with_params(
            &self.edgar_url,
            &[("company", company), ("owner", "exclude"), ("action", "getcompany")],
        )
        .context("building edgar url")?;
        let html = self.sec_get(search.as_str()).await?;
        let filings = parse_edgar_filings(
            &html,
            Utc::now().date_naive(),
            self.ctx.config.documents.max_age_days,
            self.max_docs(),
        );
        if filings.is_empty() {
            tracing::info!(company, "no recent sec filings");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (i, filing) in filings.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(POLITE_PAUSE).await;
            }
            let doc_url = match self.sec_get(&filing.index_url).await {
                Ok(index) => filing_document_link(&index),
                Err(e) => {
                    tracing::warn!(error = %e, url = %filing.index_url, "sec filing index failed");
                    continue;
                }
            };
            let Some(doc_url) = doc_url else {
                continue;
            };
            let body = match self.sec_get(&doc_url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, url = %doc_url, "sec filing document failed");
                    continue;
                }
            };
            let paragraphs = self.cdp_paragraphs(&body);
            if paragraphs.is_empty() {
                continue;
            }
            out.push(
                Signal::new(
                    format!("SEC Filing ({})", filing.filing_type),
                    doc_url,
                    document_snippet(&paragraphs),
                )
                .raw(json!({
                    "filing_type": filing.filing_type,
                    "filing_date": filing.date,
                    "relevant_paragraphs": paragraphs,
                })),
            );
        }
        Ok(out)
    }

    async fn gather_investor_relations(&self, company: &str) -> Result<Vec<Signal>> {
        let Some(site) = self.find_company_website(company).await else {
            tracing::info!(company, "no website found, skipping investor relations");
            return Ok(Vec::new());
        };
        let Some(ir_url) = self.first_live_path(&site, IR_PATHS).await else {
            tracing::info!(company, "no investor relations page");
            return Ok(Vec::new());
        };

        let html = self.ctx.http.get_text(&ir_url).await?;
        let terms = self.ctx.classifier.keywords().cdp_terms();
        let mut out = Vec::new();
        for (i, doc) in investor_document_links(&html, &ir_url, self.max_docs())
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                tokio::time::sleep(POLITE_PAUSE).await;
            }
            match doc.kind {
                DocKind::Pdf | DocKind::Presentation => {
                    // Binary formats: only the link title is searchable.
                    let title = doc.title.to_lowercase();
                    if !terms.iter().any(|t| title.contains(t)) {
                        continue;
                    }
                    let label = doc.kind.label();
                    out.push(
                        Signal::new(
                            format!("Investor {label}"),
                            doc.url,
                            format!(
                                "Document Title: {} - This {} may contain CDP-related information but requires manual review",
                                doc.title,
                                label.to_lowercase()
                            ),
                        )
                        .raw(json!({ "document_type": label, "document_title": doc.title })),
                    );
                }
                DocKind::Document => {
                    let body = match self.ctx.http.get_text(&doc.url).await {
                        Ok(b) => b,
                        Err(e) => {
                            tracing::warn!(error = %e, url = %doc.url, "investor document failed");
                            continue;
                        }
                    };
                    let paragraphs = self.cdp_paragraphs(&body);
                    if paragraphs.is_empty() {
                        continue;
                    }
                    out.push(
                        Signal::new(
                            format!("Investor Document ({})", doc.title),
                            doc.url,
                            document_snippet(&paragraphs),
                        )
                        .raw(json!({
                            "document_title": doc.title,
                            "relevant_paragraphs": paragraphs,
                        })),
                    );
                }
            }
        }
        Ok(out)
    }

    async fn gather_recent_news(&self, company: &str) -> Result<Vec<Signal>> {
        let Some(site) = self.find_company_website(company).await else {
            tracing::info!(company, "no website found, skipping news");
            return Ok(Vec::new());
        };
        let Some(news_url) = self.first_live_path(&site, NEWS_PATHS).await else {
            return Ok(Vec::new());
        };

        let html = self.ctx.http.get_text(&news_url).await?;
        let mut out = Vec::new();
        for (i, article) in news_article_links(&html, &news_url, self.max_docs())
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                tokio::time::sleep(POLITE_PAUSE).await;
            }
            let body = match self.ctx.http.get_text(&article.url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, url = %article.url, "news article failed");
                    continue;
                }
            };
            let paragraphs = self.cdp_paragraphs(&body);
            if paragraphs.is_empty() {
                continue;
            }
            let source = if article.date.is_empty() {
                "Company News".to_string()
            } else {
                format!("Company News ({})", article.date)
            };
            out.push(
                Signal::new(
                    source,
                    article.url,
                    format!("{}: {}", article.title, document_snippet(&paragraphs)),
                )
                .raw(json!({
                    "article_title": article.title,
                    "article_date": article.date,
                    "relevant_paragraphs": paragraphs,
                })),
            );
        }
        Ok(out)
    }

    async fn gather_analyst_reports(&self, company: &str) -> Result<Vec<Signal>> {
        let Some(cse_id) = &self.cse_id else {
            return Ok(Vec::new());
        };
        let related = self
            .ctx
            .classifier
            .keywords()
            .cdp_related
            .iter()
            .take(5)
            .map(|k| format!("\"{k}\""))
            .collect::<Vec<_>>()
            .join(" OR ");
        let query = format!("{company} ({related}) analyst report OR research");
        let params = [("cx", cse_id.as_str()), ("q", query.as_str())];
        let url = Url::parse_with_params(PUBLIC_CSE_URL, &params)
            .context("building analyst search url")?;
        let html = self.ctx.http.get_text(url.as_str()).await?;

        let out = GoogleCseSource::parse_public_results(&html)
            .into_iter()
            .take(self.max_docs())
            .filter(|(title, snippet, _)| {
                let text = format!("{title} {snippet}").to_lowercase();
                ANALYST_WORDS.iter().any(|w| text.contains(w))
            })
            .map(|(title, snippet, link)| {
                Signal::new("Analyst Perspective", link, format!("{title} - {snippet}"))
                    .raw(json!({ "title": title, "snippet": snippet }))
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl SignalSource for BusinessDocumentsSource {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>> {
        tracing::info!(company, "scanning business documents");
        let (sec, ir, news, analyst) = tokio::join!(
            self.gather_sec_filings(company),
            self.gather_investor_relations(company),
            self.gather_recent_news(company),
            self.gather_analyst_reports(company),
        );

        let mut out = Vec::new();
        for (label, result) in [
            ("SEC Filings", sec),
            ("Investor Relations", ir),
            ("Recent News", news),
            ("Analyst Reports", analyst),
        ] {
            match result {
                Ok(mut signals) => {
                    if !signals.is_empty() {
                        tracing::info!(
                            company,
                            part = label,
                            count = signals.len(),
                            "document signals"
                        );
                    }
                    out.append(&mut signals);
                }
                Err(e) => {
                    tracing::warn!(error = %e, company, part = label, "document scan failed");
                    counter!("scan_connector_errors_total", "source" => "business_documents")
                        .increment(1);
                }
            }
        }
        // The same document can surface through more than one sub-scan.
        let out = dedup_by_url(out);
        counter!("scan_source_signals_total", "source" => "business_documents")
            .increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "Business Documents"
    }
}
