// tests/connectors_local.rs
//
// Connectors against a throwaway local axum upstream (127.0.0.1, random port).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use cdp_signal_scanner::config::{ScannerConfig, ScrapingConfig};
use cdp_signal_scanner::sources::http::HttpFetcher;
use cdp_signal_scanner::sources::providers::careers_page::CareersPageSource;
use cdp_signal_scanner::sources::providers::google_cse::{CseAccess, GoogleCseSource};
use cdp_signal_scanner::sources::providers::greenhouse::GreenhouseSource;
use cdp_signal_scanner::sources::providers::serpapi_jobs::SerpApiJobsSource;
use cdp_signal_scanner::sources::{SignalSource, SourceContext};
use cdp_signal_scanner::Category;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve local upstream");
    });
    format!("http://{addr}")
}

async fn board(Path(token): Path<String>) -> impl IntoResponse {
    if token != "acme" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "no board"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "jobs": [
                {
                    "title": "VP Marketing",
                    "absolute_url": "https://boards.test/acme/1",
                    "location": {"name": "Remote"},
                    "departments": [{"name": "Marketing"}],
                    "content": "&lt;p&gt;Own our customer data platform.&lt;/p&gt;"
                },
                {
                    "title": "Senior Engineer, CDP Integrations",
                    "absolute_url": "https://boards.test/acme/2",
                    "location": {"name": "Berlin"},
                    "departments": [{"name": "Engineering"}]
                },
                {
                    "title": "Office Manager",
                    "absolute_url": "https://boards.test/acme/3",
                    "departments": [{"name": "Operations"}]
                },
                {
                    "title": "VP Marketing",
                    "absolute_url": "https://boards.test/acme/1",
                    "departments": [{"name": "Marketing"}]
                }
            ]
        })),
    )
}

#[tokio::test]
async fn greenhouse_finds_board_and_filters_jobs() {
    let base = spawn(Router::new().route("/boards/{token}/jobs", get(board))).await;

    let ctx = SourceContext::new(Arc::new(ScannerConfig::default())).unwrap();
    let source = GreenhouseSource::new(ctx).with_base_url(format!("{base}/boards"));

    let signals = source.gather_signals("Acme").await.unwrap();
    let urls: Vec<_> = signals.iter().map(|s| s.source_url.as_str()).collect();
    assert_eq!(urls, vec!["https://boards.test/acme/1", "https://boards.test/acme/2"]);

    assert_eq!(signals[0].snippet, "VP Marketing - Marketing - Remote");
    assert_eq!(signals[0].signal_category, Some(Category::HiringTargetPersona));
    assert_eq!(signals[0].raw_data["board_token"], "acme");
    // Relevant but not a persona title.
    assert_eq!(signals[1].signal_category, Some(Category::Other));
}

#[tokio::test]
async fn greenhouse_without_board_is_empty_not_error() {
    let base = spawn(Router::new().route("/boards/{token}/jobs", get(board))).await;
    let ctx = SourceContext::new(Arc::new(ScannerConfig::default())).unwrap();
    let source = GreenhouseSource::new(ctx).with_base_url(format!("{base}/boards"));

    assert!(source.gather_signals("Globex").await.unwrap().is_empty());
}

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "busy")
    } else {
        (StatusCode::OK, "finally")
    }
}

async fn missing(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::from_config(&ScrapingConfig::default())
        .unwrap()
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

#[tokio::test]
async fn fetcher_retries_server_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn(Router::new().route("/", get(flaky)).with_state(hits.clone())).await;

    let body = fetcher().get_text(&format!("{base}/")).await.unwrap();
    assert_eq!(body, "finally");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn fetcher_does_not_retry_client_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn(Router::new().route("/", get(missing)).with_state(hits.clone())).await;

    assert!(fetcher().get_text(&format!("{base}/")).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// Context with fast pacing and near-instant retry backoff.
fn fast_ctx() -> SourceContext {
    let mut cfg = ScannerConfig::default();
    cfg.api.serpapi.rate_limit = 1000.0;
    cfg.api.google_cse.rate_limit = 60_000.0;
    let mut ctx = SourceContext::new(Arc::new(cfg)).unwrap();
    ctx.http = fetcher();
    ctx
}

type Seen = Arc<Mutex<Vec<String>>>;

async fn cse_quota(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let q = params.get("q").cloned().unwrap_or_default();
    let n = {
        let mut seen = seen.lock().unwrap();
        seen.push(q.clone());
        seen.len()
    };
    let body = if q.contains(" OR (") {
        json!({"items": [{
            "title": "Acme picks mParticle",
            "snippet": "Acme consolidates customer data",
            "link": "https://news.test/b"
        }]})
    } else if n == 1 {
        json!({"items": [{
            "title": "Acme rolls out Segment",
            "snippet": "Event tracking across apps",
            "link": "https://news.test/a"
        }]})
    } else {
        json!({"error": {"code": 429, "message": "Quota exceeded for quota metric 'Queries'"}})
    };
    Json(body)
}

#[tokio::test]
async fn cse_quota_exhaustion_sends_one_fallback_and_stops() {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/customsearch", get(cse_quota))
        .with_state(seen.clone());
    let base = spawn(app).await;

    let access = CseAccess::Api {
        api_key: "k".into(),
        cse_id: "cx".into(),
    };
    let source =
        GoogleCseSource::new(fast_ctx(), access).with_base_url(format!("{base}/customsearch"));
    let fallback = source.quota_fallback_query("Acme");

    let signals = source.gather_signals("Acme").await.unwrap();
    let urls: Vec<_> = signals.iter().map(|s| s.source_url.as_str()).collect();
    assert_eq!(urls, vec!["https://news.test/a", "https://news.test/b"]);

    let seen = seen.lock().unwrap().clone();
    let queries = source.queries("Acme");
    assert_eq!(seen, vec![queries[0].clone(), queries[1].clone(), fallback]);
}

#[tokio::test]
async fn cse_quota_on_fallback_too_is_empty_not_error() {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/customsearch", get(cse_quota_always))
        .with_state(seen.clone());
    let base = spawn(app).await;

    let access = CseAccess::Api {
        api_key: "k".into(),
        cse_id: "cx".into(),
    };
    let source =
        GoogleCseSource::new(fast_ctx(), access).with_base_url(format!("{base}/customsearch"));

    assert!(source.gather_signals("Acme").await.unwrap().is_empty());
    // First query hits the quota, the fallback gets the same answer, nothing else is sent.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[1].contains(" OR "));
}

async fn cse_quota_always(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    seen.lock()
        .unwrap()
        .push(params.get("q").cloned().unwrap_or_default());
    Json(json!({"error": {"code": 429, "message": "Quota exceeded"}}))
}

async fn serpapi(
    State(seen): State<Seen>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let q = params.get("q").cloned().unwrap_or_default();
    seen.lock().unwrap().push(q.clone());
    assert_eq!(params.get("engine").map(String::as_str), Some("google_jobs"));

    let job = |title: &str, link: &str| {
        json!({"jobs_results": [{
            "title": title,
            "company_name": "Acme",
            "location": "Remote",
            "job_link": link,
            "description": "Own the customer data platform"
        }]})
    };
    if q.starts_with("director data platform") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
    }
    let body = if q.starts_with("vp marketing") {
        job("VP Marketing", "https://jobs.test/1")
    } else if q.starts_with("segment") {
        job("Segment Engineer", "https://jobs.test/2")
    } else {
        json!({"jobs_results": []})
    };
    (StatusCode::OK, Json(body))
}

#[tokio::test]
async fn serpapi_failed_query_does_not_drop_the_others() {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/search.json", get(serpapi))
        .with_state(seen.clone());
    let base = spawn(app).await;

    let source =
        SerpApiJobsSource::new(fast_ctx(), "key").with_base_url(format!("{base}/search.json"));
    let signals = source.gather_signals("Acme").await.unwrap();

    let urls: Vec<_> = signals.iter().map(|s| s.source_url.as_str()).collect();
    assert_eq!(urls, vec!["https://jobs.test/1", "https://jobs.test/2"]);
    assert_eq!(signals[0].raw_data["query"], "vp marketing Acme");

    // Every query was still tried after the failing one.
    let seen = seen.lock().unwrap();
    for q in source.queries("Acme") {
        assert!(seen.contains(&q), "query not sent: {q}");
    }
}

#[derive(Clone)]
struct Site {
    robots: &'static str,
    sitemap_hits: Arc<AtomicUsize>,
}

async fn site_robots(State(site): State<Site>) -> &'static str {
    site.robots
}

async fn site_careers() -> axum::response::Html<&'static str> {
    axum::response::Html(
        r#"<html><body>
            <h3><a href="/careers/42">Director, Data Platform</a></h3>
            <p>Own our customer data platform roadmap.</p>
        </body></html>"#,
    )
}

async fn site_sitemap(State(site): State<Site>, headers: axum::http::HeaderMap) -> String {
    site.sitemap_hits.fetch_add(1, Ordering::SeqCst);
    let host = headers
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    format!(
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>http://{host}/openings/data-lead</loc></url>
</urlset>"#
    )
}

async fn site_opening() -> axum::response::Html<&'static str> {
    axum::response::Html(
        r#"<html><head><title>Head of Data</title>
        <meta name="description" content="Lead our Segment rollout"></head></html>"#,
    )
}

async fn careers_site(robots: &'static str) -> (CareersPageSource, Site) {
    let site = Site {
        robots,
        sitemap_hits: Arc::default(),
    };
    let app = Router::new()
        .route("/robots.txt", get(site_robots))
        .route("/careers", get(site_careers))
        .route("/sitemap.xml", get(site_sitemap))
        .route("/openings/data-lead", get(site_opening))
        .with_state(site.clone());
    let base = spawn(app).await;
    let source = CareersPageSource::new(fast_ctx()).with_websites(vec![base]);
    (source, site)
}

#[tokio::test]
async fn careers_page_scraped_when_robots_allows() {
    let (source, site) = careers_site("User-agent: *\nDisallow: /admin\n").await;

    let signals = source.gather_signals("Acme").await.unwrap();
    assert_eq!(signals.len(), 1);
    assert!(signals[0].source_url.ends_with("/careers/42"));
    assert_eq!(signals[0].snippet, "Director, Data Platform - Acme Careers");
    assert_eq!(site.sitemap_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn robots_disallowed_careers_page_skips_whole_site() {
    let (source, site) = careers_site("User-agent: *\nDisallow: /careers\n").await;

    // The sitemap would offer an allowed job page, but the site is skipped outright.
    assert!(source.gather_signals("Acme").await.unwrap().is_empty());
    assert_eq!(site.sitemap_hits.load(Ordering::SeqCst), 0);
}
