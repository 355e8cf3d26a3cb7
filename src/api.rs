// src/api.rs
//! Web front end: start a background scan, poll its progress, fetch results.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::report::to_csv_string;
use crate::scan::{Scanner, SignalTable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Progress of the current (or last) background scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanState {
    pub status: ScanStatus,
    pub companies: Vec<String>,
    pub current: Option<String>,
    pub completed: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(skip)]
    pub results: Option<SignalTable>,
}

#[derive(Clone)]
pub struct AppState {
    scanner: Arc<Scanner>,
    scan: Arc<RwLock<ScanState>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            scan: Arc::new(RwLock::new(ScanState::default())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Snapshot of the scan progress.
    pub fn scan_state(&self) -> ScanState {
        read(&self.scan).clone()
    }
}

// A panicking scan task must not take the status endpoint down with it.
fn read(lock: &RwLock<ScanState>) -> RwLockReadGuard<'_, ScanState> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write(lock: &RwLock<ScanState>) -> RwLockWriteGuard<'_, ScanState> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/api/scan", post(start_scan))
        .route("/api/scan_status", get(scan_status))
        .route("/results", get(results))
        .route("/download", get(download))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>CDP Signal Scanner</title></head>
<body>
<h1>CDP Signal Scanner</h1>
<form id="scan">
  <textarea name="companies" rows="6" cols="40" placeholder="One company per line"></textarea><br>
  <button type="submit">Scan</button>
</form>
<pre id="status"></pre>
<p><a href="/results">results (json)</a> | <a href="/download">download csv</a></p>
<script>
document.getElementById("scan").onsubmit = async (e) => {
  e.preventDefault();
  const companies = e.target.companies.value.split("\n").map(s => s.trim()).filter(Boolean);
  await fetch("/api/scan", {method: "POST", headers: {"Content-Type": "application/json"}, body: JSON.stringify({companies})});
  const poll = async () => {
    const s = await (await fetch("/api/scan_status")).json();
    document.getElementById("status").textContent = JSON.stringify(s, null, 2);
    if (s.status === "running") setTimeout(poll, 2000);
  };
  poll();
};
</script>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Deserialize)]
struct ScanReq {
    #[serde(default)]
    companies: Vec<String>,
}

#[derive(Serialize)]
struct ScanAccepted {
    status: ScanStatus,
    companies: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

async fn start_scan(State(state): State<AppState>, Json(body): Json<ScanReq>) -> Response {
    let companies: Vec<String> = body
        .companies
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if companies.is_empty() {
        return error(StatusCode::BAD_REQUEST, "no companies given");
    }

    {
        let mut s = write(&state.scan);
        if s.status == ScanStatus::Running {
            return error(StatusCode::CONFLICT, "a scan is already running");
        }
        *s = ScanState {
            status: ScanStatus::Running,
            companies: companies.clone(),
            started_at: Some(Utc::now()),
            ..ScanState::default()
        };
    }
    tracing::info!(companies = companies.len(), "scan requested");

    let scanner = state.scanner.clone();
    let progress = state.scan.clone();
    let list = companies.clone();
    let worker = tokio::spawn(async move {
        let mut seen = 0usize;
        scanner
            .scan_companies_with(&list, |_, company| {
                let mut s = write(&progress);
                s.current = Some(company.to_string());
                s.completed = seen;
                seen += 1;
            })
            .await
    });

    let shared = state.scan.clone();
    tokio::spawn(async move {
        let outcome = worker.await;
        let mut s = write(&shared);
        s.current = None;
        s.finished_at = Some(Utc::now());
        match outcome {
            Ok(table) => {
                s.completed = s.companies.len();
                s.status = ScanStatus::Completed;
                s.results = Some(table);
            }
            Err(e) => {
                tracing::error!(error = ?e, "scan task failed");
                s.status = ScanStatus::Failed;
                s.error = Some(e.to_string());
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(ScanAccepted {
            status: ScanStatus::Running,
            companies,
        }),
    )
        .into_response()
}

async fn scan_status(State(state): State<AppState>) -> Json<ScanState> {
    Json(state.scan_state())
}

async fn results(State(state): State<AppState>) -> Json<SignalTable> {
    Json(read(&state.scan).results.clone().unwrap_or_default())
}

async fn download(State(state): State<AppState>) -> Response {
    let table = match read(&state.scan).results.clone() {
        Some(t) => t,
        None => return error(StatusCode::NOT_FOUND, "no results available"),
    };
    match to_csv_string(&table) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"signals.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "csv export failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "csv export failed")
        }
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
