// src/scan.rs
//! Scan orchestration and ranking.
//!
//! Companies are scanned one after another; within a company every source runs
//! concurrently and fails on its own. Signals are then classified, scored, tagged with
//! their account and ranked by (company total desc, signal score desc).

use std::collections::HashMap;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::analyze::SignalScorer;
use crate::signal::{Category, Signal};
use crate::sources::SignalSource;

/// Fixed leading columns of the result table.
pub const COLUMNS: [&str; 6] = [
    "account",
    "signal_category",
    "snippet",
    "score",
    "source_url",
    "total_company_score",
];

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scan_signals_total", "Signals kept after scoring, all companies.");
        describe_counter!(
            "scan_connector_errors_total",
            "Source failures recovered by the scan layer."
        );
        describe_counter!("scan_companies_total", "Companies scanned.");
        describe_counter!(
            "scan_source_signals_total",
            "Signals returned per source before scoring."
        );
        describe_histogram!(
            "scan_company_duration_ms",
            "Wall time to gather and score one company, in milliseconds."
        );
        describe_gauge!("scan_last_run_ts", "Unix ts when the last scan finished.");
    });
}

/// A fully enriched, account-tagged row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSignal {
    pub account: String,
    pub signal_category: Category,
    pub snippet: String,
    pub score: u32,
    pub source_url: String,
    pub total_company_score: u32,
    pub source: String,
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

/// Ranked scan output. `columns` is always populated, rows may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTable {
    pub columns: Vec<String>,
    pub rows: Vec<RankedSignal>,
}

impl Default for SignalTable {
    fn default() -> Self {
        Self {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

impl SignalTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// (account, total) in ranking order, one entry per company that produced rows.
    pub fn company_totals(&self) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = Vec::new();
        for row in &self.rows {
            if !out.iter().any(|(a, _)| a == &row.account) {
                out.push((row.account.clone(), row.total_company_score));
            }
        }
        out
    }
}

/// Tag, total and rank per-company signal lists. Signals missing a category or score
/// are enriched first. Companies with no signals contribute no rows.
pub fn rank_companies(
    scorer: &SignalScorer,
    per_company: Vec<(String, Vec<Signal>)>,
) -> SignalTable {
    let mut totals: HashMap<String, u32> = HashMap::new();
    let mut rows = Vec::new();

    for (company, signals) in per_company {
        for mut signal in signals {
            if signal.score.is_none() || signal.signal_category.is_none() {
                scorer.enrich(&mut signal);
            }
            let score = signal.score.unwrap_or_default();
            let total = totals.entry(company.clone()).or_default();
            *total = total.saturating_add(score);

            rows.push(RankedSignal {
                account: company.clone(),
                signal_category: signal.signal_category.unwrap_or(Category::Other),
                snippet: signal.snippet,
                score,
                source_url: signal.source_url,
                total_company_score: 0,
                source: signal.source,
                raw_data: signal.raw_data,
            });
        }
    }

    for row in &mut rows {
        row.total_company_score = totals.get(&row.account).copied().unwrap_or_default();
    }
    // Stable: equal keys keep gather order.
    rows.sort_by(|a, b| {
        b.total_company_score
            .cmp(&a.total_company_score)
            .then(b.score.cmp(&a.score))
    });

    SignalTable {
        rows,
        ..SignalTable::default()
    }
}

/// Run every source for one company concurrently, then classify and score.
/// A failing source is logged and contributes nothing.
pub async fn scan_company(
    company: &str,
    sources: &[Box<dyn SignalSource>],
    scorer: &SignalScorer,
) -> Vec<Signal> {
    ensure_metrics_described();
    let t0 = Instant::now();

    let results = join_all(
        sources
            .iter()
            .map(|s| async move { (s.name(), s.gather_signals(company).await) }),
    )
    .await;

    let mut signals = Vec::new();
    for (name, result) in results {
        match result {
            Ok(mut v) => {
                tracing::debug!(company, source = name, count = v.len(), "source finished");
                signals.append(&mut v);
            }
            Err(e) => {
                tracing::error!(error = ?e, company, source = name, "source failed");
                counter!("scan_connector_errors_total", "source" => name).increment(1);
            }
        }
    }

    for s in &mut signals {
        scorer.enrich(s);
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("scan_company_duration_ms").record(ms);
    counter!("scan_companies_total").increment(1);
    counter!("scan_signals_total").increment(signals.len() as u64);
    tracing::info!(company, signals = signals.len(), elapsed_ms = ms as u64, "company scanned");
    signals
}

/// Sources + scorer: everything a scan needs.
pub struct Scanner {
    sources: Vec<Box<dyn SignalSource>>,
    scorer: SignalScorer,
}

impl Scanner {
    pub fn new(sources: Vec<Box<dyn SignalSource>>, scorer: SignalScorer) -> Self {
        Self { sources, scorer }
    }

    pub fn scorer(&self) -> &SignalScorer {
        &self.scorer
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn scan_companies(&self, companies: &[String]) -> SignalTable {
        self.scan_companies_with(companies, |_, _| {}).await
    }

    /// Like [`Scanner::scan_companies`], calling `on_company(index, name)` before each
    /// company starts. Blank names are skipped.
    pub async fn scan_companies_with<F>(
        &self,
        companies: &[String],
        mut on_company: F,
    ) -> SignalTable
    where
        F: FnMut(usize, &str),
    {
        ensure_metrics_described();
        let mut per_company = Vec::with_capacity(companies.len());
        for (i, raw) in companies.iter().enumerate() {
            let company = raw.trim();
            if company.is_empty() {
                continue;
            }
            on_company(i, company);
            tracing::info!(company, "scanning company");
            let signals = scan_company(company, &self.sources, &self.scorer).await;
            per_company.push((company.to_string(), signals));
        }

        let table = rank_companies(&self.scorer, per_company);
        gauge!("scan_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(companies = companies.len(), rows = table.len(), "scan finished");
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ScoringWeights;
    use crate::config::Keywords;

    fn scorer() -> SignalScorer {
        SignalScorer::new(ScoringWeights::default(), Keywords::default())
    }

    fn scored(url: &str, score: u32) -> Signal {
        let mut s = Signal::new("test", url, "x").category(Category::TechnologySignal);
        s.score = Some(score);
        s
    }

    #[test]
    fn empty_input_has_columns() {
        let t = rank_companies(&scorer(), Vec::new());
        assert!(t.is_empty());
        assert_eq!(t.columns, COLUMNS.to_vec());

        let t = rank_companies(&scorer(), vec![("Acme".into(), Vec::new())]);
        assert!(t.is_empty());
        assert_eq!(t.columns.len(), 6);
    }

    #[test]
    fn totals_and_ordering() {
        let t = rank_companies(
            &scorer(),
            vec![
                ("Low".into(), vec![scored("l1", 5)]),
                ("High".into(), vec![scored("h1", 2), scored("h2", 4), scored("h3", 2)]),
            ],
        );
        let order: Vec<_> = t.rows.iter().map(|r| r.source_url.as_str()).collect();
        assert_eq!(order, vec!["h2", "h1", "h3", "l1"]);
        assert!(t
            .rows
            .iter()
            .filter(|r| r.account == "High")
            .all(|r| r.total_company_score == 8));
        assert_eq!(
            t.company_totals(),
            vec![("High".to_string(), 8), ("Low".to_string(), 5)]
        );
    }

    #[test]
    fn per_company_total_equals_sum_of_scores() {
        let t = rank_companies(
            &scorer(),
            vec![
                ("A".into(), vec![scored("a1", 3), scored("a2", 1)]),
                ("B".into(), vec![scored("b1", 4)]),
            ],
        );
        for (account, total) in t.company_totals() {
            let sum: u32 = t.rows.iter().filter(|r| r.account == account).map(|r| r.score).sum();
            assert_eq!(sum, total);
        }
    }

    #[test]
    fn unscored_signals_are_enriched() {
        let raw = Signal::new(
            "test",
            "u",
            "ACME Corp selects Segment as its Customer Data Platform for unified profiles.",
        );
        let t = rank_companies(&scorer(), vec![("ACME".into(), vec![raw])]);
        assert_eq!(t.rows[0].signal_category, Category::TechnologySignal);
        assert_eq!(t.rows[0].score, 4);
        assert_eq!(t.rows[0].total_company_score, 4);
    }
}
