// src/report.rs
//! Report I/O: company list input, CSV output, console summary.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};

use crate::scan::{SignalTable, COLUMNS};

/// Columns appended after the fixed six.
pub const PASSTHROUGH_COLUMNS: [&str; 2] = ["source", "raw_data"];
const CONSOLE_ROWS: usize = 20;
const CONSOLE_SNIPPET_CHARS: usize = 70;

/// Company names from the first column of a headerless CSV. Blank rows are skipped.
pub fn read_companies<R: Read>(input: R) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.context("reading companies csv")?;
        if let Some(first) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) {
            out.push(first.to_string());
        }
    }
    Ok(out)
}

pub fn read_companies_file(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("could not read companies file {}", path.display()))?;
    read_companies(file)
}

/// Comma-separated names, trimmed, blanks dropped.
pub fn split_company_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Header + one record per row. An empty table still gets the header.
pub fn write_csv<W: Write>(table: &SignalTable, out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(COLUMNS.iter().chain(PASSTHROUGH_COLUMNS.iter()))?;

    for row in &table.rows {
        let raw = serde_json::to_string(&row.raw_data).context("encoding raw_data")?;
        let score = row.score.to_string();
        let total = row.total_company_score.to_string();
        writer.write_record([
            row.account.as_str(),
            row.signal_category.as_str(),
            row.snippet.as_str(),
            score.as_str(),
            row.source_url.as_str(),
            total.as_str(),
            row.source.as_str(),
            raw.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv_file(table: &SignalTable, path: &Path) -> Result<()> {
    let file = File::create(path).context("Failed to create output file")?;
    write_csv(table, file)
}

pub fn to_csv_string(table: &SignalTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).context("csv output is not utf-8")
}

/// Human-readable summary: per-company totals, then the top rows.
pub fn render_console(table: &SignalTable) -> String {
    if table.is_empty() {
        return "No signals found".to_string();
    }

    let mut out = String::from("\nResults:\n");
    for (account, total) in table.company_totals() {
        out.push_str(&format!("  {account}: {total}\n"));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:<20} {:<22} {:>5} {:>5}  {}\n",
        "account", "signal_category", "score", "total", "snippet"
    ));
    for row in table.rows.iter().take(CONSOLE_ROWS) {
        let snippet: String = row.snippet.chars().take(CONSOLE_SNIPPET_CHARS).collect();
        out.push_str(&format!(
            "{:<20} {:<22} {:>5} {:>5}  {}\n",
            row.account, row.signal_category, row.score, row.total_company_score, snippet
        ));
    }
    if table.len() > CONSOLE_ROWS {
        out.push_str(&format!("... {} more rows\n", table.len() - CONSOLE_ROWS));
    }
    out
}
