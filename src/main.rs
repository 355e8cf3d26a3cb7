//! CDP Signal Scanner binary.
//! `scan` runs once and writes a CSV; `serve` starts the web front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cdp_signal_scanner::analyze::{weights::load_weights_file, SignalScorer};
use cdp_signal_scanner::api::{self, AppState};
use cdp_signal_scanner::config::load_config;
use cdp_signal_scanner::metrics::Metrics;
use cdp_signal_scanner::report;
use cdp_signal_scanner::scan::Scanner;
use cdp_signal_scanner::sources::providers::{default_sources, Credentials};

#[derive(Parser)]
#[command(name = "cdp-signal-scanner")]
#[command(
    about = "Find signs that companies are evaluating a Customer Data Platform",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file overriding the scoring weights
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan companies once and write the ranked signals to CSV
    Scan {
        /// Comma-separated company names
        #[arg(long)]
        companies: Option<String>,

        /// CSV file with one company per row (first column)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output CSV path
        #[arg(long, default_value = "signals.csv")]
        output: PathBuf,
    },

    /// Start the web front end
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value_t = 5000)]
        port: u16,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cdp_signal_scanner=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build_scanner(weights: Option<&PathBuf>) -> Result<Scanner> {
    let mut config = load_config();
    if let Some(path) = weights {
        config.scoring = load_weights_file(path)?;
        tracing::info!(path = %path.display(), "scoring weights overridden");
    }
    let scorer = SignalScorer::new(config.scoring, config.keywords.clone());
    let sources = default_sources(Arc::new(config), &Credentials::from_env())?;
    Ok(Scanner::new(sources, scorer))
}

fn gather_companies(list: Option<&str>, file: Option<&PathBuf>) -> Result<Vec<String>> {
    let mut companies = Vec::new();
    if let Some(list) = list {
        companies.extend(report::split_company_list(list));
    }
    if let Some(path) = file {
        companies.extend(report::read_companies_file(path)?);
    }
    Ok(companies)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Scan {
            companies,
            file,
            output,
        } => {
            if companies.is_none() && file.is_none() {
                Cli::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "provide --companies or --file",
                    )
                    .exit();
            }
            let list = gather_companies(companies.as_deref(), file.as_ref())?;
            if list.is_empty() {
                Cli::command()
                    .error(ErrorKind::InvalidValue, "no company names found in input")
                    .exit();
            }

            let scanner = build_scanner(cli.weights.as_ref())?;
            tracing::info!(
                companies = list.len(),
                sources = ?scanner.source_names(),
                "starting scan"
            );
            let table = scanner.scan_companies(&list).await;

            report::write_csv_file(&table, &output)?;
            tracing::info!(path = %output.display(), rows = table.len(), "results written");
            println!("{}", report::render_console(&table));
        }
        Commands::Serve { host, port } => {
            let metrics = Metrics::init()?;
            let scanner = Arc::new(build_scanner(cli.weights.as_ref())?);
            let state = AppState::new(scanner).with_metrics(metrics.handle.clone());
            let app = api::router(state);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app).await.context("server error")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_both_commands() {
        let cli =
            Cli::try_parse_from(["cdp-signal-scanner", "scan", "--companies", "A,B"]).unwrap();
        match cli.command {
            Commands::Scan { companies, output, .. } => {
                assert_eq!(companies.as_deref(), Some("A,B"));
                assert_eq!(output, PathBuf::from("signals.csv"));
            }
            _ => panic!("expected scan"),
        }

        let cli = Cli::try_parse_from(["cdp-signal-scanner", "serve", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Serve { port: 5000, .. }));
    }

    #[test]
    fn companies_from_list_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("c.csv");
        std::fs::write(&p, "Globex\n\nInitech,x\n").unwrap();
        let got = gather_companies(Some("Acme, "), Some(&p)).unwrap();
        assert_eq!(got, vec!["Acme", "Globex", "Initech"]);
    }
}
