use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::db::ReservationDbManager;
use crate::ingest::{log_run_result, HttpPageFetcher, Ingestor, SourceConfig};
use crate::types::AppState;

mod db;
mod ingest;
mod logging;
mod server;
mod types;

/// Scrapes practice room reservations from the board and serves them.
#[derive(Debug, Parser)]
#[command(name = "practice_rooms", version, about)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "PRACTICE_ROOMS_DB", default_value = "reservations.db", global = true)]
    database: String,

    /// JSON source table (category -> weekday -> URL); the built-in table is used when unset
    #[arg(long, env = "PRACTICE_ROOMS_SOURCES", global = true)]
    sources: Option<PathBuf>,

    /// Upper bound on one ingestion run, in seconds
    #[arg(long, env = "PRACTICE_ROOMS_RUN_TIMEOUT", default_value_t = 300, global = true)]
    run_timeout_secs: u64,

    /// Append-only log file
    #[arg(long, env = "PRACTICE_ROOMS_LOG", default_value = "app.log", global = true)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "PRACTICE_ROOMS_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PRACTICE_ROOMS_PORT", default_value_t = 8082)]
        port: u16,
    },
    /// Scrape and store reservations for a date and the day before it
    Ingest {
        /// Target date (YYYY-MM-DD)
        date: String,
        /// Category name, e.g. "일반 연습실", or "all"
        category: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(Some(&cli.log_file))
        .with_context(|| format!("failed to open log file {}", cli.log_file.display()))?;

    let sources = match &cli.sources {
        Some(path) => SourceConfig::load_from_file(path)?,
        None => SourceConfig::builtin()?,
    };

    let reservation_db = Arc::new(
        ReservationDbManager::new(&cli.database)
            .with_context(|| format!("failed to open database {}", cli.database))?,
    );
    let ingestor = Arc::new(
        Ingestor::new(
            reservation_db.clone(),
            Arc::new(sources),
            Arc::new(HttpPageFetcher::new()?),
        )
        .with_run_timeout(Duration::from_secs(cli.run_timeout_secs)),
    );

    match cli.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("invalid listen address {host}:{port}"))?;

            let state = Arc::new(AppState::new(reservation_db, ingestor));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Server running on http://{}", addr);

            axum::serve(listener, server::create_router(state))
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutting down");
                })
                .await?;
        }
        Command::Ingest { date, category } => {
            println!(
                "Starting data scraping and storage for date: {}, category: {}...",
                date, category
            );

            let result = ingestor.ingest_bounded(&date, &category).await;
            log_run_result("cli", &date, &category, &result);
            let report = result?;

            if report.records.is_empty() {
                println!("No reservation data found or stored.");
            } else {
                println!(
                    "Successfully scraped and stored {} reservations.",
                    report.records.len()
                );
                for (i, r) in report.records.iter().take(5).enumerate() {
                    println!(
                        "Sample {}: Room: {}, Date: {}, Time: {}, Name: {}",
                        i + 1,
                        r.room_name,
                        r.reservation_date,
                        r.reservation_time_slot,
                        r.student_name
                    );
                }
            }
            println!(
                "{} reservation(s) now stored for {}.",
                reservation_db.count_for_date(report.window.target)?,
                report.window.target
            );
            if !report.is_clean() {
                println!(
                    "Skipped {} page(s) and {} unparsed title(s); see the log for details.",
                    report.skipped_pairs, report.unparsed_titles
                );
            }
        }
    }

    Ok(())
}
