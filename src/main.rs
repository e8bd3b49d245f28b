//! # Awful Feedgen
//!
//! Builds one RSS feed out of many sources, including sites that publish no
//! feed at all.
//!
//! ## Features
//!
//! - Reads RSS 2.0, RSS 1.0 and Atom feeds as-is
//! - Extracts items from HTML listing pages with cascading selector
//!   heuristics, degrading to a content-link scan when page structure drifts
//! - Merges all sources, drops duplicate links, and ranks newest first
//! - A failing source is reported and skipped; the feed is still written
//!
//! ## Usage
//!
//! ```sh
//! awful_feedgen -c sources.yaml -o ./public/feed.xml
//! ```
//!
//! ## Architecture
//!
//! 1. **Aggregation**: fetch and extract every source concurrently
//! 2. **Normalization**: absolutize links, tag titles, default dates, dedup
//! 3. **Ranking**: newest first, truncated to the configured maximum
//! 4. **Output**: render RSS 2.0 and overwrite the output file

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod cli;
mod collection;
mod config;
mod dates;
mod error;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use cli::Cli;
use config::Config;
use fetch::HttpFetcher;
use outputs::rss;
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feedgen starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_cli(&args);
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration rejected");
        return Err(e.into());
    }
    info!(
        sources = config.sources.len(),
        max_items = config.max_items,
        output = %config.output.display(),
        "Configuration ready"
    );

    // Early check: without a writable output there is no point fetching
    if let Err(e) = ensure_writable_parent(&config.output).await {
        error!(
            path = %config.output.display(),
            error = %e,
            "Output location is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Aggregate, normalize, rank ----
    let fetcher = HttpFetcher::new()?;
    let fetched_at = Utc::now();
    let report = pipeline::generate(&config, &fetcher, fetched_at).await;

    // ---- Output ----
    let xml = rss::render(&config.channel, &report.collection, Utc::now())?;
    if let Err(e) = rss::write_feed(&config.output, &xml).await {
        error!(error = %e, "Failed to write feed");
        return Err(e.into());
    }

    if report.collection.is_empty() {
        warn!("No source produced any items; wrote an empty feed");
    }

    // ---- Run summary ----
    println!(
        "Wrote {} with {} items",
        config.output.display(),
        report.collection.len()
    );
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        items = report.collection.len(),
        failed_sources = report.diagnostics.len(),
        "Execution complete"
    );

    Ok(())
}
