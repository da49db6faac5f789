//! # Loteria Feed
//!
//! A scrape-and-distribute pipeline for Brazilian lottery results: fetches
//! draw numbers from configured result sites, validates and normalizes
//! them into canonical records, and fans them out to WhatsApp and Telegram
//! groups.
//!
//! ## Features
//!
//! - Scrapes the Federal draw and the state milhar draws (Rio de Janeiro,
//!   São Paulo, Goiás, Nacional) from configured sources
//! - Rotates requests through a proxy pool, benching identities that keep
//!   failing and degrading to direct connections when the pool is empty
//! - Two-tier extraction per source: CSS selectors first, regex fallback
//!   for pages that drop their markup
//! - Validates the page's own draw date so a stale page never publishes
//!   under the wrong day
//! - Persists canonical results to a JSON store and delivers per-group
//!   templated messages over Telegram and a WhatsApp HTTP gateway
//!
//! ## Usage
//!
//! ```sh
//! loteria_feed -c config.yaml
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Scrape**: per-source state machines run concurrently (4 at a time by default)
//! 2. **Persist**: canonical results are upserted into the result store
//! 3. **Distribute**: enabled groups receive the results they subscribe to
//! 4. **Report**: an optional per-run JSON report for operators

use std::collections::HashSet;
use std::error::Error;

use clap::Parser;
use itertools::Itertools;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod distribute;
mod errors;
mod models;
mod pipeline;
mod proxy;
mod report;
mod scrape;
mod store;
mod utils;

use cli::Cli;
use config::AppConfig;
use distribute::senders::{NoopMessenger, PlatformClients};
use models::Lottery;
use scrape::fetch::PageFetcher;
use scrape::strategy::compile_sources;
use store::{JsonFileStore, ResultStore};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("loteria_feed starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.date, args.today, args.dry_run, "Parsed CLI arguments");

    // ---- Load and compile configuration ----
    let config = match AppConfig::load(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config, error = %e, "Invalid configuration; aborting before any network activity");
            return Err(e.into());
        }
    };
    let sources = match compile_sources(&config.sources) {
        Ok(sources) => sources,
        Err(e) => {
            error!(error = %e, "Strategy compilation failed; aborting");
            return Err(e.into());
        }
    };
    info!(
        sources = sources.len(),
        proxies = config.proxies.iter().filter(|p| p.enabled).count(),
        groups = config.groups.iter().filter(|g| g.enabled).count(),
        templates = config.templates.len(),
        "Configuration loaded"
    );

    // A lottery with no enabled source silently never updates; make that
    // visible to operators.
    let covered: HashSet<Lottery> = config.enabled_sources().map(|s| s.lottery_id).collect();
    for lottery in Lottery::all() {
        if !covered.contains(&lottery) {
            debug!(lottery = lottery.id_str(), "no enabled source for lottery");
        }
    }

    let date = utils::target_date(args.date, args.today);
    info!(%date, "Scraping draws for date");

    // ---- Open store ----
    let store = JsonFileStore::open(&config.store.path).await?;

    let fetcher = PageFetcher::new(config.settings.request_timeout_secs);

    // ---- Run pipeline ----
    let run_report = if args.dry_run {
        info!("Dry run: rendering messages without sending");
        pipeline::run(&config, &sources, &fetcher, &store, &NoopMessenger, date).await
    } else {
        let telegram_token = args
            .telegram_bot_token
            .clone()
            .or_else(|| config.telegram.bot_token.clone());
        let gateway_url = args
            .whatsapp_gateway_url
            .clone()
            .or_else(|| config.whatsapp.gateway_url.clone());
        let api_key = args
            .whatsapp_api_key
            .clone()
            .or_else(|| config.whatsapp.api_key.clone());
        let messenger = PlatformClients::new(
            telegram_token,
            gateway_url,
            api_key,
            config.settings.request_timeout_secs,
        )?;
        pipeline::run(&config, &sources, &fetcher, &store, &messenger, date).await
    };

    // ---- Run report ----
    if let Some(dir) = args.report_dir.as_deref() {
        if let Err(e) = report::write_report(dir, &run_report).await {
            error!(error = %e, "Failed to write run report");
        }
    }

    // ---- Store summary ----
    match store.statistics().await {
        Ok(stats) => {
            info!(
                total_results = stats.total_results,
                storage = stats.storage_kind,
                "Store statistics"
            );
        }
        Err(e) => error!(error = %e, "Failed to read store statistics"),
    }
    match store.latest(5).await {
        Ok(recent) => {
            let keys = recent.iter().map(|r| r.key()).join(", ");
            debug!(recent = %keys, "Most recent stored results");
        }
        Err(e) => error!(error = %e, "Failed to list recent results"),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        scraped = run_report.results.len(),
        failed = run_report.failures.len(),
        groups_messaged = run_report.deliveries.len(),
        "Execution complete"
    );

    Ok(())
}
