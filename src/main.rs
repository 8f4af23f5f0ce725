//! Crawl-Ingest main entry point
//!
//! This is the command-line interface for the Crawl-Ingest article pipeline.

use anyhow::Context;
use clap::Parser;
use crawl_ingest::config::{load_config_with_hash, Config};
use crawl_ingest::crawler::{groups_from_config, run_ingest, select_groups};
use crawl_ingest::output::{load_statistics, print_statistics, render_dry_run, render_group_results};
use crawl_ingest::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawl-Ingest: a multi-source article ingestion pipeline
///
/// Crawl-Ingest reads the listing page of every configured target, skips
/// items it has already stored, fetches and parses each new detail page,
/// and saves the merged articles to SQLite.
#[derive(Parser, Debug)]
#[command(name = "crawl-ingest")]
#[command(version)]
#[command(about = "A multi-source article ingestion pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the groups and targets without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Only run the named group (repeatable)
    #[arg(long = "group", value_name = "NAME")]
    groups: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.groups)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_ingest(&config, &config_hash, &cli.groups).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_ingest=info,warn"),
            1 => EnvFilter::new("crawl_ingest=debug,info"),
            2 => EnvFilter::new("crawl_ingest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: compiles every target and lists what would run
fn handle_dry_run(config: &Config, only: &[String]) -> anyhow::Result<()> {
    let groups = select_groups(groups_from_config(config)?, only)?;

    println!("Database: {}", config.output.database_path);
    println!(
        "Retry: {} attempt(s), {}ms apart\n",
        config.crawler.retry_attempts, config.crawler.retry_delay_ms
    );
    print!("{}", render_dry_run(&groups));
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main ingest operation
async fn handle_ingest(config: &Config, config_hash: &str, only: &[String]) -> anyhow::Result<()> {
    tracing::info!("Configured groups: {}", config.groups.len());

    let results = run_ingest(config, config_hash, only)
        .await
        .context("Ingest failed")?;
    print!("{}", render_group_results(&results));

    let failed: usize = results.iter().map(|r| r.failures.len()).sum();
    if failed > 0 {
        tracing::warn!("{} target(s) failed; see the errors above", failed);
    }

    Ok(())
}
