//! Regio-Search main entry point
//!
//! This is the command-line interface for the Regio-Search back-end.

use anyhow::Context;
use clap::{Parser, Subcommand};
use regio_search::config::{load_config_with_hash, Config};
use regio_search::crawler::{CrawlOptions, StopSignal};
use regio_search::output::{load_statistics, print_crawl_report, print_search_results, print_statistics};
use regio_search::SearchEngine;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Regio-Search: a regional web search back-end
///
/// Regio-Search crawls a curated set of domains politely, stores the pages
/// in append-only batches, builds a ranked inverted index from them and
/// answers queries against it.
#[derive(Parser, Debug)]
#[command(name = "regio-search")]
#[command(version)]
#[command(about = "A regional web search back-end", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "regio.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl catalog domains and index the new pages
    Crawl {
        /// Domains to crawl (default: every catalog entry)
        domains: Vec<String>,

        /// Override the maximum link depth
        #[arg(long)]
        max_depth: Option<u32>,

        /// Override the total page ceiling
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Rebuild the index from every stored batch
    Index,

    /// Run a query against the current index
    Search {
        /// Query text
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        max_results: usize,

        /// Allow more results per domain than the diversity cap
        #[arg(long)]
        no_diversify: bool,
    },

    /// Show store, index and cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Crawl {
            domains,
            max_depth,
            max_pages,
        } => handle_crawl(config, config_hash, domains, max_depth, max_pages).await,
        Command::Index => handle_index(config),
        Command::Search {
            query,
            max_results,
            no_diversify,
        } => handle_search(config, &query.join(" "), max_results, !no_diversify),
        Command::Stats => handle_stats(config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("regio_search=info,warn"),
            1 => EnvFilter::new("regio_search=debug,info"),
            2 => EnvFilter::new("regio_search=trace,debug"),
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

fn open_engine(config: Config) -> anyhow::Result<SearchEngine> {
    let database = config.storage.database_path.clone();
    SearchEngine::open(config).with_context(|| format!("failed to open store {}", database))
}

/// Handles the crawl command: crawl, flush, index
async fn handle_crawl(
    config: Config,
    config_hash: String,
    domains: Vec<String>,
    max_depth: Option<u32>,
    max_pages: Option<usize>,
) -> anyhow::Result<()> {
    let engine = open_engine(config)?.with_config_hash(config_hash);

    let stop = StopSignal::new();
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining crawl workers");
            ctrl_c.stop();
        }
    });

    let options = CrawlOptions {
        max_depth,
        max_pages,
        stop,
        ..CrawlOptions::default()
    };

    let report = engine.crawl(&domains, options).await.context("crawl failed")?;
    print_crawl_report(&report);
    Ok(())
}

/// Handles the index command: full rebuild from the batch store
fn handle_index(config: Config) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let stats = engine.rebuild_index().context("index build failed")?;
    println!(
        "Indexed {} documents ({} terms, {} batches)",
        stats.documents, stats.terms, stats.processed_batches
    );
    Ok(())
}

/// Handles the search command
fn handle_search(config: Config, query: &str, max_results: usize, diversify: bool) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let hits = engine.search(query, max_results, diversify)?;
    print_search_results(query, &hits);
    Ok(())
}

/// Handles the stats command
fn handle_stats(config: Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);
    let engine = open_engine(config)?;
    let stats = load_statistics(&engine)?;
    print_statistics(&stats);
    Ok(())
}
