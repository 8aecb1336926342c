//! biz-harvest main entry point
//!
//! Command-line interface for the directory harvester: one-shot scrapes,
//! the HTTP server, dataset statistics and configuration dry runs.

use anyhow::{bail, Context};
use biz_harvest::config::{load_config_with_hash, Config};
use biz_harvest::crawler::{Orchestrator, RunMode, ScrapeRequest};
use biz_harvest::output::{load_statistics, print_scrape_summary, print_statistics};
use biz_harvest::server::run_server;
use biz_harvest::storage::{CsvDatasetStore, DatasetId};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// biz-harvest: a business directory harvester
///
/// Scrapes listings from a paginated business directory into deduplicated
/// CSV datasets, either once from the command line or on demand over HTTP.
#[derive(Parser, Debug)]
#[command(name = "biz-harvest")]
#[command(version)]
#[command(about = "A business directory harvester", long_about = None)]
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

    /// Run the HTTP server
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "url"])]
    serve: bool,

    /// Validate config and show which pages would be fetched
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for a dataset (default dataset if no name is given) and exit
    #[arg(long, value_name = "DATASET", num_args = 0..=1, default_missing_value = "")]
    stats: Option<String>,

    /// Base URL of the directory listing to scrape
    #[arg(long, requires_all = ["start_page", "end_page"])]
    url: Option<String>,

    /// First page to scrape
    #[arg(long)]
    start_page: Option<u32>,

    /// Last page to scrape
    #[arg(long)]
    end_page: Option<u32>,

    /// Treat the URL as a category listing with its own dataset
    #[arg(long, requires = "url")]
    category: bool,
}

impl Cli {
    fn scrape_request(&self) -> Option<ScrapeRequest> {
        let mode = if self.category {
            RunMode::Category
        } else {
            RunMode::Standard
        };

        match (&self.url, self.start_page, self.end_page) {
            (Some(url), Some(start), Some(end)) => {
                Some(ScrapeRequest::new(url.clone(), start, end, mode))
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.serve {
        run_server(&config).await?;
    } else if let Some(dataset) = &cli.stats {
        handle_stats(&config, dataset)?;
    } else if cli.dry_run {
        handle_dry_run(&config, cli.scrape_request().as_ref())?;
    } else if let Some(request) = cli.scrape_request() {
        handle_scrape(&config, request).await?;
    } else {
        bail!("Nothing to do: pass --serve, --stats, --dry-run or --url with --start-page and --end-page");
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("biz_harvest=info,actix_web=info,warn"),
            1 => EnvFilter::new("biz_harvest=debug,info"),
            2 => EnvFilter::new("biz_harvest=trace,debug"),
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

/// Handles --dry-run: shows the effective configuration and the pages a scrape would fetch
fn handle_dry_run(config: &Config, request: Option<&ScrapeRequest>) -> anyhow::Result<()> {
    println!("=== biz-harvest Dry Run ===\n");

    println!("Fetching:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!(
        "  Lightweight attempts per page: {}",
        config.fetch.max_lightweight_attempts
    );
    println!(
        "  Backoff: {}ms doubling up to {}ms",
        config.fetch.backoff_base_ms, config.fetch.backoff_max_ms
    );

    println!("\nPacing:");
    for (label, range) in [
        ("Standard delay", &config.pacing.standard_delay_ms),
        ("Category delay", &config.pacing.category_delay_ms),
        ("Failure delay", &config.pacing.failure_delay_ms),
        ("Browser settle", &config.pacing.settle_delay_ms),
    ] {
        println!("  {}: {}-{}ms", label, range.min_ms, range.max_ms);
    }
    println!("  Early stop window: {}", config.pacing.early_stop_window);

    println!("\nBrowser fallback:");
    println!("  Enabled: {}", config.browser.enabled);
    if let Some(path) = &config.browser.executable_path {
        println!("  Executable: {}", path.display());
    }

    println!("\nProxy: {}", config.proxy.url().as_deref().unwrap_or("none"));

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Default dataset: {}.csv", config.output.default_dataset);

    println!("\nServer: {}:{}", config.server.bind, config.server.port);

    println!("\n✓ Configuration is valid");

    if let Some(request) = request {
        let layout = request.validate()?;
        let store = CsvDatasetStore::new(&config.output.directory);
        let dataset = match layout.category_name() {
            Some(category) => DatasetId::for_category(category),
            None => default_dataset(config)?,
        };

        println!(
            "✓ Would scrape {} page(s) into {}",
            request.end_page - request.start_page + 1,
            store.directory().join(dataset.file_name()).display()
        );
        for page in request.start_page..=request.end_page {
            println!("  - page {}: {}", page, layout.page_url(page));
        }
    }

    Ok(())
}

/// Handles --stats: prints statistics for one dataset
fn handle_stats(config: &Config, dataset: &str) -> anyhow::Result<()> {
    let id = if dataset.is_empty() {
        default_dataset(config)?
    } else {
        let name = dataset.strip_suffix(".csv").unwrap_or(dataset);
        match DatasetId::new(name) {
            Some(id) => id,
            None => bail!("Invalid dataset name: {}", dataset),
        }
    };

    let store = CsvDatasetStore::new(&config.output.directory);
    let stats = load_statistics(&store, &id)
        .with_context(|| format!("Failed to read dataset {}", id))?;

    print_statistics(&stats);

    Ok(())
}

/// Handles a one-shot scrape; Ctrl-C stops the run after the current page
async fn handle_scrape(config: &Config, request: ScrapeRequest) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let orchestrator = Orchestrator::from_config(config)?.with_stop_flag(stop.clone());

    if !orchestrator.browser_available() {
        tracing::warn!("Browser fallback unavailable; pages that block plain requests will fail");
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            stop.store(true, Ordering::SeqCst);
        }
    });

    match orchestrator.run(&request).await {
        Ok(result) => {
            print_scrape_summary(&result);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}

fn default_dataset(config: &Config) -> anyhow::Result<DatasetId> {
    DatasetId::new(&config.output.default_dataset)
        .with_context(|| format!("Invalid default dataset: {}", config.output.default_dataset))
}
