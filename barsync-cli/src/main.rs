//! barsync CLI: refresh per-exchange daily-bar artifacts and catalogs.
//!
//! Commands:
//! - `run`: fetch every catalog symbol, write artifacts, reconcile catalogs
//! - `config`: print the default configuration as TOML

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use barsync_core::data::YahooProvider;
use barsync_core::{CsvArtifactStore, JsonCatalogStore};
use barsync_runner::{IngestConfig, IngestReport, JsonlEventLog, PipelineDriver, RunSettings};

#[derive(Parser)]
#[command(
    name = "barsync",
    about = "barsync CLI: daily-bar ingestion with catalog reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily bars for every catalog symbol and reconcile catalogs.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Exchanges to process (subset of configured codes, in this order).
        #[arg(long = "exchange")]
        exchanges: Vec<String>,

        /// Override the per-exchange concurrency budget.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override the retry budget per symbol.
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Override the lookback window in calendar days.
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Write the run report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Debug-level logging.
        #[arg(long, short, default_value_t = false)]
        verbose: bool,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            exchanges,
            concurrency,
            max_attempts,
            lookback_days,
            report,
            verbose,
        } => {
            init_logging(verbose);
            let config = load_config(config, concurrency, max_attempts, lookback_days)?;
            run_ingest(&config, &exchanges, report)
        }
        Commands::Config => {
            print!("{}", IngestConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!("{level},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

/// Load the config file (or defaults), apply CLI overrides, then validate.
fn load_config(
    path: Option<PathBuf>,
    concurrency: Option<usize>,
    max_attempts: Option<u32>,
    lookback_days: Option<u32>,
) -> Result<IngestConfig> {
    let mut config = match &path {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IngestConfig::default(),
    };

    if let Some(n) = concurrency {
        config.concurrency.per_exchange = n;
    }
    if let Some(n) = max_attempts {
        config.retry.max_attempts = n;
    }
    if let Some(days) = lookback_days {
        config.lookback_days = days;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_ingest(config: &IngestConfig, exchanges: &[String], report_path: Option<PathBuf>) -> Result<()> {
    let exchanges = if exchanges.is_empty() {
        config.exchanges.clone()
    } else {
        config.select_exchanges(exchanges)?
    };

    let provider = YahooProvider::new().context("building HTTP client")?;
    let catalogs = JsonCatalogStore::new(&config.catalog_dir);
    let artifacts = CsvArtifactStore::new(&config.data_dir);
    let event_log = config.event_log.as_ref().map(JsonlEventLog::new);

    let today = chrono::Local::now().date_naive();
    let settings = RunSettings::from_config(config, today);

    let mut driver = PipelineDriver::new(&provider, &catalogs, &artifacts, settings);
    if let Some(log) = &event_log {
        driver = driver.with_events(log);
    }

    let report = driver.run_all(&exchanges);
    print_summary(&report);

    if let Some(path) = report_path {
        report
            .write_json(&path)
            .with_context(|| format!("writing report {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    // Per-symbol failures are recorded in the report, not turned into an exit code.
    Ok(())
}

fn print_summary(report: &IngestReport) {
    let elapsed = report.finished_at - report.started_at;
    println!();
    println!("=== Ingestion Report ===");
    println!(
        "Window:         {} to {}",
        report.window.start, report.window.end
    );
    println!("Elapsed:        {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    println!();
    print!("{}", report.summary_table());

    for exchange in &report.exchanges {
        if let Some(err) = &exchange.catalog_error {
            println!("WARNING: {} catalog not saved: {err}", exchange.exchange);
        }
        for rename in &exchange.renamed {
            match &rename.error {
                Some(err) => println!(
                    "WARNING: {} {} -> {} artifact not relocated: {err}",
                    exchange.exchange, rename.from, rename.to
                ),
                None => println!("Renamed:        {} {} -> {}", exchange.exchange, rename.from, rename.to),
            }
        }
    }
    println!();
}
