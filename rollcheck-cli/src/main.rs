//! rollcheck CLI: fetch daily bars, roll them up to months, and validate the
//! result against reference spreadsheets.
//!
//! Commands:
//! - `fetch`: download daily bars from Yahoo Finance into the Parquet cache
//! - `rollup`: aggregate cached bars to monthly rows (CSV and/or SQLite)
//! - `validate`: reconcile monthly max closes against every configured reference
//! - `inspect`: show the layout of an unfamiliar reference document
//! - `cache status`: report cached instruments and date ranges

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rollcheck_core::data::{
    download_instruments, DataProvider, LogProgress, ParquetCache, RequestGovernor, Universe,
    YahooProvider,
};
use rollcheck_core::reference::inspect::{find_marker_rows, preview};
use rollcheck_core::reference::load_grid;
use rollcheck_core::store::MonthlyStore;
use rollcheck_runner::{
    load_bars, monthly_from_cache, read_monthly_csv, render_markdown, render_mismatches,
    render_summary, rollup_batch, validate_batch, write_daily_csv, write_monthly_csv, LoadOptions,
    RollupBatch, RunConfig, ValidationOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rollcheck",
    about = "Monthly OHLCV rollup and reference reconciliation"
)]
struct Cli {
    /// Run configuration. Built-in defaults apply when the file is absent.
    #[arg(long, global = true, default_value = "rollcheck.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Instrument selection shared by `fetch` and `rollup`.
#[derive(clap::Args)]
struct Selection {
    /// Instruments (e.g. AAPL TSLA). Defaults to the whole universe.
    instruments: Vec<String>,

    /// Restrict to one universe tier (e.g. tier1).
    #[arg(long, conflicts_with = "instruments")]
    tier: Option<String>,

    /// Start date (YYYY-MM-DD). Overrides the config.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Overrides the config; defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Keep raw prices instead of scaling them by adjclose / close.
    #[arg(long, default_value_t = false)]
    no_adjust: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily bars from Yahoo Finance and cache them as Parquet.
    Fetch {
        #[command(flatten)]
        selection: Selection,

        /// Re-download even if the cache covers the range.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Aggregate daily bars into monthly rows.
    Rollup {
        #[command(flatten)]
        selection: Selection,

        /// Use cached bars only; never touch the network.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Monthly CSV output.
        #[arg(long, default_value = "output/monthly.csv")]
        out: PathBuf,

        /// Also dump the daily bars to this CSV.
        #[arg(long)]
        daily_out: Option<PathBuf>,

        /// Upsert the monthly rows into the SQLite store from the config.
        #[arg(long, default_value_t = false)]
        store: bool,
    },
    /// Reconcile monthly max closes against the configured references.
    Validate {
        /// Monthly CSV from `rollup`. Without it, aggregates are computed
        /// from the cache.
        #[arg(long)]
        monthly: Option<PathBuf>,

        /// Tolerance profile applied to every reference.
        #[arg(long)]
        profile: Option<String>,

        /// Write a Markdown report here.
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Print the report as JSON instead of the summary table.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Mismatch lines shown per instrument (0 = all).
        #[arg(long, default_value_t = 10)]
        mismatches: usize,
    },
    /// Show the first rows and marker rows of a reference document.
    Inspect {
        file: PathBuf,

        /// Rows to preview.
        #[arg(long, default_value_t = 15)]
        rows: usize,

        /// Case-insensitive markers to search for.
        #[arg(long = "marker", default_values_t = ["MAX".to_string(), "Close".to_string(), "Grand Total".to_string()])]
        markers: Vec<String>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached instruments, date ranges and bar counts.
    Status,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match load_config(&cli.config) {
        Ok(config) => run(cli.command, &config),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rollcheck=debug" } else { "rollcheck=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<RunConfig> {
    if path.exists() {
        RunConfig::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        tracing::debug!(path = %path.display(), "config not found, using defaults");
        Ok(RunConfig::default())
    }
}

/// Returns `Ok(false)` when the command completed but its check failed.
fn run(command: Commands, config: &RunConfig) -> Result<bool> {
    match command {
        Commands::Fetch { selection, force } => run_fetch(config, &selection, force),
        Commands::Rollup {
            selection,
            offline,
            out,
            daily_out,
            store,
        } => run_rollup(config, &selection, offline, &out, daily_out.as_deref(), store),
        Commands::Validate {
            monthly,
            profile,
            markdown,
            json,
            mismatches,
        } => run_validate(
            config,
            monthly.as_deref(),
            profile,
            markdown.as_deref(),
            json,
            mismatches,
        ),
        Commands::Inspect {
            file,
            rows,
            markers,
        } => run_inspect(&file, rows, &markers).map(|()| true),
        Commands::Cache {
            action: CacheAction::Status,
        } => run_cache_status(config).map(|()| true),
    }
}

fn universe(config: &RunConfig) -> Result<Universe> {
    match &config.data.universe {
        Some(path) => Universe::from_file(path).with_context(|| "loading universe"),
        None => Ok(Universe::default_us()),
    }
}

fn select_instruments(config: &RunConfig, selection: &Selection) -> Result<Vec<String>> {
    if !selection.instruments.is_empty() {
        return Ok(selection
            .instruments
            .iter()
            .map(|s| s.trim().to_uppercase())
            .collect());
    }
    let universe = universe(config)?;
    match &selection.tier {
        Some(tier) => match universe.tier_instruments(tier) {
            Some(ids) => Ok(ids.to_vec()),
            None => bail!(
                "unknown tier '{tier}'. Valid: {}",
                universe.tier_names().join(", ")
            ),
        },
        None => Ok(universe
            .all_instruments()
            .into_iter()
            .map(str::to_string)
            .collect()),
    }
}

fn date_range(config: &RunConfig, selection: &Selection) -> Result<(NaiveDate, NaiveDate)> {
    let start = selection.start.unwrap_or(config.data.start_date);
    let end = selection.end.unwrap_or_else(|| config.data.end_date_or_today());
    if start > end {
        bail!("start date {start} is after end date {end}");
    }
    Ok((start, end))
}

fn provider(config: &RunConfig, selection: &Selection) -> Result<YahooProvider> {
    let governor = RequestGovernor::new(
        Duration::from_millis(config.data.request_delay_ms),
        Duration::from_secs(30 * 60),
        3,
    );
    let provider = YahooProvider::new(Arc::new(governor))?;
    Ok(if selection.no_adjust {
        provider.without_auto_adjust()
    } else {
        provider
    })
}

fn run_fetch(config: &RunConfig, selection: &Selection, force: bool) -> Result<bool> {
    let instruments = select_instruments(config, selection)?;
    let (start, end) = date_range(config, selection)?;
    let ids: Vec<&str> = instruments.iter().map(String::as_str).collect();

    let provider = provider(config, selection)?;
    let cache = ParquetCache::new(&config.data.cache_dir);
    let summary = download_instruments(&provider, &cache, &ids, start, end, force, &LogProgress);

    println!(
        "Fetched {}/{} instruments ({} already cached, {} failed)",
        summary.succeeded, summary.total, summary.skipped, summary.failed
    );
    for (instrument, err) in &summary.errors {
        eprintln!("  {instrument}: {err}");
    }
    Ok(summary.all_succeeded())
}

fn run_rollup(
    config: &RunConfig,
    selection: &Selection,
    offline: bool,
    out: &Path,
    daily_out: Option<&Path>,
    store: bool,
) -> Result<bool> {
    let instruments = select_instruments(config, selection)?;
    let (start, end) = date_range(config, selection)?;
    let ids: Vec<&str> = instruments.iter().map(String::as_str).collect();

    let cache = ParquetCache::new(&config.data.cache_dir);
    let yahoo = if offline {
        None
    } else {
        Some(provider(config, selection)?)
    };
    let provider_ref = yahoo.as_ref().map(|p| p as &dyn DataProvider);
    let opts = LoadOptions {
        start,
        end,
        offline,
        force: false,
        skip_missing: false,
    };
    let loaded = load_bars(&ids, &cache, provider_ref, Some(&LogProgress), &opts)?;
    tracing::info!(
        bars = loaded.bar_count(),
        dataset = %loaded.dataset_hash,
        "daily bars loaded"
    );

    if let Some(path) = daily_out {
        let rows = write_daily_csv(path, loaded.bars.values().flatten())?;
        println!("Daily bars: {rows} rows -> {}", path.display());
    }

    let batch = rollup_batch(&loaded.bars);
    let rows = write_monthly_csv(out, &batch.all_aggregates())?;
    println!(
        "Monthly rows: {rows} for {} instruments -> {}",
        batch.instrument_count(),
        out.display()
    );
    if batch.dropped_bars > 0 {
        println!("Dropped {} bars with no price fields", batch.dropped_bars);
    }

    if store {
        let summary = store_batch(config, &batch)?;
        println!(
            "Stored {} monthly rows in {}",
            summary.rows,
            config.data.database.display()
        );
        for (tier, count) in &summary.tier_counts {
            println!("  tier {tier}: {count} instruments");
        }
    }
    Ok(true)
}

struct StoreSummary {
    rows: usize,
    /// Instruments per tier in the whole store after the write.
    tier_counts: Vec<(u8, usize)>,
}

fn store_batch(config: &RunConfig, batch: &RollupBatch) -> Result<StoreSummary> {
    let mut store = MonthlyStore::open(&config.data.database)
        .with_context(|| format!("opening {}", config.data.database.display()))?;
    write_batch(&mut store, &universe(config)?, batch)
}

fn write_batch(
    store: &mut MonthlyStore,
    universe: &Universe,
    batch: &RollupBatch,
) -> Result<StoreSummary> {
    let mut rows = 0;
    let mut tiers = Vec::new();
    for (instrument, aggregates) in &batch.monthly {
        let tier = universe.tier_of(instrument).map_or(0, tier_number);
        if let Some(previous) = store.instrument(instrument)? {
            if previous.tier != tier {
                tracing::info!(%instrument, from = previous.tier, to = tier, "instrument re-tiered");
            }
        }
        store.upsert_instrument(instrument, instrument, tier)?;
        rows += store.upsert_aggregates(instrument, aggregates)?;
        tiers.push(tier);
    }

    tiers.sort_unstable();
    tiers.dedup();
    let tier_counts = tiers
        .into_iter()
        .map(|t| -> Result<(u8, usize)> { Ok((t, store.count_instruments_in_tier(t)?)) })
        .collect::<Result<Vec<_>>>()?;
    Ok(StoreSummary { rows, tier_counts })
}

/// `tier2` → 2; names without a trailing number map to 0.
fn tier_number(name: &str) -> u8 {
    let digits: String = name
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().unwrap_or(0)
}

fn run_validate(
    config: &RunConfig,
    monthly: Option<&Path>,
    profile: Option<String>,
    markdown: Option<&Path>,
    json: bool,
    mismatch_limit: usize,
) -> Result<bool> {
    if config.references.is_empty() {
        bail!("no references configured");
    }

    let mut config = config.clone();
    if let Some(name) = profile {
        config.profile(&name)?;
        for reference in &mut config.references {
            reference.profile = Some(name.clone());
        }
    }

    let batch = match monthly {
        Some(path) => RollupBatch::from_aggregates(read_monthly_csv(path)?),
        None => {
            let cache = ParquetCache::new(&config.data.cache_dir);
            monthly_from_cache(&config, &cache)?
        }
    };

    let report = validate_batch(&config, &batch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
        for outcome in &report.outcomes {
            match outcome {
                ValidationOutcome::Validated { result, .. } if !result.mismatches.is_empty() => {
                    println!();
                    print!("{}", render_mismatches(result, mismatch_limit));
                }
                ValidationOutcome::Unavailable {
                    instrument, reason, ..
                } => {
                    println!();
                    println!("{instrument}: {reason}");
                }
                ValidationOutcome::Validated { .. } => {}
            }
        }
    }

    if let Some(path) = markdown {
        std::fs::write(path, render_markdown(&report))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    Ok(report.all_passed())
}

fn run_inspect(file: &Path, rows: usize, markers: &[String]) -> Result<()> {
    let grid = load_grid(file)?;
    println!("{}: {} rows", file.display(), grid.height());
    println!();

    println!("--- First {rows} rows ---");
    for (i, line) in preview(&grid, rows).iter().enumerate() {
        println!("{i:>4}  {line}");
    }

    let needles: Vec<&str> = markers.iter().map(String::as_str).collect();
    let found = find_marker_rows(&grid, &needles);
    println!();
    println!("--- Rows mentioning {} ---", markers.join(" / "));
    if found.is_empty() {
        println!("(none)");
    }
    for row in found {
        println!("{:>4}  {}", row.index, row.text);
    }
    Ok(())
}

fn run_cache_status(config: &RunConfig) -> Result<()> {
    let cache = ParquetCache::new(&config.data.cache_dir);
    let instruments = cache.list_instruments();
    if instruments.is_empty() {
        println!("Cache is empty: {}", config.data.cache_dir.display());
        return Ok(());
    }

    let ids: Vec<&str> = instruments.iter().map(String::as_str).collect();
    println!("Cache: {}", config.data.cache_dir.display());
    println!("Instruments: {}", ids.len());
    println!();
    println!("{:<8} {:<25} {:>10}", "ID", "Date Range", "Bars");
    println!("{}", "-".repeat(45));
    for status in cache.status(&ids) {
        let range = match (status.start_date, status.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(no meta)".to_string(),
        };
        let bars = status
            .bar_count
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!("{:<8} {:<25} {:>10}", status.instrument, range, bars);
    }
    Ok(())
}
