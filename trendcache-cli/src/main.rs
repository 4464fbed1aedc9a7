//! TrendCache CLI: evaluate cached indicators over a bar series.
//!
//! Commands:
//! - `compute`: load or synthesize bars, evaluate an indicator set over the
//!   whole series, print a table or JSON report, optionally export CSV
//! - `stream`: feed bars into a bounded series one at a time, with intrabar
//!   price updates, and print the indicator values as they evolve

mod data;
mod report;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use trendcache_core::precompute::{compute_warmup, precompute, IndicatorValues};
use trendcache_core::{Bar, BarSeries, EngineConfig, Indicator, SeriesWindow};

use report::{
    build_all, export_values_csv, indicator_reports, parse_specs, print_table, write_export,
    ComputeReport,
};

const DEFAULT_INDICATORS: &str = "sma:20,ema:50,rsi:14,atr:14";

#[derive(Parser)]
#[command(
    name = "trendcache",
    about = "TrendCache CLI: lazily cached technical indicators"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate indicators over a whole series.
    Compute {
        /// CSV file with `time,open,high,low,close[,volume]` columns.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Number of synthetic bars when no CSV is given.
        #[arg(long, default_value_t = 2520)]
        bars: usize,

        /// RNG seed for synthetic bars.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Keep only the newest N bars.
        #[arg(long)]
        max_bars: Option<usize>,

        /// Comma-separated indicators: sma, ema, mma, rsi, atr, momentum, roc (e.g. sma:20).
        #[arg(long, default_value = DEFAULT_INDICATORS)]
        indicators: String,

        /// Engine config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Query every index from a rayon pool instead of in order.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write all computed values to this CSV file.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Rows shown in the table.
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
    /// Stream synthetic bars into a bounded series.
    Stream {
        /// Number of bars to stream.
        #[arg(long, default_value_t = 500)]
        bars: usize,

        /// RNG seed for synthetic bars and ticks.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Maximum bar count of the streaming series.
        #[arg(long, default_value_t = 200)]
        window: usize,

        /// Comma-separated indicators (see `compute`).
        #[arg(long, default_value = DEFAULT_INDICATORS)]
        indicators: String,

        /// Engine config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print a line every N bars.
        #[arg(long, default_value_t = 50)]
        every: usize,

        /// Intrabar price updates applied to each bar after it is added.
        #[arg(long, default_value_t = 3)]
        updates: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compute {
            csv,
            bars,
            seed,
            max_bars,
            indicators,
            config,
            parallel,
            format,
            export,
            tail,
        } => run_compute(ComputeArgs {
            csv,
            bars,
            seed,
            max_bars,
            indicators,
            config,
            parallel,
            format,
            export,
            tail,
        }),
        Commands::Stream {
            bars,
            seed,
            window,
            indicators,
            config,
            every,
            updates,
        } => run_stream(bars, seed, window, &indicators, config.as_deref(), every, updates),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            info!(path = %path.display(), ?config, "loaded engine config");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

// ─── compute ─────────────────────────────────────────────────────────

struct ComputeArgs {
    csv: Option<PathBuf>,
    bars: usize,
    seed: u64,
    max_bars: Option<usize>,
    indicators: String,
    config: Option<PathBuf>,
    parallel: bool,
    format: OutputFormat,
    export: Option<PathBuf>,
    tail: usize,
}

fn run_compute(args: ComputeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let specs = parse_specs(&args.indicators)?;
    if specs.is_empty() {
        bail!("no indicators requested");
    }

    let (name, bars) = match &args.csv {
        Some(path) => (path.display().to_string(), data::load_csv(path)?),
        None => (
            format!("synthetic(seed={})", args.seed),
            data::synthetic_bars(args.bars, args.seed)?,
        ),
    };
    let series = Arc::new(build_series(&name, bars, args.max_bars)?);
    info!(
        series = %name,
        bars = series.bar_count(),
        removed = series.removed_bars_count(),
        "series ready"
    );

    let indicators = build_all(&series, &specs, &config);
    let started = Instant::now();
    let values = if args.parallel {
        precompute_parallel(&indicators)?
    } else {
        precompute(&indicators)?
    };
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    debug!(elapsed_ms, parallel = args.parallel, "indicators evaluated");

    let end_index = series.end_index();
    let report = ComputeReport {
        series: name,
        bar_count: series.bar_count(),
        begin_index: series.begin_index(),
        end_index,
        warmup: compute_warmup(&indicators),
        parallel: args.parallel,
        elapsed_ms,
        indicators: indicator_reports(&indicators, &values, end_index),
    };

    match args.format {
        OutputFormat::Table => print_table(&report, &values, args.tail),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(path) = &args.export {
        let csv = export_values_csv(&series, &indicators, &values)?;
        write_export(path, &csv)?;
        info!(path = %path.display(), "exported indicator values");
        if matches!(args.format, OutputFormat::Table) {
            println!("Exported values to {}", path.display());
        }
    }

    Ok(())
}

fn build_series(name: &str, bars: Vec<Bar>, max_bars: Option<usize>) -> Result<BarSeries> {
    let series = match max_bars {
        Some(max) => BarSeries::with_maximum_bar_count(name, max)?,
        None => BarSeries::new(name),
    };
    for bar in bars {
        series.add_bar(bar)?;
    }
    Ok(series)
}

/// Same result as `precompute`, but every index of every indicator is
/// queried from the rayon pool in arbitrary order.
fn precompute_parallel(indicators: &[Arc<dyn Indicator>]) -> Result<IndicatorValues> {
    let Some(first) = indicators.first() else {
        return Ok(IndicatorValues::default());
    };
    let window = first.window();
    let (Some(begin), Some(end)) = (window.begin_index(), window.end_index()) else {
        return Ok(IndicatorValues::default());
    };

    let columns = indicators
        .par_iter()
        .map(|indicator| -> Result<(String, Vec<f64>)> {
            let column = (begin..=end)
                .into_par_iter()
                .map(|index| indicator.value(index))
                .collect::<trendcache_core::Result<Vec<f64>>>()?;
            Ok((indicator.name().to_string(), column))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut values = IndicatorValues::new(begin);
    for (name, column) in columns {
        values.insert(name, column);
    }
    Ok(values)
}

// ─── stream ──────────────────────────────────────────────────────────

fn run_stream(
    bar_count: usize,
    seed: u64,
    window: usize,
    indicators: &str,
    config: Option<&Path>,
    every: usize,
    updates: usize,
) -> Result<()> {
    let config = load_config(config)?;
    let specs = parse_specs(indicators)?;
    if specs.is_empty() {
        bail!("no indicators requested");
    }
    let bars = data::synthetic_bars(bar_count, seed)?;
    let series = Arc::new(BarSeries::with_maximum_bar_count(
        format!("stream(seed={seed})"),
        window,
    )?);
    // Built on the empty series so the caches take the bounded capacity.
    let indicators = build_all(&series, &specs, &config);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let every = every.max(1);

    print!("{:>8} {:>8} {:>12}", "index", "begin", "close");
    for ind in &indicators {
        print!(" {:>14}", ind.name());
    }
    println!();

    for (n, bar) in bars.into_iter().enumerate() {
        series.add_bar(bar)?;
        let mut price = bar.close;
        for _ in 0..updates {
            price = data::tick(&mut rng, price);
            series.add_price(price)?;
            if let Some(end) = series.end_index() {
                // Touch the tip so every update goes through the cache.
                for ind in &indicators {
                    ind.value(end)?;
                }
            }
        }

        let Some(end) = series.end_index() else {
            continue;
        };
        let mut row = Vec::with_capacity(indicators.len());
        for ind in &indicators {
            row.push(ind.value(end)?);
        }
        if (n + 1) % every == 0 {
            let last = series.bar(end)?;
            print!(
                "{:>8} {:>8} {:>12.4}",
                end,
                series.begin_index().unwrap_or(0),
                last.close
            );
            for value in row {
                print!(" {:>14.4}", value);
            }
            println!();
        }
    }

    println!();
    for ind in &indicators {
        if let Some(stats) = ind.cache_stats() {
            println!(
                "{:<14} retained {:>5}  first {:>6}  hits {:>7}  misses {:>7}",
                ind.name(),
                stats.retained,
                stats
                    .first_cached_index
                    .map_or("-".to_string(), |i| i.to_string()),
                stats.hits,
                stats.misses
            );
        }
    }
    Ok(())
}
