//! Walk-forward optimization CLI.
//!
//! Usage:
//!
//! # Run walk-forward optimization
//! wfo-backtest optimize --config config/default.toml --data data/spy.csv
//!
//! # Print the window schedule without evaluating anything
//! wfo-backtest windows --config config/default.toml --data data/spy.csv

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{error, info, warn};

use wfo_backtest::analysis::{render_sensitivity, sensitivity, write_sensitivity_csv};
use wfo_backtest::data::{load_csv, PriceSeries};
use wfo_backtest::walkforward::{ProgressObserver, WindowScheduler};
use wfo_backtest::{
    AggregationMethod, MovingAverageCrossover, ParameterRanges, RobustParameters,
    WalkForwardConfig, WalkForwardOptimizer, WalkForwardReport, WindowResult,
};

#[derive(Parser)]
#[command(name = "wfo-backtest")]
#[command(about = "Walk-forward parameter optimization for trading strategies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run walk-forward parameter optimization
    Optimize {
        /// Path to run configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to price CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Robust parameter aggregation: median, mean or mode
        #[arg(short, long, default_value = "median")]
        robust: String,
    },

    /// Print the window schedule without running the optimizer
    Windows {
        /// Path to run configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Path to price CSV
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Contents of a TOML run file.
#[derive(Debug, Deserialize)]
struct RunFile {
    #[serde(default)]
    walk_forward: WalkForwardConfig,
    #[serde(default)]
    strategy: MovingAverageCrossover,
    #[serde(default)]
    parameters: ParameterRanges,
}

impl RunFile {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let run: RunFile = toml::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(run)
    }
}

/// Drives an `indicatif` bar from optimizer progress events.
struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
                .progress_chars("=>-"),
        );
        Ok(Self { bar })
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_run_started(&self, windows: usize, combinations: usize) {
        self.bar.set_length(windows as u64);
        self.bar
            .set_message(format!("{} combinations per window", combinations));
    }

    fn on_window_completed(&self, result: &WindowResult) {
        self.bar.set_message(format!("window {} {}", result.window, result.status.as_str()));
        self.bar.inc(1);
    }

    fn on_run_completed(&self, report: &WalkForwardReport) {
        self.bar
            .finish_with_message(format!("{} windows", report.len()));
    }
}

fn load_series(path: &Path) -> Result<PriceSeries> {
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("series")
        .to_uppercase();
    let series = load_csv(path, &symbol)
        .with_context(|| format!("Failed to load price data from {}", path.display()))?;
    info!(
        "Loaded {} observations for {} ({} to {})",
        series.len(),
        series.symbol(),
        series.first_date().map(|d| d.to_string()).unwrap_or_default(),
        series.last_date().map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(series)
}

fn cmd_optimize(config: &Path, data: &Path, output: &Path, robust: &str) -> Result<()> {
    let run = RunFile::load(config)?;
    let series = load_series(data)?;
    let method = AggregationMethod::parse(robust);

    let observer = Arc::new(ProgressBarObserver::new()?);
    let optimizer = WalkForwardOptimizer::new(run.strategy)
        .with_config(run.walk_forward)
        .with_ranges(run.parameters)
        .with_observer(observer);

    let report = optimizer
        .optimize(&series)
        .context("Walk-forward optimization failed")?;

    if report.is_empty() {
        warn!(
            "Series of {} observations is too short for a single window",
            series.len()
        );
    } else if report.all_degenerate() {
        warn!("Every window is degenerate; check the strategy and parameter ranges");
    }

    let robust = RobustParameters::from_report(&report, method);
    let records = sensitivity(&report);

    println!();
    print!("{}", report.summary().render());
    println!();
    print!("{}", robust);
    println!();
    println!("Parameter sensitivity:");
    print!("{}", render_sensitivity(&records));

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let csv_path = output.join("walk_forward.csv");
    report.write_csv(File::create(&csv_path)?)?;

    let json_path = output.join("walk_forward.json");
    fs::write(&json_path, report.to_json()?)?;

    let sensitivity_path = output.join("sensitivity.csv");
    write_sensitivity_csv(&records, File::create(&sensitivity_path)?)?;

    info!("Results written to {}", output.display());
    Ok(())
}

fn cmd_windows(config: &Path, data: &Path) -> Result<()> {
    let run = RunFile::load(config)?;
    let cfg = run.walk_forward;
    cfg.validate()?;
    let series = load_series(data)?;
    let bars = series.bars();

    let scheduler = WindowScheduler::new(cfg.in_sample_size, cfg.out_sample_size, cfg.step_size);
    let bounds = scheduler.bounds(bars.len());
    if bounds.is_empty() {
        bail!(
            "No walk-forward windows: {} observations, need at least {}",
            bars.len(),
            cfg.in_sample_size + cfg.out_sample_size
        );
    }

    println!(
        "{} windows (in-sample {}, out-of-sample {}, step {}), {} combinations each",
        bounds.len(),
        cfg.in_sample_size,
        cfg.out_sample_size,
        cfg.step_size,
        run.parameters.total_combinations()
    );
    for b in &bounds {
        println!(
            "  Window {:>3}: IS {} to {}, OOS {} to {}",
            b.index,
            bars[b.in_sample.start].date,
            bars[b.in_sample.end - 1].date,
            bars[b.out_sample.start].date,
            bars[b.out_sample.end - 1].date
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wfo_backtest=info".parse()?),
        )
        .init();

    // Evaluator panics are caught per window; keep them in the log stream.
    std::panic::set_hook(Box::new(|info| error!("{}", info)));

    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            config,
            data,
            output,
            robust,
        } => cmd_optimize(&config, &data, &output, &robust)?,
        Commands::Windows { config, data } => cmd_windows(&config, &data)?,
    }

    Ok(())
}
