//! Command-line interface: argument definitions and command handlers.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use crate::batch::{BatchError, BatchOptions, run_batch};
use crate::calendar::TimeGrid;
use crate::config::{ConfigError, PlannerConfig};
use crate::error::{ParseError, PlanError};
use crate::forecast::{ForecastTable, NaiveForecast, tsf};
use crate::plan::TwoPhasePlanner;
use crate::prices::PriceSeries;
use crate::solver::HighsSolver;

#[derive(Parser, Debug)]
#[command(
    name = "ppoi-planner",
    version,
    about = "Two-phase MILP planner for campus activities and batteries"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan one or more instances and write their schedules
    Solve(SolveArgs),
    /// Produce a naive seasonal-offset forecast from history
    Forecast(ForecastArgs),
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Instance files in the ppoi format
    #[arg(long = "instance", required = true, num_args = 1..)]
    pub instances: Vec<PathBuf>,
    /// Per-entity forecast CSV (buildings then solar, no header)
    #[arg(long)]
    pub forecast: PathBuf,
    /// AEMO price CSV with SETTLEMENTDATE and RRP columns
    #[arg(long)]
    pub prices: PathBuf,
    /// Directory receiving one schedule per instance and summary.json
    #[arg(long)]
    pub out_dir: PathBuf,
    /// Planner configuration in TOML
    #[arg(long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,
    /// Built-in configuration preset
    #[arg(long)]
    pub preset: Option<String>,
    /// Per-phase time limit in seconds, overriding the configuration
    #[arg(long)]
    pub time_limit: Option<f64>,
    /// Worker threads, overriding the configuration (0 = one per CPU)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Replace existing schedule and period CSV files
    #[arg(long)]
    pub overwrite: bool,
    /// Also write a per-period CSV next to each schedule
    #[arg(long)]
    pub period_csv: bool,
}

#[derive(Args, Debug)]
pub struct ForecastArgs {
    /// History CSV, one row per entity (no header), or a `.tsf` file
    #[arg(long)]
    pub history: PathBuf,
    /// Drop `.tsf` observations before this time, e.g. 2020-04-25T14:00:00
    #[arg(long)]
    pub since: Option<NaiveDateTime>,
    /// Destination of the forecast CSV
    #[arg(long)]
    pub out: PathBuf,
    /// Number of periods to forecast
    #[arg(long, default_value_t = 2880)]
    pub periods: usize,
    /// Offset per history row, comma separated
    #[arg(long, value_delimiter = ',')]
    pub horizons: Option<Vec<usize>>,
    /// Season length for MASE backtesting
    #[arg(long)]
    pub season: Option<usize>,
}

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{failed} of {total} instances failed, see {}", summary.display())]
    JobsFailed {
        failed: usize,
        total: usize,
        summary: PathBuf,
    },
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns the first failure of the command; for `solve`, failed jobs are
/// reported after every job has run.
pub fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Solve(args) => solve(&args),
        Commands::Forecast(args) => forecast(&args),
    }
}

/// Resolves `--config` / `--preset` and the command-line overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] for an unreadable file, an unknown preset or
/// the first field failing validation.
pub fn load_config(args: &SolveArgs) -> Result<PlannerConfig, ConfigError> {
    let mut config = match (&args.config, &args.preset) {
        (Some(path), _) => PlannerConfig::from_toml_file(path)?,
        (None, Some(name)) => PlannerConfig::from_preset(name)?,
        (None, None) => PlannerConfig::november_2020(),
    };
    if let Some(secs) = args.time_limit {
        config.solver.time_limit_secs = secs;
    }
    if let Some(threads) = args.threads {
        config.batch.threads = threads;
    }

    match config.validate().into_iter().next() {
        Some(err) => Err(err),
        None => Ok(config),
    }
}

fn solve(args: &SolveArgs) -> Result<(), CliError> {
    let config = load_config(args)?;
    let grid = TimeGrid::derive(&config.calendar);
    let forecast = ForecastTable::from_path(&args.forecast)?;
    let prices = PriceSeries::from_path(&args.prices)?;
    info!(
        periods = grid.periods(),
        forecast_rows = forecast.len(),
        prices = prices.len(),
        "inputs loaded"
    );

    let planner = TwoPhasePlanner::new(HighsSolver, &config);
    let options = BatchOptions {
        out_dir: args.out_dir.clone(),
        overwrite: args.overwrite,
        period_csv: args.period_csv,
        threads: config.batch.threads,
    };
    let summary = run_batch(&planner, &grid, &forecast, &prices, &args.instances, &options)?;

    for job in &summary.jobs {
        match (&job.cost, &job.error) {
            (Some(cost), _) => {
                let status = job
                    .phase2
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                println!("{}: cost {cost:.4} ({status}) -> {}", job.instance, job.output);
                if let Some(report) = &job.report {
                    println!("{report}");
                }
            }
            (None, Some(err)) => println!("{}: failed: {err}", job.instance),
            (None, None) => println!("{}: failed", job.instance),
        }
    }

    if summary.failure > 0 {
        return Err(CliError::JobsFailed {
            failed: summary.failure,
            total: summary.num_jobs,
            summary: summary.summary_path,
        });
    }
    Ok(())
}

fn forecast(args: &ForecastArgs) -> Result<(), CliError> {
    let defaults = PlannerConfig::default().forecast;
    let horizons = args.horizons.clone().unwrap_or(defaults.horizons);
    let season = args.season.unwrap_or(defaults.mase_season);

    let history = read_history(&args.history, args.since)?;
    let naive = NaiveForecast::new(horizons);
    let predicted = naive.forecast(&history, args.periods)?;
    write_table(&predicted, &args.out)?;
    info!(
        rows = predicted.len(),
        periods = args.periods,
        out = %args.out.display(),
        "forecast written"
    );

    let scores = naive.backtest(&history, args.periods, season);
    for (label, score) in history.labels.iter().zip(scores) {
        match score {
            Some(score) => println!("{label}: MASE {score:.4}"),
            None => println!("{label}: MASE n/a"),
        }
    }
    Ok(())
}

fn read_history(path: &Path, since: Option<NaiveDateTime>) -> Result<ForecastTable, ParseError> {
    let is_tsf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsf"));
    if !is_tsf {
        return ForecastTable::from_path(path);
    }
    let dataset = tsf::read_tsf(path)?;
    info!(
        series = dataset.series.len(),
        minutes = dataset.resolution_minutes(),
        "loaded tsf history"
    );
    dataset.extract(&path.display().to_string(), since)
}

fn write_table(table: &ForecastTable, path: &Path) -> Result<(), CliError> {
    let io_err = |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    table.write_csv(BufWriter::new(file)).map_err(io_err)
}
