//! Parallel planning of many instances against shared forecast and price inputs.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::calendar::TimeGrid;
use crate::error::{ParseError, PlanError};
use crate::forecast::ForecastTable;
use crate::instance::parse::read_instance;
use crate::io::export::export_csv;
use crate::plan::{PlanOutcome, PlanReport, TwoPhasePlanner};
use crate::prices::PriceSeries;
use crate::solver::{MilpSolver, SolveStatus};

/// File name of the summary written next to the schedules.
pub const SUMMARY_FILE: &str = "summary.json";

/// Where and how job outputs are written.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub out_dir: PathBuf,
    /// Replace existing schedules and period CSVs instead of failing the job.
    pub overwrite: bool,
    /// Also write `<stem>.periods.csv` for every solved instance.
    pub period_csv: bool,
    /// Worker threads; `0` lets rayon pick one per CPU.
    pub threads: usize,
}

/// Outcome of one instance, as recorded in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub instance: String,
    pub output: String,
    /// `"ok"` or `"error"`.
    pub status: String,
    pub cost: Option<f64>,
    pub energy_cost: Option<f64>,
    pub peak_bound: Option<f64>,
    pub phase1: Option<SolveStatus>,
    pub phase2: Option<SolveStatus>,
    pub report: Option<PlanReport>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Aggregate of a batch run, serialised to [`SUMMARY_FILE`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub created_at: DateTime<Utc>,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    pub jobs: Vec<JobRecord>,
    #[serde(skip)]
    pub summary_path: PathBuf,
}

/// Failures of the batch itself; job failures are recorded, not returned.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot build worker pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot serialise batch summary: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Plans every instance in `instances` on a rayon pool.
///
/// Each job parses its instance, runs both phases and writes the schedule
/// to `<out_dir>/<instance file name>`. When two instances share a file name
/// only the first is planned and the others fail with
/// [`PlanError::DuplicateOutput`]. Job failures are logged and recorded in
/// the summary; the remaining jobs still run.
///
/// # Errors
///
/// Returns a [`BatchError`] if the output directory, the pool or the
/// summary file cannot be created.
pub fn run_batch<S: MilpSolver>(
    planner: &TwoPhasePlanner<S>,
    grid: &TimeGrid,
    forecast: &ForecastTable,
    prices: &PriceSeries,
    instances: &[PathBuf],
    options: &BatchOptions,
) -> Result<BatchSummary, BatchError> {
    fs::create_dir_all(&options.out_dir).map_err(|source| BatchError::Io {
        path: options.out_dir.clone(),
        source,
    })?;

    let pool = ThreadPoolBuilder::new().num_threads(options.threads).build()?;
    info!(
        jobs = instances.len(),
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let outputs = assign_outputs(&options.out_dir, instances);
    let jobs: Vec<JobRecord> = pool.install(|| {
        instances
            .par_iter()
            .zip(outputs)
            .map(|(path, output)| {
                let shown = output.as_ref().ok().cloned();
                let result = output.and_then(|output| {
                    run_job(planner, grid, forecast, prices, path, &output, options)
                });
                record(path, shown, result)
            })
            .collect()
    });

    let success = jobs.iter().filter(|j| j.is_ok()).count();
    let summary = BatchSummary {
        created_at: Utc::now(),
        num_jobs: jobs.len(),
        success,
        failure: jobs.len() - success,
        jobs,
        summary_path: options.out_dir.join(SUMMARY_FILE),
    };
    write_summary(&summary)?;

    info!(
        success = summary.success,
        failure = summary.failure,
        summary = %summary.summary_path.display(),
        "batch finished"
    );
    Ok(summary)
}

fn run_job<S: MilpSolver>(
    planner: &TwoPhasePlanner<S>,
    grid: &TimeGrid,
    forecast: &ForecastTable,
    prices: &PriceSeries,
    path: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<PlanOutcome, PlanError> {
    let instance = read_instance(path)?;
    let outcome = planner.plan_tables(&instance, grid, forecast, prices)?;
    outcome.document.write_to_path(output, options.overwrite)?;

    if options.period_csv {
        let csv_path = output.with_extension("periods.csv");
        export_csv(&outcome.periods, &csv_path, options.overwrite)?;
    }
    Ok(outcome)
}

/// `<out_dir>/<file name of instance>`.
fn output_path(out_dir: &Path, instance: &Path) -> Result<PathBuf, PlanError> {
    match instance.file_name() {
        Some(name) => Ok(out_dir.join(name)),
        None => {
            let origin = instance.display().to_string();
            Err(ParseError::invalid(&origin, "path has no file name").into())
        }
    }
}

/// Output paths in input order; repeats of an earlier output are errors.
fn assign_outputs(out_dir: &Path, instances: &[PathBuf]) -> Vec<Result<PathBuf, PlanError>> {
    let mut first_by_output: HashMap<PathBuf, &Path> = HashMap::new();
    instances
        .iter()
        .map(|instance| {
            let output = output_path(out_dir, instance)?;
            if let Some(first) = first_by_output.get(&output) {
                return Err(PlanError::DuplicateOutput {
                    path: output,
                    first: first.to_path_buf(),
                });
            }
            first_by_output.insert(output.clone(), instance);
            Ok(output)
        })
        .collect()
}

fn record(
    path: &Path,
    output: Option<PathBuf>,
    result: Result<PlanOutcome, PlanError>,
) -> JobRecord {
    let instance = path.display().to_string();
    let output = output.map(|p| p.display().to_string()).unwrap_or_default();

    match result {
        Ok(outcome) => {
            info!(%instance, cost = outcome.cost, "job done");
            JobRecord {
                instance,
                output,
                status: "ok".to_string(),
                cost: Some(outcome.cost),
                energy_cost: Some(outcome.energy_cost),
                peak_bound: Some(outcome.peak_bound),
                phase1: Some(outcome.phase1.status),
                phase2: Some(outcome.phase2.status),
                report: Some(outcome.report),
                error: None,
            }
        }
        Err(err) => {
            warn!(%instance, error = %err, "job failed");
            JobRecord {
                instance,
                output,
                status: "error".to_string(),
                cost: None,
                energy_cost: None,
                peak_bound: None,
                phase1: None,
                phase2: None,
                report: None,
                error: Some(err.to_string()),
            }
        }
    }
}

fn write_summary(summary: &BatchSummary) -> Result<(), BatchError> {
    let path = &summary.summary_path;
    let file = File::create(path).map_err(|source| BatchError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::model::Model;
    use crate::solver::{SolveError, SolveLimits, SolverOutput};

    struct Infeasible;

    impl MilpSolver for Infeasible {
        fn name(&self) -> &str {
            "infeasible"
        }

        fn solve(&self, _: &Model, _: &SolveLimits) -> Result<SolverOutput, SolveError> {
            Err(SolveError::Infeasible)
        }
    }

    #[test]
    fn output_keeps_instance_file_name() {
        let out = output_path(Path::new("out"), Path::new("data/small_0.txt"));
        assert_eq!(out.unwrap(), PathBuf::from("out/small_0.txt"));
        assert!(output_path(Path::new("out"), Path::new("..")).is_err());
    }

    #[test]
    fn failed_jobs_are_recorded_in_summary() {
        let dir = tempfile::tempdir().unwrap();

        let instance = dir.path().join("tiny.txt");
        fs::write(&instance, "ppoi 1 0 0 0 0\nw 0 1 1\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let config = PlannerConfig::default();
        let grid = TimeGrid::derive(&config.calendar);
        let forecast = ForecastTable {
            labels: vec!["0".to_string()],
            rows: vec![vec![1.0; grid.periods()]],
        };
        let prices = PriceSeries::constant(50.0, grid.periods());
        let options = BatchOptions {
            out_dir: dir.path().join("out"),
            overwrite: false,
            period_csv: false,
            threads: 2,
        };

        let summary = run_batch(
            &TwoPhasePlanner::new(Infeasible, &config),
            &grid,
            &forecast,
            &prices,
            &[instance, missing],
            &options,
        )
        .unwrap();

        assert_eq!(summary.num_jobs, 2);
        assert_eq!(summary.failure, 2);
        assert!(summary.jobs[0].error.as_deref().is_some_and(|e| e.contains("infeasible")));
        assert!(summary.jobs[1].error.as_deref().is_some_and(|e| e.contains("missing.txt")));

        let text = fs::read_to_string(&summary.summary_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["num_jobs"], 2);
        assert_eq!(json["jobs"][0]["status"], "error");
        assert!(!options.out_dir.join("tiny.txt").exists());
    }

    #[test]
    fn repeated_file_names_keep_only_the_first() {
        let outputs = assign_outputs(
            Path::new("out"),
            &[
                PathBuf::from("week1/small_0.txt"),
                PathBuf::from("week1/small_1.txt"),
                PathBuf::from("week2/small_0.txt"),
            ],
        );
        assert_eq!(outputs[0].as_ref().unwrap(), Path::new("out/small_0.txt"));
        assert_eq!(outputs[1].as_ref().unwrap(), Path::new("out/small_1.txt"));
        match &outputs[2] {
            Err(PlanError::DuplicateOutput { path, first }) => {
                assert_eq!(path, Path::new("out/small_0.txt"));
                assert_eq!(first, Path::new("week1/small_0.txt"));
            }
            other => panic!("expected a duplicate output, got {other:?}"),
        }
    }

    #[test]
    fn duplicates_fail_before_any_solve() {
        let dir = tempfile::tempdir().unwrap();
        for week in ["week1", "week2"] {
            fs::create_dir(dir.path().join(week)).unwrap();
            fs::write(dir.path().join(week).join("tiny.txt"), "ppoi 1 0 0 0 0\nw 0 1 1\n")
                .unwrap();
        }

        let config = PlannerConfig::default();
        let grid = TimeGrid::derive(&config.calendar);
        let forecast = ForecastTable {
            labels: vec!["0".to_string()],
            rows: vec![vec![1.0; grid.periods()]],
        };
        let prices = PriceSeries::constant(50.0, grid.periods());
        let options = BatchOptions {
            out_dir: dir.path().join("out"),
            overwrite: true,
            period_csv: false,
            threads: 2,
        };
        let instances = [
            dir.path().join("week1/tiny.txt"),
            dir.path().join("week2/tiny.txt"),
        ];

        let summary = run_batch(
            &TwoPhasePlanner::new(Infeasible, &config),
            &grid,
            &forecast,
            &prices,
            &instances,
            &options,
        )
        .unwrap();

        assert_eq!(summary.failure, 2);
        let first = summary.jobs[0].error.as_deref().unwrap();
        assert!(first.contains("infeasible"), "{first}");
        let second = summary.jobs[1].error.as_deref().unwrap();
        assert!(second.contains("already written by"), "{second}");
        assert!(second.contains("week1"), "{second}");
    }
}
