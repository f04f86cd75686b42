//! Reading instance, forecast and price files from disk.

mod common;

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, TimeDelta};
use clap::Parser;
use ppoi_planner::cli::{Cli, run};
use ppoi_planner::config::PlannerConfig;
use ppoi_planner::forecast::ForecastTable;
use ppoi_planner::instance::parse::read_instance;
use ppoi_planner::model::Model;
use ppoi_planner::plan::plan_instance_with;
use ppoi_planner::prices::PriceSeries;
use ppoi_planner::solver::{MilpSolver, SolveError, SolveLimits, SolverOutput};
use ppoi_planner::{ParseError, PlanError};

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Counts solve calls and refuses every model.
struct Counting(Arc<AtomicUsize>);

impl MilpSolver for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn solve(&self, _: &Model, _: &SolveLimits) -> Result<SolverOutput, SolveError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(SolveError::Backend("not expected to run".to_string()))
    }
}

/// `rows` half-hourly AEMO rows, the first settling at 00:30 on `day`.
fn aemo_prices(day: NaiveDate, rows: usize) -> String {
    let mut text = "REGION,SETTLEMENTDATE,TOTALDEMAND,RRP,PERIODTYPE\n".to_string();
    let start = day.and_hms_opt(0, 30, 0).unwrap();
    for i in 0..rows {
        let at = start + TimeDelta::minutes(30 * i as i64);
        writeln!(text, "VIC1,{},4400.0,45.0,TRADE", at.format("%Y/%m/%d %H:%M:%S")).unwrap();
    }
    text
}

#[test]
fn instance_file_round_trips_its_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "phase2_instance_small_0.txt", common::CONTENDED);
    let instance = read_instance(&path).unwrap();
    assert_eq!(instance.counts.to_string(), "ppoi 2 1 1 3 1");
    assert_eq!(instance.room_capacity().small, 3);
    assert_eq!(instance.room_capacity().large, 1);
    assert_eq!(instance.predecessors(2), &[0, 1]);
}

#[test]
fn parse_errors_name_the_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    let text = "ppoi 1 0 0 1 0\nw 0 1 0\nr 0 1 S abc 4 0\n";
    let path = write(dir.path(), "broken.txt", text);
    match read_instance(&path) {
        Err(err @ ParseError::Malformed { line, .. }) => {
            assert_eq!(line, 3);
            let message = err.to_string();
            assert!(message.contains("broken.txt"), "{message}");
            assert!(message.contains("load"), "{message}");
        }
        other => panic!("expected a malformed line, got {other:?}"),
    }
}

#[test]
fn missing_instance_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");
    assert!(matches!(read_instance(&missing), Err(ParseError::Io { .. })));
}

#[test]
fn forecast_table_reads_labels_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let text = "Building0,1.5,2.5,3.5\nSolar0, 0.0, 1.0, 0.5\n";
    let path = write(dir.path(), "forecast.csv", text);
    let table = ForecastTable::from_path(&path).unwrap();
    assert_eq!(table.labels, ["Building0", "Solar0"]);
    assert_eq!(table.rows[1], [0.0, 1.0, 0.5]);
}

#[test]
fn non_numeric_forecast_value_reports_its_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "forecast.csv", "Building0,1,2\nBuilding1,3,x\n");
    match ForecastTable::from_path(&path) {
        Err(ParseError::Malformed { line, message, .. }) => {
            assert_eq!(line, 2);
            assert!(message.contains("Building1"), "{message}");
        }
        other => panic!("expected a malformed row, got {other:?}"),
    }
}

#[test]
fn aemo_prices_are_upsampled_to_quarter_hours() {
    let dir = tempfile::tempdir().unwrap();
    let text = "\
REGION,SETTLEMENTDATE,TOTALDEMAND,RRP,PERIODTYPE
VIC1,2020/11/01 00:30:00,4412.5,41.2,TRADE
VIC1,2020/11/01 01:00:00,4300.0,-3.5,TRADE
";
    let path = write(dir.path(), "PRICE_AND_DEMAND_202011_VIC1.csv", text);
    let series = PriceSeries::from_path(&path).unwrap();
    assert_eq!(series.values(), [41.2, 41.2, -3.5, -3.5]);
    let stamps: Vec<String> = series
        .timestamps()
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect();
    assert_eq!(stamps, ["00:15", "00:30", "00:45", "01:00"]);
}

#[test]
fn non_finite_inputs_stop_before_the_solver() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlannerConfig::november_2020();
    let calls = Arc::new(AtomicUsize::new(0));
    let november = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
    let prices = write(dir.path(), "prices.csv", &aemo_prices(november, 2));
    let good_instance = write(dir.path(), "good.txt", "ppoi 1 0 0 0 0\nw 0 1 1\n");
    let good_forecast = write(dir.path(), "good.csv", "Building0,1.0,2.0\n");

    let text = "ppoi 1 0 0 1 0\nw 0 1 0\nr 0 1 S NaN 4 0\n";
    let nan_load = write(dir.path(), "nan.txt", text);
    let outcome = plan_instance_with(
        Counting(calls.clone()),
        &nan_load,
        &good_forecast,
        &prices,
        &config,
    );
    match outcome {
        Err(PlanError::Parse(ParseError::Malformed { line, message, .. })) => {
            assert_eq!(line, 3);
            assert!(message.contains("finite"), "{message}");
        }
        other => panic!("expected a malformed instance, got {:?}", other.err()),
    }

    let inf_forecast = write(dir.path(), "inf.csv", "Building0,1.0,inf\n");
    let outcome = plan_instance_with(
        Counting(calls.clone()),
        &good_instance,
        &inf_forecast,
        &prices,
        &config,
    );
    match outcome {
        Err(PlanError::Parse(ParseError::Malformed { line, message, .. })) => {
            assert_eq!(line, 1);
            assert!(message.contains("finite"), "{message}");
        }
        other => panic!("expected a malformed forecast, got {:?}", other.err()),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn prices_from_another_month_stop_before_the_solver() {
    let dir = tempfile::tempdir().unwrap();
    let config = PlannerConfig::november_2020();
    let periods = config.calendar.periods;
    let calls = Arc::new(AtomicUsize::new(0));

    let instance = write(dir.path(), "empty.txt", "ppoi 1 0 0 0 0\nw 0 1 1\n");
    let row = vec!["10.0"; periods].join(",");
    let forecast = write(dir.path(), "forecast.csv", &format!("Building0,{row}\n"));
    let december = NaiveDate::from_ymd_opt(2020, 12, 1).unwrap();
    let prices = write(dir.path(), "prices.csv", &aemo_prices(december, periods / 2));

    let outcome = plan_instance_with(
        Counting(calls.clone()),
        &instance,
        &forecast,
        &prices,
        &config,
    );
    match outcome {
        Err(err @ PlanError::CalendarMismatch { .. }) => {
            let message = err.to_string();
            assert!(message.contains("2020-12-01 00:15:00"), "{message}");
            assert!(message.contains("2020-11-01 00:15:00"), "{message}");
        }
        other => panic!("expected a calendar mismatch, got {:?}", other.err()),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn forecast_command_writes_a_shifted_table() {
    let dir = tempfile::tempdir().unwrap();
    let history: Vec<String> = (0..12).map(|v| v.to_string()).collect();
    let history = write(
        dir.path(),
        "history.csv",
        &format!("Building0,{}\nSolar0,{}\n", history.join(","), history.join(",")),
    );
    let out = dir.path().join("forecast.csv");

    let cli = Cli::try_parse_from([
        "ppoi-planner",
        "forecast",
        "--history",
        &history.display().to_string(),
        "--out",
        &out.display().to_string(),
        "--periods",
        "4",
        "--horizons",
        "1,2",
    ])
    .unwrap();
    run(cli).unwrap();

    let table = ForecastTable::from_path(&out).unwrap();
    assert_eq!(table.labels, ["Building0", "Solar0"]);
    assert_eq!(table.rows[0], [7.0, 8.0, 9.0, 10.0]);
    assert_eq!(table.rows[1], [6.0, 7.0, 8.0, 9.0]);
}

#[test]
fn forecast_command_reads_tsf_history() {
    let dir = tempfile::tempdir().unwrap();
    // two hours before --since, then 0..=11 with 9 missing
    let history = write(
        dir.path(),
        "nov_data.tsf",
        "\
@relation nov_data
@attribute series_name string
@attribute start_timestamp date
@frequency 15_minutes
@missing true
@equallength true
@data
Building0:2020-10-31 22-00-00:99,99,99,99,99,99,99,99,0,1,2,3,4,5,6,7,8,?,10,11
",
    );
    let out = dir.path().join("forecast.csv");

    let cli = Cli::try_parse_from([
        "ppoi-planner",
        "forecast",
        "--history",
        &history.display().to_string(),
        "--since",
        "2020-11-01T00:00:00",
        "--out",
        &out.display().to_string(),
        "--periods",
        "3",
        "--horizons",
        "1",
    ])
    .unwrap();
    run(cli).unwrap();

    let table = ForecastTable::from_path(&out).unwrap();
    assert_eq!(table.labels, ["Building0"]);
    // the gap is filled with 57 / 12 before shifting
    assert_eq!(table.rows[0], [8.0, 4.75, 10.0]);
}
