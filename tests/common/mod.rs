//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use ppoi_planner::calendar::{CalendarSpec, TimeGrid};
use ppoi_planner::config::PlannerConfig;
use ppoi_planner::forecast::{ForecastTable, NetLoadSeries};
use ppoi_planner::instance::Instance;
use ppoi_planner::instance::parse::parse_instance;

/// Two weeks of hourly periods starting on Monday 2020-11-02.
///
/// No lead-in, weeks `[0, 168)` and `[168, 336)`, eight business periods
/// per weekday starting at hour 9.
pub fn hourly_config() -> PlannerConfig {
    let mut config = PlannerConfig::quick();
    config.calendar = CalendarSpec {
        start_date: NaiveDate::from_ymd_opt(2020, 11, 2).unwrap(),
        periods: 24 * 14,
        period_minutes: 60,
        business_start_hour: 9,
        business_end_hour: 17,
    };
    config
}

/// The November 2020 grid with a generous per-phase limit.
pub fn november_config() -> PlannerConfig {
    let mut config = PlannerConfig::november_2020();
    config.solver.time_limit_secs = 120.0;
    config
}

pub fn grid(config: &PlannerConfig) -> TimeGrid {
    TimeGrid::derive(&config.calendar)
}

pub fn instance(text: &str) -> Instance {
    parse_instance("fixture", text).expect("fixture instance should parse")
}

/// A forecast table whose rows all hold `value` for every period.
pub fn flat_forecast(rows: usize, periods: usize, value: f64) -> ForecastTable {
    ForecastTable {
        labels: (0..rows).map(|i| i.to_string()).collect(),
        rows: vec![vec![value; periods]; rows],
    }
}

/// A base load that follows a daily shape: `low` at night, `high` from
/// hour 8 to hour 18.
pub fn daily_base_load(grid: &TimeGrid, low: f64, high: f64) -> NetLoadSeries {
    let per_hour = grid.periods_per_day() / 24;
    NetLoadSeries::new(
        (0..grid.periods())
            .map(|t| {
                let hour = grid.time_of_day(t) / per_hour;
                if (8..18).contains(&hour) { high } else { low }
            })
            .collect(),
    )
}

/// Prices at `base` everywhere except on `expensive_day` (ISO day of week).
pub fn prices_with_expensive_day(grid: &TimeGrid, base: f64, expensive_day: u8) -> Vec<f64> {
    (0..grid.periods())
        .map(|t| {
            if grid.day_of_week(t) == expensive_day {
                base * 10.0
            } else {
                base
            }
        })
        .collect()
}

/// Three activities with a precedence chain, competing for three small
/// rooms and one large room, and one battery.
pub const CONTENDED: &str = "\
ppoi 2 1 1 3 1
w 0 2 1
w 1 1 0
s 0 1
c 0 0 20 5 0.81
r 0 2 S 4.0 3 0
r 1 1 L 6.0 2 1 0
r 2 2 S 2.5 4 2 0 1
a 0 1 S 3.0 2 50.0 5.0 0
";
