//! Reads solved values back out of a model and writes ppoi schedules.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::power_balance::net_power_kw;
use super::types::PeriodResult;
use crate::calendar::TimeGrid;
use crate::error::PlanError;
use crate::instance::Instance;
use crate::io::open_output;
use crate::model::{Assignment, ScheduleModel, VarId};

/// Decisions and derived values of a solved schedule, `[entity][period]`.
///
/// Binary decisions are rounded (`> 0.5`); continuous values are copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolvedSchedule {
    pub starts: Vec<Vec<bool>>,
    pub ongoing: Vec<Vec<bool>>,
    pub charging: Vec<Vec<bool>>,
    pub discharging: Vec<Vec<bool>>,
    pub levels: Vec<Vec<f64>>,
    pub activity_power: Vec<f64>,
    pub net_power: Vec<f64>,
    pub peak_power: f64,
}

impl SolvedSchedule {
    pub fn extract(built: &ScheduleModel, assignment: &Assignment) -> Self {
        let v = &built.vars;
        let flags = |rows: &[Vec<VarId>]| -> Vec<Vec<bool>> {
            rows.iter()
                .map(|row| row.iter().map(|var| assignment.is_set(*var)).collect())
                .collect()
        };
        let values =
            |row: &[VarId]| -> Vec<f64> { row.iter().map(|var| assignment.value(*var)).collect() };

        Self {
            starts: flags(&v.start),
            ongoing: flags(&v.ongoing),
            charging: flags(&v.charge),
            discharging: flags(&v.discharge),
            levels: v.level.iter().map(|row| values(row)).collect(),
            activity_power: values(&v.activity_power),
            net_power: values(&v.net_power),
            peak_power: assignment.value(v.peak_power),
        }
    }

    /// Number of grid periods.
    pub fn periods(&self) -> usize {
        self.net_power.len()
    }

    /// Periods at which activity `a` starts, ascending.
    pub fn start_periods(&self, a: usize) -> Vec<usize> {
        self.starts[a]
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(t, _)| t)
            .collect()
    }

    /// Expands the schedule into one record per period.
    ///
    /// # Panics
    ///
    /// Panics if `base_kw` or `prices` is shorter than the schedule.
    pub fn period_results(
        &self,
        grid: &TimeGrid,
        instance: &Instance,
        base_kw: &[f64],
        prices: &[f64],
    ) -> Vec<PeriodResult> {
        (0..self.periods())
            .map(|t| {
                let mut charge_kwh = 0.0;
                let mut discharge_kwh = 0.0;
                for (b, battery) in instance.batteries.iter().enumerate() {
                    if self.charging[b][t] {
                        charge_kwh += battery.charge_kwh();
                    }
                    if self.discharging[b][t] {
                        discharge_kwh += battery.discharge_kwh();
                    }
                }

                let mut small_rooms = 0;
                let mut large_rooms = 0;
                let mut activity_kw = 0.0;
                for (a, act) in instance.recurring.iter().enumerate() {
                    if self.ongoing[a][t] {
                        small_rooms += act.small_rooms();
                        large_rooms += act.large_rooms();
                        activity_kw += act.power_kw();
                    }
                }

                PeriodResult {
                    period: t,
                    start: grid.period_start(t),
                    day_of_week: grid.day_of_week(t),
                    time_of_day: grid.time_of_day(t),
                    base_kw: base_kw[t],
                    activity_kw,
                    charge_kwh,
                    discharge_kwh,
                    battery_kw: charge_kwh - discharge_kwh,
                    net_kw: self.net_power[t],
                    price: prices[t],
                    small_rooms,
                    large_rooms,
                }
            })
            .collect()
    }

    /// Largest gap between the solved net power and the net power recomputed
    /// from the base load and the rounded decisions.
    pub fn max_balance_error(&self, results: &[PeriodResult]) -> f64 {
        results
            .iter()
            .map(|r| (net_power_kw(r.base_kw, r.activity_kw, r.battery_kw) - r.net_kw).abs())
            .fold(0.0, f64::max)
    }
}

/// A schedule in the ppoi solution format, one string per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleDocument {
    lines: Vec<String>,
}

impl ScheduleDocument {
    /// Header, `sched` size line, activity starts then battery events.
    ///
    /// Starts are ordered by period then activity; battery events by period
    /// then battery, with charging (`0`) before discharging (`2`). Idle
    /// battery periods produce no line.
    pub fn from_solution(instance: &Instance, schedule: &SolvedSchedule) -> Self {
        let mut lines = vec![
            instance.counts.to_string(),
            format!("sched {} 0", instance.counts.recurring),
        ];

        for t in 0..schedule.periods() {
            for (a, act) in instance.recurring.iter().enumerate() {
                if schedule.starts[a][t] {
                    lines.push(format!("r {} {t} {}", act.id, act.rooms));
                }
            }
        }

        for t in 0..schedule.periods() {
            for (b, battery) in instance.batteries.iter().enumerate() {
                if schedule.charging[b][t] {
                    lines.push(format!("b {} {t} 0", battery.id));
                }
                if schedule.discharging[b][t] {
                    lines.push(format!("b {} {t} 2", battery.id));
                }
            }
        }

        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines after the header and the size line.
    pub fn body(&self) -> &[String] {
        self.lines.get(2..).unwrap_or_default()
    }

    /// Writes every line followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()
    }

    /// Writes the document to `path`.
    ///
    /// Without `overwrite` the file is created exclusively and an existing
    /// file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::WriteConflict`] if `path` exists and `overwrite`
    /// is false, or [`PlanError::Io`] for any other failure.
    pub fn write_to_path(&self, path: &Path, overwrite: bool) -> Result<(), PlanError> {
        let file = open_output(path, overwrite)?;
        self.write_to(BufWriter::new(file)).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Display for ScheduleDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
