//! CSV export for per-period plan results.

use std::io::{self, Write};
use std::path::Path;

use super::open_output;
use crate::error::PlanError;
use crate::plan::PeriodResult;

/// Column header for the per-period CSV export.
const HEADER: &str = "period,timestamp,day_of_week,time_of_day,base_kw,activity_kw,\
                      charge_kwh,discharge_kwh,battery_kw,net_kw,price,\
                      small_rooms,large_rooms";

/// Exports period results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per period. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `results` - Per-period records of a solved plan
/// * `path` - Output file path
/// * `overwrite` - Replace an existing file instead of failing
///
/// # Errors
///
/// Returns [`PlanError::WriteConflict`] if `path` exists and `overwrite` is
/// false, or [`PlanError::Io`] if file creation or writing fails.
pub fn export_csv(results: &[PeriodResult], path: &Path, overwrite: bool) -> Result<(), PlanError> {
    let file = open_output(path, overwrite)?;
    write_csv(results, io::BufWriter::new(file)).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes period results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[PeriodResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.period.to_string(),
            r.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.day_of_week.to_string(),
            r.time_of_day.to_string(),
            format!("{:.4}", r.base_kw),
            format!("{:.4}", r.activity_kw),
            format!("{:.4}", r.charge_kwh),
            format!("{:.4}", r.discharge_kwh),
            format!("{:.4}", r.battery_kw),
            format!("{:.4}", r.net_kw),
            format!("{:.4}", r.price),
            r.small_rooms.to_string(),
            r.large_rooms.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
