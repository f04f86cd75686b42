//! Per-entity load forecasts and their aggregation onto the grid.

pub mod aggregate;
pub mod naive;
pub mod tsf;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

pub use aggregate::{EntityRole, NetLoadSeries, aggregate_net_load, default_roles};
pub use naive::{NaiveForecast, mase};

use crate::error::ParseError;

/// A headerless table with one row per entity.
///
/// Each row starts with a free-form label followed by one value per period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastTable {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ForecastTable {
    /// Reads a table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be opened, otherwise any
    /// error from [`ForecastTable::from_reader`].
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|source| ParseError::Io {
            origin: origin.clone(),
            source,
        })?;
        Self::from_reader(&origin, file)
    }

    /// Reads a table from any CSV source.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Csv`] when the CSV layer fails and
    /// [`ParseError::Malformed`] for a value that is not a finite number.
    pub fn from_reader(origin: &str, reader: impl Read) -> Result<Self, ParseError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::default();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|source| ParseError::Csv {
                origin: origin.to_string(),
                source,
            })?;
            let line = record.position().map_or(idx + 1, |p| p.line() as usize);

            let mut fields = record.iter();
            let label = fields.next().unwrap_or_default().trim().to_string();
            let values = fields
                .enumerate()
                .map(|(col, v)| match v.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(ParseError::malformed(
                        origin,
                        line,
                        format!(
                            "value {} of row \"{label}\" is not a finite number: \"{v}\"",
                            col + 1
                        ),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;

            table.labels.push(label);
            table.rows.push(values);
        }
        Ok(table)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the table in the same headerless layout it is read from.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn write_csv(&self, writer: impl Write) -> io::Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);

        for (label, row) in self.labels.iter().zip(&self.rows) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(label.clone());
            record.extend(row.iter().map(f64::to_string));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}
