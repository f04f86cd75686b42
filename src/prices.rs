//! Wholesale price series loaded from AEMO half-hourly CSV files.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::calendar::TimeGrid;
use crate::error::{ParseError, PlanError};

const TIMESTAMP_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One AEMO settlement row. Other columns are ignored.
#[derive(Debug, Deserialize)]
struct AemoRow {
    #[serde(rename = "SETTLEMENTDATE")]
    settlement: String,
    #[serde(rename = "RRP")]
    rrp: f64,
}

/// Quarter-hourly prices in $/MWh with the start of each period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    timestamps: Vec<NaiveDateTime>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Builds a series directly from quarter-hour prices.
    pub fn from_prices(prices: Vec<f64>) -> Self {
        Self {
            timestamps: Vec::new(),
            prices,
        }
    }

    /// A constant series, mostly useful in tests.
    pub fn constant(price: f64, periods: usize) -> Self {
        Self::from_prices(vec![price; periods])
    }

    /// Reads an AEMO CSV file and upsamples it.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be opened, otherwise any
    /// error from [`PriceSeries::from_reader`].
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|source| ParseError::Io {
            origin: origin.clone(),
            source,
        })?;
        Self::from_reader(&origin, file)
    }

    /// Reads AEMO CSV rows and upsamples them to quarter hours.
    ///
    /// Each half-hourly settlement value is repeated for the two quarter
    /// hours it covers: the one ending 15 minutes before the settlement
    /// time and the one ending at it.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Csv`] for a missing column or a bad price and
    /// [`ParseError::Malformed`] for an unparseable timestamp.
    pub fn from_reader(origin: &str, reader: impl Read) -> Result<Self, ParseError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let mut series = Self::default();
        for (idx, row) in rdr.deserialize::<AemoRow>().enumerate() {
            let row = row.map_err(|source| ParseError::Csv {
                origin: origin.to_string(),
                source,
            })?;
            // header is line 1
            let settlement = parse_timestamp(&row.settlement)
                .ok_or_else(|| {
                    ParseError::malformed(
                        origin,
                        idx + 2,
                        format!("invalid SETTLEMENTDATE \"{}\"", row.settlement),
                    )
                })?;

            if !row.rrp.is_finite() {
                return Err(ParseError::malformed(
                    origin,
                    idx + 2,
                    format!("RRP must be finite, found {}", row.rrp),
                ));
            }

            series.timestamps.push(settlement - TimeDelta::minutes(15));
            series.timestamps.push(settlement);
            series.prices.push(row.rrp);
            series.prices.push(row.rrp);
        }

        debug!(origin, periods = series.prices.len(), "loaded prices");
        Ok(series)
    }

    /// Prices per period.
    pub fn values(&self) -> &[f64] {
        &self.prices
    }

    /// Timestamps per period. Empty for series built from bare prices.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// The prices covering `grid`, one per period.
    ///
    /// A timestamped series must label its first value with the end of the
    /// grid's first period. Values past the grid are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ShapeMismatch`] if the series is shorter than the
    /// grid and [`PlanError::CalendarMismatch`] if it starts elsewhere.
    pub fn aligned(&self, grid: &TimeGrid) -> Result<&[f64], PlanError> {
        let periods = grid.periods();
        if let Some(&first) = self.timestamps().first() {
            let expected = grid.period_end(0);
            if first != expected {
                return Err(PlanError::CalendarMismatch {
                    what: "price series".to_string(),
                    expected,
                    actual: first,
                });
            }
        }

        let prices = self
            .prices
            .get(..periods)
            .ok_or_else(|| PlanError::shape("price series", periods, self.prices.len()))?;
        if self.prices.len() > periods {
            warn!(
                available = self.prices.len(),
                periods, "price series is longer than the grid; dropping the tail"
            );
        }
        Ok(prices)
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::CalendarSpec;

    const AEMO: &str = "\
REGION,SETTLEMENTDATE,TOTALDEMAND,RRP,PERIODTYPE
VIC1,2020/11/01 00:30:00,4412.5,41.2,TRADE
VIC1,2020/11/01 01:00:00,4300.1,-3.5,TRADE
";

    #[test]
    fn half_hours_are_doubled() {
        let prices = PriceSeries::from_reader("aemo", AEMO.as_bytes()).unwrap();
        assert_eq!(prices.values(), &[41.2, 41.2, -3.5, -3.5]);
        let stamps: Vec<String> = prices.timestamps().iter().map(|t| t.to_string()).collect();
        assert_eq!(
            stamps,
            vec![
                "2020-11-01 00:15:00",
                "2020-11-01 00:30:00",
                "2020-11-01 00:45:00",
                "2020-11-01 01:00:00",
            ]
        );
    }

    #[test]
    fn missing_rrp_column_is_csv_error() {
        let csv = "REGION,SETTLEMENTDATE\nVIC1,2020/11/01 00:30:00\n";
        assert!(matches!(
            PriceSeries::from_reader("aemo", csv.as_bytes()),
            Err(ParseError::Csv { .. })
        ));
    }

    #[test]
    fn bad_timestamp_reports_line() {
        let csv = "SETTLEMENTDATE,RRP\n2020/11/01 00:30:00,1.0\nyesterday,2.0\n";
        match PriceSeries::from_reader("aemo", csv.as_bytes()) {
            Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_price_is_malformed() {
        let csv = "SETTLEMENTDATE,RRP\n2020/11/01 00:30:00,1.0\n2020/11/01 01:00:00,NaN\n";
        match PriceSeries::from_reader("aemo", csv.as_bytes()) {
            Err(ParseError::Malformed { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("RRP"));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    fn grid(start_date: NaiveDate, periods: usize) -> TimeGrid {
        TimeGrid::derive(&CalendarSpec {
            start_date,
            periods,
            ..CalendarSpec::default()
        })
    }

    #[test]
    fn aligned_checks_length() {
        let nov1 = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
        let prices = PriceSeries::constant(50.0, 4);
        assert_eq!(prices.aligned(&grid(nov1, 3)).unwrap(), &[50.0; 3][..]);
        assert!(matches!(
            prices.aligned(&grid(nov1, 5)),
            Err(PlanError::ShapeMismatch {
                expected: 5,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn aligned_rejects_series_from_another_day() {
        let prices = PriceSeries::from_reader("aemo", AEMO.as_bytes()).unwrap();

        let nov1 = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
        assert_eq!(prices.aligned(&grid(nov1, 4)).unwrap(), &[41.2, 41.2, -3.5, -3.5]);
        assert_eq!(prices.aligned(&grid(nov1, 2)).unwrap(), &[41.2, 41.2]);

        let dec1 = NaiveDate::from_ymd_opt(2020, 12, 1).unwrap();
        match prices.aligned(&grid(dec1, 4)) {
            Err(PlanError::CalendarMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected.to_string(), "2020-12-01 00:15:00");
                assert_eq!(actual.to_string(), "2020-11-01 00:15:00");
            }
            other => panic!("expected calendar mismatch, got {other:?}"),
        }
    }
}
