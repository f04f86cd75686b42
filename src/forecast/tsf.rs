//! Reader for `.tsf` time series files and the cleaning step that turns
//! them into a [`ForecastTable`].
//!
//! ```text
//! # comments are ignored
//! @relation nov_data
//! @attribute series_name string
//! @attribute start_timestamp date
//! @frequency 15_minutes
//! @missing true
//! @equallength false
//! @data
//! Building0:2020-10-01 00-00-00:1.5,2.0,?,3.1
//! ```
//!
//! Series lines hold one value per attribute, in declaration order, then the
//! comma-separated observations. `?` marks a missing observation.

use std::fs;
use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

use super::ForecastTable;
use crate::error::ParseError;

const DATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Resolution used when the header has no usable `@frequency`.
pub const DEFAULT_RESOLUTION_MINUTES: u32 = 15;

/// Type of a declared `@attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Numeric,
    String,
    Date,
}

/// One attribute value of a series line.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Numeric(i64),
    String(String),
    Date(NaiveDateTime),
}

/// Metadata from the `@` lines before `@data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsfHeader {
    pub attributes: Vec<(String, AttributeKind)>,
    pub frequency: Option<String>,
    pub horizon: Option<usize>,
    pub missing: Option<bool>,
    pub equal_length: Option<bool>,
}

impl TsfHeader {
    /// Minutes between observations, if `@frequency` names a known step.
    pub fn frequency_minutes(&self) -> Option<u32> {
        let frequency = self.frequency.as_deref()?;
        match frequency {
            "minutely" => Some(1),
            "half_hourly" => Some(30),
            "hourly" => Some(60),
            "daily" => Some(1440),
            other => other.strip_suffix("_minutes")?.parse().ok(),
        }
    }
}

/// One series line.
#[derive(Debug, Clone, PartialEq)]
pub struct TsfSeries {
    /// The `series_name` attribute, or `T<n>` when there is none.
    pub name: String,
    /// The `start_timestamp` attribute, if declared.
    pub start: Option<NaiveDateTime>,
    pub attributes: Vec<AttributeValue>,
    /// Observations in order; `None` where the file has `?` or a
    /// non-finite number.
    pub values: Vec<Option<f64>>,
}

/// A parsed `.tsf` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsfDataset {
    pub header: TsfHeader,
    pub series: Vec<TsfSeries>,
}

impl TsfDataset {
    /// Minutes between observations.
    pub fn resolution_minutes(&self) -> u32 {
        self.header
            .frequency_minutes()
            .unwrap_or(DEFAULT_RESOLUTION_MINUTES)
    }

    /// Cleans every series into one table row labelled by series name.
    ///
    /// With `since`, observations stamped before it are dropped first. The
    /// remaining gaps are then filled with [`fill_missing`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Invalid`] if `since` is given but a series has
    /// no start timestamp, or a series keeps no observations.
    pub fn extract(
        &self,
        origin: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<ForecastTable, ParseError> {
        let resolution = self.resolution_minutes();
        let mut table = ForecastTable::default();

        for series in &self.series {
            let kept = match since {
                None => series.values.as_slice(),
                Some(since) => {
                    let start = series.start.ok_or_else(|| {
                        ParseError::invalid(
                            origin,
                            format!("series \"{}\" has no start_timestamp", series.name),
                        )
                    })?;
                    let stamps = generate_timestamps(start, series.values.len(), resolution, 0);
                    let skip = stamps.iter().take_while(|t| **t < since).count();
                    &series.values[skip..]
                }
            };
            if kept.iter().all(Option::is_none) {
                return Err(ParseError::invalid(
                    origin,
                    format!("series \"{}\" has no observations to keep", series.name),
                ));
            }

            debug!(
                series = %series.name,
                kept = kept.len(),
                filled = kept.iter().filter(|v| v.is_none()).count(),
                "cleaned series"
            );
            table.labels.push(series.name.clone());
            table.rows.push(fill_missing(kept, None));
        }
        Ok(table)
    }
}

/// Reads and parses a `.tsf` file.
///
/// # Errors
///
/// Returns [`ParseError::Io`] if the file cannot be read, otherwise any error
/// from [`parse_tsf`].
pub fn read_tsf(path: &Path) -> Result<TsfDataset, ParseError> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        origin: origin.clone(),
        source,
    })?;
    parse_tsf(&origin, &text)
}

/// Parses `.tsf` text. `origin` is used in error messages only.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] for a bad metadata or series line and
/// [`ParseError::Invalid`] when the file has no attributes or no series.
pub fn parse_tsf(origin: &str, text: &str) -> Result<TsfDataset, ParseError> {
    let mut header = TsfHeader::default();
    let mut series = Vec::new();
    let mut in_data = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let number = idx + 1;
        let malformed = |message: String| ParseError::malformed(origin, number, message);
        if line.is_empty() {
            continue;
        }

        if let Some(meta) = line.strip_prefix('@') {
            let tokens: Vec<&str> = meta.split_whitespace().collect();
            match tokens.as_slice() {
                ["data"] => {
                    if header.attributes.is_empty() {
                        return Err(malformed("@data before any @attribute".to_string()));
                    }
                    in_data = true;
                }
                ["attribute", name, kind] => {
                    let kind = match *kind {
                        "numeric" => AttributeKind::Numeric,
                        "string" => AttributeKind::String,
                        "date" => AttributeKind::Date,
                        other => {
                            return Err(malformed(format!("unknown attribute type \"{other}\"")));
                        }
                    };
                    header.attributes.push(((*name).to_string(), kind));
                }
                ["attribute", ..] => {
                    return Err(malformed("@attribute needs a name and a type".to_string()));
                }
                ["frequency", value] => header.frequency = Some((*value).to_string()),
                ["horizon", value] => {
                    let horizon = value
                        .parse()
                        .map_err(|_| malformed(format!("invalid @horizon \"{value}\"")))?;
                    header.horizon = Some(horizon);
                }
                ["missing", value] => {
                    header.missing = Some(flag(value).ok_or_else(|| {
                        malformed(format!("invalid @missing \"{value}\""))
                    })?);
                }
                ["equallength", value] => {
                    header.equal_length = Some(flag(value).ok_or_else(|| {
                        malformed(format!("invalid @equallength \"{value}\""))
                    })?);
                }
                [_, _] => {}
                _ => return Err(malformed(format!("metadata line needs one value: \"{line}\""))),
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }
        if header.attributes.is_empty() {
            return Err(malformed("series before any @attribute".to_string()));
        }
        if !in_data {
            return Err(malformed("series before the @data tag".to_string()));
        }
        series.push(parse_series(&header, series.len(), line).map_err(malformed)?);
    }

    if header.attributes.is_empty() {
        return Err(ParseError::invalid(origin, "missing @attribute section"));
    }
    if series.is_empty() {
        return Err(ParseError::invalid(origin, "no series under @data"));
    }

    debug!(
        origin,
        series = series.len(),
        frequency = header.frequency.as_deref().unwrap_or("unknown"),
        "parsed tsf"
    );
    Ok(TsfDataset { header, series })
}

fn flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "t" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "f" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_series(header: &TsfHeader, index: usize, line: &str) -> Result<TsfSeries, String> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() != header.attributes.len() + 1 {
        return Err(format!(
            "expected {} attributes and the values, found {} fields",
            header.attributes.len(),
            parts.len()
        ));
    }

    let mut name = format!("T{}", index + 1);
    let mut start = None;
    let mut attributes = Vec::with_capacity(header.attributes.len());
    for ((attr, kind), raw) in header.attributes.iter().zip(&parts) {
        let value = match kind {
            AttributeKind::Numeric => raw
                .trim()
                .parse()
                .map(AttributeValue::Numeric)
                .map_err(|_| format!("attribute {attr} is not an integer: \"{raw}\""))?,
            AttributeKind::String => AttributeValue::String((*raw).to_string()),
            AttributeKind::Date => NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(AttributeValue::Date)
                .map_err(|_| format!("attribute {attr} is not a {DATE_FORMAT} date: \"{raw}\""))?,
        };
        match (attr.as_str(), &value) {
            ("series_name", AttributeValue::String(s)) => name = s.clone(),
            ("start_timestamp", AttributeValue::Date(d)) => start = Some(*d),
            _ => {}
        }
        attributes.push(value);
    }

    let values = parts[parts.len() - 1]
        .split(',')
        .map(|v| match v.trim() {
            "?" => Ok(None),
            v => v
                .parse::<f64>()
                .map(|x| x.is_finite().then_some(x))
                .map_err(|_| format!("value \"{v}\" of series \"{name}\" is not a number")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.iter().all(Option::is_none) {
        return Err(format!("every value of series \"{name}\" is missing"));
    }

    Ok(TsfSeries {
        name,
        start,
        attributes,
        values,
    })
}

/// Timestamps of `len` observations starting at `start`, shifted back by
/// `offset_minutes` (the source's lead over UTC).
pub fn generate_timestamps(
    start: NaiveDateTime,
    len: usize,
    resolution_minutes: u32,
    offset_minutes: i64,
) -> Vec<NaiveDateTime> {
    let first = start - TimeDelta::minutes(offset_minutes);
    let step = i64::from(resolution_minutes);
    (0..len)
        .map(|i| first + TimeDelta::minutes(i as i64 * step))
        .collect()
}

/// Replaces missing observations with the series mean.
///
/// The mean is the sum of the present values over the full length, missing
/// ones included. With `window`, present values outside `[lower, upper]` are
/// replaced too.
pub fn fill_missing(values: &[Option<f64>], window: Option<(f64, f64)>) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().flatten().sum::<f64>() / values.len() as f64;
    values
        .iter()
        .map(|v| match (v, window) {
            (Some(x), Some((lower, upper))) if !(lower..=upper).contains(x) => mean,
            (Some(x), _) => *x,
            (None, _) => mean,
        })
        .collect()
}
