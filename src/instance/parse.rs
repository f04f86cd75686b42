//! Reader for the whitespace-tokenised ppoi instance format.
//!
//! One record per line, the first token naming the record type:
//!
//! ```text
//! ppoi <#buildings> <#solar> <#batteries> <#recurring> <#onceoff>
//! w <buildingId> <#smallRooms> <#largeRooms>
//! s <solarId> <buildingId>
//! c <batteryId> <buildingId> <capacityKwh> <maxPowerKwh> <efficiency>
//! r <activityId> <roomCount> <S|L> <loadKwh> <duration> <#precedence> [ids...]
//! a <activityId> <roomCount> <S|L> <loadKwh> <duration> <value> <penalty> <#precedence> [ids...]
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use super::{
    Battery, Building, Instance, InstanceCounts, OnceOffActivity, RecurringActivity, RoomSize,
    SolarPanel,
};
use crate::error::ParseError;

/// Reads and parses an instance file.
///
/// # Errors
///
/// Returns [`ParseError::Io`] if the file cannot be read, otherwise any error
/// from [`parse_instance`].
pub fn read_instance(path: &Path) -> Result<Instance, ParseError> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        origin: origin.clone(),
        source,
    })?;
    parse_instance(&origin, &text)
}

/// Parses instance text. `origin` is used in error messages only.
///
/// # Errors
///
/// Returns [`ParseError::Malformed`] for an unreadable line and
/// [`ParseError::Invalid`] when the records disagree with the header or
/// reference unknown activities.
pub fn parse_instance(origin: &str, text: &str) -> Result<Instance, ParseError> {
    let mut header: Option<InstanceCounts> = None;
    let mut buildings = Vec::new();
    let mut solar = Vec::new();
    let mut batteries = Vec::new();
    let mut recurring = Vec::new();
    let mut once_off = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let Some(&tag) = tokens.first() else {
            continue;
        };
        let line = Line {
            origin,
            number: idx + 1,
            tokens: &tokens,
        };

        if tag != "ppoi" && header.is_none() {
            return Err(line.error("expected the ppoi header first"));
        }

        match tag {
            "ppoi" => {
                if header.is_some() {
                    return Err(line.error("duplicate ppoi header"));
                }
                line.expect_len(6)?;
                header = Some(InstanceCounts {
                    buildings: line.field(1, "building count")?,
                    solar: line.field(2, "solar count")?,
                    batteries: line.field(3, "battery count")?,
                    recurring: line.field(4, "recurring count")?,
                    once_off: line.field(5, "once-off count")?,
                });
            }
            "w" => {
                line.expect_len(4)?;
                buildings.push(Building {
                    id: line.field(1, "building id")?,
                    small_rooms: line.field(2, "small room count")?,
                    large_rooms: line.field(3, "large room count")?,
                });
            }
            "s" => {
                line.expect_len(3)?;
                solar.push(SolarPanel {
                    id: line.field(1, "solar id")?,
                    building_id: line.field(2, "building id")?,
                });
            }
            "c" => {
                line.expect_len(6)?;
                let capacity = line.real(3, "capacity")?;
                let power = line.real(4, "max power")?;
                let efficiency = line.real(5, "efficiency")?;
                if !(capacity >= 0.0 && power >= 0.0) {
                    return Err(line.error("battery capacity and power must be >= 0"));
                }
                if !(efficiency > 0.0 && efficiency <= 1.0) {
                    return Err(line.error(format!("efficiency {efficiency} is outside (0, 1]")));
                }
                batteries.push(Battery::new(
                    line.field(1, "battery id")?,
                    line.field(2, "building id")?,
                    capacity,
                    power,
                    efficiency,
                ));
            }
            "r" => {
                let precedence = line.precedence(6)?;
                recurring.push(RecurringActivity {
                    id: line.field(1, "activity id")?,
                    rooms: line.field(2, "room count")?,
                    room_size: line.room_size(3)?,
                    load_kwh: line.real(4, "load")?,
                    duration: line.duration(5)?,
                    precedence,
                });
            }
            "a" => {
                let precedence = line.precedence(8)?;
                once_off.push(OnceOffActivity {
                    id: line.field(1, "activity id")?,
                    rooms: line.field(2, "room count")?,
                    room_size: line.room_size(3)?,
                    load_kwh: line.real(4, "load")?,
                    duration: line.duration(5)?,
                    value: line.real(6, "value")?,
                    penalty: line.real(7, "penalty")?,
                    precedence,
                });
            }
            other => return Err(line.error(format!("unknown record type \"{other}\""))),
        }
    }

    let Some(header) = header else {
        return Err(ParseError::invalid(origin, "missing ppoi header"));
    };

    let instance =
        Instance::from_records(origin, buildings, solar, batteries, recurring, once_off)?;
    if instance.counts != header {
        return Err(ParseError::invalid(
            origin,
            format!(
                "header declares \"{header}\" but the records give \"{}\"",
                instance.counts
            ),
        ));
    }

    debug!(
        origin,
        buildings = header.buildings,
        batteries = header.batteries,
        recurring = header.recurring,
        "parsed instance"
    );
    Ok(instance)
}

/// One tokenised record with its position for error reporting.
struct Line<'a> {
    origin: &'a str,
    number: usize,
    tokens: &'a [&'a str],
}

impl Line<'_> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::malformed(self.origin, self.number, message)
    }

    fn expect_len(&self, len: usize) -> Result<(), ParseError> {
        if self.tokens.len() == len {
            Ok(())
        } else {
            Err(self.error(format!(
                "\"{}\" record needs {len} tokens, found {}",
                self.tokens[0],
                self.tokens.len()
            )))
        }
    }

    fn field<T: FromStr>(&self, idx: usize, what: &str) -> Result<T, ParseError> {
        let token = self
            .tokens
            .get(idx)
            .ok_or_else(|| self.error(format!("missing {what}")))?;
        token
            .parse()
            .map_err(|_| self.error(format!("invalid {what} \"{token}\"")))
    }

    /// A finite real number; `NaN` and infinities are rejected.
    fn real(&self, idx: usize, what: &str) -> Result<f64, ParseError> {
        let value: f64 = self.field(idx, what)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.error(format!("{what} must be finite, found \"{}\"", self.tokens[idx])))
        }
    }

    fn room_size(&self, idx: usize) -> Result<RoomSize, ParseError> {
        match self.tokens.get(idx) {
            Some(&"S") => Ok(RoomSize::Small),
            Some(&"L") => Ok(RoomSize::Large),
            Some(other) => Err(self.error(format!("room size must be S or L, found \"{other}\""))),
            None => Err(self.error("missing room size")),
        }
    }

    fn duration(&self, idx: usize) -> Result<usize, ParseError> {
        let duration: usize = self.field(idx, "duration")?;
        if duration == 0 {
            return Err(self.error("duration must be at least one period"));
        }
        Ok(duration)
    }

    /// Reads the precedence count at `idx` and the ids after it, checking
    /// that the record ends exactly there.
    fn precedence(&self, idx: usize) -> Result<Vec<usize>, ParseError> {
        let count: usize = self.field(idx, "precedence count")?;
        self.expect_len(idx + 1 + count)?;
        (idx + 1..idx + 1 + count)
            .map(|i| self.field(i, "precedence id"))
            .collect()
    }
}
