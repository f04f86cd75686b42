//! Typed records of a ppoi problem instance.
//!
//! An instance describes the buildings (room counts), their solar panels and
//! batteries, and the recurring and once-off activities to place on the
//! grid. Records keep their file ids; the model works on their positions in
//! the ordered vectors.

pub mod battery;
pub mod parse;

use std::fmt;

pub use battery::Battery;

use crate::calendar::TimeGrid;
use crate::error::ParseError;

/// Room size class an activity books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomSize {
    Small,
    Large,
}

impl fmt::Display for RoomSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomSize::Small => write!(f, "S"),
            RoomSize::Large => write!(f, "L"),
        }
    }
}

/// A building and its bookable rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Building {
    pub id: usize,
    pub small_rooms: u32,
    pub large_rooms: u32,
}

/// A rooftop solar installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolarPanel {
    pub id: usize,
    pub building_id: usize,
}

/// An activity held once a week at the same slot every week.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringActivity {
    pub id: usize,
    /// Number of rooms booked while the activity runs.
    pub rooms: u32,
    pub room_size: RoomSize,
    /// Load per room per period, in kWh.
    pub load_kwh: f64,
    /// Length in periods.
    pub duration: usize,
    /// Ids of activities that must start no later within the week.
    pub precedence: Vec<usize>,
}

impl RecurringActivity {
    /// Small rooms occupied while ongoing.
    pub fn small_rooms(&self) -> u32 {
        match self.room_size {
            RoomSize::Small => self.rooms,
            RoomSize::Large => 0,
        }
    }

    /// Large rooms occupied while ongoing.
    pub fn large_rooms(&self) -> u32 {
        match self.room_size {
            RoomSize::Small => 0,
            RoomSize::Large => self.rooms,
        }
    }

    /// Load drawn in every ongoing period, across all booked rooms.
    pub fn power_kw(&self) -> f64 {
        self.load_kwh * f64::from(self.rooms)
    }
}

/// A one-time activity. Parsed and carried but never scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct OnceOffActivity {
    pub id: usize,
    pub rooms: u32,
    pub room_size: RoomSize,
    pub load_kwh: f64,
    pub duration: usize,
    pub value: f64,
    pub penalty: f64,
    pub precedence: Vec<usize>,
}

/// Entity counts from the `ppoi` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceCounts {
    pub buildings: usize,
    pub solar: usize,
    pub batteries: usize,
    pub recurring: usize,
    pub once_off: usize,
}

impl fmt::Display for InstanceCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ppoi {} {} {} {} {}",
            self.buildings, self.solar, self.batteries, self.recurring, self.once_off
        )
    }
}

/// Aggregate room counts across all buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomCapacity {
    pub small: u32,
    pub large: u32,
}

/// A fully parsed instance.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    pub counts: InstanceCounts,
    pub buildings: Vec<Building>,
    pub solar: Vec<SolarPanel>,
    pub batteries: Vec<Battery>,
    pub recurring: Vec<RecurringActivity>,
    pub once_off: Vec<OnceOffActivity>,
    /// Predecessors of each recurring activity, as indices into `recurring`.
    predecessors: Vec<Vec<usize>>,
}

impl Instance {
    /// Assembles an instance from records, resolving precedence ids.
    ///
    /// Header counts are taken from the record vectors.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Invalid`] if an activity id repeats or a
    /// precedence entry names an unknown activity.
    pub fn from_records(
        origin: &str,
        buildings: Vec<Building>,
        solar: Vec<SolarPanel>,
        batteries: Vec<Battery>,
        recurring: Vec<RecurringActivity>,
        once_off: Vec<OnceOffActivity>,
    ) -> Result<Self, ParseError> {
        let counts = InstanceCounts {
            buildings: buildings.len(),
            solar: solar.len(),
            batteries: batteries.len(),
            recurring: recurring.len(),
            once_off: once_off.len(),
        };

        for (i, a) in recurring.iter().enumerate() {
            if recurring[..i].iter().any(|b| b.id == a.id) {
                return Err(ParseError::invalid(
                    origin,
                    format!("recurring activity {} is declared twice", a.id),
                ));
            }
        }

        let mut instance = Self {
            counts,
            buildings,
            solar,
            batteries,
            recurring,
            once_off,
            predecessors: Vec::new(),
        };

        let mut predecessors = Vec::with_capacity(instance.recurring.len());
        for a in &instance.recurring {
            let resolved = a
                .precedence
                .iter()
                .map(|&p| {
                    instance.activity_index(p).ok_or_else(|| {
                        ParseError::invalid(
                            origin,
                            format!("activity {} lists unknown predecessor {p}", a.id),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            predecessors.push(resolved);
        }
        instance.predecessors = predecessors;
        Ok(instance)
    }

    /// Total small and large rooms across buildings.
    pub fn room_capacity(&self) -> RoomCapacity {
        self.buildings
            .iter()
            .fold(RoomCapacity::default(), |acc, b| RoomCapacity {
                small: acc.small + b.small_rooms,
                large: acc.large + b.large_rooms,
            })
    }

    /// Predecessor indices of recurring activity `a`.
    pub fn predecessors(&self, a: usize) -> &[usize] {
        &self.predecessors[a]
    }

    /// Position of a recurring activity by its file id.
    pub fn activity_index(&self, id: usize) -> Option<usize> {
        self.recurring.iter().position(|a| a.id == id)
    }

    /// Checks that every recurring activity fits inside one week of `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Invalid`] naming the first activity that is too long.
    pub fn check_fits(&self, origin: &str, grid: &TimeGrid) -> Result<(), ParseError> {
        match self
            .recurring
            .iter()
            .find(|a| a.duration > grid.week_len())
        {
            Some(a) => Err(ParseError::invalid(
                origin,
                format!(
                    "activity {} lasts {} periods, longer than a week ({})",
                    a.id,
                    a.duration,
                    grid.week_len()
                ),
            )),
            None => Ok(()),
        }
    }
}
