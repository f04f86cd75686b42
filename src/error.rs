//! Error taxonomy shared by the loaders, the model pipeline and the writer.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::config::ConfigError;

/// The two solve phases of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Relaxed minimisation of the peak net power.
    PeakBound,
    /// Integral cost minimisation with the fixed peak penalty.
    CostMinimisation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PeakBound => write!(f, "phase 1 (peak bound)"),
            Phase::CostMinimisation => write!(f, "phase 2 (cost minimisation)"),
        }
    }
}

/// Malformed instance, forecast or price input.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A record could not be understood.
    #[error("{origin}:{line}: {message}")]
    Malformed {
        origin: String,
        line: usize,
        message: String,
    },
    /// The input parsed but breaks an invariant of its format.
    #[error("{origin}: {message}")]
    Invalid { origin: String, message: String },
    /// The CSV layer rejected the input.
    #[error("{origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },
    /// The input could not be read at all.
    #[error("cannot read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    pub(crate) fn malformed(origin: &str, line: usize, message: impl Into<String>) -> Self {
        ParseError::Malformed {
            origin: origin.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(origin: &str, message: impl Into<String>) -> Self {
        ParseError::Invalid {
            origin: origin.to_string(),
            message: message.into(),
        }
    }
}

/// Everything that can stop a plan from being produced.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Input dimensions disagree with the instance or the time grid.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A timestamped input starts at a different time than the grid.
    #[error("{what} starts at {actual}, the grid expects {expected}")]
    CalendarMismatch {
        what: String,
        expected: NaiveDateTime,
        actual: NaiveDateTime,
    },

    /// The solver proved that no feasible assignment exists.
    #[error("{phase} is infeasible")]
    Infeasible { phase: Phase },

    /// The phase exhausted its time limit before finding any feasible assignment.
    #[error("{phase} hit its {limit:?} time limit without a feasible incumbent")]
    TimedOutNoIncumbent { phase: Phase, limit: Duration },

    /// The solver backend failed for a reason other than infeasibility.
    #[error("solver failed during {phase}: {message}")]
    Solver { phase: Phase, message: String },

    /// An output file already exists and overwriting was not requested.
    #[error("refusing to overwrite existing file {}", path.display())]
    WriteConflict { path: PathBuf },

    /// Two instances of one batch map to the same output file.
    #[error("{} is already written by {}", path.display(), first.display())]
    DuplicateOutput { path: PathBuf, first: PathBuf },

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PlanError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        PlanError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}
