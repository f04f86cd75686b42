//! MILP solver abstraction.
//!
//! The planner only needs a backend that can minimise a [`Model`] under a
//! wall-clock limit and hand back its best assignment. The HiGHS backend
//! goes through `good_lp`.

pub mod highs;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::{Assignment, Model};

pub use highs::HighsSolver;

/// Tolerance used when checking a returned assignment.
pub const FEASIBILITY_TOL: f64 = 1e-5;

/// Share of the time limit after which a solve counts as cut off.
const LIMIT_SHARE: f64 = 0.99;

/// Limits applied to a single solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveLimits {
    pub time_limit: Duration,
}

impl SolveLimits {
    /// Whether a solve that ran for `elapsed` was stopped by the time limit.
    pub fn reached(&self, elapsed: Duration) -> bool {
        elapsed >= self.time_limit.mul_f64(LIMIT_SHARE)
    }
}

/// How a successful solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// The solver proved the assignment optimal.
    Optimal,
    /// The time limit stopped the search; the assignment is the best incumbent.
    TimeLimited,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::TimeLimited => write!(f, "time limited"),
        }
    }
}

/// Result of a successful solve.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub status: SolveStatus,
    pub assignment: Assignment,
    /// Objective value of `assignment`, constant term included.
    pub objective: f64,
    pub elapsed: Duration,
}

/// Why a solve produced no usable assignment.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("model is infeasible")]
    Infeasible,
    #[error("time limit reached without a feasible assignment")]
    NoIncumbent,
    #[error("{0}")]
    Backend(String),
}

/// A mixed-integer linear solver.
///
/// Implementations must respect `limits.time_limit` and, when it expires,
/// return the best feasible assignment found so far as
/// [`SolveStatus::TimeLimited`], or [`SolveError::NoIncumbent`] if none exists.
pub trait MilpSolver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Minimises `model`.
    ///
    /// # Errors
    ///
    /// See [`SolveError`].
    fn solve(&self, model: &Model, limits: &SolveLimits) -> Result<SolverOutput, SolveError>;
}

/// Classifies a raw assignment returned by a backend that cannot report its
/// termination reason directly.
///
/// A feasible assignment is optimal unless the wall clock reached the limit.
/// An infeasible assignment after the limit means there was no incumbent.
///
/// # Errors
///
/// Returns [`SolveError::NoIncumbent`] or [`SolveError::Backend`] when the
/// assignment breaks the model.
pub fn classify(
    model: &Model,
    assignment: Assignment,
    elapsed: Duration,
    limits: &SolveLimits,
) -> Result<SolverOutput, SolveError> {
    let timed_out = limits.reached(elapsed);
    let violations = model.violations(&assignment, FEASIBILITY_TOL);

    if let Some(first) = violations.first() {
        return Err(if timed_out {
            SolveError::NoIncumbent
        } else {
            SolveError::Backend(format!(
                "solver returned an infeasible assignment ({} violations, first: {first})",
                violations.len()
            ))
        });
    }

    Ok(SolverOutput {
        status: if timed_out {
            SolveStatus::TimeLimited
        } else {
            SolveStatus::Optimal
        },
        objective: model.objective_value(&assignment),
        assignment,
        elapsed,
    })
}
