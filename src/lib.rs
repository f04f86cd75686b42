//! Two-phase MILP planner for recurring campus activities and batteries.
//!
//! An instance, a per-entity load forecast and wholesale prices are turned
//! into a solver-agnostic model on a 15-minute grid. Phase 1 bounds the peak
//! net power on the relaxed model; phase 2 minimises energy cost plus a
//! fixed peak penalty, and the result is written in the ppoi schedule format.

pub mod batch;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod forecast;
pub mod instance;
pub mod io;
pub mod model;
pub mod plan;
pub mod prices;
pub mod solver;

pub use error::{ParseError, PlanError};
