//! Planning pipeline: two-phase solve, extraction and reporting.

pub mod driver;
pub mod extract;
pub mod kpi;
pub mod power_balance;
pub mod types;

pub use driver::{PhaseReport, PlanOutcome, TwoPhasePlanner, plan_instance, plan_instance_with};
pub use extract::{ScheduleDocument, SolvedSchedule};
pub use kpi::PlanReport;
pub use types::PeriodResult;
