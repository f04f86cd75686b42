//! Two-phase solve driver: bound the peak, then minimise cost.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use super::extract::{ScheduleDocument, SolvedSchedule};
use super::kpi::PlanReport;
use super::types::PeriodResult;
use crate::calendar::TimeGrid;
use crate::config::PlannerConfig;
use crate::error::{Phase, PlanError};
use crate::forecast::{ForecastTable, NetLoadSeries, aggregate_net_load, default_roles};
use crate::instance::Instance;
use crate::instance::parse::read_instance;
use crate::model::{BuilderOptions, CostWeights, ModelBuilder, Objective, ScheduleModel};
use crate::prices::PriceSeries;
use crate::solver::{
    FEASIBILITY_TOL, MilpSolver, SolveError, SolveLimits, SolveStatus, SolverOutput,
};

/// How one phase ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: SolveStatus,
    /// Objective value at termination.
    pub objective: f64,
    pub elapsed: Duration,
}

/// Everything a finished plan produces.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Phase 2 objective at termination: energy cost plus peak penalty.
    pub cost: f64,
    pub energy_cost: f64,
    pub peak_penalty: f64,
    /// Phase 1 peak net power bound (kW).
    pub peak_bound: f64,
    pub phase1: PhaseReport,
    pub phase2: PhaseReport,
    pub schedule: SolvedSchedule,
    pub document: ScheduleDocument,
    pub periods: Vec<PeriodResult>,
    pub report: PlanReport,
}

impl PlanOutcome {
    /// True when both phases proved optimality within their limit.
    pub fn is_optimal(&self) -> bool {
        self.phase1.status == SolveStatus::Optimal && self.phase2.status == SolveStatus::Optimal
    }
}

/// Runs the peak-bound and cost phases with one solver backend.
///
/// Generic over `S: MilpSolver` for static dispatch. Each phase builds its
/// model from scratch; only the scalar peak bound crosses phases.
#[derive(Debug, Clone)]
pub struct TwoPhasePlanner<S: MilpSolver> {
    solver: S,
    limits: SolveLimits,
    weights: CostWeights,
    options: BuilderOptions,
}

impl<S: MilpSolver> TwoPhasePlanner<S> {
    pub fn new(solver: S, config: &PlannerConfig) -> Self {
        Self {
            solver,
            limits: SolveLimits {
                time_limit: config.solver.time_limit(),
            },
            weights: CostWeights {
                period_hours: config.calendar.period_hours(),
                price_divisor: config.objective.price_divisor,
                peak_penalty: config.objective.peak_penalty,
            },
            options: BuilderOptions {
                exclusive_battery_modes: config.battery.exclusive_modes,
            },
        }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Phase 1: minimises the peak net power with integrality relaxed.
    ///
    /// # Errors
    ///
    /// Returns the solver failure mapped to a [`PlanError`] for phase 1.
    pub fn peak_bound(&self, builder: &ModelBuilder<'_>) -> Result<(f64, PhaseReport), PlanError> {
        let mut built = builder.build(&Objective::PeakPower);
        built.model.relax_integrality();

        let out = self.run(Phase::PeakBound, &built)?;
        let bound = out.assignment.value(built.vars.peak_power);
        Ok((bound, phase_report(Phase::PeakBound, &out)))
    }

    /// Phase 2: minimises energy cost plus the fixed peak penalty.
    ///
    /// # Errors
    ///
    /// Returns the solver failure mapped to a [`PlanError`] for phase 2.
    pub fn minimise_cost(
        &self,
        builder: &ModelBuilder<'_>,
        prices: &[f64],
        peak_bound: f64,
    ) -> Result<(ScheduleModel, SolverOutput), PlanError> {
        let built = builder.build(&Objective::Cost {
            prices,
            peak_bound,
            weights: self.weights,
        });
        let out = self.run(Phase::CostMinimisation, &built)?;
        Ok((built, out))
    }

    /// Plans one instance on `grid` against a base load and a price per period.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ShapeMismatch`] if the series do not cover the
    /// grid exactly, [`PlanError::Parse`] if an activity is longer than a
    /// week, or the first failing phase's error.
    pub fn plan(
        &self,
        instance: &Instance,
        grid: &TimeGrid,
        base_load: &NetLoadSeries,
        prices: &[f64],
    ) -> Result<PlanOutcome, PlanError> {
        let periods = grid.periods();
        if base_load.len() != periods {
            return Err(PlanError::shape("base load", periods, base_load.len()));
        }
        if prices.len() != periods {
            return Err(PlanError::shape("prices", periods, prices.len()));
        }
        instance.check_fits("instance", grid)?;

        debug!(
            periods,
            base_peak_kw = base_load.peak(),
            activities = instance.recurring.len(),
            batteries = instance.batteries.len(),
            "planning instance"
        );
        let builder =
            ModelBuilder::new(grid, instance, base_load.values()).with_options(self.options);

        let (peak_bound, phase1) = self.peak_bound(&builder)?;
        info!(
            peak_bound,
            status = %phase1.status,
            elapsed_ms = phase1.elapsed.as_millis() as u64,
            "phase 1 done"
        );

        let (built, out) = self.minimise_cost(&builder, prices, peak_bound)?;
        let phase2 = phase_report(Phase::CostMinimisation, &out);
        info!(
            cost = phase2.objective,
            status = %phase2.status,
            elapsed_ms = phase2.elapsed.as_millis() as u64,
            "phase 2 done"
        );

        let schedule = SolvedSchedule::extract(&built, &out.assignment);
        let document = ScheduleDocument::from_solution(instance, &schedule);
        let results = schedule.period_results(grid, instance, base_load.values(), prices);
        debug!(
            balance_error = schedule.max_balance_error(&results),
            lines = document.lines().len(),
            "extracted schedule"
        );

        let energy_cost: f64 = schedule
            .net_power
            .iter()
            .zip(prices)
            .map(|(net, price)| self.weights.energy_cost(*net, *price))
            .sum();
        let report = PlanReport::from_results(&results, &instance.batteries, &self.weights);

        Ok(PlanOutcome {
            cost: out.objective,
            energy_cost,
            peak_penalty: self.weights.peak_cost(peak_bound),
            peak_bound,
            phase1,
            phase2,
            schedule,
            document,
            periods: results,
            report,
        })
    }

    /// Aggregates the forecast table with the instance's default roles and
    /// aligns prices to the grid before planning.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ShapeMismatch`] for forecast or price tables of
    /// the wrong size, or any error from [`TwoPhasePlanner::plan`].
    pub fn plan_tables(
        &self,
        instance: &Instance,
        grid: &TimeGrid,
        forecast: &ForecastTable,
        prices: &PriceSeries,
    ) -> Result<PlanOutcome, PlanError> {
        let roles = default_roles(&instance.counts);
        let base_load = aggregate_net_load(forecast, &roles, grid.periods())?;
        let prices = prices.aligned(grid)?;
        self.plan(instance, grid, &base_load, prices)
    }

    fn run(&self, phase: Phase, built: &ScheduleModel) -> Result<SolverOutput, PlanError> {
        debug!(
            %phase,
            solver = self.solver.name(),
            vars = built.model.vars().len(),
            constraints = built.model.constraints().len(),
            "solving"
        );
        let out = self
            .solver
            .solve(&built.model, &self.limits)
            .map_err(|e| phase_error(phase, self.limits.time_limit, e))?;

        let violations = built.model.violations(&out.assignment, FEASIBILITY_TOL);
        if let Some(first) = violations.first() {
            return Err(PlanError::Solver {
                phase,
                message: format!(
                    "assignment breaks {} constraints, first: {first}",
                    violations.len()
                ),
            });
        }
        Ok(out)
    }
}

fn phase_report(phase: Phase, out: &SolverOutput) -> PhaseReport {
    PhaseReport {
        phase,
        status: out.status,
        objective: out.objective,
        elapsed: out.elapsed,
    }
}

fn phase_error(phase: Phase, limit: Duration, err: SolveError) -> PlanError {
    match err {
        SolveError::Infeasible => PlanError::Infeasible { phase },
        SolveError::NoIncumbent => PlanError::TimedOutNoIncumbent { phase, limit },
        SolveError::Backend(message) => PlanError::Solver { phase, message },
    }
}

/// Loads an instance, a forecast table and a price file, then plans with `solver`.
///
/// # Errors
///
/// Returns [`PlanError::Config`] for the first invalid configuration field,
/// [`PlanError::Parse`] for unreadable inputs, or any planning error.
pub fn plan_instance_with<S: MilpSolver>(
    solver: S,
    instance: &Path,
    forecast: &Path,
    prices: &Path,
    config: &PlannerConfig,
) -> Result<PlanOutcome, PlanError> {
    if let Some(err) = config.validate().into_iter().next() {
        return Err(err.into());
    }
    let grid = TimeGrid::derive(&config.calendar);

    let parsed = read_instance(instance)?;
    let table = ForecastTable::from_path(forecast)?;
    let price_series = PriceSeries::from_path(prices)?;
    info!(
        instance = %instance.display(),
        activities = parsed.recurring.len(),
        batteries = parsed.batteries.len(),
        "planning"
    );

    TwoPhasePlanner::new(solver, config).plan_tables(&parsed, &grid, &table, &price_series)
}

/// [`plan_instance_with`] using the HiGHS backend.
///
/// # Errors
///
/// See [`plan_instance_with`].
pub fn plan_instance(
    instance: &Path,
    forecast: &Path,
    prices: &Path,
    config: &PlannerConfig,
) -> Result<PlanOutcome, PlanError> {
    plan_instance_with(crate::solver::HighsSolver, instance, forecast, prices, config)
}
