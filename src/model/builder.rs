//! Builds the scheduling model: battery dynamics, weekly activity
//! placement, room limits and the power balance.

use tracing::debug;

use super::{ConstraintFamily as F, LinExpr, Model, Sense, VarId};
use crate::calendar::TimeGrid;
use crate::instance::{Battery, Instance, RecurringActivity, RoomCapacity};

/// Switches that change which constraints are emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuilderOptions {
    /// Add `charge + discharge <= 1` for every battery and period.
    pub exclusive_battery_modes: bool,
}

/// Coefficients of the cost objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    /// Hours per period; turns kW into kWh.
    pub period_hours: f64,
    /// Divides `kWh * price` (prices are per MWh).
    pub price_divisor: f64,
    /// Coefficient of the squared peak bound.
    pub peak_penalty: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            period_hours: 0.25,
            price_divisor: 1000.0,
            peak_penalty: 0.005,
        }
    }
}

impl CostWeights {
    /// Cost of drawing `net_kw` for one period at `price`.
    pub fn energy_cost(&self, net_kw: f64, price: f64) -> f64 {
        self.period_hours * net_kw * price / self.price_divisor
    }

    /// Fixed penalty for a given peak bound.
    pub fn peak_cost(&self, peak_bound: f64) -> f64 {
        self.peak_penalty * peak_bound * peak_bound
    }
}

/// What the model minimises.
#[derive(Debug, Clone, Copy)]
pub enum Objective<'a> {
    /// The epigraph variable bounding net power from above.
    PeakPower,
    /// Energy cost over the grid plus a constant peak penalty.
    Cost {
        prices: &'a [f64],
        peak_bound: f64,
        weights: CostWeights,
    },
}

/// Typed handles into a built [`Model`]; `[entity][period]` where indexed twice.
#[derive(Debug, Clone)]
pub struct ScheduleVars {
    pub start: Vec<Vec<VarId>>,
    pub ongoing: Vec<Vec<VarId>>,
    pub charge: Vec<Vec<VarId>>,
    pub discharge: Vec<Vec<VarId>>,
    pub level: Vec<Vec<VarId>>,
    pub activity_power: Vec<VarId>,
    pub net_power: Vec<VarId>,
    pub peak_power: VarId,
}

/// A model together with the handles needed to read a solution back.
#[derive(Debug, Clone)]
pub struct ScheduleModel {
    pub model: Model,
    pub vars: ScheduleVars,
}

/// Turns an instance on a time grid into a [`ScheduleModel`].
///
/// The builder borrows its inputs and can build any number of models; each
/// call starts from an empty model.
#[derive(Debug)]
pub struct ModelBuilder<'a> {
    grid: &'a TimeGrid,
    rooms: RoomCapacity,
    batteries: &'a [Battery],
    activities: &'a [RecurringActivity],
    instance: &'a Instance,
    base_load: &'a [f64],
    options: BuilderOptions,
}

impl<'a> ModelBuilder<'a> {
    /// # Panics
    ///
    /// Panics if `base_load` does not have one value per grid period.
    pub fn new(grid: &'a TimeGrid, instance: &'a Instance, base_load: &'a [f64]) -> Self {
        assert_eq!(
            base_load.len(),
            grid.periods(),
            "base load must cover the grid"
        );

        Self {
            grid,
            rooms: instance.room_capacity(),
            instance,
            batteries: &instance.batteries,
            activities: &instance.recurring,
            base_load,
            options: BuilderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds a fresh model minimising `objective`.
    ///
    /// # Panics
    ///
    /// Panics if a cost objective does not carry one price per grid period.
    pub fn build(&self, objective: &Objective<'_>) -> ScheduleModel {
        let mut model = Model::new();
        let vars = self.declare(&mut model);

        self.add_battery_constraints(&mut model, &vars);
        self.add_activity_constraints(&mut model, &vars);
        self.add_room_constraints(&mut model, &vars);
        self.add_power_constraints(&mut model, &vars);
        self.set_objective(&mut model, &vars, objective);

        debug!(
            vars = model.vars().len(),
            binaries = model.binary_count(),
            constraints = model.constraints().len(),
            "built schedule model"
        );
        ScheduleModel { model, vars }
    }

    fn declare(&self, model: &mut Model) -> ScheduleVars {
        let n = self.grid.periods();
        let binaries = |model: &mut Model, count: usize| -> Vec<Vec<VarId>> {
            (0..count)
                .map(|_| (0..n).map(|_| model.add_binary()).collect())
                .collect()
        };

        let start = binaries(model, self.activities.len());
        let ongoing = binaries(model, self.activities.len());
        let charge = binaries(model, self.batteries.len());
        let discharge = binaries(model, self.batteries.len());
        let level = (0..self.batteries.len())
            .map(|_| {
                (0..n)
                    .map(|_| model.add_continuous(0.0, f64::INFINITY))
                    .collect()
            })
            .collect();
        let activity_power = (0..n)
            .map(|_| model.add_continuous(0.0, f64::INFINITY))
            .collect();
        let net_power = (0..n)
            .map(|_| model.add_continuous(0.0, f64::INFINITY))
            .collect();
        let peak_power = model.add_continuous(0.0, f64::INFINITY);

        ScheduleVars {
            start,
            ongoing,
            charge,
            discharge,
            level,
            activity_power,
            net_power,
            peak_power,
        }
    }

    fn add_battery_constraints(&self, model: &mut Model, vars: &ScheduleVars) {
        let n = self.grid.periods();
        for (b, battery) in self.batteries.iter().enumerate() {
            let level = &vars.level[b];
            let charge = &vars.charge[b];
            let discharge = &vars.discharge[b];

            model.add_constraint(
                F::BatteryInitial,
                LinExpr::var(level[0]),
                Sense::Eq,
                battery.capacity_kwh,
            );
            for &l in level {
                model.add_constraint(
                    F::BatteryCapacity,
                    LinExpr::var(l),
                    Sense::Le,
                    battery.capacity_kwh,
                );
            }

            // period 0 is pinned by the initial level, so its flows are free
            for t in 1..n {
                let expr = LinExpr::var(level[t])
                    .with_term(level[t - 1], -1.0)
                    .with_term(charge[t], -battery.charge_kwh())
                    .with_term(discharge[t], battery.discharge_kwh());
                model.add_constraint(F::BatteryDynamics, expr, Sense::Eq, 0.0);
            }

            if self.options.exclusive_battery_modes {
                for t in 0..n {
                    let expr = LinExpr::var(charge[t]).with_term(discharge[t], 1.0);
                    model.add_constraint(F::BatteryModeExclusion, expr, Sense::Le, 1.0);
                }
            }
        }
    }

    fn add_activity_constraints(&self, model: &mut Model, vars: &ScheduleVars) {
        let grid = self.grid;
        let n = grid.periods();
        let week_len = grid.week_len();

        for (a, activity) in self.activities.iter().enumerate() {
            let start = &vars.start[a];
            let ongoing = &vars.ongoing[a];

            // the trailing partial week only gets what periodicity copies into it
            for week in grid.full_weeks() {
                let mut expr = LinExpr::new();
                for t in week.clone() {
                    expr.add_term(start[t], 1.0);
                }
                model.add_constraint(F::WeeklyOccurrence, expr, Sense::Eq, 1.0);
            }

            if let Some(week) = grid.first_week() {
                for &p in self.instance.predecessors(a) {
                    let mut expr = LinExpr::new();
                    for t in week.clone() {
                        expr.add_term(start[t], t as f64);
                        expr.add_term(vars.start[p][t], -(t as f64));
                    }
                    model.add_constraint(F::Precedence, expr, Sense::Ge, 0.0);
                }
            }

            for t in grid.periodic_from()..n {
                for series in [start, ongoing] {
                    let expr = LinExpr::var(series[t]).with_term(series[t - week_len], -1.0);
                    model.add_constraint(F::Periodicity, expr, Sense::Eq, 0.0);
                }
            }

            // starts outside business periods are fixed to zero below
            for &t in grid.valid_periods() {
                for d in 0..activity.duration {
                    if t + d >= n {
                        break;
                    }
                    let expr = LinExpr::var(start[t]).with_term(ongoing[t + d], -1.0);
                    model.add_constraint(F::DurationContiguity, expr, Sense::Le, 0.0);
                }
            }

            for t in grid.non_valid_periods() {
                model.add_constraint(F::BusinessHours, LinExpr::var(start[t]), Sense::Eq, 0.0);
                model.add_constraint(F::BusinessHours, LinExpr::var(ongoing[t]), Sense::Eq, 0.0);
            }
        }
    }

    fn add_room_constraints(&self, model: &mut Model, vars: &ScheduleVars) {
        let limits: [(F, u32, fn(&RecurringActivity) -> u32); 2] = [
            (F::SmallRooms, self.rooms.small, RecurringActivity::small_rooms),
            (F::LargeRooms, self.rooms.large, RecurringActivity::large_rooms),
        ];

        for (family, capacity, usage) in limits {
            let users: Vec<(usize, f64)> = self
                .activities
                .iter()
                .enumerate()
                .map(|(a, act)| (a, f64::from(usage(act))))
                .filter(|(_, rooms)| *rooms > 0.0)
                .collect();
            if users.is_empty() {
                continue;
            }

            for t in 0..self.grid.periods() {
                let mut expr = LinExpr::new();
                for &(a, rooms) in &users {
                    expr.add_term(vars.ongoing[a][t], rooms);
                }
                model.add_constraint(family, expr, Sense::Le, f64::from(capacity));
            }
        }
    }

    fn add_power_constraints(&self, model: &mut Model, vars: &ScheduleVars) {
        for t in 0..self.grid.periods() {
            let mut activity = LinExpr::var(vars.activity_power[t]);
            for (a, act) in self.activities.iter().enumerate() {
                activity.add_term(vars.ongoing[a][t], -act.power_kw());
            }
            model.add_constraint(F::ActivityPower, activity, Sense::Eq, 0.0);

            let mut net = LinExpr::var(vars.net_power[t]).with_term(vars.activity_power[t], -1.0);
            for (b, battery) in self.batteries.iter().enumerate() {
                net.add_term(vars.charge[b][t], -battery.charge_kwh());
                net.add_term(vars.discharge[b][t], battery.discharge_kwh());
            }
            model.add_constraint(F::NetPower, net, Sense::Eq, self.base_load[t]);

            let epigraph = LinExpr::var(vars.peak_power).with_term(vars.net_power[t], -1.0);
            model.add_constraint(F::PeakPower, epigraph, Sense::Ge, 0.0);
        }
    }

    fn set_objective(&self, model: &mut Model, vars: &ScheduleVars, objective: &Objective<'_>) {
        match objective {
            Objective::PeakPower => model.set_objective(LinExpr::var(vars.peak_power)),
            Objective::Cost {
                prices,
                peak_bound,
                weights,
            } => {
                assert_eq!(
                    prices.len(),
                    self.grid.periods(),
                    "prices must cover the grid"
                );
                let mut expr = LinExpr::constant(weights.peak_cost(*peak_bound));
                for (t, price) in prices.iter().enumerate() {
                    expr.add_term(vars.net_power[t], weights.energy_cost(1.0, *price));
                }
                model.set_objective(expr);
            }
        }
    }
}
