//! Solver-agnostic linear model with continuous and binary variables.
//!
//! A [`Model`] is a list of variable definitions, tagged linear constraints
//! and a linear objective to minimise. It knows nothing about any solver;
//! backends implementing [`crate::solver::MilpSolver`] translate it. The
//! same model can check any [`Assignment`] against itself, which is how
//! solved schedules are verified and how a timed-out solve is told apart
//! from one without an incumbent.

pub mod builder;

use std::fmt;

pub use builder::{
    BuilderOptions, CostWeights, ModelBuilder, Objective, ScheduleModel, ScheduleVars,
};

/// Handle to a variable of a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    /// Position of the variable in [`Model::vars`].
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    /// Integral in `[0, 1]`.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDef {
    pub kind: VarKind,
    pub lower: f64,
    /// `f64::INFINITY` when unbounded above.
    pub upper: f64,
}

/// `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// A constant expression.
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// A single `1.0 * var` term.
    pub fn var(var: VarId) -> Self {
        Self {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }

    /// Adds `coef * var`. Zero coefficients are dropped.
    pub fn add_term(&mut self, var: VarId, coef: f64) -> &mut Self {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    /// Builder form of [`LinExpr::add_term`].
    pub fn with_term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression under `assignment`.
    pub fn evaluate(&self, assignment: &Assignment) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * assignment.value(*v))
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Ge => write!(f, ">="),
            Sense::Eq => write!(f, "=="),
        }
    }
}

/// Which rule of the schedule a constraint encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintFamily {
    BatteryInitial,
    BatteryCapacity,
    BatteryDynamics,
    WeeklyOccurrence,
    Precedence,
    Periodicity,
    DurationContiguity,
    BusinessHours,
    SmallRooms,
    LargeRooms,
    PeakPower,
    ActivityPower,
    NetPower,
    BatteryModeExclusion,
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintFamily::BatteryInitial => "battery initial level",
            ConstraintFamily::BatteryCapacity => "battery capacity",
            ConstraintFamily::BatteryDynamics => "battery dynamics",
            ConstraintFamily::WeeklyOccurrence => "weekly occurrence",
            ConstraintFamily::Precedence => "precedence",
            ConstraintFamily::Periodicity => "periodicity",
            ConstraintFamily::DurationContiguity => "duration contiguity",
            ConstraintFamily::BusinessHours => "business hours",
            ConstraintFamily::SmallRooms => "small room capacity",
            ConstraintFamily::LargeRooms => "large room capacity",
            ConstraintFamily::PeakPower => "peak power",
            ConstraintFamily::ActivityPower => "activity power",
            ConstraintFamily::NetPower => "net power",
            ConstraintFamily::BatteryModeExclusion => "battery mode exclusion",
        };
        write!(f, "{name}")
    }
}

/// `expr (sense) rhs`, tagged with its family.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub family: ConstraintFamily,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Magnitude used to scale feasibility tolerances: one plus the largest
    /// absolute coefficient or right-hand side.
    pub fn scale(&self) -> f64 {
        1.0 + self
            .expr
            .terms()
            .iter()
            .map(|(_, k)| k.abs())
            .fold(self.rhs.abs(), f64::max)
    }

    /// Whether `lhs` satisfies the constraint within `tol`.
    pub fn holds(&self, lhs: f64, tol: f64) -> bool {
        match self.sense {
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Ge => lhs >= self.rhs - tol,
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}

/// A value for every variable of a model, indexed by [`VarId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment(Vec<f64>);

impl Assignment {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.0[var.0]
    }

    /// Value rounded to a boolean (`> 0.5`).
    pub fn is_set(&self, var: VarId) -> bool {
        self.value(var) > 0.5
    }

    pub fn set(&mut self, var: VarId, value: f64) {
        self.0[var.0] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single way in which an assignment breaks a model.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// The assignment has the wrong number of values.
    Size { expected: usize, actual: usize },
    Bound {
        var: VarId,
        value: f64,
        lower: f64,
        upper: f64,
    },
    Integrality { var: VarId, value: f64 },
    Constraint {
        index: usize,
        family: ConstraintFamily,
        lhs: f64,
        sense: Sense,
        rhs: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Size { expected, actual } => {
                write!(f, "assignment has {actual} values, model has {expected} variables")
            }
            Violation::Bound {
                var,
                value,
                lower,
                upper,
            } => write!(
                f,
                "variable {} = {value} outside [{lower}, {upper}]",
                var.index()
            ),
            Violation::Integrality { var, value } => {
                write!(f, "binary variable {} = {value} is fractional", var.index())
            }
            Violation::Constraint {
                index,
                family,
                lhs,
                sense,
                rhs,
            } => write!(f, "{family} constraint #{index}: {lhs} {sense} {rhs} fails"),
        }
    }
}

/// A minimisation problem over continuous and binary variables.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<VarDef>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a continuous variable in `[lower, upper]`.
    pub fn add_continuous(&mut self, lower: f64, upper: f64) -> VarId {
        self.push_var(VarDef {
            kind: VarKind::Continuous,
            lower,
            upper,
        })
    }

    pub fn add_binary(&mut self) -> VarId {
        self.push_var(VarDef {
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
        })
    }

    fn push_var(&mut self, def: VarDef) -> VarId {
        self.vars.push(def);
        VarId(self.vars.len() - 1)
    }

    /// Adds `expr (sense) rhs`. Constants in `expr` count towards the left side.
    pub fn add_constraint(
        &mut self,
        family: ConstraintFamily,
        expr: LinExpr,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            family,
            expr,
            sense,
            rhs,
        });
    }

    /// Sets the expression to minimise.
    pub fn set_objective(&mut self, objective: LinExpr) {
        self.objective = objective;
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn var(&self, id: VarId) -> &VarDef {
        &self.vars[id.0]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    /// Number of binary variables.
    pub fn binary_count(&self) -> usize {
        self.vars
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .count()
    }

    /// Constraints of one family.
    pub fn family(&self, family: ConstraintFamily) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    /// Turns every binary into a continuous variable on `[0, 1]`.
    pub fn relax_integrality(&mut self) {
        for v in &mut self.vars {
            v.kind = VarKind::Continuous;
        }
    }

    /// Objective value under `assignment`.
    pub fn objective_value(&self, assignment: &Assignment) -> f64 {
        self.objective.evaluate(assignment)
    }

    /// Every bound, integrality requirement and constraint `assignment` breaks.
    ///
    /// Bounds and integrality are checked against `tol`; each constraint
    /// against `tol` times its [`Constraint::scale`]. An empty result means
    /// the assignment is feasible.
    pub fn violations(&self, assignment: &Assignment, tol: f64) -> Vec<Violation> {
        if assignment.len() != self.vars.len() {
            return vec![Violation::Size {
                expected: self.vars.len(),
                actual: assignment.len(),
            }];
        }

        let mut found = Vec::new();
        for (i, def) in self.vars.iter().enumerate() {
            let var = VarId(i);
            let value = assignment.value(var);
            if !(value >= def.lower - tol && value <= def.upper + tol) {
                found.push(Violation::Bound {
                    var,
                    value,
                    lower: def.lower,
                    upper: def.upper,
                });
            }
            if def.kind == VarKind::Binary && (value - value.round()).abs() > tol {
                found.push(Violation::Integrality { var, value });
            }
        }

        for (index, c) in self.constraints.iter().enumerate() {
            let lhs = c.expr.evaluate(assignment);
            if !c.holds(lhs, tol * c.scale()) {
                found.push(Violation::Constraint {
                    index,
                    family: c.family,
                    lhs,
                    sense: c.sense,
                    rhs: c.rhs,
                });
            }
        }
        found
    }

    /// Whether `assignment` satisfies the whole model within `tol`.
    pub fn is_feasible(&self, assignment: &Assignment, tol: f64) -> bool {
        self.violations(assignment, tol).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knapsack() -> (Model, VarId, VarId, VarId) {
        let mut m = Model::new();
        let x = m.add_binary();
        let y = m.add_binary();
        let z = m.add_continuous(0.0, 10.0);
        m.add_constraint(
            ConstraintFamily::SmallRooms,
            LinExpr::var(x).with_term(y, 1.0),
            Sense::Le,
            1.0,
        );
        m.add_constraint(
            ConstraintFamily::NetPower,
            LinExpr::var(z).with_term(x, -4.0),
            Sense::Eq,
            2.0,
        );
        m.set_objective(LinExpr::constant(1.5).with_term(z, 2.0));
        (m, x, y, z)
    }

    #[test]
    fn feasible_assignment_has_no_violations() {
        let (m, ..) = knapsack();
        let a = Assignment::new(vec![1.0, 0.0, 6.0]);
        assert!(m.violations(&a, 1e-9).is_empty());
        assert_eq!(m.objective_value(&a), 13.5);
    }

    #[test]
    fn broken_constraint_is_reported_with_family() {
        let (m, ..) = knapsack();
        let a = Assignment::new(vec![1.0, 1.0, 6.0]);
        let v = m.violations(&a, 1e-9);
        assert_eq!(v.len(), 1);
        assert!(matches!(
            v[0],
            Violation::Constraint {
                family: ConstraintFamily::SmallRooms,
                ..
            }
        ));
    }

    #[test]
    fn fractional_binary_breaks_integrality_until_relaxed() {
        let (mut m, x, ..) = knapsack();
        let mut a = Assignment::new(vec![0.5, 0.0, 4.0]);
        assert!(
            m.violations(&a, 1e-9)
                .iter()
                .any(|v| matches!(v, Violation::Integrality { var, .. } if *var == x))
        );

        m.relax_integrality();
        assert_eq!(m.binary_count(), 0);
        assert!(m.is_feasible(&a, 1e-9));

        a.set(x, 1.5);
        assert!(
            m.violations(&a, 1e-9)
                .iter()
                .any(|v| matches!(v, Violation::Bound { .. }))
        );
    }

    #[test]
    fn wrong_length_assignment_is_a_single_violation() {
        let (m, ..) = knapsack();
        let v = m.violations(&Assignment::new(vec![0.0]), 1e-9);
        assert_eq!(
            v,
            vec![Violation::Size {
                expected: 3,
                actual: 1
            }]
        );
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let mut e = LinExpr::new();
        e.add_term(VarId(0), 0.0).add_term(VarId(1), 2.0).add_constant(3.0);
        assert_eq!(e.terms(), &[(VarId(1), 2.0)]);
        assert_eq!(e.constant_term(), 3.0);
        assert!(!e.is_constant());
    }
}
