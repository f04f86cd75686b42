//! HiGHS backend through `good_lp`.

use std::time::Instant;

use good_lp::solvers::WithTimeLimit;
use good_lp::solvers::highs::highs;
use good_lp::variable::VariableDefinition;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};
use tracing::debug;

use super::{MilpSolver, SolveError, SolveLimits, SolverOutput, classify};
use crate::model::{Assignment, LinExpr, Model, Sense, VarDef, VarKind};

/// Solves models with the HiGHS MIP solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

impl MilpSolver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, model: &Model, limits: &SolveLimits) -> Result<SolverOutput, SolveError> {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .vars()
            .iter()
            .map(|def| vars.add(definition(def)))
            .collect();

        let objective = expression(model.objective(), &handles);
        let mut problem = vars
            .minimise(objective)
            .using(highs)
            .with_time_limit(limits.time_limit.as_secs_f64());

        for c in model.constraints() {
            let lhs = expression(&c.expr, &handles);
            let rhs = c.rhs;
            let row = match c.sense {
                Sense::Le => constraint!(lhs <= rhs),
                Sense::Ge => constraint!(lhs >= rhs),
                Sense::Eq => constraint!(lhs == rhs),
            };
            problem.add_constraint(row);
        }

        debug!(
            vars = handles.len(),
            rows = model.constraints().len(),
            limit_secs = limits.time_limit.as_secs_f64(),
            "handing model to HiGHS"
        );

        let started = Instant::now();
        let result = problem.solve();
        let elapsed = started.elapsed();

        let solution = match result {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => return Err(SolveError::Infeasible),
            Err(_) if limits.reached(elapsed) => return Err(SolveError::NoIncumbent),
            Err(e) => return Err(SolveError::Backend(e.to_string())),
        };

        let values = handles.iter().map(|v| solution.value(*v)).collect();
        classify(model, Assignment::new(values), elapsed, limits)
    }
}

fn definition(def: &VarDef) -> VariableDefinition {
    let mut v = variable().min(def.lower);
    if def.upper.is_finite() {
        v = v.max(def.upper);
    }
    if def.kind == VarKind::Binary {
        v = v.integer();
    }
    v
}

fn expression(expr: &LinExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant_term());
    for (var, coef) in expr.terms() {
        out += *coef * handles[var.index()];
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::ConstraintFamily;
    use crate::solver::SolveStatus;

    fn limits() -> SolveLimits {
        SolveLimits {
            time_limit: Duration::from_secs(30),
        }
    }

    #[test]
    fn picks_cheapest_binary() {
        // minimise 3x + 2y + 1 subject to x + y >= 1
        let mut m = Model::new();
        let x = m.add_binary();
        let y = m.add_binary();
        m.add_constraint(
            ConstraintFamily::WeeklyOccurrence,
            LinExpr::var(x).with_term(y, 1.0),
            Sense::Ge,
            1.0,
        );
        m.set_objective(LinExpr::constant(1.0).with_term(x, 3.0).with_term(y, 2.0));

        let out = HighsSolver.solve(&m, &limits()).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert!(!out.assignment.is_set(x) && out.assignment.is_set(y));
        assert!((out.objective - 3.0).abs() < 1e-6);
    }

    #[test]
    fn epigraph_finds_the_max() {
        // minimise z subject to z >= 4, z >= 7 - w, w in [0, 1]
        let mut m = Model::new();
        let z = m.add_continuous(0.0, f64::INFINITY);
        let w = m.add_continuous(0.0, 1.0);
        m.add_constraint(ConstraintFamily::PeakPower, LinExpr::var(z), Sense::Ge, 4.0);
        m.add_constraint(
            ConstraintFamily::PeakPower,
            LinExpr::var(z).with_term(w, 1.0),
            Sense::Ge,
            7.0,
        );
        m.set_objective(LinExpr::var(z));

        let out = HighsSolver.solve(&m, &limits()).unwrap();
        assert!((out.assignment.value(z) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn contradiction_is_infeasible() {
        let mut m = Model::new();
        let x = m.add_binary();
        m.add_constraint(ConstraintFamily::WeeklyOccurrence, LinExpr::var(x), Sense::Eq, 1.0);
        m.add_constraint(ConstraintFamily::BusinessHours, LinExpr::var(x), Sense::Eq, 0.0);
        m.set_objective(LinExpr::var(x));

        assert!(matches!(
            HighsSolver.solve(&m, &limits()),
            Err(SolveError::Infeasible)
        ));
    }
}
