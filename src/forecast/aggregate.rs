//! Net load aggregation: buildings minus solar, period by period.

use crate::error::PlanError;
use crate::instance::InstanceCounts;

use super::ForecastTable;

/// What a forecast row measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRole {
    /// Consumption, added to the net load.
    Building,
    /// Production, subtracted from the net load.
    Solar,
}

/// The usual row layout: every building row, then every solar row.
pub fn default_roles(counts: &InstanceCounts) -> Vec<EntityRole> {
    let mut roles = vec![EntityRole::Building; counts.buildings];
    roles.extend(std::iter::repeat_n(EntityRole::Solar, counts.solar));
    roles
}

/// Net building load per period, in kW.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetLoadSeries(Vec<f64>);

impl NetLoadSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// A constant series, mostly useful in tests.
    pub fn constant(value: f64, periods: usize) -> Self {
        Self(vec![value; periods])
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

    /// Largest value in the series, or zero when empty.
    pub fn peak(&self) -> f64 {
        self.0.iter().copied().fold(0.0_f64, f64::max)
    }
}

/// Sums building rows and subtracts solar rows for each of `periods`.
///
/// # Errors
///
/// Returns [`PlanError::ShapeMismatch`] if the table does not have exactly
/// one row per role or a row does not have exactly `periods` values.
pub fn aggregate_net_load(
    table: &ForecastTable,
    roles: &[EntityRole],
    periods: usize,
) -> Result<NetLoadSeries, PlanError> {
    if table.rows.len() != roles.len() {
        return Err(PlanError::shape(
            "forecast rows",
            roles.len(),
            table.rows.len(),
        ));
    }

    let mut net = vec![0.0; periods];
    for (i, (row, role)) in table.rows.iter().zip(roles).enumerate() {
        if row.len() != periods {
            return Err(PlanError::shape(
                format!("forecast row {i} (\"{}\")", table.labels[i]),
                periods,
                row.len(),
            ));
        }
        let sign = match role {
            EntityRole::Building => 1.0,
            EntityRole::Solar => -1.0,
        };
        for (acc, v) in net.iter_mut().zip(row) {
            *acc += sign * v;
        }
    }

    Ok(NetLoadSeries(net))
}
