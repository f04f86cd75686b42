//! Post-hoc KPI computation from solved plans.

use std::fmt;

use serde::Serialize;

use super::types::PeriodResult;
use crate::instance::Battery;
use crate::model::CostWeights;

/// Aggregate indicators derived from the per-period records of a plan.
///
/// Computed from `&[PeriodResult]` rather than from solver values so the
/// report always agrees with the exported periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    /// Energy cost of the solved net power over the grid.
    pub energy_cost: f64,
    /// Net energy drawn over the grid (kWh).
    pub net_energy_kwh: f64,
    /// Highest net power (kW).
    pub peak_net_kw: f64,
    /// Period at which `peak_net_kw` occurs (first one on ties).
    pub peak_period: usize,
    /// Energy consumed by activities (kWh).
    pub activity_energy_kwh: f64,
    /// Total battery energy moved in either direction (kWh).
    pub battery_throughput_kwh: f64,
    /// Throughput over twice the total battery capacity.
    pub battery_equivalent_full_cycles: f64,
    pub peak_small_rooms: u32,
    pub peak_large_rooms: u32,
}

impl PlanReport {
    /// Computes all KPIs from the complete period record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Per-period records of a solved plan
    /// * `batteries` - Batteries of the instance, for the cycle count
    /// * `weights` - Cost weights used by the cost objective
    pub fn from_results(
        results: &[PeriodResult],
        batteries: &[Battery],
        weights: &CostWeights,
    ) -> Self {
        let mut report = Self {
            energy_cost: 0.0,
            net_energy_kwh: 0.0,
            peak_net_kw: 0.0,
            peak_period: 0,
            activity_energy_kwh: 0.0,
            battery_throughput_kwh: 0.0,
            battery_equivalent_full_cycles: 0.0,
            peak_small_rooms: 0,
            peak_large_rooms: 0,
        };
        if results.is_empty() {
            return report;
        }

        report.peak_net_kw = f64::NEG_INFINITY;
        for r in results {
            report.energy_cost += weights.energy_cost(r.net_kw, r.price);
            report.net_energy_kwh += r.net_kw * weights.period_hours;
            report.activity_energy_kwh += r.activity_kw * weights.period_hours;
            report.battery_throughput_kwh += r.charge_kwh + r.discharge_kwh;

            if r.net_kw > report.peak_net_kw {
                report.peak_net_kw = r.net_kw;
                report.peak_period = r.period;
            }
            report.peak_small_rooms = report.peak_small_rooms.max(r.small_rooms);
            report.peak_large_rooms = report.peak_large_rooms.max(r.large_rooms);
        }

        let capacity: f64 = batteries.iter().map(|b| b.capacity_kwh).sum();
        if capacity > 0.0 {
            report.battery_equivalent_full_cycles =
                report.battery_throughput_kwh / (2.0 * capacity);
        }
        report
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Plan Report ---")?;
        writeln!(f, "Energy cost:           {:.4}", self.energy_cost)?;
        writeln!(f, "Net energy:            {:.2} kWh", self.net_energy_kwh)?;
        writeln!(
            f,
            "Peak net power:        {:.2} kW (period {})",
            self.peak_net_kw, self.peak_period
        )?;
        writeln!(f, "Activity energy:       {:.2} kWh", self.activity_energy_kwh)?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        write!(
            f,
            "Peak rooms in use:     S={} L={}",
            self.peak_small_rooms, self.peak_large_rooms
        )
    }
}
