//! Per-period view of a solved schedule.

use std::fmt;

use chrono::NaiveDateTime;

/// Complete record of one grid period of a solved plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodResult {
    /// Period index.
    pub period: usize,
    /// Wall-clock start of the period.
    pub start: NaiveDateTime,
    /// ISO day of week (1 = Monday).
    pub day_of_week: u8,
    /// Period index within its day.
    pub time_of_day: usize,
    /// Forecast net building load (kW).
    pub base_kw: f64,
    /// Load of all ongoing activities (kW, positive).
    pub activity_kw: f64,
    /// Energy drawn by charging batteries this period (kWh, positive).
    pub charge_kwh: f64,
    /// Energy delivered by discharging batteries this period (kWh, positive).
    pub discharge_kwh: f64,
    /// Net battery contribution (`charge - discharge`; positive = charging).
    pub battery_kw: f64,
    /// Solved net power (kW).
    pub net_kw: f64,
    /// Wholesale price ($/MWh).
    pub price: f64,
    /// Small rooms in use.
    pub small_rooms: u32,
    /// Large rooms in use.
    pub large_rooms: u32,
}

impl fmt::Display for PeriodResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} ({} d{} q{:>2}) | net={:>8.2} kW | base={:.2}  act={:.2}  bat={:.2} \
             | price={:.2} | rooms S={} L={}",
            self.period,
            self.start.format("%Y-%m-%d %H:%M"),
            self.day_of_week,
            self.time_of_day,
            self.net_kw,
            self.base_kw,
            self.activity_kw,
            self.battery_kw,
            self.price,
            self.small_rooms,
            self.large_rooms,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn period_result_display_shows_time_and_net() {
        let start = NaiveDate::from_ymd_opt(2020, 11, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let r = PeriodResult {
            period: 132,
            start,
            day_of_week: 1,
            time_of_day: 36,
            base_kw: 100.0,
            activity_kw: 12.5,
            charge_kwh: 0.0,
            discharge_kwh: 4.5,
            battery_kw: -4.5,
            net_kw: 108.0,
            price: 41.2,
            small_rooms: 2,
            large_rooms: 0,
        };
        let s = r.to_string();
        assert!(s.contains("2020-11-02 09:00"));
        assert!(s.contains("net=  108.00 kW"));
    }
}
