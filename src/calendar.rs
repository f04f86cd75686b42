//! Calendar derivation for the fixed-length planning grid.
//!
//! The grid is a run of equally long periods starting at midnight of
//! `start_date`. Weeks start on Mondays: every period before the first
//! Monday belongs to the lead-in, after which the grid is cut into
//! `week_len` chunks (the last one possibly shorter). Recurring activities
//! may only run inside the business window of a weekday within a week.

use std::ops::Range;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Deserialize;

/// Explicit description of the planning calendar.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarSpec {
    /// Date of the first period (the grid starts at 00:00).
    pub start_date: NaiveDate,
    /// Number of periods on the grid.
    pub periods: usize,
    /// Length of one period in minutes (must divide a day).
    pub period_minutes: u32,
    /// First business hour (inclusive).
    pub business_start_hour: u32,
    /// Last business hour (exclusive).
    pub business_end_hour: u32,
}

impl Default for CalendarSpec {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 11, 1).unwrap_or_default(),
            periods: 2880,
            period_minutes: 15,
            business_start_hour: 9,
            business_end_hour: 17,
        }
    }
}

impl CalendarSpec {
    /// Length of one period in hours.
    pub fn period_hours(&self) -> f64 {
        f64::from(self.period_minutes) / 60.0
    }
}

/// Index sets derived from a [`CalendarSpec`].
///
/// # Examples
///
/// ```
/// use ppoi_planner::calendar::{CalendarSpec, TimeGrid};
///
/// let grid = TimeGrid::derive(&CalendarSpec::default());
/// assert_eq!(grid.lead_in(), 96);
/// assert_eq!(grid.week_len(), 672);
/// assert_eq!(grid.full_weeks().count(), 4);
/// assert_eq!(grid.valid_periods()[0], 132);
/// ```
#[derive(Debug, Clone)]
pub struct TimeGrid {
    start: NaiveDateTime,
    period_minutes: u32,
    periods_per_day: usize,
    lead_in: usize,
    week_len: usize,
    weeks: Vec<Range<usize>>,
    day_of_week: Vec<u8>,
    time_of_day: Vec<usize>,
    valid: Vec<bool>,
    valid_periods: Vec<usize>,
}

impl TimeGrid {
    /// Derives the grid from an explicit calendar.
    ///
    /// # Panics
    ///
    /// Panics if `periods` is zero, if `period_minutes` does not divide a day,
    /// or if the business window is empty. [`crate::config::PlannerConfig::validate`]
    /// rejects such calendars up front.
    pub fn derive(spec: &CalendarSpec) -> Self {
        assert!(spec.periods > 0, "periods must be > 0");
        assert!(
            spec.period_minutes > 0 && 1440 % spec.period_minutes == 0,
            "period_minutes must divide a day"
        );
        assert!(
            spec.business_start_hour < spec.business_end_hour,
            "business window must not be empty"
        );

        let periods = spec.periods;
        let periods_per_day = (1440 / spec.period_minutes) as usize;
        let week_len = 7 * periods_per_day;

        let first_weekday = spec.start_date.weekday().num_days_from_monday() as usize;
        let days_to_monday = (7 - first_weekday) % 7;
        let lead_in = (days_to_monday * periods_per_day).min(periods);

        let mut weeks = Vec::new();
        let mut week_start = lead_in;
        while week_start < periods {
            let week_end = (week_start + week_len).min(periods);
            weeks.push(week_start..week_end);
            week_start = week_end;
        }

        let business_start = (spec.business_start_hour * 60 / spec.period_minutes) as usize;
        let business_end = (spec.business_end_hour * 60 / spec.period_minutes) as usize;

        let mut day_of_week = Vec::with_capacity(periods);
        let mut time_of_day = Vec::with_capacity(periods);
        let mut valid = Vec::with_capacity(periods);
        let mut valid_periods = Vec::new();

        for t in 0..periods {
            // 0 = Monday
            let weekday = (first_weekday + t / periods_per_day) % 7;
            let tod = t % periods_per_day;
            let is_valid =
                t >= lead_in && weekday < 5 && tod >= business_start && tod < business_end;

            day_of_week.push(weekday as u8 + 1);
            time_of_day.push(tod);
            valid.push(is_valid);
            if is_valid {
                valid_periods.push(t);
            }
        }

        Self {
            start: spec.start_date.and_time(NaiveTime::MIN),
            period_minutes: spec.period_minutes,
            periods_per_day,
            lead_in,
            week_len,
            weeks,
            day_of_week,
            time_of_day,
            valid,
            valid_periods,
        }
    }

    /// Number of periods on the grid.
    pub fn periods(&self) -> usize {
        self.day_of_week.len()
    }

    pub fn periods_per_day(&self) -> usize {
        self.periods_per_day
    }

    /// Periods before the first Monday 00:00.
    pub fn lead_in(&self) -> usize {
        self.lead_in
    }

    /// Periods in one week.
    pub fn week_len(&self) -> usize {
        self.week_len
    }

    /// All weeks in order; the last one may be partial.
    pub fn weeks(&self) -> &[Range<usize>] {
        &self.weeks
    }

    /// Weeks that span a full `week_len` periods.
    pub fn full_weeks(&self) -> impl Iterator<Item = &Range<usize>> + '_ {
        self.weeks.iter().filter(|w| w.len() == self.week_len)
    }

    /// The reference week whose pattern later weeks repeat.
    pub fn first_week(&self) -> Option<&Range<usize>> {
        self.weeks.first()
    }

    /// First period that must repeat the period one week earlier.
    pub fn periodic_from(&self) -> usize {
        self.lead_in + self.week_len
    }

    /// ISO day of week of period `t` (1 = Monday, 7 = Sunday).
    pub fn day_of_week(&self, t: usize) -> u8 {
        self.day_of_week[t]
    }

    /// Index of period `t` within its day.
    pub fn time_of_day(&self, t: usize) -> usize {
        self.time_of_day[t]
    }

    /// Whether recurring activities may occupy period `t`.
    pub fn is_valid(&self, t: usize) -> bool {
        self.valid[t]
    }

    /// Business periods in ascending order.
    pub fn valid_periods(&self) -> &[usize] {
        &self.valid_periods
    }

    /// Complement of [`TimeGrid::valid_periods`], ascending.
    pub fn non_valid_periods(&self) -> impl Iterator<Item = usize> + '_ {
        self.valid
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(t, _)| t)
    }

    /// Wall-clock start of period `t`.
    pub fn period_start(&self, t: usize) -> NaiveDateTime {
        self.start + TimeDelta::minutes(t as i64 * i64::from(self.period_minutes))
    }

    /// Wall-clock end of period `t`, which is how settlement data labels it.
    pub fn period_end(&self, t: usize) -> NaiveDateTime {
        self.period_start(t + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn november() -> TimeGrid {
        TimeGrid::derive(&CalendarSpec::default())
    }

    #[test]
    fn november_weeks_match_fixed_layout() {
        let grid = november();
        assert_eq!(grid.periods(), 2880);
        assert_eq!(grid.periods_per_day(), 96);
        assert_eq!(grid.lead_in(), 96);
        assert_eq!(grid.week_len(), 672);
        assert_eq!(
            grid.weeks(),
            &[96..768, 768..1440, 1440..2112, 2112..2784, 2784..2880]
        );
        assert_eq!(grid.full_weeks().count(), 4);
        assert_eq!(grid.periodic_from(), 768);
    }

    #[test]
    fn november_day_of_week_starts_on_sunday_and_ends_on_monday() {
        let grid = november();
        assert_eq!(grid.day_of_week(0), 7);
        assert_eq!(grid.day_of_week(95), 7);
        assert_eq!(grid.day_of_week(96), 1);
        assert_eq!(grid.day_of_week(96 + 4 * 96), 5);
        assert_eq!(grid.day_of_week(2879), 1);
        assert_eq!(grid.time_of_day(2879), 95);
        assert_eq!(grid.time_of_day(132), 36);
    }

    #[test]
    fn november_business_periods() {
        let grid = november();
        let valid = grid.valid_periods();
        // 4 full weeks of 5 days plus Monday 30 November, 32 periods each
        assert_eq!(valid.len(), 32 * (4 * 5 + 1));
        assert_eq!(valid[0], 132);
        assert_eq!(valid[31], 163);
        assert_eq!(valid[32], 132 + 96);
        assert!(valid.iter().all(|&t| t < 2880));
        assert_eq!(*valid.last().unwrap(), 2784 + 36 + 31);
        assert!(!grid.is_valid(131));
        assert!(!grid.is_valid(164));
        // Saturday of week 1
        assert!(!grid.is_valid(96 + 5 * 96 + 40));
    }

    #[test]
    fn non_valid_is_complement() {
        let grid = november();
        let non_valid: Vec<usize> = grid.non_valid_periods().collect();
        assert_eq!(non_valid.len() + grid.valid_periods().len(), grid.periods());
        assert!(non_valid.iter().all(|&t| !grid.is_valid(t)));
    }

    #[test]
    fn mid_week_start_excludes_lead_in_business_days() {
        // 3 March 2021 is a Wednesday
        let spec = CalendarSpec {
            start_date: NaiveDate::from_ymd_opt(2021, 3, 3).unwrap(),
            periods: 24 * 19,
            period_minutes: 60,
            business_start_hour: 9,
            business_end_hour: 17,
        };
        let grid = TimeGrid::derive(&spec);
        assert_eq!(grid.lead_in(), 5 * 24);
        assert_eq!(grid.weeks(), &[120..288, 288..456]);
        assert_eq!(grid.valid_periods()[0], 120 + 9);
        assert!(!grid.is_valid(9));
        assert_eq!(grid.valid_periods().len(), 2 * 5 * 8);
    }

    #[test]
    fn monday_start_has_no_lead_in() {
        let spec = CalendarSpec {
            start_date: NaiveDate::from_ymd_opt(2020, 11, 2).unwrap(),
            periods: 24 * 7,
            period_minutes: 60,
            ..CalendarSpec::default()
        };
        let grid = TimeGrid::derive(&spec);
        assert_eq!(grid.lead_in(), 0);
        assert_eq!(grid.weeks(), &[0..168]);
        assert_eq!(grid.day_of_week(0), 1);
    }

    #[test]
    fn period_start_advances_by_period_length() {
        let grid = november();
        let t = grid.period_start(132);
        assert_eq!(t.to_string(), "2020-11-02 09:00:00");
        assert_eq!(grid.period_end(0).to_string(), "2020-11-01 00:15:00");
    }

    #[test]
    #[should_panic]
    fn zero_periods_panics() {
        TimeGrid::derive(&CalendarSpec {
            periods: 0,
            ..CalendarSpec::default()
        });
    }
}
