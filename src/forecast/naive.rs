//! Naive seasonal-offset forecaster and its MASE score.

use crate::error::PlanError;

use super::ForecastTable;

/// Forecasts each series by replaying its own recent history.
///
/// Series `i` is predicted by the last `periods` observations shifted back by
/// `horizons[i]` periods, so a horizon of one means "next period equals this
/// period". Series beyond the end of `horizons` use a horizon of one.
#[derive(Debug, Clone)]
pub struct NaiveForecast {
    horizons: Vec<usize>,
}

impl NaiveForecast {
    pub fn new(horizons: Vec<usize>) -> Self {
        Self { horizons }
    }

    /// Offset used for series `i`.
    pub fn horizon(&self, i: usize) -> usize {
        self.horizons.get(i).copied().unwrap_or(1).max(1)
    }

    /// Predicts `periods` values for one series.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ShapeMismatch`] if the history holds fewer than
    /// `periods + horizon` observations.
    pub fn forecast_series(
        &self,
        history: &[f64],
        horizon: usize,
        periods: usize,
    ) -> Result<Vec<f64>, PlanError> {
        let needed = periods + horizon;
        if history.len() < needed {
            return Err(PlanError::shape("forecast history", needed, history.len()));
        }
        let end = history.len() - horizon;
        Ok(history[end - periods..end].to_vec())
    }

    /// Forecasts every row of `history`, keeping the labels.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ShapeMismatch`] naming the first row that is too short.
    pub fn forecast(
        &self,
        history: &ForecastTable,
        periods: usize,
    ) -> Result<ForecastTable, PlanError> {
        let mut rows = Vec::with_capacity(history.rows.len());
        for (i, row) in history.rows.iter().enumerate() {
            let horizon = self.horizon(i);
            let predicted = self.forecast_series(row, horizon, periods).map_err(|_| {
                PlanError::shape(
                    format!("history of \"{}\"", history.labels[i]),
                    periods + horizon,
                    row.len(),
                )
            })?;
            rows.push(predicted);
        }
        Ok(ForecastTable {
            labels: history.labels.clone(),
            rows,
        })
    }

    /// Scores each row by predicting its last `periods` observations from
    /// the observations before them.
    ///
    /// Rows too short to hold out `periods` values score `None`.
    pub fn backtest(
        &self,
        history: &ForecastTable,
        periods: usize,
        season: usize,
    ) -> Vec<Option<f64>> {
        history
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let train = row.get(..row.len().checked_sub(periods)?)?;
                let predicted = self.forecast_series(train, self.horizon(i), periods).ok()?;
                mase(&predicted, row, season)
            })
            .collect()
    }
}

/// Mean absolute scaled error of `predicted` against the tail of `actual`.
///
/// `actual` holds the full observed series; its last `predicted.len()` values
/// are the ones being predicted. The error is scaled by the in-sample
/// seasonal naive error over the whole of `actual`. Returns `None` when the
/// series is too short or the scale is zero.
pub fn mase(predicted: &[f64], actual: &[f64], season: usize) -> Option<f64> {
    let horizon = predicted.len();
    let n = actual.len();
    if horizon == 0 || season == 0 || n < horizon || n <= season {
        return None;
    }

    let current = &actual[n - horizon..];
    let error: f64 = predicted
        .iter()
        .zip(current)
        .map(|(p, a)| (p - a).abs())
        .sum();

    let seasonal: f64 = (season..n).map(|i| (actual[i] - actual[i - season]).abs()).sum();
    let scale = seasonal * horizon as f64 / (n - season) as f64;
    if scale == 0.0 {
        return None;
    }

    Some(error / scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecast_matches_horizon_length() {
        let history: Vec<f64> = (0..20).map(f64::from).collect();
        let forecast = NaiveForecast::new(vec![1]).forecast_series(&history, 1, 7).unwrap();
        assert_eq!(forecast.len(), 7);
    }

    #[test]
    fn forecast_replays_shifted_history() {
        let history: Vec<f64> = (0..10).map(f64::from).collect();
        let naive = NaiveForecast::new(vec![1, 4]);
        assert_eq!(naive.forecast_series(&history, 1, 3).unwrap(), [6.0, 7.0, 8.0]);
        assert_eq!(naive.forecast_series(&history, 4, 3).unwrap(), [3.0, 4.0, 5.0]);
    }

    #[test]
    fn short_history_is_shape_error() {
        let history = vec![1.0; 5];
        let naive = NaiveForecast::new(vec![2]);
        assert!(matches!(
            naive.forecast_series(&history, 2, 4),
            Err(PlanError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn table_forecast_uses_per_row_horizons() {
        let history = ForecastTable {
            labels: vec!["a".into(), "b".into(), "c".into()],
            rows: vec![
                (0..6).map(f64::from).collect(),
                (10..16).map(f64::from).collect(),
                (20..26).map(f64::from).collect(),
            ],
        };
        let rows = NaiveForecast::new(vec![1, 2]).forecast(&history, 2).unwrap().rows;
        assert_eq!(rows[0], vec![3.0, 4.0]);
        assert_eq!(rows[1], vec![12.0, 13.0]);
        // Missing horizon falls back to one period
        assert_eq!(rows[2], vec![23.0, 24.0]);
    }

    #[test]
    fn perfect_prediction_scores_zero() {
        let actual = vec![1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
        let score = mase(&actual[4..], &actual, 1);
        assert_eq!(score, Some(0.0));
    }

    #[test]
    fn mase_matches_hand_computation() {
        let actual = vec![1.0, 2.0, 3.0, 4.0];
        // Seasonal naive error with season 1: |1|+|1|+|1| = 3 over 3 steps,
        // scaled to horizon 2 gives 2. Prediction error is 1 + 1 = 2.
        let score = mase(&[2.0, 3.0], &actual, 1);
        assert!(score.is_some_and(|s| (s - 1.0).abs() < 1e-12));
    }

    #[test]
    fn backtest_scores_every_row() {
        let history = ForecastTable {
            labels: vec!["a".into(), "b".into()],
            rows: vec![(0..12).map(f64::from).collect(), vec![1.0; 3]],
        };
        let scores = NaiveForecast::new(vec![1]).backtest(&history, 2, 1);
        assert_eq!(scores.len(), 2);
        // a ramp predicted three steps late is off by 3 against a scale of 2
        assert!(scores[0].is_some_and(|s| (s - 3.0).abs() < 1e-12));
        assert_eq!(scores[1], None);
    }

    #[test]
    fn flat_history_has_no_scale() {
        let actual = vec![2.0; 10];
        assert_eq!(mase(&[1.0, 1.0], &actual, 2), None);
        assert_eq!(mase(&[1.0], &[1.0], 1), None);
    }
}
