//! TOML-based planner configuration and preset definitions.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::calendar::CalendarSpec;

/// Top-level planner configuration parsed from TOML.
///
/// All fields have defaults matching the November 2020 competition month.
/// Load from TOML with [`PlannerConfig::from_toml_file`] or use
/// [`PlannerConfig::november_2020`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Time grid layout.
    #[serde(default)]
    pub calendar: CalendarSpec,
    /// Solver limits.
    #[serde(default)]
    pub solver: SolverConfig,
    /// Cost objective weights.
    #[serde(default)]
    pub objective: ObjectiveConfig,
    /// Battery modelling switches.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Multi-instance execution.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Naive forecaster parameters.
    #[serde(default)]
    pub forecast: ForecastConfig,
}

/// Solver limits applied to each phase.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Wall-clock limit per phase, in seconds.
    pub time_limit_secs: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 180.0,
        }
    }
}

impl SolverConfig {
    /// The per-phase limit as a `Duration`.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs.max(0.0))
    }
}

/// Weights of the phase 2 cost objective.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObjectiveConfig {
    /// Divisor turning `kWh * price` into currency (AEMO prices are per MWh).
    pub price_divisor: f64,
    /// Coefficient of the squared phase 1 peak bound.
    pub peak_penalty: f64,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            price_divisor: 1000.0,
            peak_penalty: 0.005,
        }
    }
}

/// Battery modelling switches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Forbid charging and discharging the same battery in the same period.
    pub exclusive_modes: bool,
}

/// Multi-instance execution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Worker threads; `0` uses one per CPU.
    pub threads: usize,
}

/// Naive seasonal-offset forecaster parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Offset, in periods, used for each history row.
    pub horizons: Vec<usize>,
    /// Season length used by the MASE denominator.
    pub mase_season: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 4, 1, 2, 2, 1, 1, 1, 1, 1, 1, 1],
            mase_season: 672,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"calendar.periods"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl PlannerConfig {
    /// The November 2020 month with the three minute phase limit.
    pub fn november_2020() -> Self {
        Self::default()
    }

    /// November 2020 with charge/discharge mutual exclusion enabled.
    pub fn exclusive_batteries() -> Self {
        Self {
            battery: BatteryConfig {
                exclusive_modes: true,
            },
            ..Self::default()
        }
    }

    /// November 2020 with a short time limit for smoke runs.
    pub fn quick() -> Self {
        Self {
            solver: SolverConfig {
                time_limit_secs: 20.0,
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["november_2020", "exclusive_batteries", "quick"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "november_2020" => Ok(Self::november_2020()),
            "exclusive_batteries" => Ok(Self::exclusive_batteries()),
            "quick" => Ok(Self::quick()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let c = &self.calendar;

        if c.periods == 0 {
            errors.push(ConfigError::new("calendar.periods", "must be > 0"));
        }
        if c.period_minutes == 0 || 1440 % c.period_minutes != 0 {
            errors.push(ConfigError::new(
                "calendar.period_minutes",
                "must be > 0 and divide 1440",
            ));
        } else {
            let start_min = c.business_start_hour * 60;
            let end_min = c.business_end_hour * 60;
            if start_min % c.period_minutes != 0 || end_min % c.period_minutes != 0 {
                errors.push(ConfigError::new(
                    "calendar.business_start_hour",
                    "business window must align with period boundaries",
                ));
            }
        }
        if c.business_start_hour >= c.business_end_hour {
            errors.push(ConfigError::new(
                "calendar.business_start_hour",
                "must be < calendar.business_end_hour",
            ));
        }
        if c.business_end_hour > 24 {
            errors.push(ConfigError::new("calendar.business_end_hour", "must be <= 24"));
        }

        let s = &self.solver;
        if !s.time_limit_secs.is_finite() || s.time_limit_secs <= 0.0 {
            errors.push(ConfigError::new(
                "solver.time_limit_secs",
                "must be a finite number > 0",
            ));
        }

        let o = &self.objective;
        if !o.price_divisor.is_finite() || o.price_divisor <= 0.0 {
            errors.push(ConfigError::new("objective.price_divisor", "must be > 0"));
        }
        if !o.peak_penalty.is_finite() || o.peak_penalty < 0.0 {
            errors.push(ConfigError::new("objective.peak_penalty", "must be >= 0"));
        }

        let f = &self.forecast;
        if f.mase_season == 0 {
            errors.push(ConfigError::new("forecast.mase_season", "must be > 0"));
        }

        errors
    }
}
