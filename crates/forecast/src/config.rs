//! Planning configuration.
//!
//! Layering, lowest to highest precedence: defaults, TOML file, overrides.
//! [`PlanningConfig::resolve`] never reads the process environment itself.
//! Callers supply `DEMANDFLOW_*` values as overrides, either through
//! [`PlanningOverrides::from_env`] or through their own flag parser, so every
//! variable is read exactly once. Validation runs once on the final value.

use std::path::Path;

use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastError, ForecastResult};

use crate::reorder::{DEFAULT_LEAD_TIME_BUFFER_DAYS, DEFAULT_THRESHOLD_FRACTION, ReorderPolicy};

pub const DEFAULT_HORIZON_MONTHS: u32 = 2;

pub const ENV_THRESHOLD_FRACTION: &str = "DEMANDFLOW_THRESHOLD_FRACTION";
pub const ENV_HORIZON_MONTHS: &str = "DEMANDFLOW_HORIZON_MONTHS";
pub const ENV_LEAD_TIME_BUFFER_DAYS: &str = "DEMANDFLOW_LEAD_TIME_BUFFER_DAYS";

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanningConfig {
    pub threshold_fraction: f64,
    pub horizon_months: u32,
    pub lead_time_buffer_days: i64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: DEFAULT_THRESHOLD_FRACTION,
            horizon_months: DEFAULT_HORIZON_MONTHS,
            lead_time_buffer_days: DEFAULT_LEAD_TIME_BUFFER_DAYS,
        }
    }
}

/// Individually optional settings layered on top of a [`PlanningConfig`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PlanningOverrides {
    pub threshold_fraction: Option<f64>,
    pub horizon_months: Option<u32>,
    pub lead_time_buffer_days: Option<i64>,
}

impl PlanningOverrides {
    /// Read overrides from the `DEMANDFLOW_*` environment variables.
    pub fn from_env() -> ForecastResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) against an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ForecastResult<Self> {
        Ok(Self {
            threshold_fraction: parse_var(&lookup, ENV_THRESHOLD_FRACTION)?,
            horizon_months: parse_var(&lookup, ENV_HORIZON_MONTHS)?,
            lead_time_buffer_days: parse_var(&lookup, ENV_LEAD_TIME_BUFFER_DAYS)?,
        })
    }

    /// Later layers win field by field.
    pub fn merge(self, later: PlanningOverrides) -> Self {
        Self {
            threshold_fraction: later.threshold_fraction.or(self.threshold_fraction),
            horizon_months: later.horizon_months.or(self.horizon_months),
            lead_time_buffer_days: later.lead_time_buffer_days.or(self.lead_time_buffer_days),
        }
    }

    pub fn apply(&self, mut config: PlanningConfig) -> PlanningConfig {
        if let Some(v) = self.threshold_fraction {
            config.threshold_fraction = v;
        }
        if let Some(v) = self.horizon_months {
            config.horizon_months = v;
        }
        if let Some(v) = self.lead_time_buffer_days {
            config.lead_time_buffer_days = v;
        }
        config
    }
}

fn parse_var<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> ForecastResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ForecastError::invalid_config(format!("{key}: cannot parse {raw:?}"))),
    }
}

impl PlanningConfig {
    pub fn validate(&self) -> ForecastResult<()> {
        if self.horizon_months == 0 {
            return Err(ForecastError::invalid_config("horizon_months must be >= 1"));
        }
        ReorderPolicy::new(self.threshold_fraction, self.lead_time_buffer_days)?;
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> ForecastResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ForecastError::invalid_config(format!("invalid planning config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_path(path: &Path) -> ForecastResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults, then the optional TOML file, then `overrides`; validated.
    pub fn resolve(file: Option<&Path>, overrides: PlanningOverrides) -> ForecastResult<Self> {
        let base = match file {
            Some(path) => Self::from_toml_path(path)?,
            None => Self::default(),
        };
        let config = overrides.apply(base);
        config.validate()?;
        Ok(config)
    }

    pub fn policy(&self) -> ForecastResult<ReorderPolicy> {
        ReorderPolicy::new(self.threshold_fraction, self.lead_time_buffer_days)
    }
}
