//! Feature schema contract shared by training-side tooling and inference.
//!
//! The schema is an ordered list of named numeric columns plus a version.
//! A model records the schema version and the exact column list it was fitted
//! on; inference rebuilds that list from [`FeatureRow`](crate::features::FeatureRow)s
//! and fails hard on any mismatch instead of passing a subset or reordering.

use demandflow_core::{ForecastError, ForecastResult};

/// Current feature schema version.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Feature column names.
pub mod feature_columns {
    pub const SKU_CODE: &str = "sku_code";
    pub const SEASON_CODE: &str = "season_code";
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const WEEK_OF_YEAR: &str = "week_of_year";
    pub const DAY: &str = "day";
    pub const WEEKDAY: &str = "weekday";
    pub const PROMOTION: &str = "promotion";
    pub const HOLIDAY: &str = "holiday";
    pub const LEAD_TIME: &str = "lead_time";
    pub const LAG_1: &str = "lag_1";
    pub const LAG_2: &str = "lag_2";
    pub const LAG_3: &str = "lag_3";
    pub const ROLLING_MEAN_3: &str = "rolling_mean_3";
    /// Only present when the source carries expiration dates.
    pub const DAYS_UNTIL_EXPIRY: &str = "days_until_expiry";
}

use feature_columns::*;

const V1_COLUMNS: [&str; 14] = [
    SKU_CODE,
    SEASON_CODE,
    YEAR,
    MONTH,
    WEEK_OF_YEAR,
    DAY,
    WEEKDAY,
    PROMOTION,
    HOLIDAY,
    LEAD_TIME,
    LAG_1,
    LAG_2,
    LAG_3,
    ROLLING_MEAN_3,
];

const V1_OPTIONAL: [&str; 1] = [DAYS_UNTIL_EXPIRY];

/// Versioned, ordered feature column contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    columns: Vec<String>,
    optional: Vec<String>,
}

impl FeatureSchema {
    /// The schema produced by this build of the feature builder.
    pub fn current() -> Self {
        Self {
            version: FEATURE_SCHEMA_VERSION,
            columns: V1_COLUMNS.iter().map(|c| c.to_string()).collect(),
            optional: V1_OPTIONAL.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Columns every feature row supplies, in canonical order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether `name` is a column of this schema (always-present or optional).
    pub fn knows(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name) || self.optional.iter().any(|c| c == name)
    }

    /// Check a model's declared schema against this one.
    ///
    /// Fails with `SchemaMismatch` on a version difference and with
    /// `UnknownFeatureColumn` for the first column this schema cannot supply.
    pub fn check_model(&self, version: u32, model_columns: &[String]) -> ForecastResult<()> {
        if version != self.version {
            return Err(ForecastError::SchemaMismatch {
                expected: self.version,
                found: version,
            });
        }
        match model_columns.iter().find(|c| !self.knows(c)) {
            Some(unknown) => Err(ForecastError::unknown_feature(unknown.as_str())),
            None => Ok(()),
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::current()
    }
}
