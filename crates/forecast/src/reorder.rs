//! Reorder Policy: monthly forecast + stock balance -> purchase recommendation.
//!
//! Canonical quantity rule: gate first, clamp second.
//!
//! ```text
//! threshold = predicted_demand * threshold_fraction
//! needed    = stock_balance < threshold            (strict)
//! quantity  = needed ? max(0, predicted_demand - stock_balance) : 0
//! ```

use core::str::FromStr;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastError, ForecastResult, Sku, YearMonth};
use demandflow_inventory::columns;

use crate::engine::ForecastRow;

/// Default fraction of predicted demand below which stock triggers a reorder.
pub const DEFAULT_THRESHOLD_FRACTION: f64 = 0.3;

/// Default safety buffer added to the lead time, in days.
pub const DEFAULT_LEAD_TIME_BUFFER_DAYS: i64 = 7;

const NO_ORDER: &str = "No Order Needed";

/// A date, or the explicit absence of an order.
///
/// Serialized as `YYYY-MM-DD` or `No Order Needed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderDate {
    NoOrder,
    On(NaiveDate),
}

impl OrderDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            OrderDate::NoOrder => None,
            OrderDate::On(d) => Some(*d),
        }
    }

    pub fn is_no_order(&self) -> bool {
        matches!(self, OrderDate::NoOrder)
    }
}

impl core::fmt::Display for OrderDate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OrderDate::NoOrder => f.write_str(NO_ORDER),
            OrderDate::On(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for OrderDate {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == NO_ORDER {
            return Ok(OrderDate::NoOrder);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(OrderDate::On)
            .map_err(|_| ForecastError::invalid_value("order date", 0, s))
    }
}

impl TryFrom<String> for OrderDate {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderDate> for String {
    fn from(value: OrderDate) -> Self {
        value.to_string()
    }
}

/// Reorder recommendation derived 1:1 from a [`ForecastRow`].
///
/// Field names double as the columns of the persisted forecast artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRecommendation {
    #[serde(rename = "SKU")]
    pub sku: Sku,
    #[serde(rename = "Target Month")]
    pub target: YearMonth,
    #[serde(rename = "Predicted Demand")]
    pub predicted_demand: f64,
    #[serde(rename = "Stock Balance")]
    pub stock_balance: f64,
    #[serde(rename = "Observed On")]
    pub observed_on: NaiveDate,
    #[serde(rename = "Lead Time")]
    pub mean_lead_time_days: f64,
    #[serde(rename = "Reorder Threshold")]
    pub reorder_threshold: f64,
    #[serde(rename = "Reorder Needed")]
    pub reorder_needed: bool,
    #[serde(rename = "Reorder Quantity")]
    pub reorder_quantity: f64,
    /// First day of the target month, or no order.
    #[serde(rename = "Recommended Order Date")]
    pub recommended_order_date: OrderDate,
    /// Latest date to place the order so it lands by the start of the
    /// target month: order date minus (lead time + buffer).
    #[serde(rename = "Place Order By")]
    pub place_order_by: OrderDate,
}

/// Validated reorder tunables.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReorderPolicy {
    threshold_fraction: f64,
    lead_time_buffer_days: i64,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            threshold_fraction: DEFAULT_THRESHOLD_FRACTION,
            lead_time_buffer_days: DEFAULT_LEAD_TIME_BUFFER_DAYS,
        }
    }
}

impl ReorderPolicy {
    /// Fails with `InvalidConfiguration` for a negative or non-finite
    /// fraction, or a negative buffer. Values are never clamped.
    pub fn new(threshold_fraction: f64, lead_time_buffer_days: i64) -> ForecastResult<Self> {
        if !(threshold_fraction.is_finite() && threshold_fraction >= 0.0) {
            return Err(ForecastError::invalid_config(format!(
                "threshold_fraction must be a finite non-negative number (got {threshold_fraction})"
            )));
        }
        if lead_time_buffer_days < 0 {
            return Err(ForecastError::invalid_config(format!(
                "lead_time_buffer_days must be >= 0 (got {lead_time_buffer_days})"
            )));
        }
        Ok(Self {
            threshold_fraction,
            lead_time_buffer_days,
        })
    }

    pub fn threshold_fraction(&self) -> f64 {
        self.threshold_fraction
    }

    pub fn lead_time_buffer_days(&self) -> i64 {
        self.lead_time_buffer_days
    }

    /// Fails with `InvalidValue` on the `Lead Time` column (row 0: not tied
    /// to a source row) when the mean lead time is negative or not finite, or
    /// when the place-order-by date falls outside the representable range.
    pub fn recommend(&self, row: &ForecastRow) -> ForecastResult<ReorderRecommendation> {
        let lead = row.mean_lead_time_days;
        if !(lead.is_finite() && lead >= 0.0) {
            return Err(ForecastError::invalid_value(columns::LEAD_TIME, 0, lead.to_string()));
        }

        let reorder_threshold = row.predicted_demand * self.threshold_fraction;
        let reorder_needed = row.stock_balance < reorder_threshold;

        let reorder_quantity = if reorder_needed {
            (row.predicted_demand - row.stock_balance).max(0.0)
        } else {
            0.0
        };

        let (recommended_order_date, place_order_by) = if reorder_needed {
            let order_date = row.target.first_day();
            let place_by = self
                .place_order_by(order_date, lead)
                .ok_or_else(|| ForecastError::invalid_value(columns::LEAD_TIME, 0, lead.to_string()))?;
            (OrderDate::On(order_date), OrderDate::On(place_by))
        } else {
            (OrderDate::NoOrder, OrderDate::NoOrder)
        };

        Ok(ReorderRecommendation {
            sku: row.sku.clone(),
            target: row.target,
            predicted_demand: row.predicted_demand,
            stock_balance: row.stock_balance,
            observed_on: row.observed_on,
            mean_lead_time_days: row.mean_lead_time_days,
            reorder_threshold,
            reorder_needed,
            reorder_quantity,
            recommended_order_date,
            place_order_by,
        })
    }

    /// `order_date - (ceil(lead) + buffer)` days; `None` when out of range.
    fn place_order_by(&self, order_date: NaiveDate, lead_time_days: f64) -> Option<NaiveDate> {
        // Fractional lead times round up to whole days.
        let lead = lead_time_days.ceil();
        if lead > i64::MAX as f64 {
            return None;
        }
        let days = (lead as i64).checked_add(self.lead_time_buffer_days)?;
        order_date.checked_sub_signed(TimeDelta::try_days(days)?)
    }

    pub fn recommend_all(&self, rows: &[ForecastRow]) -> ForecastResult<Vec<ReorderRecommendation>> {
        rows.iter().map(|r| self.recommend(r)).collect()
    }
}

/// One-shot form of [`ReorderPolicy::recommend`] that validates the tunables.
pub fn recommend(
    row: &ForecastRow,
    threshold_fraction: f64,
    lead_time_buffer_days: i64,
) -> ForecastResult<ReorderRecommendation> {
    ReorderPolicy::new(threshold_fraction, lead_time_buffer_days)?.recommend(row)
}
