use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use demandflow_core::Sku;

/// Season label as used in source data and in the category encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    /// Meteorological season of a calendar month (Dec–Feb is winter).
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }
}

impl core::fmt::Display for Season {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of inventory history: a SKU in a single period.
///
/// Records are immutable inputs. The stock balance is never read from the
/// source; it is derived from stock-in and stock-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub sku: Sku,
    /// Period date.
    pub date: NaiveDate,
    pub stock_in: f64,
    pub stock_out: f64,
    pub promotion: bool,
    pub holiday: bool,
    /// Raw season label; encoded later against the training-time mapping.
    pub season: String,
    /// Days between placing and receiving an order.
    pub lead_time_days: f64,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
}

impl InventoryRecord {
    /// Demand observed in this period (units that left stock).
    pub fn demand(&self) -> f64 {
        self.stock_out
    }

    /// `stock_in - stock_out`, clamped to zero.
    pub fn stock_balance(&self) -> f64 {
        (self.stock_in - self.stock_out).max(0.0)
    }

    /// Days from `as_of` until expiry, if an expiration date is known.
    ///
    /// Negative once the batch has expired.
    pub fn days_until_expiry(&self, as_of: NaiveDate) -> Option<i64> {
        self.expiration_date
            .map(|exp| exp.signed_duration_since(as_of).num_days())
    }

    pub fn season_of_period(&self) -> Season {
        Season::from_month(self.date.month())
    }
}
