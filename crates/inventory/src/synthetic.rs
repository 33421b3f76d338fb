//! Seeded synthetic inventory history.
//!
//! Model per SKU and month:
//! - base demand drawn once per SKU, uniform in `[100, 500)`
//! - December demand x1.5
//! - promotion with probability 0.2 (demand x1.5)
//! - holiday flag with probability 0.1 (flag only)
//! - multiplicative noise ~ Normal(1, 0.1)
//!
//! Stock-in covers demand with a random margin so that balances vary.

use chrono::{Datelike, Months, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use demandflow_core::{ForecastError, ForecastResult, Sku};

use crate::record::{InventoryRecord, Season};

/// Generator parameters.
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    pub num_skus: usize,
    pub num_months: u32,
    /// Any date in the first month; periods are dated at month end.
    pub start: NaiveDate,
    pub seed: u64,
}

impl Default for SyntheticHistory {
    fn default() -> Self {
        Self {
            num_skus: 150,
            num_months: 24,
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or(NaiveDate::MIN),
            seed: 42,
        }
    }
}

impl SyntheticHistory {
    pub fn with_skus(mut self, num_skus: usize) -> Self {
        self.num_skus = num_skus;
        self
    }

    pub fn with_months(mut self, num_months: u32) -> Self {
        self.num_months = num_months;
        self
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate records ordered by SKU, then date.
    pub fn generate(&self) -> ForecastResult<Vec<InventoryRecord>> {
        if self.num_skus == 0 || self.num_months == 0 {
            return Err(ForecastError::invalid_config(
                "synthetic history needs at least one SKU and one month",
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let noise = Normal::new(1.0, 0.1)
            .map_err(|e| ForecastError::invalid_config(format!("noise distribution: {e}")))?;

        let dates = month_ends(self.start, self.num_months)?;
        let mut records = Vec::with_capacity(self.num_skus * dates.len());

        for i in 0..self.num_skus {
            let sku = Sku::new(format!("SKU_{}", i + 1));
            let base_demand = rng.gen_range(100..500) as f64;
            let lead_time_days = rng.gen_range(3..=21) as f64;

            for &date in &dates {
                let seasonality = if date.month() == 12 { 1.5 } else { 1.0 };
                let promotion = rng.gen_bool(0.2);
                let holiday = rng.gen_bool(0.1);
                let uplift = if promotion { 1.5 } else { 1.0 };
                let factor: f64 = noise.sample(&mut rng);

                let demand = (base_demand * seasonality * uplift * factor).max(0.0).floor();
                let margin = rng.gen_range(0.8..1.3);
                let stock_in = (demand * margin).round();

                records.push(InventoryRecord {
                    sku: sku.clone(),
                    date,
                    stock_in,
                    stock_out: demand,
                    promotion,
                    holiday,
                    season: Season::from_month(date.month()).to_string(),
                    lead_time_days,
                    manufacturing_date: None,
                    expiration_date: date.checked_add_months(Months::new(18)),
                    order_date: None,
                    delivery_date: None,
                });
            }
        }

        tracing::debug!(
            skus = self.num_skus,
            months = self.num_months,
            seed = self.seed,
            records = records.len(),
            "generated synthetic inventory history"
        );

        Ok(records)
    }
}

/// Last day of each of `n` consecutive months starting at `start`'s month.
fn month_ends(start: NaiveDate, n: u32) -> ForecastResult<Vec<NaiveDate>> {
    let first = start.with_day(1).unwrap_or(start);
    (1..=n)
        .map(|k| {
            first
                .checked_add_months(Months::new(k))
                .and_then(|d| d.pred_opt())
                .ok_or_else(|| ForecastError::invalid_config("synthetic date range overflows"))
        })
        .collect()
}
