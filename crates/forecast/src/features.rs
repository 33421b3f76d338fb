//! Feature Builder: inventory history -> per-row feature vectors.
//!
//! Per SKU, records are ordered by date and turned into rows carrying:
//! - calendar fields of the row date
//! - `lag_1`, `lag_2`, `lag_3`: demand 1, 2 and 3 periods back
//! - `rolling_mean_3`: mean demand over the trailing window of up to 3
//!   periods **ending at and including** the current period
//! - SKU / season codes from the fixed [`CategoryEncoding`]
//!
//! The first [`MAX_LAG`] periods of every SKU lack at least one lag and are
//! dropped (never zero-filled). Their demand still seeds the forecast
//! horizon via [`SkuSeed`].
//!
//! Training and inference windows differ by one period on purpose. A
//! training row's `rolling_mean_3` includes its own (observed) demand; a
//! synthesized horizon row cannot, because its demand is what the model is
//! asked for, so its window ends at the preceding period (see
//! [`crate::engine`]).

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastResult, Sku};
use demandflow_inventory::{InventoryRecord, InventoryTable};

use crate::encoding::CategoryEncoding;
use crate::schema::{FEATURE_SCHEMA_VERSION, feature_columns as col};

/// Trailing window length of the rolling-mean feature.
pub const ROLLING_WINDOW: usize = 3;

/// Deepest lag feature; rows with fewer prior periods are dropped.
pub const MAX_LAG: usize = 3;

/// Length of the demand tail kept per SKU to start the horizon from.
pub const SEED_LEN: usize = if MAX_LAG > ROLLING_WINDOW { MAX_LAG } else { ROLLING_WINDOW };

/// Calendar fields derived from a single date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub year: i32,
    pub month: u32,
    /// ISO week number.
    pub week_of_year: u32,
    pub day: u32,
    /// Monday = 0 .. Sunday = 6.
    pub weekday: u32,
}

impl Calendar {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            week_of_year: date.iso_week().week(),
            day: date.day(),
            weekday: date.weekday().num_days_from_monday(),
        }
    }
}

/// One feature vector for a SKU at a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub sku: Sku,
    pub date: NaiveDate,
    pub sku_code: u32,
    pub season_code: u32,
    pub calendar: Calendar,
    pub promotion: bool,
    pub holiday: bool,
    pub lead_time_days: f64,
    pub lag_1: f64,
    pub lag_2: f64,
    pub lag_3: f64,
    pub rolling_mean_3: f64,
    pub days_until_expiry: Option<f64>,
    /// Observed demand (training target). `None` for synthesized future rows.
    pub demand: Option<f64>,
    pub stock_balance: f64,
}

impl FeatureRow {
    /// Value of a named feature column, `None` if this row cannot supply it.
    pub fn value(&self, column: &str) -> Option<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match column {
            col::SKU_CODE => Some(self.sku_code as f64),
            col::SEASON_CODE => Some(self.season_code as f64),
            col::YEAR => Some(self.calendar.year as f64),
            col::MONTH => Some(self.calendar.month as f64),
            col::WEEK_OF_YEAR => Some(self.calendar.week_of_year as f64),
            col::DAY => Some(self.calendar.day as f64),
            col::WEEKDAY => Some(self.calendar.weekday as f64),
            col::PROMOTION => Some(flag(self.promotion)),
            col::HOLIDAY => Some(flag(self.holiday)),
            col::LEAD_TIME => Some(self.lead_time_days),
            col::LAG_1 => Some(self.lag_1),
            col::LAG_2 => Some(self.lag_2),
            col::LAG_3 => Some(self.lag_3),
            col::ROLLING_MEAN_3 => Some(self.rolling_mean_3),
            col::DAYS_UNTIL_EXPIRY => self.days_until_expiry,
            _ => None,
        }
    }
}

/// Tail of a SKU's known history, the starting point of its forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuSeed {
    pub sku: Sku,
    pub sku_code: u32,
    /// Last up-to-[`SEED_LEN`] demand values, oldest first.
    pub recent_demand: Vec<f64>,
    /// Date of the latest record; also the date the stock balance was observed.
    pub last_date: NaiveDate,
    /// Stock balance of the latest record.
    pub stock_balance: f64,
    pub mean_lead_time_days: f64,
    /// Latest known expiration date.
    pub expiration_date: Option<NaiveDate>,
}

/// Output of the feature builder.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub schema_version: u32,
    pub as_of: NaiveDate,
    pub encoding: CategoryEncoding,
    pub rows: Vec<FeatureRow>,
    pub seeds: BTreeMap<Sku, SkuSeed>,
}

impl FeatureTable {
    /// Latest record date across all SKUs, or `as_of` when there is no history.
    pub fn latest_date(&self) -> NaiveDate {
        self.seeds
            .values()
            .map(|s| s.last_date)
            .max()
            .unwrap_or(self.as_of)
    }

    pub fn rows_for<'a>(&'a self, sku: &'a Sku) -> impl Iterator<Item = &'a FeatureRow> + 'a {
        self.rows.iter().filter(move |r| &r.sku == sku)
    }
}

/// Build features from a raw source table.
///
/// Fails with `MissingColumn` when the table lacks a required column.
pub fn build_features_from_table(
    table: &InventoryTable,
    encoding: &CategoryEncoding,
    as_of: NaiveDate,
) -> ForecastResult<FeatureTable> {
    let records = table.to_records()?;
    build_features(&records, encoding, as_of)
}

/// Build features from typed records.
///
/// Records dated after `as_of` are ignored. Pure; the encoding is only read.
pub fn build_features(
    history: &[InventoryRecord],
    encoding: &CategoryEncoding,
    as_of: NaiveDate,
) -> ForecastResult<FeatureTable> {
    let mut by_sku: BTreeMap<&Sku, Vec<&InventoryRecord>> = BTreeMap::new();
    for record in history.iter().filter(|r| r.date <= as_of) {
        by_sku.entry(&record.sku).or_default().push(record);
    }

    let mut rows = Vec::new();
    let mut seeds = BTreeMap::new();

    for (sku, mut records) in by_sku {
        // Stable: same-date records keep their input order.
        records.sort_by_key(|r| r.date);

        let sku_code = encoding.sku_code(sku)?;
        let demand: Vec<f64> = records.iter().map(|r| r.demand()).collect();

        for (t, record) in records.iter().enumerate() {
            let season_code = encoding.season_code(&record.season)?;
            if t < MAX_LAG {
                continue;
            }
            rows.push(FeatureRow {
                sku: sku.clone(),
                date: record.date,
                sku_code,
                season_code,
                calendar: Calendar::of(record.date),
                promotion: record.promotion,
                holiday: record.holiday,
                lead_time_days: record.lead_time_days,
                lag_1: demand[t - 1],
                lag_2: demand[t - 2],
                lag_3: demand[t - 3],
                rolling_mean_3: trailing_mean(&demand[..=t]),
                days_until_expiry: record.days_until_expiry(as_of).map(|d| d as f64),
                demand: Some(demand[t]),
                stock_balance: record.stock_balance(),
            });
        }

        let Some(last) = records.last() else {
            continue;
        };
        let lead_total: f64 = records.iter().map(|r| r.lead_time_days).sum();
        seeds.insert(
            sku.clone(),
            SkuSeed {
                sku: sku.clone(),
                sku_code,
                recent_demand: demand[demand.len().saturating_sub(SEED_LEN)..].to_vec(),
                last_date: last.date,
                stock_balance: last.stock_balance(),
                mean_lead_time_days: lead_total / records.len() as f64,
                expiration_date: records.iter().rev().find_map(|r| r.expiration_date),
            },
        );
    }

    tracing::debug!(
        skus = seeds.len(),
        rows = rows.len(),
        %as_of,
        "built feature table"
    );

    Ok(FeatureTable {
        schema_version: FEATURE_SCHEMA_VERSION,
        as_of,
        encoding: encoding.clone(),
        rows,
        seeds,
    })
}

/// Last up-to-[`ROLLING_WINDOW`] values of a series.
fn tail(series: &[f64]) -> &[f64] {
    &series[series.len().saturating_sub(ROLLING_WINDOW)..]
}

/// Value `k` periods before the end of `series`; `lag(s, 1)` is the last value.
pub(crate) fn lag(series: &[f64], k: usize) -> Option<f64> {
    series.len().checked_sub(k).map(|i| series[i])
}

/// Mean of the last up-to-[`ROLLING_WINDOW`] values; `None` for an empty series.
pub(crate) fn trailing_mean_opt(series: &[f64]) -> Option<f64> {
    let window = tail(series);
    if window.is_empty() {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

fn trailing_mean(series: &[f64]) -> f64 {
    trailing_mean_opt(series).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use demandflow_core::ForecastError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(sku: &str, on: NaiveDate, demand: f64) -> InventoryRecord {
        InventoryRecord {
            sku: Sku::new(sku),
            date: on,
            stock_in: demand + 10.0,
            stock_out: demand,
            promotion: false,
            holiday: false,
            season: "Winter".to_string(),
            lead_time_days: 4.0,
            manufacturing_date: None,
            expiration_date: None,
            order_date: None,
            delivery_date: None,
        }
    }

    fn history_a() -> Vec<InventoryRecord> {
        vec![
            record("A", date(2024, 1, 31), 100.0),
            record("A", date(2024, 2, 29), 120.0),
            record("A", date(2024, 3, 31), 110.0),
            record("A", date(2024, 4, 30), 90.0),
            record("A", date(2024, 5, 31), 130.0),
        ]
    }

    #[test]
    fn periods_without_full_lags_are_dropped() {
        let records = history_a();
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].date, date(2024, 4, 30));
    }

    #[test]
    fn lags_and_rolling_mean_follow_history() {
        let records = history_a();
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();

        let first = &table.rows[0];
        assert_eq!((first.lag_1, first.lag_2, first.lag_3), (110.0, 120.0, 100.0));
        // (120 + 110 + 90) / 3
        assert!((first.rolling_mean_3 - 320.0 / 3.0).abs() < 1e-9);
        assert_eq!(first.value(col::LAG_3), Some(100.0));

        let second = &table.rows[1];
        assert_eq!((second.lag_1, second.lag_2, second.lag_3), (90.0, 110.0, 120.0));
        assert_eq!(second.rolling_mean_3, 110.0);
    }

    #[test]
    fn unordered_input_is_sorted_per_sku() {
        let mut records = history_a();
        records.reverse();
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();
        assert_eq!(table.rows[0].lag_1, 110.0);
        assert_eq!(table.rows[1].demand, Some(130.0));
    }

    #[test]
    fn calendar_fields_come_from_row_date() {
        let cal = Calendar::of(date(2024, 2, 29));
        assert_eq!(cal.year, 2024);
        assert_eq!(cal.month, 2);
        assert_eq!(cal.day, 29);
        assert_eq!(cal.week_of_year, 9);
        assert_eq!(cal.weekday, 3); // Thursday
    }

    #[test]
    fn seed_keeps_tail_latest_balance_and_mean_lead_time() {
        let mut records = history_a();
        records[4].lead_time_days = 9.0;
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();

        let seed = &table.seeds[&Sku::new("A")];
        assert_eq!(seed.recent_demand, vec![110.0, 90.0, 130.0]);
        assert_eq!(seed.last_date, date(2024, 5, 31));
        assert_eq!(seed.stock_balance, 10.0);
        assert_eq!(seed.mean_lead_time_days, 5.0);
    }

    #[test]
    fn short_history_sku_has_seed_but_no_rows() {
        let records = vec![
            record("B", date(2024, 1, 31), 40.0),
            record("B", date(2024, 2, 29), 50.0),
            record("B", date(2024, 3, 31), 60.0),
        ];
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.seeds[&Sku::new("B")].recent_demand, vec![40.0, 50.0, 60.0]);
    }

    #[test]
    fn records_after_as_of_are_ignored() {
        let records = history_a();
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 4, 30)).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.latest_date(), date(2024, 4, 30));
    }

    #[test]
    fn sku_outside_encoding_fails() {
        let records = history_a();
        let enc = CategoryEncoding::fit(1, &[record("Other", date(2024, 1, 31), 1.0)]);
        let err = build_features(&records, &enc, date(2024, 12, 31)).unwrap_err();
        assert_eq!(err, ForecastError::unknown_category("SKU", "A"));
    }

    #[test]
    fn unknown_season_fails_even_on_first_period() {
        let mut records = history_a();
        records[0].season = "Monsoon".to_string();
        let enc = CategoryEncoding::fit(1, &records);
        let err = build_features(&records, &enc, date(2024, 12, 31)).unwrap_err();
        assert_eq!(err, ForecastError::unknown_category("Season", "Monsoon"));
    }

    #[test]
    fn missing_source_column_fails_from_table() {
        let csv = "SKU,Date,Stock In,Promotion,Holiday,Season,Lead Time\n";
        let table = InventoryTable::from_reader(csv.as_bytes()).unwrap();
        let enc = CategoryEncoding::fit(1, &[]);
        let err = build_features_from_table(&table, &enc, date(2024, 1, 1)).unwrap_err();
        assert_eq!(err, ForecastError::MissingColumn("Stock Out".to_string()));
    }

    #[test]
    fn days_until_expiry_measured_from_as_of() {
        let mut records = history_a();
        records[3].expiration_date = Some(date(2025, 1, 10));
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 12, 31)).unwrap();
        assert_eq!(table.rows[0].days_until_expiry, Some(10.0));
        assert_eq!(table.rows[1].value(col::DAYS_UNTIL_EXPIRY), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: lag_k at t is demand at t-k; rolling mean covers max(1,t-2)..=t.
            #[test]
            fn lag_and_window_match_definition(
                demand in prop::collection::vec(0u32..1000, 4..24)
            ) {
                let records: Vec<_> = demand
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let on = date(2020, 1, 1) + chrono::Duration::days(i as i64 * 30);
                        record("P", on, *d as f64)
                    })
                    .collect();
                let enc = CategoryEncoding::fit(1, &records);
                let table = build_features(&records, &enc, date(2030, 1, 1)).unwrap();

                prop_assert_eq!(table.rows.len(), demand.len() - MAX_LAG);
                for (k, row) in table.rows.iter().enumerate() {
                    let t = k + MAX_LAG;
                    prop_assert_eq!(row.lag_1, demand[t - 1] as f64);
                    prop_assert_eq!(row.lag_2, demand[t - 2] as f64);
                    prop_assert_eq!(row.lag_3, demand[t - 3] as f64);
                    let start = t.saturating_sub(2);
                    let window = &demand[start..=t];
                    let mean = window.iter().map(|d| *d as f64).sum::<f64>() / window.len() as f64;
                    prop_assert!((row.rolling_mean_3 - mean).abs() < 1e-9);
                }
            }
        }
    }
}
