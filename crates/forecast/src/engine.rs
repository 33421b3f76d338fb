//! Forecast Engine: feature table + model -> (SKU x target month) forecast.
//!
//! Horizon synthesis is sequential per SKU: the row for month k+1 takes its
//! lags and `rolling_mean_3` from the series extended with the prediction
//! for month k. SKUs are independent and run in parallel.
//!
//! Inference-time window: the synthesized row's `rolling_mean_3` is the mean
//! of the last up-to-3 known (or synthesized) values, i.e. the window ending
//! at the preceding period. Training rows use the window ending at and
//! including their own period, so the two windows are offset by exactly one
//! period. This is intentional: a synthesized row's own demand is the value
//! being predicted and cannot be part of its window.
//!
//! Lags reaching before the first known period of a SKU are zero, the same
//! values the zero-history fallback uses.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastError, ForecastResult, Sku, YearMonth};
use demandflow_inventory::Season;

use crate::features::{Calendar, FeatureRow, FeatureTable, SkuSeed, lag, trailing_mean_opt};
use crate::model::{DemandModel, FeatureMatrix, check_encoding, check_model};
use crate::schema::FeatureSchema;

/// One forecast per SKU and target month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub sku: Sku,
    pub target: YearMonth,
    pub predicted_demand: f64,
    /// Latest known stock balance.
    pub stock_balance: f64,
    pub mean_lead_time_days: f64,
    /// Date the stock balance was observed on.
    pub observed_on: NaiveDate,
}

/// What a SKU without any history starts its horizon from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum HistoryFallback {
    /// lag, rolling mean, stock balance and lead time all start at zero.
    #[default]
    Zero,
}

/// One synthesized horizon step: the row fed to the model and its output.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonStep {
    pub row: FeatureRow,
    pub prediction: f64,
}

/// Forecast `horizon_months` months ahead for every SKU.
///
/// SKUs are the union of the encoding's SKUs and those seen in history, so a
/// SKU with zero history still gets one row per target month. Output is
/// ordered by SKU, then target month.
pub fn forecast(
    model: &dyn DemandModel,
    table: &FeatureTable,
    horizon_months: u32,
) -> ForecastResult<Vec<ForecastRow>> {
    forecast_with(model, table, horizon_months, HistoryFallback::Zero)
}

pub fn forecast_with(
    model: &dyn DemandModel,
    table: &FeatureTable,
    horizon_months: u32,
    fallback: HistoryFallback,
) -> ForecastResult<Vec<ForecastRow>> {
    if horizon_months == 0 {
        return Err(ForecastError::invalid_config("horizon_months must be >= 1"));
    }
    check_model(model, &FeatureSchema::current())?;
    check_encoding(model, &table.encoding)?;

    let anchor = table.latest_date();
    let seeds = horizon_seeds(table, anchor, fallback);

    tracing::info!(
        skus = seeds.len(),
        horizon_months,
        %anchor,
        "forecasting demand horizon"
    );

    let per_sku: Vec<Vec<ForecastRow>> = seeds
        .par_iter()
        .map(|seed| -> ForecastResult<Vec<ForecastRow>> {
            let steps = forecast_sku(model, table, seed, anchor, horizon_months)?;
            Ok(steps
                .into_iter()
                .map(|step| ForecastRow {
                    sku: seed.sku.clone(),
                    target: YearMonth::from_date(step.row.date),
                    predicted_demand: step.prediction,
                    stock_balance: seed.stock_balance,
                    mean_lead_time_days: seed.mean_lead_time_days,
                    observed_on: seed.last_date,
                })
                .collect())
        })
        .collect::<ForecastResult<_>>()?;

    Ok(per_sku.into_iter().flatten().collect())
}

/// Sequentially synthesize and predict the horizon of one SKU.
///
/// Target month k (1-based) is the month of `anchor` plus k; rows are dated
/// on the first day of the target month.
pub fn forecast_sku(
    model: &dyn DemandModel,
    table: &FeatureTable,
    seed: &SkuSeed,
    anchor: NaiveDate,
    horizon_months: u32,
) -> ForecastResult<Vec<HorizonStep>> {
    let anchor_month = YearMonth::from_date(anchor);
    let mut series = seed.recent_demand.clone();
    let mut steps = Vec::with_capacity(horizon_months as usize);

    for k in 1..=horizon_months {
        let target = anchor_month.plus_months(k);
        let date = target.first_day();
        let season = Season::from_month(target.month());

        let row = FeatureRow {
            sku: seed.sku.clone(),
            date,
            sku_code: seed.sku_code,
            season_code: table.encoding.season_code(season.as_str())?,
            calendar: Calendar::of(date),
            promotion: false,
            holiday: false,
            lead_time_days: seed.mean_lead_time_days,
            lag_1: lag(&series, 1).unwrap_or(0.0),
            lag_2: lag(&series, 2).unwrap_or(0.0),
            lag_3: lag(&series, 3).unwrap_or(0.0),
            rolling_mean_3: trailing_mean_opt(&series).unwrap_or(0.0),
            days_until_expiry: seed
                .expiration_date
                .map(|exp| exp.signed_duration_since(date).num_days() as f64),
            demand: None,
            stock_balance: seed.stock_balance,
        };

        let matrix = FeatureMatrix::from_rows(model.feature_columns(), std::slice::from_ref(&row))?;
        let prediction = model.predict(&matrix)?.first().copied().unwrap_or(0.0);

        tracing::debug!(sku = %seed.sku, %target, prediction, "synthesized horizon step");

        series.push(prediction);
        steps.push(HorizonStep { row, prediction });
    }

    Ok(steps)
}

/// Seeds for every SKU to forecast, ordered by SKU.
fn horizon_seeds(table: &FeatureTable, anchor: NaiveDate, fallback: HistoryFallback) -> Vec<SkuSeed> {
    let mut seeds: BTreeMap<Sku, SkuSeed> = table.seeds.clone();
    for (sku, &code) in &table.encoding.skus {
        if seeds.contains_key(sku) {
            continue;
        }
        tracing::warn!(sku = %sku, ?fallback, "no history for SKU; using fallback seed");
        let seed = match fallback {
            HistoryFallback::Zero => SkuSeed {
                sku: sku.clone(),
                sku_code: code,
                recent_demand: Vec::new(),
                last_date: anchor,
                stock_balance: 0.0,
                mean_lead_time_days: 0.0,
                expiration_date: None,
            },
        };
        seeds.insert(sku.clone(), seed);
    }
    seeds.into_values().collect()
}

/// Per-row (in-sample) predictions for every feature row of the table.
pub fn predict_rows(model: &dyn DemandModel, table: &FeatureTable) -> ForecastResult<Vec<f64>> {
    check_model(model, &FeatureSchema::current())?;
    check_encoding(model, &table.encoding)?;
    let matrix = FeatureMatrix::from_rows(model.feature_columns(), &table.rows)?;
    model.predict(&matrix)
}

/// Predict every feature row and roll the predictions up to monthly rows.
pub fn forecast_in_sample(model: &dyn DemandModel, table: &FeatureTable) -> ForecastResult<Vec<ForecastRow>> {
    let predictions = predict_rows(model, table)?;
    let rows = table
        .rows
        .iter()
        .zip(predictions)
        .map(|(row, prediction)| ForecastRow {
            sku: row.sku.clone(),
            target: YearMonth::from_date(row.date),
            predicted_demand: prediction,
            stock_balance: row.stock_balance,
            mean_lead_time_days: row.lead_time_days,
            observed_on: row.date,
        });
    Ok(aggregate_monthly(rows))
}

/// Collapse rows by (SKU, target month).
///
/// - predicted demand: sum
/// - stock balance: the chronologically last observation (`observed_on`);
///   ties go to the later input row
/// - lead time: mean
///
/// Rows that are already one per (SKU, month) come back unchanged.
pub fn aggregate_monthly(rows: impl IntoIterator<Item = ForecastRow>) -> Vec<ForecastRow> {
    struct Group {
        demand: f64,
        lead_time_sum: f64,
        count: usize,
        last: ForecastRow,
    }

    let mut groups: BTreeMap<(Sku, YearMonth), Group> = BTreeMap::new();
    for row in rows {
        let key = (row.sku.clone(), row.target);
        match groups.get_mut(&key) {
            Some(g) => {
                g.demand += row.predicted_demand;
                g.lead_time_sum += row.mean_lead_time_days;
                g.count += 1;
                if row.observed_on >= g.last.observed_on {
                    g.last = row;
                }
            }
            None => {
                groups.insert(
                    key,
                    Group {
                        demand: row.predicted_demand,
                        lead_time_sum: row.mean_lead_time_days,
                        count: 1,
                        last: row,
                    },
                );
            }
        }
    }

    groups
        .into_values()
        .map(|g| ForecastRow {
            predicted_demand: g.demand,
            mean_lead_time_days: g.lead_time_sum / g.count as f64,
            ..g.last
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CategoryEncoding;
    use crate::features::build_features;
    use crate::model::{FnDemandModel, LinearDemandModel};
    use crate::schema::feature_columns as col;
    use demandflow_inventory::InventoryRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(sku: &str, on: NaiveDate, demand: f64, balance: f64) -> InventoryRecord {
        InventoryRecord {
            sku: Sku::new(sku),
            date: on,
            stock_in: demand + balance,
            stock_out: demand,
            promotion: false,
            holiday: false,
            season: "Winter".to_string(),
            lead_time_days: 6.0,
            manufacturing_date: None,
            expiration_date: None,
            order_date: None,
            delivery_date: None,
        }
    }

    fn table_a() -> FeatureTable {
        let records = vec![
            record("A", date(2024, 1, 31), 100.0, 30.0),
            record("A", date(2024, 2, 29), 120.0, 25.0),
            record("A", date(2024, 3, 31), 110.0, 20.0),
        ];
        let enc = CategoryEncoding::fit(1, &records);
        build_features(&records, &enc, date(2024, 3, 31)).unwrap()
    }

    fn ym(y: i32, m: u32) -> YearMonth {
        YearMonth::new(y, m).unwrap()
    }

    #[test]
    fn one_row_per_sku_and_target_month() {
        let model = LinearDemandModel::persistence();
        let rows = forecast(&model, &table_a(), 3).unwrap();

        let targets: Vec<_> = rows.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![ym(2024, 4), ym(2024, 5), ym(2024, 6)]);
        assert!(rows.iter().all(|r| r.stock_balance == 20.0));
        assert!(rows.iter().all(|r| r.mean_lead_time_days == 6.0));
        assert!(rows.iter().all(|r| r.observed_on == date(2024, 3, 31)));
    }

    #[test]
    fn horizon_is_chained_through_predictions() {
        let table = table_a();
        let model = FnDemandModel::new(&[col::LAG_1, col::ROLLING_MEAN_3], |x| x[0] + 5.0);
        let seed = &table.seeds[&Sku::new("A")];
        let steps = forecast_sku(&model, &table, seed, table.latest_date(), 3).unwrap();

        assert_eq!(steps[0].row.lag_1, 110.0);
        assert_eq!(steps[0].prediction, 115.0);
        assert_eq!(steps[1].row.lag_1, steps[0].prediction);
        assert_eq!(steps[2].row.lag_1, steps[1].prediction);
        // Window for month 2: [120, 110, 115].
        assert_eq!(steps[1].row.rolling_mean_3, 115.0);
    }

    #[test]
    fn deeper_lags_shift_through_the_horizon() {
        let table = table_a();
        let model = FnDemandModel::new(&[col::LAG_1, col::LAG_2, col::LAG_3], |x| x[0] + 5.0);
        let seed = &table.seeds[&Sku::new("A")];
        let steps = forecast_sku(&model, &table, seed, table.latest_date(), 4).unwrap();

        let lags = |i: usize| (steps[i].row.lag_1, steps[i].row.lag_2, steps[i].row.lag_3);
        assert_eq!(lags(0), (110.0, 120.0, 100.0));
        assert_eq!(lags(1), (115.0, 110.0, 120.0));
        assert_eq!(lags(2), (120.0, 115.0, 110.0));
        assert_eq!(lags(3), (125.0, 120.0, 115.0));
    }

    #[test]
    fn lags_before_first_known_period_are_zero() {
        let records = vec![record("A", date(2024, 1, 31), 100.0, 5.0)];
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 1, 31)).unwrap();
        let model = FnDemandModel::new(&[col::LAG_1, col::LAG_2, col::LAG_3], |x| x[0]);
        let seed = &table.seeds[&Sku::new("A")];
        let steps = forecast_sku(&model, &table, seed, table.latest_date(), 2).unwrap();

        assert_eq!((steps[0].row.lag_1, steps[0].row.lag_2, steps[0].row.lag_3), (100.0, 0.0, 0.0));
        assert_eq!((steps[1].row.lag_1, steps[1].row.lag_2, steps[1].row.lag_3), (100.0, 100.0, 0.0));
    }

    #[test]
    fn model_fitted_on_other_encoding_is_rejected() {
        let records = vec![
            record("A", date(2024, 1, 31), 100.0, 30.0),
            record("A", date(2024, 2, 29), 120.0, 25.0),
        ];
        let mut enc = CategoryEncoding::fit(2, &records);
        enc.skus.insert(Sku::new("A"), 99);
        let table = build_features(&records, &enc, date(2024, 2, 29)).unwrap();
        let model = FnDemandModel::new(&[col::SKU_CODE], |x| x[0]);

        let err = forecast(&model, &table, 1).unwrap_err();
        assert_eq!(err, ForecastError::EncodingMismatch { expected: 2, found: 1 });
        let err = predict_rows(&model, &table).unwrap_err();
        assert_eq!(err, ForecastError::EncodingMismatch { expected: 2, found: 1 });

        let bound = FnDemandModel::new(&[col::SKU_CODE], |x| x[0]).with_encoding_version(2);
        let rows = forecast(&bound, &table, 1).unwrap();
        assert_eq!(rows[0].predicted_demand, 99.0);
    }

    #[test]
    fn synthesized_rows_take_calendar_and_season_from_target_month() {
        let table = table_a();
        let model = LinearDemandModel::persistence();
        let seed = &table.seeds[&Sku::new("A")];
        let steps = forecast_sku(&model, &table, seed, date(2024, 11, 15), 2).unwrap();

        assert_eq!(steps[0].row.date, date(2024, 12, 1));
        assert_eq!(steps[0].row.season_code, 3);
        assert_eq!(steps[1].row.calendar.year, 2025);
        assert_eq!(steps[1].row.calendar.month, 1);
        assert!(!steps[0].row.promotion);
    }

    #[test]
    fn zero_history_sku_uses_explicit_fallback() {
        let records = vec![record("A", date(2024, 1, 31), 100.0, 10.0)];
        let mut enc = CategoryEncoding::fit(1, &records);
        enc.skus.insert(Sku::new("NEW"), 1);
        let table = build_features(&records, &enc, date(2024, 1, 31)).unwrap();

        let model = FnDemandModel::new(&[col::LAG_1], |x| x[0]);
        let rows = forecast(&model, &table, 2).unwrap();

        let new_rows: Vec<_> = rows.iter().filter(|r| r.sku == Sku::new("NEW")).collect();
        assert_eq!(new_rows.len(), 2);
        assert!(new_rows.iter().all(|r| r.predicted_demand == 0.0));
        assert!(new_rows.iter().all(|r| r.stock_balance == 0.0));
    }

    #[test]
    fn model_with_drifted_columns_is_rejected() {
        let model = FnDemandModel::new(&[col::LAG_1, "Moving Average"], |_| 1.0);
        let err = forecast(&model, &table_a(), 2).unwrap_err();
        assert_eq!(err, ForecastError::UnknownFeatureColumn("Moving Average".to_string()));
    }

    #[test]
    fn optional_column_missing_on_synthesized_row_is_rejected() {
        let model = FnDemandModel::new(&[col::LAG_1, col::DAYS_UNTIL_EXPIRY], |_| 1.0);
        let err = forecast(&model, &table_a(), 1).unwrap_err();
        assert_eq!(err, ForecastError::UnknownFeatureColumn("days_until_expiry".to_string()));
    }

    #[test]
    fn zero_horizon_is_invalid() {
        let model = LinearDemandModel::persistence();
        let err = forecast(&model, &table_a(), 0).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfiguration(_)));
    }

    fn frow(sku: &str, target: YearMonth, demand: f64, balance: f64, lead: f64, on: NaiveDate) -> ForecastRow {
        ForecastRow {
            sku: Sku::new(sku),
            target,
            predicted_demand: demand,
            stock_balance: balance,
            mean_lead_time_days: lead,
            observed_on: on,
        }
    }

    #[test]
    fn aggregation_sums_demand_takes_last_balance_and_mean_lead_time() {
        let m = ym(2024, 6);
        let rows = vec![
            frow("A", m, 10.0, 7.0, 4.0, date(2024, 6, 20)),
            frow("A", m, 20.0, 3.0, 8.0, date(2024, 6, 5)),
            frow("A", m, 5.0, 9.0, 6.0, date(2024, 6, 12)),
        ];
        let out = aggregate_monthly(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].predicted_demand, 35.0);
        assert_eq!(out[0].stock_balance, 7.0);
        assert_eq!(out[0].mean_lead_time_days, 6.0);
        assert_eq!(out[0].observed_on, date(2024, 6, 20));
    }

    #[test]
    fn aggregation_is_noop_on_monthly_rows() {
        let rows = vec![
            frow("A", ym(2024, 6), 10.0, 7.0, 4.0, date(2024, 5, 31)),
            frow("A", ym(2024, 7), 11.0, 7.0, 4.0, date(2024, 5, 31)),
            frow("B", ym(2024, 6), 3.5, 1.0, 2.5, date(2024, 5, 31)),
        ];
        assert_eq!(aggregate_monthly(rows.clone()), rows);
    }

    #[test]
    fn in_sample_forecast_groups_rows_by_month() {
        let records = vec![
            record("A", date(2024, 1, 2), 1.0, 1.0),
            record("A", date(2024, 1, 4), 2.0, 1.0),
            record("A", date(2024, 1, 6), 3.0, 1.0),
            record("A", date(2024, 1, 10), 10.0, 1.0),
            record("A", date(2024, 1, 20), 20.0, 2.0),
            record("A", date(2024, 2, 10), 40.0, 4.0),
        ];
        let enc = CategoryEncoding::fit(1, &records);
        let table = build_features(&records, &enc, date(2024, 2, 29)).unwrap();
        let model = FnDemandModel::new(&[col::LAG_1], |x| x[0]);

        let out = forecast_in_sample(&model, &table).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target, ym(2024, 1));
        assert_eq!(out[0].predicted_demand, 13.0); // lags 3 + 10
        assert_eq!(out[0].stock_balance, 2.0);
        assert_eq!(out[1].predicted_demand, 20.0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: aggregating already-monthly rows is a no-op.
            #[test]
            fn aggregation_idempotent(
                demand in prop::collection::vec(0.0f64..1000.0, 1..12),
                balance in 0.0f64..500.0,
                lead in 0.0f64..30.0,
            ) {
                let rows: Vec<ForecastRow> = demand
                    .iter()
                    .enumerate()
                    .map(|(i, d)| frow("S", ym(2024, 1).plus_months(i as u32), *d, balance, lead, date(2023, 12, 31)))
                    .collect();
                let once = aggregate_monthly(rows.clone());
                prop_assert_eq!(&once, &rows);
                prop_assert_eq!(aggregate_monthly(once.clone()), once);
            }

            /// Property: every synthesized lag_k is the k-th last value of
            /// history extended with the predictions made so far.
            #[test]
            fn horizon_lags_read_the_running_series(
                demand in prop::collection::vec(0.0f64..1000.0, 1..8),
                horizon in 1u32..8,
            ) {
                let records: Vec<_> = demand
                    .iter()
                    .enumerate()
                    .map(|(i, d)| record("P", ym(2020, 1).plus_months(i as u32).first_day(), *d, 0.0))
                    .collect();
                let enc = CategoryEncoding::fit(1, &records);
                let table = build_features(&records, &enc, date(2030, 1, 1)).unwrap();
                let model = FnDemandModel::new(&[col::LAG_1, col::LAG_2, col::LAG_3], |x| {
                    0.5 * x[0] + 0.3 * x[1] + 0.2 * x[2] + 1.0
                });
                let seed = &table.seeds[&Sku::new("P")];
                let steps = forecast_sku(&model, &table, seed, table.latest_date(), horizon).unwrap();

                let mut series = seed.recent_demand.clone();
                for step in &steps {
                    let back = |k: usize| series.len().checked_sub(k).map(|i| series[i]).unwrap_or(0.0);
                    prop_assert_eq!(step.row.lag_1, back(1));
                    prop_assert_eq!(step.row.lag_2, back(2));
                    prop_assert_eq!(step.row.lag_3, back(3));
                    series.push(step.prediction);
                }
            }
        }
    }
}
