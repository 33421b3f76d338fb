//! One planning run: history -> features -> horizon forecast -> recommendations.

use chrono::NaiveDate;
use serde_json::json;

use demandflow_core::{ForecastResult, RunId};
use demandflow_inventory::InventoryRecord;

use crate::config::PlanningConfig;
use crate::encoding::CategoryEncoding;
use crate::engine::forecast;
use crate::features::{FeatureTable, build_features};
use crate::model::DemandModel;
use crate::reorder::ReorderRecommendation;
use crate::summary::RunSummary;

/// Forecast and recommend from an already-built feature table.
///
/// Output is ordered by SKU, then target month.
pub fn plan(
    model: &dyn DemandModel,
    table: &FeatureTable,
    config: &PlanningConfig,
) -> ForecastResult<Vec<ReorderRecommendation>> {
    config.validate()?;
    let policy = config.policy()?;
    let rows = forecast(model, table, config.horizon_months)?;
    policy.recommend_all(&rows)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanningOutcome {
    pub recommendations: Vec<ReorderRecommendation>,
    pub summary: RunSummary,
}

/// A single forecasting run over a history snapshot.
///
/// Inputs are provided by the caller; the job never reads files and never
/// mutates the encoding or model.
pub struct PlanningJob<'a> {
    run_id: RunId,
    model: &'a dyn DemandModel,
    encoding: &'a CategoryEncoding,
    history: &'a [InventoryRecord],
    as_of: NaiveDate,
    config: PlanningConfig,
}

impl<'a> PlanningJob<'a> {
    pub fn new(
        model: &'a dyn DemandModel,
        encoding: &'a CategoryEncoding,
        history: &'a [InventoryRecord],
        as_of: NaiveDate,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            model,
            encoding,
            history,
            as_of,
            config: PlanningConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlanningConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn run(&self) -> ForecastResult<PlanningOutcome> {
        self.config.validate()?;

        tracing::info!(
            run_id = %self.run_id,
            records = self.history.len(),
            as_of = %self.as_of,
            horizon_months = self.config.horizon_months,
            threshold_fraction = self.config.threshold_fraction,
            "planning run started"
        );

        let table = build_features(self.history, self.encoding, self.as_of)?;
        let anchor = table.latest_date();
        let recommendations = plan(self.model, &table, &self.config)?;

        let summary = RunSummary::new(self.run_id, &recommendations)
            .with_explanation(format!(
                "{} of {} forecast row(s) need a reorder (horizon={} month(s), threshold_fraction={})",
                recommendations.iter().filter(|r| r.reorder_needed).count(),
                recommendations.len(),
                self.config.horizon_months,
                self.config.threshold_fraction
            ))
            .with_metadata(json!({
                "kind": "demand.reorder_plan",
                "as_of": self.as_of.to_string(),
                "anchor": anchor.to_string(),
                "feature_rows": table.rows.len(),
                "feature_schema_version": table.schema_version,
                "model_columns": self.model.feature_columns(),
                "config": self.config,
            }));

        tracing::info!(
            run_id = %self.run_id,
            skus = summary.skus,
            forecast_rows = summary.forecast_rows,
            reorders = summary.reorders,
            total_reorder_quantity = summary.total_reorder_quantity,
            "planning run finished"
        );

        Ok(PlanningOutcome {
            recommendations,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearDemandModel;
    use demandflow_core::ForecastError;
    use demandflow_inventory::SyntheticHistory;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 31).unwrap()
    }

    #[test]
    fn run_covers_every_sku_for_the_horizon() {
        let history = SyntheticHistory::default()
            .with_skus(5)
            .with_months(12)
            .generate()
            .unwrap();
        let encoding = CategoryEncoding::fit(1, &history);
        let model = LinearDemandModel::persistence();

        let outcome = PlanningJob::new(&model, &encoding, &history, as_of())
            .with_config(PlanningConfig {
                horizon_months: 3,
                ..PlanningConfig::default()
            })
            .run()
            .unwrap();

        assert_eq!(outcome.recommendations.len(), 15);
        assert_eq!(outcome.summary.skus, 5);
        assert_eq!(outcome.summary.forecast_rows, 15);
        assert_eq!(outcome.summary.metadata["config"]["horizon_months"], 3);
        for rec in &outcome.recommendations {
            assert!(rec.reorder_quantity >= 0.0);
        }
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let encoding = CategoryEncoding::fit(1, &[]);
        let model = LinearDemandModel::persistence();
        let err = PlanningJob::new(&model, &encoding, &[], as_of())
            .with_config(PlanningConfig {
                threshold_fraction: -1.0,
                ..PlanningConfig::default()
            })
            .run()
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfiguration(_)));
    }

    #[test]
    fn run_id_is_stable_for_a_job() {
        let encoding = CategoryEncoding::fit(1, &[]);
        let model = LinearDemandModel::persistence();
        let id = RunId::new();
        let job = PlanningJob::new(&model, &encoding, &[], as_of()).with_run_id(id);
        let outcome = job.run().unwrap();
        assert_eq!(outcome.summary.run_id, id);
        assert!(outcome.recommendations.is_empty());
    }

    #[test]
    fn unknown_sku_in_history_fails() {
        let history = SyntheticHistory::default()
            .with_skus(2)
            .with_months(4)
            .generate()
            .unwrap();
        let encoding = CategoryEncoding::fit(1, &history[..1]);
        let model = LinearDemandModel::persistence();
        let err = PlanningJob::new(&model, &encoding, &history, as_of()).run().unwrap_err();
        assert!(matches!(err, ForecastError::UnknownCategory { .. }));
    }
}
