use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use demandflow_core::{ForecastError, ForecastResult, RunId};

use crate::reorder::ReorderRecommendation;

/// Outcome of one planning run.
///
/// This is a report, not state: it can be logged, persisted beside the
/// artifact, or displayed without affecting later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,

    pub skus: usize,
    pub forecast_rows: usize,
    pub reorders: usize,

    /// Sum of recommended quantities across all rows.
    pub total_reorder_quantity: f64,

    /// Optional human-readable explanation.
    pub explanation: Option<String>,

    /// Free-form metadata (configuration, anchor date, model columns, etc).
    pub metadata: JsonValue,
}

impl RunSummary {
    pub fn new(run_id: RunId, recommendations: &[ReorderRecommendation]) -> Self {
        let mut skus: Vec<_> = recommendations.iter().map(|r| &r.sku).collect();
        skus.sort();
        skus.dedup();

        let needed = recommendations.iter().filter(|r| r.reorder_needed);

        Self {
            run_id,
            skus: skus.len(),
            forecast_rows: recommendations.len(),
            reorders: needed.clone().count(),
            total_reorder_quantity: needed.map(|r| r.reorder_quantity).sum(),
            explanation: None,
            metadata: JsonValue::Null,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_json(&self) -> ForecastResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ForecastError::artifact(e.to_string()))
    }

    pub fn save(&self, path: &std::path::Path) -> ForecastResult<()> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| ForecastError::artifact(format!("failed to write {}: {e}", path.display())))
    }
}
