//! Demand model boundary.
//!
//! The regression model is an external collaborator: training happens
//! elsewhere, and the pipeline only calls `predict`. What the pipeline does
//! own is the column contract: a model declares the ordered columns it was
//! fitted on, and [`FeatureMatrix`] rebuilds exactly those columns or fails.

use std::path::Path;

use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastError, ForecastResult};

use crate::encoding::{CategoryEncoding, ENCODING_VERSION};
use crate::features::FeatureRow;
use crate::schema::{FEATURE_SCHEMA_VERSION, FeatureSchema, feature_columns as col};

/// A trained regression model mapping a feature vector to a demand value.
///
/// Implementations must be read-only after construction: one instance is
/// shared across all SKU computations, possibly from several threads.
pub trait DemandModel: Send + Sync {
    /// Feature schema version the model was fitted against.
    fn schema_version(&self) -> u32;

    /// Version of the category encoding the model's codes were fitted with.
    fn encoding_version(&self) -> u32;

    /// Ordered feature columns the model consumes.
    fn feature_columns(&self) -> &[String];

    /// Predict demand for one feature vector laid out as `feature_columns()`.
    fn predict_one(&self, features: &[f64]) -> f64;

    /// Predict demand for every row of a matrix built for this model.
    fn predict(&self, matrix: &FeatureMatrix) -> ForecastResult<Vec<f64>> {
        if matrix.columns() != self.feature_columns() {
            let drifted = matrix
                .columns()
                .iter()
                .zip(self.feature_columns())
                .find(|(have, want)| have != want)
                .map(|(_, want)| want.clone())
                .or_else(|| self.feature_columns().get(matrix.columns().len()).cloned())
                .or_else(|| matrix.columns().get(self.feature_columns().len()).cloned())
                .unwrap_or_default();
            return Err(ForecastError::unknown_feature(drifted));
        }
        Ok(matrix.rows().map(|row| self.predict_one(row)).collect())
    }
}

/// Check that a model can be served by the given feature schema.
pub fn check_model(model: &dyn DemandModel, schema: &FeatureSchema) -> ForecastResult<()> {
    schema.check_model(model.schema_version(), model.feature_columns())
}

/// Check that a model reads category codes from the loaded encoding.
pub fn check_encoding(model: &dyn DemandModel, encoding: &CategoryEncoding) -> ForecastResult<()> {
    encoding.check_model_version(model.encoding_version())
}

/// Row-major feature matrix with a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Lay out `rows` in `columns` order.
    ///
    /// Fails with `UnknownFeatureColumn` for the first column a row cannot
    /// supply. Nothing is coerced to a default.
    pub fn from_rows(columns: &[String], rows: &[FeatureRow]) -> ForecastResult<Self> {
        let mut values = Vec::with_capacity(columns.len() * rows.len());
        for row in rows {
            for name in columns {
                let v = row
                    .value(name)
                    .ok_or_else(|| ForecastError::unknown_feature(name.as_str()))?;
                values.push(v);
            }
        }
        Ok(Self {
            columns: columns.to_vec(),
            values,
            n_rows: rows.len(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let width = self.columns.len();
        &self.values[i * width..(i + 1) * width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }
}

/// Linear model artifact: `intercept + sum(weight_i * feature_i)`.
///
/// Persisted as JSON. Stands in for any regressor exported to a simple
/// closed form, and gives the pipeline a concrete model to run end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDemandModel {
    schema_version: u32,
    encoding_version: u32,
    columns: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearDemandModel {
    pub fn new(columns: Vec<String>, weights: Vec<f64>, intercept: f64) -> ForecastResult<Self> {
        let model = Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            encoding_version: ENCODING_VERSION,
            columns,
            weights,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    /// Blend of last demand and trailing mean; a reasonable untrained default.
    pub fn persistence() -> Self {
        Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            encoding_version: ENCODING_VERSION,
            columns: vec![col::LAG_1.to_string(), col::ROLLING_MEAN_3.to_string()],
            weights: vec![0.6, 0.4],
            intercept: 0.0,
        }
    }

    /// Bind the model to the encoding its category codes came from.
    pub fn with_encoding_version(mut self, version: u32) -> Self {
        self.encoding_version = version;
        self
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn validate(&self) -> ForecastResult<()> {
        if self.columns.len() != self.weights.len() {
            return Err(ForecastError::artifact(format!(
                "linear model has {} columns but {} weights",
                self.columns.len(),
                self.weights.len()
            )));
        }
        if !(self.intercept.is_finite() && self.weights.iter().all(|w| w.is_finite())) {
            return Err(ForecastError::artifact("linear model has non-finite parameters"));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> ForecastResult<Self> {
        let model: Self = serde_json::from_str(json)
            .map_err(|e| ForecastError::artifact(format!("invalid model artifact: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> ForecastResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ForecastError::artifact(e.to_string()))
    }

    pub fn load(path: &Path) -> ForecastResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::artifact(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> ForecastResult<()> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| ForecastError::artifact(format!("failed to write {}: {e}", path.display())))
    }
}

impl DemandModel for LinearDemandModel {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn encoding_version(&self) -> u32 {
        self.encoding_version
    }

    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Adapter turning a closure over the feature vector into a [`DemandModel`].
pub struct FnDemandModel<F> {
    columns: Vec<String>,
    encoding_version: u32,
    f: F,
}

impl<F> FnDemandModel<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(columns: &[&str], f: F) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            encoding_version: ENCODING_VERSION,
            f,
        }
    }

    pub fn with_encoding_version(mut self, version: u32) -> Self {
        self.encoding_version = version;
        self
    }
}

impl<F> DemandModel for FnDemandModel<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn schema_version(&self) -> u32 {
        FEATURE_SCHEMA_VERSION
    }

    fn encoding_version(&self) -> u32 {
        self.encoding_version
    }

    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict_one(&self, features: &[f64]) -> f64 {
        (self.f)(features)
    }
}
