//! Demand forecasting and reorder planning.
//!
//! Data flows one way: [`features`] -> [`model`] -> [`engine`] -> [`reorder`].
//! The model and the category encoding are injected by the caller and only
//! ever read.

pub mod artifact;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod features;
pub mod job;
pub mod model;
pub mod reorder;
pub mod schema;
pub mod summary;

pub use artifact::{
    read_recommendations, read_recommendations_path, write_recommendations, write_recommendations_path,
};
pub use config::{PlanningConfig, PlanningOverrides};
pub use encoding::{CategoryEncoding, ENCODING_VERSION};
pub use engine::{
    ForecastRow, HistoryFallback, HorizonStep, aggregate_monthly, forecast, forecast_in_sample, forecast_sku,
    forecast_with, predict_rows,
};
pub use features::{Calendar, FeatureRow, FeatureTable, SkuSeed, build_features, build_features_from_table};
pub use job::{PlanningJob, PlanningOutcome, plan};
pub use model::{DemandModel, FeatureMatrix, FnDemandModel, LinearDemandModel, check_encoding, check_model};
pub use reorder::{OrderDate, ReorderPolicy, ReorderRecommendation, recommend};
pub use schema::{FEATURE_SCHEMA_VERSION, FeatureSchema};
pub use summary::RunSummary;
