//! `demandflow-core`: shared building blocks for the forecasting pipeline.
//!
//! This crate contains **pure** primitives (no IO, no logging setup).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{ForecastError, ForecastResult};
pub use id::{RunId, Sku};
pub use value_object::{ValueObject, YearMonth};
