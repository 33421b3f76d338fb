//! Fixed categorical encoding for SKU and season.
//!
//! The encoding is fitted once on training data, persisted next to the model
//! and loaded read-only for inference. The inference path only ever looks
//! codes up; a value without a code is an error, never a fresh code.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use demandflow_core::{ForecastError, ForecastResult, Sku};
use demandflow_inventory::{InventoryRecord, Season, columns};

/// Version stamped on encodings fitted by this build's tooling.
///
/// Independent of the feature schema version: the schema names columns,
/// the encoding assigns category codes.
pub const ENCODING_VERSION: u32 = 1;

/// Versioned SKU / season code mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    /// Artifact version; bump whenever the mapping is refitted.
    pub version: u32,
    pub skus: BTreeMap<Sku, u32>,
    pub seasons: BTreeMap<String, u32>,
}

impl CategoryEncoding {
    /// Fit an encoding on training records.
    ///
    /// SKUs get codes in lexicographic order; seasons use the fixed
    /// Spring/Summer/Autumn/Winter = 0/1/2/3 mapping. Training-side only.
    pub fn fit(version: u32, records: &[InventoryRecord]) -> Self {
        let mut skus: BTreeMap<Sku, u32> = records.iter().map(|r| (r.sku.clone(), 0)).collect();
        for (code, value) in skus.values_mut().enumerate() {
            *value = code as u32;
        }

        Self {
            version,
            skus,
            seasons: standard_seasons(),
        }
    }

    /// Fails with `EncodingMismatch` unless a model fitted against encoding
    /// `model_version` can read codes from this encoding.
    pub fn check_model_version(&self, model_version: u32) -> ForecastResult<()> {
        if model_version != self.version {
            return Err(ForecastError::EncodingMismatch {
                expected: self.version,
                found: model_version,
            });
        }
        Ok(())
    }

    pub fn sku_code(&self, sku: &Sku) -> ForecastResult<u32> {
        self.skus
            .get(sku)
            .copied()
            .ok_or_else(|| ForecastError::unknown_category(columns::SKU, sku.as_str()))
    }

    pub fn season_code(&self, season: &str) -> ForecastResult<u32> {
        self.seasons
            .get(season)
            .copied()
            .ok_or_else(|| ForecastError::unknown_category(columns::SEASON, season))
    }

    pub fn from_json(json: &str) -> ForecastResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ForecastError::artifact(format!("invalid category encoding: {e}")))
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

/// Spring=0, Summer=1, Autumn=2, Winter=3.
pub fn standard_seasons() -> BTreeMap<String, u32> {
    Season::ALL
        .iter()
        .enumerate()
        .map(|(code, s)| (s.as_str().to_string(), code as u32))
        .collect()
}
