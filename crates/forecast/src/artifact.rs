//! Persisted forecast artifact (CSV).
//!
//! One row per [`ReorderRecommendation`]; the header names come from its
//! serde field names. Written once per run, read by presentation callers.

use std::io::{Read, Write};
use std::path::Path;

use demandflow_core::{ForecastError, ForecastResult};

use crate::reorder::ReorderRecommendation;

pub fn write_recommendations<W: Write>(
    writer: W,
    recommendations: &[ReorderRecommendation],
) -> ForecastResult<()> {
    let mut w = csv::Writer::from_writer(writer);
    for rec in recommendations {
        w.serialize(rec)
            .map_err(|e| ForecastError::artifact(format!("failed to write forecast row: {e}")))?;
    }
    w.flush().map_err(|e| ForecastError::artifact(e.to_string()))
}

pub fn read_recommendations<R: Read>(reader: R) -> ForecastResult<Vec<ReorderRecommendation>> {
    let mut r = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    r.deserialize()
        .enumerate()
        .map(|(idx, row)| {
            row.map_err(|e| {
                ForecastError::artifact(format!("invalid forecast row at line {}: {e}", idx + 2))
            })
        })
        .collect()
}

pub fn write_recommendations_path(
    path: &Path,
    recommendations: &[ReorderRecommendation],
) -> ForecastResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ForecastError::artifact(format!("failed to create {}: {e}", parent.display())))?;
    }
    let file = std::fs::File::create(path)
        .map_err(|e| ForecastError::artifact(format!("failed to create {}: {e}", path.display())))?;
    write_recommendations(std::io::BufWriter::new(file), recommendations)
}

pub fn read_recommendations_path(path: &Path) -> ForecastResult<Vec<ReorderRecommendation>> {
    let file = std::fs::File::open(path)
        .map_err(|e| ForecastError::artifact(format!("failed to open {}: {e}", path.display())))?;
    read_recommendations(std::io::BufReader::new(file))
}
