//! Candidate areas for each row of a geo-typed field.
//!
//! Exact matching decides the column type; this pass is looser. Codes still
//! match exactly, names are ranked by bigram similarity so that misspelled
//! or partial names can be resolved by a reviewer.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    book::{Field, FieldId, ProcessStatus},
    decision::{GeoOptions, TypeDecision},
    geo::{GeoArea, GeoCatalog, GeoType},
};

/// Names scoring at or below this are not candidates.
pub const SIMILARITY_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarArea {
    pub id: u64,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeodataRow {
    pub similar_areas: Vec<SimilarArea>,
    pub selected_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geodata {
    pub field_id: FieldId,
    pub status: ProcessStatus,
    pub rows: Vec<GeodataRow>,
}

/// Candidates for one cell, best first.
pub fn similar_areas(query: &str, catalog: &GeoCatalog, options: &GeoOptions) -> Vec<SimilarArea> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    // Level 0 columns search every level.
    let on_level = |area: &&GeoArea| {
        options.admin_level == 0 || area.admin_level == options.admin_level
    };

    let mut found: Vec<SimilarArea> = match options.geo_type {
        GeoType::Code => catalog
            .areas()
            .iter()
            .filter(on_level)
            .filter(|area| area.code.trim().to_lowercase() == query)
            .map(|area| SimilarArea {
                id: area.id,
                similarity: 1.0,
            })
            .collect(),
        GeoType::Name => catalog
            .areas()
            .iter()
            .filter(on_level)
            .map(|area| SimilarArea {
                id: area.id,
                similarity: strsim::sorensen_dice(&area.title.to_lowercase(), &query),
            })
            .filter(|candidate| candidate.similarity > SIMILARITY_THRESHOLD)
            .collect(),
    };
    // Stable sort keeps catalog order among equal scores.
    found.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    found
}

/// Builds candidate lists for every data row of `field`, which must have been
/// processed as a geo column.
pub fn extract_geodata(field: &Field, data_row_index: usize, catalog: &GeoCatalog) -> Result<Geodata> {
    let options = match field.decision() {
        Some(TypeDecision::Geo(options)) => *options,
        Some(other) => bail!("Field {} is a {} column, not geo", field.id, other.field_type()),
        None => bail!("Field {} has not been processed yet", field.id),
    };
    let rows = field
        .data_values(data_row_index)
        .iter()
        .map(|raw| {
            let similar = raw
                .as_non_empty()
                .map(|value| similar_areas(value, catalog, &options))
                .unwrap_or_default();
            GeodataRow {
                selected_id: similar.first().map(|candidate| candidate.id),
                similar_areas: similar,
            }
        })
        .collect();
    Ok(Geodata {
        field_id: field.id,
        status: ProcessStatus::Success,
        rows,
    })
}
