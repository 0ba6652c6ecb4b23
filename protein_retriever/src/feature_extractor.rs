// src/feature_extractor.rs

use crate::error::ExtractionError;
use crate::models::{GeneSymbol, ProteinRecord, RawFeature};
use serde_json::Value;
use tracing::{debug, warn};

/// Turns a fetched record into one annotation table.
///
/// The built-in extractors never return `Err`; the orchestrator still runs
/// every extractor behind its own isolation boundary, see
/// [`crate::retrieval::isolated_extract`].
pub trait FeatureExtractor {
    type Row;

    /// Short name used in diagnostics ("domain", "PTM").
    fn category(&self) -> &'static str;

    fn extract(
        &self,
        record: &ProteinRecord,
        gene: &GeneSymbol,
    ) -> Result<Vec<Self::Row>, ExtractionError>;
}

/// The record's features as null-safe rows, or an empty list when the record
/// is missing or its feature list is not an array.
pub(crate) fn raw_features(record: Option<&ProteinRecord>, category: &str) -> Vec<RawFeature> {
    let Some(record) = record else {
        debug!("No protein record, skipping {} extraction", category);
        return Vec::new();
    };

    match &record.features {
        Value::Array(items) => items.iter().map(RawFeature::from_value).collect(),
        Value::Null => {
            debug!("Entry {} carries no feature list", record.accession);
            Vec::new()
        }
        other => {
            warn!(
                "Feature list of {} is not an array (found {}), no {} rows extracted",
                record.accession,
                json_kind(other),
                category
            );
            Vec::new()
        }
    }
}

/// Case-sensitive match of the feature's type against a category list.
pub(crate) fn has_type(feature: &RawFeature, types: &[&str]) -> bool {
    feature
        .feature_type
        .as_deref()
        .map(|t| types.contains(&t))
        .unwrap_or(false)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
