// src/protein_domains.rs

use crate::error::ExtractionError;
use crate::feature_extractor::{has_type, raw_features, FeatureExtractor};
use crate::models::{DomainRecord, GeneSymbol, ProteinRecord};
use tracing::{debug, info};

/// UniProt feature types drawn as rectangles on the backbone.
pub const DOMAIN_FEATURE_TYPES: [&str; 5] = ["Domain", "Region", "Repeat", "Zinc finger", "DNA binding"];

pub const DEFAULT_DOMAIN_NAME: &str = "Domain";

/// Domain-like features of `record` as `DomainRecord` rows.
///
/// Never fails. A feature without both a start and an end (or with
/// `end < start`) is dropped rather than drawn as a zero-width box.
pub fn extract_domains(record: Option<&ProteinRecord>, gene: &GeneSymbol) -> Vec<DomainRecord> {
    let features = raw_features(record, "domain");
    let mut skipped = 0usize;

    let domains: Vec<DomainRecord> = features
        .iter()
        .filter(|feature| has_type(feature, &DOMAIN_FEATURE_TYPES))
        .filter_map(|feature| {
            let bounds = feature.start.zip(feature.end).filter(|(start, end)| end >= start);
            if bounds.is_none() {
                skipped += 1;
            }
            let (start, end) = bounds?;
            Some(DomainRecord {
                gene: gene.clone(),
                domain_name: feature
                    .description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string()),
                start,
                end,
            })
        })
        .collect();

    if skipped > 0 {
        debug!("Dropped {} domain feature(s) of {} without usable bounds", skipped, gene);
    }
    if !features.is_empty() {
        info!("Extracted {} domain(s) for {}", domains.len(), gene);
    }
    domains
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DomainExtractor;

impl FeatureExtractor for DomainExtractor {
    type Row = DomainRecord;

    fn category(&self) -> &'static str {
        "domain"
    }

    fn extract(&self, record: &ProteinRecord, gene: &GeneSymbol) -> Result<Vec<DomainRecord>, ExtractionError> {
        Ok(extract_domains(Some(record), gene))
    }
}
