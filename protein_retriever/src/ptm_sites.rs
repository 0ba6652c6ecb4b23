// src/ptm_sites.rs

use crate::error::ExtractionError;
use crate::feature_extractor::{has_type, raw_features, FeatureExtractor};
use crate::models::{GeneSymbol, ProteinRecord, PtmRecord, PtmType};
use tracing::{debug, info};

/// UniProt feature types treated as modification sites.
pub const PTM_FEATURE_TYPES: [&str; 5] = [
    "Modified residue",
    "Cross-link",
    "Glycosylation",
    "Lipidation",
    "Disulfide bond",
];

/// Modification sites of `record` as point annotations.
///
/// Only the start of a feature's location is used; a disulfide bond is placed
/// at its first cysteine. Features without a start are dropped. The category
/// comes from [`PtmType::categorize`] on the description alone; a feature
/// without one keeps an empty description and lands in `Other`.
pub fn extract_ptms(record: Option<&ProteinRecord>, gene: &GeneSymbol) -> Vec<PtmRecord> {
    let features = raw_features(record, "PTM");
    let mut skipped = 0usize;

    let ptms: Vec<PtmRecord> = features
        .iter()
        .filter(|feature| has_type(feature, &PTM_FEATURE_TYPES))
        .filter_map(|feature| {
            let Some(position) = feature.start else {
                skipped += 1;
                return None;
            };
            let description = feature.description.clone().unwrap_or_default();
            Some(PtmRecord {
                gene: gene.clone(),
                ptm_type: PtmType::categorize(&description),
                position,
                description,
            })
        })
        .collect();

    if skipped > 0 {
        debug!("Dropped {} PTM feature(s) of {} without a position", skipped, gene);
    }
    if !features.is_empty() {
        info!("Extracted {} PTM site(s) for {}", ptms.len(), gene);
    }
    ptms
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PtmExtractor;

impl FeatureExtractor for PtmExtractor {
    type Row = PtmRecord;

    fn category(&self) -> &'static str {
        "PTM"
    }

    fn extract(&self, record: &ProteinRecord, gene: &GeneSymbol) -> Result<Vec<PtmRecord>, ExtractionError> {
        Ok(extract_ptms(Some(record), gene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProteinAccession;
    use serde_json::{json, Value};

    fn record(features: Value) -> ProteinRecord {
        ProteinRecord {
            accession: ProteinAccession("P00002".into()),
            gene_name: None,
            sequence_length: 500,
            features,
        }
    }

    fn gene() -> GeneSymbol {
        GeneSymbol::new("TEST1").unwrap()
    }

    #[test]
    fn categorizes_and_positions_sites() {
        let rec = record(json!([
            {"type": "Modified residue", "description": "Phosphoserine; by CDK1",
             "location": {"start": {"value": 150}, "end": {"value": 150}}},
            {"type": "Modified residue", "description": "N6-acetyllysine",
             "location": {"start": {"value": 250}, "end": {"value": 250}}},
            {"type": "Disulfide bond", "description": "",
             "location": {"start": {"value": 30}, "end": {"value": 88}}},
            {"type": "Domain", "description": "Kinase",
             "location": {"start": {"value": 10}, "end": {"value": 100}}},
        ]));

        let ptms = extract_ptms(Some(&rec), &gene());
        let summary: Vec<(PtmType, u32)> = ptms.iter().map(|p| (p.ptm_type, p.position)).collect();
        assert_eq!(
            summary,
            vec![
                (PtmType::Phosphorylation, 150),
                (PtmType::Acetylation, 250),
                (PtmType::Other, 30),
            ]
        );
        assert_eq!(ptms[2].description, "");
    }

    #[test]
    fn type_name_never_stands_in_for_description() {
        let rec = record(json!([
            {"type": "Glycosylation", "location": {"start": {"value": 40}}},
            {"type": "Lipidation", "description": null,
             "location": {"start": {"value": 7}}},
        ]));
        let ptms = extract_ptms(Some(&rec), &gene());
        let summary: Vec<(PtmType, &str)> = ptms.iter().map(|p| (p.ptm_type, p.description.as_str())).collect();
        assert_eq!(summary, vec![(PtmType::Other, ""), (PtmType::Other, "")]);
    }

    #[test]
    fn missing_start_excludes_row() {
        let rec = record(json!([
            {"type": "Modified residue", "description": "Phosphothreonine",
             "location": {"end": {"value": 12}}},
            {"type": "Cross-link", "description": "Glycyl lysine isopeptide (Lys-Gly) (interchain with G-Cter in ubiquitin)",
             "location": {"start": {"value": "48"}}},
        ]));
        let ptms = extract_ptms(Some(&rec), &gene());
        assert_eq!(ptms.len(), 1);
        assert_eq!(ptms[0].position, 48);
        assert_eq!(ptms[0].ptm_type, PtmType::Ubiquitination);
    }

    #[test]
    fn absent_or_malformed_input_is_empty() {
        assert!(extract_ptms(None, &gene()).is_empty());
        assert!(extract_ptms(Some(&record(json!({"features": []}))), &gene()).is_empty());
        assert!(extract_ptms(Some(&record(json!([]))), &gene()).is_empty());
    }
}
