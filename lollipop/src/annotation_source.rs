//! Where the plot's protein length, domains and PTMs come from.
//!
//! Values the user passes in always win. UniProt is asked only for what is
//! still missing, and only if auto-retrieval is on. The one hard requirement
//! is the protein length; empty domain or PTM tables are fine.

use protein_retriever::{DomainRecord, GeneSymbol, PtmRecord, RetrievalResult};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::data_handling::annotations::{read_domains, read_ptms};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error(
        "Could not retrieve protein length for {gene} from UniProt. Supply it with \
         --protein-length, or check the gene symbol spelling and your network connection."
    )]
    RetrievalFailed { gene: GeneSymbol },

    #[error(
        "No protein length supplied for {gene} and auto-retrieval is disabled. \
         Pass --protein-length or drop --no-auto-retrieve."
    )]
    LengthMissing { gene: GeneSymbol },

    #[error(transparent)]
    Table(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationRequest<'a> {
    pub protein_length: Option<u32>,
    pub domains_path: Option<&'a Path>,
    pub ptms_path: Option<&'a Path>,
    pub auto_retrieve: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProteinAnnotations {
    pub gene: GeneSymbol,
    pub protein_length: u32,
    pub domains: Vec<DomainRecord>,
    pub ptms: Vec<PtmRecord>,
}

/// Combine user-supplied annotations with a retrieval for whatever is missing.
///
/// `retrieve` is called at most once.
pub fn resolve_annotations<F>(
    gene: &GeneSymbol,
    request: &AnnotationRequest<'_>,
    retrieve: F,
) -> Result<ProteinAnnotations, AnnotationError>
where
    F: FnOnce(&GeneSymbol) -> RetrievalResult,
{
    let manual_domains = request.domains_path.map(|p| read_domains(p, gene)).transpose()?;
    let manual_ptms = request.ptms_path.map(|p| read_ptms(p, gene)).transpose()?;

    let complete = request.protein_length.is_some() && manual_domains.is_some() && manual_ptms.is_some();
    let retrieved = if request.auto_retrieve && !complete {
        info!("Retrieving missing annotations for {} from UniProt", gene);
        retrieve(gene)
    } else {
        RetrievalResult::empty()
    };

    let protein_length = match request.protein_length.or(retrieved.protein_length) {
        Some(length) => length,
        None if request.auto_retrieve => {
            return Err(AnnotationError::RetrievalFailed { gene: gene.clone() })
        }
        None => return Err(AnnotationError::LengthMissing { gene: gene.clone() }),
    };

    let domains = manual_domains.unwrap_or(retrieved.domains);
    let ptms = manual_ptms.unwrap_or(retrieved.ptms);

    Ok(ProteinAnnotations {
        gene: gene.clone(),
        protein_length,
        domains: clip_domains(domains, protein_length),
        ptms: clip_ptms(ptms, protein_length),
    })
}

/// Domains past the end of the protein are dropped, overhanging ones trimmed.
fn clip_domains(domains: Vec<DomainRecord>, protein_length: u32) -> Vec<DomainRecord> {
    let before = domains.len();
    let clipped: Vec<DomainRecord> = domains
        .into_iter()
        .filter(|d| d.start <= protein_length)
        .map(|mut d| {
            d.end = d.end.min(protein_length);
            d
        })
        .collect();
    if clipped.len() < before {
        warn!(
            "Dropped {} domain(s) starting beyond residue {}",
            before - clipped.len(),
            protein_length
        );
    }
    clipped
}

fn clip_ptms(ptms: Vec<PtmRecord>, protein_length: u32) -> Vec<PtmRecord> {
    let before = ptms.len();
    let clipped: Vec<PtmRecord> = ptms.into_iter().filter(|p| p.position <= protein_length).collect();
    if clipped.len() < before {
        warn!(
            "Dropped {} PTM site(s) beyond residue {}",
            before - clipped.len(),
            protein_length
        );
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use protein_retriever::error::ApiError;
    use protein_retriever::{ProteinAccession, ProteinSource, PtmType, Retriever};
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    fn gene(symbol: &str) -> GeneSymbol {
        GeneSymbol::new(symbol).unwrap()
    }

    fn retrieved(symbol: &str) -> RetrievalResult {
        RetrievalResult {
            domains: vec![DomainRecord {
                gene: gene(symbol),
                domain_name: "Kinase".into(),
                start: 10,
                end: 100,
            }],
            ptms: vec![PtmRecord {
                gene: gene(symbol),
                ptm_type: PtmType::Phosphorylation,
                position: 150,
                description: "Phosphoserine".into(),
            }],
            protein_length: Some(500),
        }
    }

    fn auto() -> AnnotationRequest<'static> {
        AnnotationRequest {
            auto_retrieve: true,
            ..AnnotationRequest::default()
        }
    }

    #[test]
    fn failed_retrieval_names_gene_and_remedy() {
        let err = resolve_annotations(&gene("TEST5"), &auto(), |_| RetrievalResult::empty()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, AnnotationError::RetrievalFailed { .. }));
        assert!(message.contains("Could not retrieve protein length for TEST5"));
        assert!(message.contains("--protein-length"));
    }

    struct Unreachable;

    impl ProteinSource for Unreachable {
        fn search(&self, _query: &str) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Malformed {
                url: "https://rest.uniprot.org/uniprotkb/search".into(),
                reason: "network unreachable".into(),
            })
        }

        fn entry(&self, accession: &ProteinAccession) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Malformed {
                url: accession.to_string(),
                reason: "network unreachable".into(),
            })
        }
    }

    #[test]
    fn transport_failure_surfaces_as_retrieval_failure() {
        let retriever = Retriever::new(Unreachable);
        let err = resolve_annotations(&gene("TEST5"), &auto(), |g| retriever.retrieve(g)).unwrap_err();
        assert!(err.to_string().contains("Could not retrieve protein length for TEST5"));
    }

    #[test]
    fn disabled_retrieval_has_its_own_message() {
        let calls = Cell::new(0);
        let err = resolve_annotations(&gene("TEST5"), &AnnotationRequest::default(), |_| {
            calls.set(calls.get() + 1);
            RetrievalResult::empty()
        })
        .unwrap_err();
        assert!(matches!(err, AnnotationError::LengthMissing { .. }));
        assert!(err.to_string().contains("auto-retrieval is disabled"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn empty_annotations_are_not_an_error() {
        let annotations = resolve_annotations(&gene("TEST2"), &auto(), |_| RetrievalResult {
            protein_length: Some(500),
            ..RetrievalResult::empty()
        })
        .unwrap();
        assert_eq!(annotations.protein_length, 500);
        assert!(annotations.domains.is_empty());
        assert!(annotations.ptms.is_empty());
    }

    #[test]
    fn manual_length_wins_over_retrieval() {
        let request = AnnotationRequest {
            protein_length: Some(393),
            ..auto()
        };
        let annotations = resolve_annotations(&gene("TEST1"), &request, |g| retrieved(g.as_str())).unwrap();
        assert_eq!(annotations.protein_length, 393);
        assert_eq!(annotations.domains.len(), 1);
    }

    #[test]
    fn fully_manual_input_skips_retrieval() {
        let dir = tempdir().unwrap();
        let domains = dir.path().join("domains.tsv");
        let ptms = dir.path().join("ptms.tsv");
        fs::write(&domains, "gene\tdomain_name\tstart\tend\nTEST1\tTAD\t1\t60\nTEST1\tTail\t90\t140\n").unwrap();
        fs::write(&ptms, "gene\tptm_type\tposition\tdescription\nTEST1\tAcetylation\t120\tN6-acetyllysine\n").unwrap();

        let request = AnnotationRequest {
            protein_length: Some(100),
            domains_path: Some(&domains),
            ptms_path: Some(&ptms),
            auto_retrieve: true,
        };
        let annotations = resolve_annotations(&gene("TEST1"), &request, |_| {
            panic!("retrieval must not run when everything is supplied")
        })
        .unwrap();

        assert_eq!(annotations.domains.len(), 2);
        assert_eq!(annotations.domains[1].end, 100);
        assert!(annotations.ptms.is_empty());
    }
}
