// src/retrieval.rs

use crate::api_handler::{
    fetch_protein_record, resolve_accession, APIHandler, ProteinSource, DEFAULT_ORGANISM, UNIPROT_REST_URL,
};
use crate::cache::{JsonFileCache, RetrievalCache};
use crate::feature_extractor::FeatureExtractor;
use crate::models::{DomainRecord, GeneSymbol, ProteinRecord, PtmRecord, RetrievalResult};
use crate::protein_domains::DomainExtractor;
use crate::ptm_sites::PtmExtractor;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info, warn};

/// Run one extractor so that nothing it does can escape: an `Err` or a panic
/// becomes an empty table and an error log naming the category.
pub fn isolated_extract<E: FeatureExtractor>(
    extractor: &E,
    record: &ProteinRecord,
    gene: &GeneSymbol,
) -> Vec<E::Row> {
    match catch_unwind(AssertUnwindSafe(|| extractor.extract(record, gene))) {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            error!("{} for {}; continuing without {} annotations", e, gene, extractor.category());
            Vec::new()
        }
        Err(payload) => {
            error!(
                "{} extraction panicked for {}: {}; continuing without {} annotations",
                extractor.category(),
                gene,
                panic_message(payload.as_ref()),
                extractor.category()
            );
            Vec::new()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Best-effort protein annotation lookup for one gene at a time.
///
/// `retrieve` never fails. The protein length comes from the fetched record
/// alone, so a broken domain or PTM extraction cannot take it down; the two
/// extractors are isolated from each other as well.
pub struct Retriever<S, D = DomainExtractor, P = PtmExtractor> {
    source: S,
    cache: Option<Box<dyn RetrievalCache>>,
    organism: String,
    domain_extractor: D,
    ptm_extractor: P,
}

impl<S: ProteinSource> Retriever<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
            organism: DEFAULT_ORGANISM.to_string(),
            domain_extractor: DomainExtractor,
            ptm_extractor: PtmExtractor,
        }
    }
}

impl<S, D, P> Retriever<S, D, P>
where
    S: ProteinSource,
    D: FeatureExtractor<Row = DomainRecord>,
    P: FeatureExtractor<Row = PtmRecord>,
{
    pub fn with_cache(mut self, cache: impl RetrievalCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = organism.into();
        self
    }

    pub fn with_extractors<D2, P2>(self, domain_extractor: D2, ptm_extractor: P2) -> Retriever<S, D2, P2>
    where
        D2: FeatureExtractor<Row = DomainRecord>,
        P2: FeatureExtractor<Row = PtmRecord>,
    {
        Retriever {
            source: self.source,
            cache: self.cache,
            organism: self.organism,
            domain_extractor,
            ptm_extractor,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn retrieve(&self, gene: &GeneSymbol) -> RetrievalResult {
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(gene)) {
            info!("Using cached protein data for {}", gene);
            return cached;
        }

        let Some(accession) = resolve_accession(&self.source, gene, &self.organism) else {
            warn!("Could not resolve {} to a UniProt accession; no annotations retrieved", gene);
            return RetrievalResult::empty();
        };

        let Some(record) = fetch_protein_record(&self.source, &accession) else {
            warn!("Could not fetch UniProt entry {} for {}; no annotations retrieved", accession, gene);
            return RetrievalResult::empty();
        };

        let protein_length = Some(record.sequence_length);
        let domains = isolated_extract(&self.domain_extractor, &record, gene);
        let ptms = isolated_extract(&self.ptm_extractor, &record, gene);

        info!(
            "Retrieved {} ({} aa): {} domain(s), {} PTM site(s)",
            gene,
            record.sequence_length,
            domains.len(),
            ptms.len()
        );

        let result = RetrievalResult {
            domains,
            ptms,
            protein_length,
        };

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(gene, &result) {
                warn!("Could not cache protein data for {}: {}", gene, e);
            }
        }
        result
    }
}

/// One-shot retrieval against the public UniProt service, optionally backed
/// by a JSON cache directory.
pub fn retrieve(gene: &GeneSymbol, cache_dir: Option<&Path>) -> RetrievalResult {
    if let Some(dir) = cache_dir {
        if let Some(cached) = JsonFileCache::new(dir).get(gene) {
            info!("Using cached protein data for {}", gene);
            return cached;
        }
    }

    let handler = match APIHandler::new(UNIPROT_REST_URL) {
        Ok(handler) => handler,
        Err(e) => {
            warn!("Could not set up UniProt client for {}: {}", gene, e);
            return RetrievalResult::empty();
        }
    };

    let retriever = Retriever::new(handler);
    match cache_dir {
        Some(dir) => retriever.with_cache(JsonFileCache::new(dir)).retrieve(gene),
        None => retriever.retrieve(gene),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::{ApiError, ExtractionError};
    use crate::models::{ProteinAccession, PtmType};
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// In-memory UniProt: gene symbol -> entry JSON. Counts every call.
    #[derive(Default)]
    struct FakeUniProt {
        entries: HashMap<String, Value>,
        offline: bool,
        requests: Cell<usize>,
    }

    impl FakeUniProt {
        fn with_entry(mut self, gene: &str, entry: Value) -> Self {
            self.entries.insert(gene.to_string(), entry);
            self
        }

        fn offline() -> Self {
            Self {
                offline: true,
                ..Self::default()
            }
        }

        fn transport_error(&self) -> ApiError {
            ApiError::Malformed {
                url: "https://rest.uniprot.org".into(),
                reason: "connection refused".into(),
            }
        }
    }

    impl ProteinSource for FakeUniProt {
        fn search(&self, query: &str) -> Result<Value, ApiError> {
            self.requests.set(self.requests.get() + 1);
            if self.offline {
                return Err(self.transport_error());
            }
            let hit = self
                .entries
                .keys()
                .find(|gene| query.contains(&format!("gene_exact:{})", gene)));
            let results: Vec<Value> = hit
                .map(|gene| json!({"primaryAccession": format!("ACC_{}", gene)}))
                .into_iter()
                .collect();
            Ok(json!({ "results": results }))
        }

        fn entry(&self, accession: &ProteinAccession) -> Result<Value, ApiError> {
            self.requests.set(self.requests.get() + 1);
            if self.offline {
                return Err(self.transport_error());
            }
            let gene = accession.0.trim_start_matches("ACC_");
            self.entries.get(gene).cloned().ok_or_else(|| ApiError::Status {
                url: accession.0.clone(),
                status: 404,
                body: String::new(),
            })
        }
    }

    struct PanickingDomains;

    impl FeatureExtractor for PanickingDomains {
        type Row = DomainRecord;

        fn category(&self) -> &'static str {
            "domain"
        }

        fn extract(&self, _: &ProteinRecord, _: &GeneSymbol) -> Result<Vec<DomainRecord>, ExtractionError> {
            panic!("index out of bounds in domain table");
        }
    }

    struct FailingPtms;

    impl FeatureExtractor for FailingPtms {
        type Row = PtmRecord;

        fn category(&self) -> &'static str {
            "PTM"
        }

        fn extract(&self, _: &ProteinRecord, _: &GeneSymbol) -> Result<Vec<PtmRecord>, ExtractionError> {
            Err(ExtractionError::new("PTM", "unexpected feature shape"))
        }
    }

    fn gene(symbol: &str) -> GeneSymbol {
        GeneSymbol::new(symbol).unwrap()
    }

    fn site(kind: &str, description: &str, start: u32, end: u32) -> Value {
        json!({
            "type": kind,
            "description": description,
            "location": {"start": {"value": start}, "end": {"value": end}}
        })
    }

    fn test1_entry() -> Value {
        json!({
            "primaryAccession": "ACC_TEST1",
            "genes": [{"geneName": {"value": "TEST1"}}],
            "sequence": {"length": 500},
            "features": [
                site("Domain", "Kinase", 10, 100),
                site("Domain", "SH2", 300, 400),
                site("Modified residue", "Phosphoserine", 150, 150),
                site("Modified residue", "N6-acetyllysine", 250, 250),
            ]
        })
    }

    #[test]
    fn full_record_yields_domains_ptms_and_length() {
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST1", test1_entry()));
        let result = retriever.retrieve(&gene("TEST1"));

        assert_eq!(result.protein_length, Some(500));
        let bounds: Vec<(u32, u32)> = result.domains.iter().map(|d| (d.start, d.end)).collect();
        assert_eq!(bounds, vec![(10, 100), (300, 400)]);
        let types: Vec<PtmType> = result.ptms.iter().map(|p| p.ptm_type).collect();
        assert_eq!(types, vec![PtmType::Phosphorylation, PtmType::Acetylation]);
        let positions: Vec<u32> = result.ptms.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![150, 250]);
    }

    #[test]
    fn unknown_gene_is_empty_not_an_error() {
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST1", test1_entry()));
        let result = retriever.retrieve(&gene("NOPE1"));
        assert_eq!(result, RetrievalResult::empty());
        assert_eq!(retriever.source().requests.get(), 1);
    }

    #[test]
    fn transport_failure_is_terminal_state() {
        let retriever = Retriever::new(FakeUniProt::offline());
        let result = retriever.retrieve(&gene("TEST5"));
        assert!(result.domains.is_empty());
        assert!(result.ptms.is_empty());
        assert_eq!(result.protein_length, None);
    }

    #[test]
    fn empty_feature_list_is_valid() {
        let entry = json!({"sequence": {"length": 500}, "features": []});
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST2", entry));
        let result = retriever.retrieve(&gene("TEST2"));
        assert_eq!(result.protein_length, Some(500));
        assert!(result.domains.is_empty());
        assert!(result.ptms.is_empty());
    }

    #[test]
    fn failing_domain_extractor_does_not_block_ptms_or_length() {
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST1", test1_entry()))
            .with_extractors(PanickingDomains, PtmExtractor);
        let result = retriever.retrieve(&gene("TEST1"));
        assert_eq!(result.protein_length, Some(500));
        assert!(result.domains.is_empty());
        assert_eq!(result.ptms.len(), 2);
    }

    #[test]
    fn failing_ptm_extractor_does_not_block_domains_or_length() {
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST1", test1_entry()))
            .with_extractors(DomainExtractor, FailingPtms);
        let result = retriever.retrieve(&gene("TEST1"));
        assert_eq!(result.protein_length, Some(500));
        assert_eq!(result.domains.len(), 2);
        assert!(result.ptms.is_empty());
    }

    #[test]
    fn malformed_feature_list_keeps_length() {
        let entry = json!({"sequence": {"length": 321}, "features": {"Domain": "not a list"}});
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST3", entry));
        let result = retriever.retrieve(&gene("TEST3"));
        assert_eq!(result.protein_length, Some(321));
        assert!(result.domains.is_empty() && result.ptms.is_empty());
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let dir = tempdir().unwrap();
        let retriever = Retriever::new(FakeUniProt::default().with_entry("TEST1", test1_entry()))
            .with_cache(JsonFileCache::new(dir.path()));

        let first = retriever.retrieve(&gene("TEST1"));
        let requests_after_first = retriever.source().requests.get();
        assert_eq!(requests_after_first, 2);

        let second = retriever.retrieve(&gene("TEST1"));
        assert_eq!(retriever.source().requests.get(), requests_after_first);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn cache_hit_skips_network_entirely() {
        let cache = MemoryCache::new();
        let cached = RetrievalResult {
            protein_length: Some(42),
            ..RetrievalResult::empty()
        };
        cache.put(&gene("TEST4"), &cached).unwrap();

        let retriever = Retriever::new(FakeUniProt::offline()).with_cache(cache);
        assert_eq!(retriever.retrieve(&gene("TEST4")), cached);
        assert_eq!(retriever.source().requests.get(), 0);
    }

    #[test]
    fn terminal_state_is_not_cached() {
        let dir = tempdir().unwrap();
        let retriever = Retriever::new(FakeUniProt::offline()).with_cache(JsonFileCache::new(dir.path()));
        retriever.retrieve(&gene("TEST5"));
        assert_eq!(JsonFileCache::new(dir.path()).get(&gene("TEST5")), None);
    }

    #[test]
    fn free_function_uses_existing_cache_entry() {
        let dir = tempdir().unwrap();
        let cached = RetrievalResult {
            protein_length: Some(393),
            ..RetrievalResult::empty()
        };
        JsonFileCache::new(dir.path()).put(&gene("TP53"), &cached).unwrap();
        assert_eq!(retrieve(&gene("TP53"), Some(dir.path())), cached);
    }
}
