// src/lib.rs

//! Protein annotations for lollipop plots, fetched from UniProt.
//!
//! [`retrieval::Retriever`] resolves a gene symbol to its reviewed UniProtKB
//! entry, pulls domain and PTM tables out of the entry's feature list and
//! caches the result per gene. It degrades instead of failing: the only thing
//! a caller has to check is whether `protein_length` came back.

pub mod api_handler;
pub mod cache;
pub mod error;
pub mod feature_extractor;
pub mod models;
pub mod protein_domains;
pub mod ptm_sites;
pub mod retrieval;

pub use api_handler::{APIHandler, ProteinSource};
pub use cache::{JsonFileCache, MemoryCache, RetrievalCache};
pub use models::{DomainRecord, GeneSymbol, ProteinAccession, ProteinRecord, PtmRecord, PtmType, RetrievalResult};
pub use protein_domains::extract_domains;
pub use ptm_sites::extract_ptms;
pub use retrieval::{retrieve, Retriever};
