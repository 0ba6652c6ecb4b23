// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the protein annotation service.
///
/// These never reach callers of [`crate::retrieval::Retriever::retrieve`]; the
/// metadata client logs them and degrades to "no data".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("exceeded {attempts} rate-limited attempts for {url}")]
    RateLimited { url: String, attempts: u32 },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize cache entry for {gene}: {source}")]
    Serialize {
        gene: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An extractor refused the record it was handed.
#[derive(Debug, Error)]
#[error("{category} extraction failed: {reason}")]
pub struct ExtractionError {
    pub category: &'static str,
    pub reason: String,
}

impl ExtractionError {
    pub fn new(category: &'static str, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}
