// src/api_handler.rs

use crate::error::ApiError;
use crate::models::{GeneSymbol, ProteinAccession, ProteinRecord};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const UNIPROT_REST_URL: &str = "https://rest.uniprot.org";
pub const DEFAULT_ORGANISM: &str = "human";

/// The two calls the metadata client needs from the annotation service.
///
/// `APIHandler` talks to UniProt over HTTP; tests substitute an in-memory
/// source so that no test touches the network.
pub trait ProteinSource {
    /// Run a UniProtKB search and return the raw JSON body.
    fn search(&self, query: &str) -> Result<Value, ApiError>;

    /// Fetch the full UniProtKB entry for one accession.
    fn entry(&self, accession: &ProteinAccession) -> Result<Value, ApiError>;
}

impl<S: ProteinSource + ?Sized> ProteinSource for &S {
    fn search(&self, query: &str) -> Result<Value, ApiError> {
        (**self).search(query)
    }

    fn entry(&self, accession: &ProteinAccession) -> Result<Value, ApiError> {
        (**self).entry(accession)
    }
}

pub struct APIHandler {
    client: Client,
    base_url: String,
    max_attempts: u32,
}

impl APIHandler {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_options(base_url, None, 3)
    }

    /// `timeout` of `None` keeps reqwest's default.
    pub fn with_options(
        base_url: &str,
        timeout: Option<Duration>,
        max_attempts: u32,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("protein_retriever/", env!("CARGO_PKG_VERSION"))),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, query);
        self.make_request_with_retry(&url, query)
    }

    /// Only HTTP 429 is retried, honouring `Retry-After`. Anything else is
    /// reported straight back to the caller.
    fn make_request_with_retry(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut attempts = 0;

        loop {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .map_err(|source| ApiError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().map_err(|source| ApiError::Transport {
                    url: url.to_string(),
                    source,
                })?;
                return serde_json::from_str(&body).map_err(|e| ApiError::Malformed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                if attempts >= self.max_attempts {
                    return Err(ApiError::RateLimited {
                        url: url.to_string(),
                        attempts,
                    });
                }

                let wait_time = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(1);
                warn!("Rate limited by {}. Waiting {} seconds before retrying...", url, wait_time);
                thread::sleep(Duration::from_secs(wait_time));
            } else {
                let body = response.text().unwrap_or_default();
                return Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }
        }
    }
}

impl ProteinSource for APIHandler {
    fn search(&self, query: &str) -> Result<Value, ApiError> {
        self.get(
            "/uniprotkb/search",
            &[
                ("query", query),
                ("fields", "accession,gene_names,length"),
                ("format", "json"),
                ("size", "1"),
            ],
        )
    }

    fn entry(&self, accession: &ProteinAccession) -> Result<Value, ApiError> {
        self.get(&format!("/uniprotkb/{}.json", accession.0), &[])
    }
}

/// Reviewed-only, exact-gene query. Human is pinned to its taxonomy id so the
/// top hit is never an ortholog that happens to share the symbol.
pub fn build_search_query(gene: &GeneSymbol, organism: &str) -> String {
    let organism_clause = match organism.trim().to_lowercase().as_str() {
        "human" | "homo sapiens" | "9606" => "organism_id:9606".to_string(),
        other => format!("organism_name:\"{}\"", other),
    };
    format!(
        "(gene_exact:{}) AND ({}) AND (reviewed:true)",
        gene.as_str(),
        organism_clause
    )
}

pub fn parse_search_response(body: &Value) -> Option<ProteinAccession> {
    body.get("results")?
        .as_array()?
        .first()?
        .get("primaryAccession")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| ProteinAccession(s.to_string()))
}

/// Pull length, gene name and the untouched feature list out of an entry.
/// `None` when the entry has no usable sequence length.
pub fn parse_protein_record(accession: &ProteinAccession, body: &Value) -> Option<ProteinRecord> {
    let sequence = body.get("sequence");
    let sequence_length = sequence
        .and_then(|s| s.get("length"))
        .and_then(Value::as_u64)
        .or_else(|| {
            sequence
                .and_then(|s| s.get("value"))
                .and_then(Value::as_str)
                .map(|residues| residues.len() as u64)
        })
        .and_then(|length| u32::try_from(length).ok())
        .filter(|length| *length >= 1)?;

    let gene_name = body
        .get("genes")
        .and_then(|genes| genes.get(0))
        .and_then(|gene| gene.get("geneName"))
        .and_then(|name| name.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(ProteinRecord {
        accession: accession.clone(),
        gene_name,
        sequence_length,
        features: body.get("features").cloned().unwrap_or(Value::Null),
    })
}

/// Top-ranked reviewed accession for `gene`, or `None`.
///
/// No-match and every failure mode both come back as `None`; failures are
/// logged here and go no further.
pub fn resolve_accession<S: ProteinSource + ?Sized>(
    source: &S,
    gene: &GeneSymbol,
    organism: &str,
) -> Option<ProteinAccession> {
    let query = build_search_query(gene, organism);
    match source.search(&query) {
        Ok(body) => {
            let accession = parse_search_response(&body);
            match &accession {
                Some(accession) => info!("Resolved {} to UniProt accession {}", gene, accession),
                None => warn!("No reviewed UniProt entry found for {} ({})", gene, organism),
            }
            accession
        }
        Err(e) => {
            warn!("Accession lookup for {} failed: {}", gene, e);
            None
        }
    }
}

pub fn fetch_protein_record<S: ProteinSource + ?Sized>(
    source: &S,
    accession: &ProteinAccession,
) -> Option<ProteinRecord> {
    match source.entry(accession) {
        Ok(body) => {
            let record = parse_protein_record(accession, &body);
            if record.is_none() {
                warn!("UniProt entry {} has no usable sequence length", accession);
            }
            record
        }
        Err(e) => {
            warn!("Fetching UniProt entry {} failed: {}", accession, e);
            None
        }
    }
}
