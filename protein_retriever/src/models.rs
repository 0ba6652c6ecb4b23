// src/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HUGO gene symbol. Case-sensitive, only checked for being non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneSymbol(String);

impl GeneSymbol {
    pub fn new(symbol: impl Into<String>) -> Option<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            None
        } else {
            Some(Self(symbol))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GeneSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProteinAccession(pub String);

impl fmt::Display for ProteinAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One canonical UniProtKB entry, as far as the extractors care.
///
/// `features` is the verbatim `features` member of the entry. It is left
/// untyped because the extractors decide for themselves what shape they accept.
#[derive(Debug, Clone)]
pub struct ProteinRecord {
    pub accession: ProteinAccession,
    pub gene_name: Option<String>,
    pub sequence_length: u32,
    pub features: Value,
}

/// Null-safe view of a single entry of `ProteinRecord::features`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeature {
    pub feature_type: Option<String>,
    pub description: Option<String>,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl RawFeature {
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let location = value.get("location");
        let bound = |key: &str| {
            location
                .and_then(|loc| loc.get(key))
                .and_then(|b| b.get("value"))
                .and_then(residue_position)
        };

        RawFeature {
            feature_type: text("type"),
            description: text("description"),
            start: bound("start"),
            end: bound("end"),
        }
    }
}

/// Residue positions are 1-based. Integers and numeric strings are accepted,
/// everything else (null, zero, negatives, fractions) is treated as absent.
fn residue_position(value: &Value) -> Option<u32> {
    let position = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    u32::try_from(position).ok().filter(|p| *p >= 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub gene: GeneSymbol,
    pub domain_name: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PtmType {
    Phosphorylation,
    Acetylation,
    Methylation,
    Ubiquitination,
    Glycosylation,
    Other,
}

impl PtmType {
    pub const ALL: [PtmType; 6] = [
        PtmType::Phosphorylation,
        PtmType::Acetylation,
        PtmType::Methylation,
        PtmType::Ubiquitination,
        PtmType::Glycosylation,
        PtmType::Other,
    ];

    /// Keyword heuristic over free-text UniProt descriptions, first match wins.
    ///
    /// The descriptions are not a controlled vocabulary, so this is a best
    /// guess: e.g. "N-linked (GlcNAc...) asparagine" lands in `Other`.
    pub fn categorize(description: &str) -> PtmType {
        const KEYWORDS: [(&str, PtmType); 5] = [
            ("phospho", PtmType::Phosphorylation),
            ("acetyl", PtmType::Acetylation),
            ("methyl", PtmType::Methylation),
            ("ubiquitin", PtmType::Ubiquitination),
            ("glyc", PtmType::Glycosylation),
        ];

        let lowered = description.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, ptm_type)| *ptm_type)
            .unwrap_or(PtmType::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PtmType::Phosphorylation => "Phosphorylation",
            PtmType::Acetylation => "Acetylation",
            PtmType::Methylation => "Methylation",
            PtmType::Ubiquitination => "Ubiquitination",
            PtmType::Glycosylation => "Glycosylation",
            PtmType::Other => "Other",
        }
    }
}

impl fmt::Display for PtmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtmRecord {
    pub gene: GeneSymbol,
    pub ptm_type: PtmType,
    pub position: u32,
    pub description: String,
}

/// What one retrieval hands back, and what the cache stores.
///
/// Only a missing `protein_length` means the retrieval failed; empty tables
/// are a valid answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub domains: Vec<DomainRecord>,
    pub ptms: Vec<PtmRecord>,
    pub protein_length: Option<u32>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }
}
