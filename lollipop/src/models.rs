use polars::error::PolarsResult;
use polars::frame::DataFrame;
use std::fmt;

pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// VEP-style impact class, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Impact {
    Unknown,
    Modifier,
    Low,
    Moderate,
    High,
}

impl Impact {
    pub fn parse(raw: &str) -> Impact {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Impact::High,
            "MODERATE" => Impact::Moderate,
            "LOW" => Impact::Low,
            "MODIFIER" => Impact::Modifier,
            _ => Impact::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Impact::High => "HIGH",
            Impact::Moderate => "MODERATE",
            Impact::Low => "LOW",
            Impact::Modifier => "MODIFIER",
            Impact::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the variant table.
///
/// `protein_position` is the amino-acid coordinate the lollipop is drawn at;
/// see `data_handling::variants` for how it is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub family_id: Option<String>,
    pub chrom: Option<String>,
    pub pos: Option<i64>,
    pub reference: Option<String>,
    pub alt: Option<String>,
    pub gene_symbol: String,
    pub max_allele_frequency: Option<f64>,
    pub impact: Impact,
    pub consequence: Option<String>,
    pub sample: Option<String>,
    pub genotype: Option<String>,
    pub protein_position: Option<u32>,
    pub protein_change: Option<String>,
}
