use polars::prelude::*;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use crate::helper_functions::read_csv;
use crate::models::{Dataset, Impact, VariantRecord};

pub const VARIANT_COLUMNS: [&str; 11] = [
    "Family_ID",
    "CHROM",
    "POS",
    "REF",
    "ALT",
    "gene_symbol",
    "max_allele_frequency",
    "impact",
    "consequence",
    "sample",
    "genotype",
];

/// Columns without which no lollipop can be placed.
const REQUIRED_COLUMNS: [&str; 2] = ["gene_symbol", "POS"];

pub struct VariantTable {
    pub path: PathBuf,
}

impl Dataset for VariantTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading variants from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read variant table {}: {}", self.path.display(), e);
                return Err(e);
            }
        };

        for required in REQUIRED_COLUMNS {
            if !has_column(&df, required) {
                return Err(PolarsError::ColumnNotFound(
                    format!("variant table {} has no '{}' column", self.path.display(), required).into(),
                ));
            }
        }
        let missing: Vec<&str> = VARIANT_COLUMNS
            .iter()
            .copied()
            .filter(|c| !has_column(&df, c))
            .collect();
        if !missing.is_empty() {
            debug!("Variant table lacks optional columns {:?}", missing);
        }

        Ok(df)
    }
}

impl VariantTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Rows of the table whose `gene_symbol` is exactly `gene`.
    pub fn load_gene(&self, gene: &str) -> PolarsResult<Vec<VariantRecord>> {
        variants_for_gene(&self.load()?, gene)
    }
}

/// Rows of an already loaded table for one gene. Batch runs load the file
/// once and call this per gene.
pub fn variants_for_gene(df: &DataFrame, gene: &str) -> PolarsResult<Vec<VariantRecord>> {
    let rows = df
        .clone()
        .lazy()
        .filter(col("gene_symbol").cast(DataType::String).eq(lit(gene)))
        .collect()?;
    info!("{} variant row(s) for {}", rows.height(), gene);
    records_from_frame(&rows)
}

/// Distinct gene symbols in table order of first appearance.
pub fn genes_in(df: &DataFrame) -> PolarsResult<Vec<String>> {
    let mut genes: Vec<String> = Vec::new();
    for gene in str_values(df, "gene_symbol")?.into_iter().flatten() {
        if !genes.contains(&gene) {
            genes.push(gene);
        }
    }
    Ok(genes)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Trimmed string values; empty cells and "." read as missing. A missing
/// column reads as all-missing.
fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::String)?;
    let values = column
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty() && *s != ".")
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::Int64)?;
    let values = column.i64()?.into_iter().collect();
    Ok(values)
}

fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::Float64)?;
    let values = column.f64()?.into_iter().collect();
    Ok(values)
}

pub fn records_from_frame(df: &DataFrame) -> PolarsResult<Vec<VariantRecord>> {
    let family_id = str_values(df, "Family_ID")?;
    let chrom = str_values(df, "CHROM")?;
    let pos = i64_values(df, "POS")?;
    let reference = str_values(df, "REF")?;
    let alt = str_values(df, "ALT")?;
    let gene_symbol = str_values(df, "gene_symbol")?;
    let max_af = f64_values(df, "max_allele_frequency")?;
    let impact = str_values(df, "impact")?;
    let consequence = str_values(df, "consequence")?;
    let sample = str_values(df, "sample")?;
    let genotype = str_values(df, "genotype")?;

    let mut records = Vec::with_capacity(df.height());
    let mut without_position = 0usize;
    for i in 0..df.height() {
        let Some(gene) = gene_symbol[i].clone() else {
            continue;
        };

        let change = consequence[i].as_deref().and_then(protein_change);
        let protein_position = change
            .as_ref()
            .map(|(_, position)| *position)
            .or_else(|| pos[i].and_then(|p| u32::try_from(p).ok()).filter(|p| *p >= 1));
        if protein_position.is_none() {
            without_position += 1;
        }

        records.push(VariantRecord {
            family_id: family_id[i].clone(),
            chrom: chrom[i].clone(),
            pos: pos[i],
            reference: reference[i].clone(),
            alt: alt[i].clone(),
            gene_symbol: gene,
            max_allele_frequency: max_af[i],
            impact: impact[i].as_deref().map(Impact::parse).unwrap_or(Impact::Unknown),
            consequence: consequence[i].clone(),
            sample: sample[i].clone(),
            genotype: genotype[i].clone(),
            protein_position,
            protein_change: change.map(|(label, _)| label),
        });
    }

    if without_position > 0 {
        warn!("{} variant row(s) have no usable amino-acid position", without_position);
    }
    Ok(records)
}

fn hgvs_protein() -> &'static Regex {
    static HGVS_P: OnceLock<Regex> = OnceLock::new();
    HGVS_P.get_or_init(|| {
        Regex::new(r"p\.\(?(?P<change>(?:[A-Z][a-z]{2}|[A-Z*])(?P<pos>\d+)[A-Za-z*=]*)")
            .expect("static regex")
    })
}

/// HGVS protein change inside a consequence string, with its residue number:
/// `"missense_variant p.Arg175His"` -> `("p.Arg175His", 175)`.
pub fn protein_change(consequence: &str) -> Option<(String, u32)> {
    let caps = hgvs_protein().captures(consequence)?;
    let position = caps["pos"].parse::<u32>().ok().filter(|p| *p >= 1)?;
    Some((format!("p.{}", &caps["change"]), position))
}
