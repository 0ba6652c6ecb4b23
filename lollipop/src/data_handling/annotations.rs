//! Domain and PTM tables on disk.
//!
//! Columns are fixed: domains `gene, domain_name, start, end`; PTMs
//! `gene, ptm_type, position, description`. The same shape is written by
//! `lollipop fetch` and read back by `lollipop plot --domains/--ptms`.

use anyhow::{Context, Result};
use protein_retriever::{DomainRecord, GeneSymbol, PtmRecord, PtmType};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use crate::helper_functions::delimiter_for;

#[derive(Debug, Deserialize)]
struct DomainRow {
    gene: String,
    domain_name: Option<String>,
    start: Option<u32>,
    end: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PtmRow {
    gene: String,
    ptm_type: Option<String>,
    position: Option<u32>,
    description: Option<String>,
}

/// Exact label match first ("Phosphorylation", any case), otherwise the same
/// keyword heuristic used for UniProt descriptions.
pub fn parse_ptm_type(label: &str) -> PtmType {
    PtmType::ALL
        .iter()
        .copied()
        .find(|t| t.as_str().eq_ignore_ascii_case(label.trim()))
        .unwrap_or_else(|| PtmType::categorize(label))
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for (line, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => {
                malformed += 1;
                warn!("Skipping row {} of {}: {}", line + 2, path.display(), e);
            }
        }
    }
    if malformed > 0 {
        warn!("Skipped {} malformed row(s) in {}", malformed, path.display());
    }
    Ok(rows)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    // serde writes the header from the first row, so an empty table needs it
    // spelled out
    if rows.is_empty() {
        writer.write_record(header)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Domains for `gene` from a delimited file. Rows for other genes and rows
/// without both coordinates are skipped.
pub fn read_domains(path: &Path, gene: &GeneSymbol) -> Result<Vec<DomainRecord>> {
    let rows: Vec<DomainRow> = read_rows(path)?;
    let domains: Vec<DomainRecord> = rows
        .into_iter()
        .filter(|row| row.gene == gene.as_str())
        .filter_map(|row| {
            let (start, end) = row.start.zip(row.end).filter(|(s, e)| *s >= 1 && e >= s)?;
            Some(DomainRecord {
                gene: gene.clone(),
                domain_name: row.domain_name.unwrap_or_else(|| "Domain".to_string()),
                start,
                end,
            })
        })
        .collect();
    info!("Loaded {} domain(s) for {} from {}", domains.len(), gene, path.display());
    Ok(domains)
}

pub fn read_ptms(path: &Path, gene: &GeneSymbol) -> Result<Vec<PtmRecord>> {
    let rows: Vec<PtmRow> = read_rows(path)?;
    let ptms: Vec<PtmRecord> = rows
        .into_iter()
        .filter(|row| row.gene == gene.as_str())
        .filter_map(|row| {
            let position = row.position.filter(|p| *p >= 1)?;
            let description = row.description.unwrap_or_default();
            let ptm_type = match row.ptm_type.as_deref() {
                Some(label) if !label.is_empty() => parse_ptm_type(label),
                _ => PtmType::categorize(&description),
            };
            Some(PtmRecord {
                gene: gene.clone(),
                ptm_type,
                position,
                description,
            })
        })
        .collect();
    info!("Loaded {} PTM site(s) for {} from {}", ptms.len(), gene, path.display());
    Ok(ptms)
}

pub fn write_domains(path: &Path, domains: &[DomainRecord]) -> Result<()> {
    write_rows(path, domains, &["gene", "domain_name", "start", "end"])
}

pub fn write_ptms(path: &Path, ptms: &[PtmRecord]) -> Result<()> {
    write_rows(path, ptms, &["gene", "ptm_type", "position", "description"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn gene(symbol: &str) -> GeneSymbol {
        GeneSymbol::new(symbol).unwrap()
    }

    #[test]
    fn written_tables_read_back() {
        let dir = tempdir().unwrap();
        let domains_path = dir.path().join("TP53_domains.tsv");
        let ptms_path = dir.path().join("TP53_ptms.tsv");
        let domains = vec![DomainRecord {
            gene: gene("TP53"),
            domain_name: "p53 DNA-binding".into(),
            start: 94,
            end: 292,
        }];
        let ptms = vec![PtmRecord {
            gene: gene("TP53"),
            ptm_type: PtmType::Phosphorylation,
            position: 15,
            description: "Phosphoserine; by ATM".into(),
        }];

        write_domains(&domains_path, &domains).unwrap();
        write_ptms(&ptms_path, &ptms).unwrap();

        let header = fs::read_to_string(&ptms_path).unwrap();
        assert!(header.starts_with("gene\tptm_type\tposition\tdescription"));
        assert_eq!(read_domains(&domains_path, &gene("TP53")).unwrap(), domains);
        assert_eq!(read_ptms(&ptms_path, &gene("TP53")).unwrap(), ptms);
    }

    #[test]
    fn empty_tables_keep_their_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_domains(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "gene,domain_name,start,end");
        assert!(read_domains(&path, &gene("TP53")).unwrap().is_empty());
    }

    #[test]
    fn reading_filters_gene_and_skips_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("domains.csv");
        fs::write(
            &path,
            "gene,domain_name,start,end\n\
             TP53,TAD,1,61\n\
             TP53,Broken,,40\n\
             TP53,Typo,ten,40\n\
             MDM2,SWIB,26,109\n",
        )
        .unwrap();
        let domains = read_domains(&path, &gene("TP53")).unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].domain_name, "TAD");
    }

    #[test]
    fn ptm_type_labels_are_lenient() {
        assert_eq!(parse_ptm_type("phosphorylation"), PtmType::Phosphorylation);
        assert_eq!(parse_ptm_type("Other"), PtmType::Other);
        assert_eq!(parse_ptm_type("N6-acetyllysine"), PtmType::Acetylation);
        assert_eq!(parse_ptm_type("sumoylation"), PtmType::Other);
    }
}
