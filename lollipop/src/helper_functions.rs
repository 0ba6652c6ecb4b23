use std::path::{Path, PathBuf};
use polars::error::PolarsResult;
use polars::frame::DataFrame;
use polars::prelude::{CsvReadOptions, SerReader};

use std::env;
pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// `.csv` files are comma separated, everything else (`.tsv`, `.txt`, ...) is
/// read as tab separated.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    let separator = delimiter_for(file_path);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .map_parse_options(|opts| opts.with_separator(separator))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

/// File-system friendly version of a gene symbol for output names.
pub fn file_stem_for(gene: &str) -> String {
    gene.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(delimiter_for(Path::new("variants.csv")), b',');
        assert_eq!(delimiter_for(Path::new("variants.CSV")), b',');
        assert_eq!(delimiter_for(Path::new("variants.tsv")), b'\t');
        assert_eq!(delimiter_for(Path::new("variants")), b'\t');
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem_for("HLA/DRB1"), "HLA_DRB1");
        assert_eq!(file_stem_for("TP53"), "TP53");
    }
}
