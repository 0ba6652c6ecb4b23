use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use protein_retriever::{APIHandler, GeneSymbol, JsonFileCache, RetrievalCache, Retriever};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::annotation_source::{resolve_annotations, AnnotationError, AnnotationRequest};
use crate::config::LollipopConfig;
use crate::data_handling::annotations::{write_domains, write_ptms};
use crate::data_handling::variants::{genes_in, variants_for_gene, VariantTable};
use crate::helper_functions::file_stem_for;
use crate::models::{Dataset, VariantRecord};
use crate::plot::{aggregate_variants, assemble_scene, render, ImageFormat};

mod annotation_source;
mod config;
mod data_handling;
mod helper_functions;
mod models;
mod plot;

#[derive(Parser, Debug)]
#[command(author, version, about = "Lollipop plots of variants over UniProt protein annotations", long_about = None)]
struct Cli {
    /// JSON config file; defaults to $PROJECT_ROOT/lollipop.json when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plot the variants of one gene
    Plot(PlotArgs),
    /// Plot every gene in a variant table
    Batch(BatchArgs),
    /// Download domain and PTM tables for a gene
    Fetch(FetchArgs),
    /// Manage the retrieval cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
struct RetrievalArgs {
    /// Directory for cached UniProt results
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    organism: Option<String>,

    /// Never contact UniProt; everything must be supplied by hand
    #[arg(long)]
    no_auto_retrieve: bool,
}

#[derive(Args, Debug)]
struct PlotArgs {
    #[arg(long)]
    variants: PathBuf,

    #[arg(short, long)]
    gene: String,

    /// .png or .svg
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    protein_length: Option<u32>,

    /// Domain table (gene, domain_name, start, end)
    #[arg(long)]
    domains: Option<PathBuf>,

    /// PTM table (gene, ptm_type, position, description)
    #[arg(long)]
    ptms: Option<PathBuf>,

    #[command(flatten)]
    retrieval: RetrievalArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(long)]
    variants: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,

    #[command(flatten)]
    retrieval: RetrievalArgs,
}

#[derive(Args, Debug)]
struct FetchArgs {
    #[arg(short, long)]
    gene: String,

    #[arg(long)]
    out_domains: PathBuf,

    #[arg(long)]
    out_ptms: PathBuf,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    organism: Option<String>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Delete cached entries, all of them or one gene's
    Clear {
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        #[arg(short, long)]
        gene: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Png,
    Svg,
}

impl From<OutputFormat> for ImageFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Svg => ImageFormat::Svg,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = LollipopConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Plot(args) => run_plot(&config, args),
        Commands::Batch(args) => run_batch(&config, args),
        Commands::Fetch(args) => run_fetch(&config, args),
        Commands::Cache { action: CacheAction::Clear { cache_dir, gene } } => {
            run_cache_clear(&config, cache_dir.as_deref(), gene.as_deref())
        }
    }
}

fn parse_gene(raw: &str) -> Result<GeneSymbol> {
    GeneSymbol::new(raw).ok_or_else(|| anyhow!("Gene symbol must not be blank"))
}

/// UniProt client from the config, with `--cache-dir`/`--organism` taking
/// precedence over their config counterparts.
fn build_retriever(
    config: &LollipopConfig,
    cache_dir: Option<&Path>,
    organism: Option<&str>,
) -> Result<Retriever<APIHandler>> {
    let handler = APIHandler::with_options(
        &config.uniprot_base_url,
        config.timeout_secs.map(Duration::from_secs),
        config.max_rate_limit_attempts,
    )?;
    let retriever = Retriever::new(handler).with_organism(organism.unwrap_or(&config.organism));

    Ok(match cache_dir.or(config.cache_dir.as_deref()) {
        Some(dir) => {
            info!("Caching UniProt results in {}", dir.display());
            retriever.with_cache(JsonFileCache::new(dir))
        }
        None => retriever,
    })
}

fn plot_gene(
    config: &LollipopConfig,
    variants: &[VariantRecord],
    gene: &GeneSymbol,
    request: &AnnotationRequest<'_>,
    retriever: &Retriever<APIHandler>,
    output: &Path,
) -> Result<()> {
    if variants.is_empty() {
        warn!("No variants for {}", gene);
    }

    let annotations = resolve_annotations(gene, request, |g| retriever.retrieve(g))?;
    let (lollipops, skipped) = aggregate_variants(variants, annotations.protein_length);
    if skipped > 0 {
        warn!(
            "{} variant(s) of {} have no position within 1..={} and are not drawn",
            skipped, gene, annotations.protein_length
        );
    }

    let scene = assemble_scene(&annotations, &lollipops, &config.plot);
    render(&scene, output)
}

fn run_plot(config: &LollipopConfig, args: PlotArgs) -> Result<()> {
    let gene = parse_gene(&args.gene)?;
    // fail on a bad extension before any network traffic
    ImageFormat::from_path(&args.output)?;

    let retriever = build_retriever(
        config,
        args.retrieval.cache_dir.as_deref(),
        args.retrieval.organism.as_deref(),
    )?;
    let request = AnnotationRequest {
        protein_length: args.protein_length,
        domains_path: args.domains.as_deref(),
        ptms_path: args.ptms.as_deref(),
        auto_retrieve: config.auto_retrieve && !args.retrieval.no_auto_retrieve,
    };

    let variants = VariantTable::new(&args.variants).load_gene(gene.as_str())?;
    plot_gene(
        config,
        &variants,
        &gene,
        &request,
        &retriever,
        &args.output,
    )
}

fn run_batch(config: &LollipopConfig, args: BatchArgs) -> Result<()> {
    let frame = VariantTable::new(&args.variants).load()?;
    let genes = genes_in(&frame)?;
    if genes.is_empty() {
        bail!("No gene symbols found in {}", args.variants.display());
    }

    let retriever = build_retriever(
        config,
        args.retrieval.cache_dir.as_deref(),
        args.retrieval.organism.as_deref(),
    )?;
    let request = AnnotationRequest {
        auto_retrieve: config.auto_retrieve && !args.retrieval.no_auto_retrieve,
        ..AnnotationRequest::default()
    };
    let extension = ImageFormat::from(args.format).extension();

    let mut failed = Vec::new();
    for raw in &genes {
        let Some(gene) = GeneSymbol::new(raw) else {
            continue;
        };
        let output = args
            .output_dir
            .join(format!("{}_lollipop.{}", file_stem_for(gene.as_str()), extension));
        let plotted = variants_for_gene(&frame, gene.as_str())
            .map_err(anyhow::Error::from)
            .and_then(|variants| plot_gene(config, &variants, &gene, &request, &retriever, &output));
        if let Err(e) = plotted {
            error!("Skipping {}: {}", gene, e);
            failed.push(gene.to_string());
        }
    }

    info!("Plotted {} of {} gene(s)", genes.len() - failed.len(), genes.len());
    if failed.len() == genes.len() {
        bail!("No plot could be produced; failed genes: {}", failed.join(", "));
    }
    if !failed.is_empty() {
        warn!("Failed genes: {}", failed.join(", "));
    }
    Ok(())
}

fn run_fetch(config: &LollipopConfig, args: FetchArgs) -> Result<()> {
    let gene = parse_gene(&args.gene)?;
    let retriever = build_retriever(config, args.cache_dir.as_deref(), args.organism.as_deref())?;

    let result = retriever.retrieve(&gene);
    let Some(length) = result.protein_length else {
        return Err(AnnotationError::RetrievalFailed { gene }.into());
    };

    write_domains(&args.out_domains, &result.domains)?;
    write_ptms(&args.out_ptms, &result.ptms)?;
    info!(
        "{} ({} aa): wrote {} domain(s) to {} and {} PTM site(s) to {}",
        gene,
        length,
        result.domains.len(),
        args.out_domains.display(),
        result.ptms.len(),
        args.out_ptms.display()
    );
    Ok(())
}

fn run_cache_clear(config: &LollipopConfig, cache_dir: Option<&Path>, gene: Option<&str>) -> Result<()> {
    let Some(dir) = cache_dir.or(config.cache_dir.as_deref()) else {
        bail!("No cache directory given; pass --cache-dir or set cache_dir in the config");
    };
    let cache = JsonFileCache::new(dir);

    match gene {
        Some(raw) => {
            let gene = parse_gene(raw)?;
            if cache.remove(&gene)? {
                info!("Removed cached entry for {} from {}", gene, cache.root().display());
            } else {
                info!("No cached entry for {} in {}", gene, cache.root().display());
            }
        }
        None => {
            let removed = cache.clear()?;
            info!("Removed {} cached entr(ies) from {}", removed, cache.root().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plot_arguments_parse() {
        let cli = Cli::try_parse_from([
            "lollipop",
            "plot",
            "--variants",
            "variants.tsv",
            "--gene",
            "TP53",
            "--output",
            "TP53.svg",
            "--protein-length",
            "393",
            "--no-auto-retrieve",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Plot(args) = cli.command else {
            panic!("expected the plot subcommand");
        };
        assert_eq!(args.gene, "TP53");
        assert_eq!(args.protein_length, Some(393));
        assert!(args.retrieval.no_auto_retrieve);
        assert!(args.domains.is_none());
    }

    #[test]
    fn batch_format_defaults_to_png() {
        let cli = Cli::try_parse_from(["lollipop", "batch", "--variants", "v.tsv", "--output-dir", "plots"]).unwrap();
        let Commands::Batch(args) = cli.command else {
            panic!("expected the batch subcommand");
        };
        assert_eq!(args.format, OutputFormat::Png);
    }

    #[test]
    fn fetch_requires_both_outputs() {
        assert!(Cli::try_parse_from(["lollipop", "fetch", "--gene", "TP53", "--out-domains", "d.tsv"]).is_err());
    }

    #[test]
    fn cache_clear_needs_a_directory() {
        let config = LollipopConfig::default();
        assert!(run_cache_clear(&config, None, None).is_err());
    }

    #[test]
    fn cache_clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("TP53_protein_data.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        run_cache_clear(&LollipopConfig::default(), Some(dir.path()), None).unwrap();
        assert!(!dir.path().join("TP53_protein_data.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
