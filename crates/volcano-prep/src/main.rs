//! CLI entry point for volcano preparation.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{error, info};
use volcano_prep::{
    EnrichmentBackend, RunConfig, RunPipeline, RunReport, SyntheticConfig, TableLoader,
    synthetic_results,
};

/// File name of the generated input in `--demo` mode.
const DEMO_INPUT_FILE: &str = "synthetic_input.csv";

/// CLI-compatible enrichment backend enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEnrichment {
    /// Skip pathway enrichment
    None,
    /// Enrichr gene-set enrichment API
    Enrichr,
    /// Reactome content search
    Reactome,
}

impl From<CliEnrichment> for EnrichmentBackend {
    fn from(cli: CliEnrichment) -> Self {
        match cli {
            CliEnrichment::None => EnrichmentBackend::None,
            CliEnrichment::Enrichr => EnrichmentBackend::Enrichr,
            CliEnrichment::Reactome => EnrichmentBackend::Reactome,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Differential expression cleaning and volcano plot preparation",
    long_about = "Cleans a DESeq2-style result table, labels genes by significance, \
                  selects the top genes and renders bar and volcano plots.\n\n\
                  EXAMPLES:\n  \
                  # Clean and plot with default thresholds\n  \
                  volcano-prep -i results_deseq2.xlsx\n\n  \
                  # Annotate genes with Reactome pathways\n  \
                  volcano-prep -i results.csv --enrich reactome -o results/\n\n  \
                  # Run on 200 synthetic genes\n  \
                  volcano-prep --demo 200"
)]
struct Args {
    /// Path to the .csv or .xlsx table to process
    #[arg(short, long, required_unless_present = "demo")]
    input: Option<PathBuf>,

    /// Output directory for tables, plots and the report
    ///
    /// Overrides `output_dir` from --config
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pathway enrichment backend
    #[arg(long, value_enum)]
    enrich: Option<CliEnrichment>,

    /// Keep only protein-coding genes (downloads the Ensembl gene list)
    #[arg(long)]
    protein_coding: bool,

    /// Skip plot rendering
    #[arg(long)]
    no_plots: bool,

    /// Generate a synthetic table with this many genes and run on it
    #[arg(long, value_name = "ROWS", conflicts_with = "input")]
    demo: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Print the run report as JSON to stdout instead of a summary
    ///
    /// Disables all logs so the output can be piped: `... --json | jq .label_counts`
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = build_config(&args)?;
    let input = resolve_input(&args, &config)?;

    let pipeline = RunPipeline::builder().config(config).build()?;
    let output = match pipeline.run(&input) {
        Ok(output) => output,
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            error!("Run failed [{}]: {}", e.error_code(), e);
            return Err(anyhow!("Run failed: {}", e));
        }
    };

    if args.json {
        println!("{}", output.report.to_json_pretty()?);
    } else {
        print_summary(&output.report, pipeline.config().volcano.n);
    }

    Ok(())
}

/// Load the JSON configuration, if any, and apply CLI overrides.
fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            RunConfig::from_json_file(path)?
        }
        None => RunConfig::default(),
    };

    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(backend) = args.enrich {
        config.enrichment.backend = backend.into();
    }
    if args.protein_coding {
        config.enrichment.protein_coding_only = true;
    }
    if args.no_plots {
        config.plot.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// The input path, writing a synthetic table first in `--demo` mode.
///
/// A given `--input` is not checked here; the run reports a missing file
/// as `SOURCE_NOT_FOUND`.
fn resolve_input(args: &Args, config: &RunConfig) -> Result<PathBuf> {
    if let Some(rows) = args.demo {
        std::fs::create_dir_all(&config.output_dir)?;
        let synthetic = SyntheticConfig {
            rows,
            missing: rows / 10,
            ..SyntheticConfig::default()
        };
        let mut df = synthetic_results(synthetic)?;
        let path = config.output_dir.join(DEMO_INPUT_FILE);
        TableLoader::write_csv(&mut df, &path)?;
        info!("Wrote {} synthetic genes to {}", rows, path.display());
        return Ok(path);
    }

    args.input
        .clone()
        .ok_or_else(|| anyhow!("Either --input or --demo is required"))
}

/// Print a human-readable summary of the run.
fn print_summary(report: &RunReport, n: i64) {
    println!();
    println!("{}", "=".repeat(80));
    println!("VOLCANO PREPARATION COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Input: {}", report.input_file);
    println!(
        "  Rows: {} loaded -> {} after cleaning -> {} processed",
        report.rows_loaded, report.rows_after_cleaning, report.rows_processed
    );
    println!("  Duration: {}ms", report.duration_ms);
    println!();

    println!("Significance:");
    for count in &report.label_counts {
        println!("  {:<20} {}", count.label, count.count);
    }
    println!();

    match report.top_n_threshold {
        Some(threshold) => println!(
            "Top {} genes (cutoff {}, {} rows with ties):",
            n,
            threshold,
            report.top_genes.len()
        ),
        None => println!("Top {} genes:", n),
    }
    for gene in &report.top_genes {
        let name = gene.gene.as_deref().unwrap_or("<unnamed>");
        match gene.value {
            Some(value) => println!("  {:<20} {:.3e}", name, value),
            None => println!("  {:<20} -", name),
        }
    }
    println!();

    if let Some(counts) = &report.enrichment {
        println!(
            "Enrichment: {} with pathways, {} without, {} failed",
            counts.with_pathways, counts.no_results, counts.failed
        );
        println!();
    }

    if !report.outputs.is_empty() {
        println!("Outputs:");
        for output in &report.outputs {
            println!("  - {}", output);
        }
        println!();
    }

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
