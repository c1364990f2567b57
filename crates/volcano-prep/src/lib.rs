//! Volcano Preparation Library
//!
//! Cleaning, volcano-plot preparation and pathway annotation for
//! differential expression tables (DESeq2-style `row`, `log2FoldChange`,
//! `padj` columns), built on Polars.
//!
//! # Overview
//!
//! - **Loading**: `.csv` and `.xlsx` tables via [`TableLoader`]
//! - **Cleaning**: chainable missing-value removal, column removal and
//!   threshold filtering via [`CleaningPipeline`]
//! - **Volcano preparation**: probability validation, a derived `-log10(p)`
//!   column, ordinal significance labels and top-N selection with ties
//! - **Enrichment**: optional per-gene pathway lookups (Enrichr, Reactome)
//!   on a bounded worker pool
//! - **Plotting**: bar and volcano plots as PNG (feature `plot`)
//! - **Reporting**: a JSON summary of each run
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use volcano_prep::{CleaningPipeline, VolcanoParams, process_for_volcano};
//!
//! let mut pipeline = CleaningPipeline::from_path("results_deseq2.xlsx")?;
//! let cleaned = pipeline.clean("padj", 0.1, "less_than", "Unnamed: 0")?;
//!
//! let frames = process_for_volcano(cleaned, &VolcanoParams::default())?;
//! println!("{}", frames.top_n);
//! ```
//!
//! # End-to-end runs
//!
//! [`RunPipeline`] strings every stage together from a [`RunConfig`] and
//! writes tables, plots and a [`RunReport`] to the output directory:
//!
//! ```rust,ignore
//! use volcano_prep::{EnrichmentBackend, RunConfig, RunPipeline};
//!
//! let config = RunConfig::builder()
//!     .output_dir("output")
//!     .enrichment_backend(EnrichmentBackend::Reactome)
//!     .top_n(20, false)
//!     .build()?;
//!
//! let output = RunPipeline::builder().config(config).build()?.run("results.csv")?;
//! println!("{:?}", output.report.label_counts);
//! ```
//!
//! # Custom lookups
//!
//! Any [`PathwayLookup`] can replace the built-in clients, which keeps
//! enrichment testable without network access.

pub mod cleaner;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod loader;
pub mod pipeline;
#[cfg(feature = "plot")]
pub mod plot;
pub mod report;
pub mod synthetic;
pub mod utils;
pub mod volcano;

// Re-exports for convenient access
pub use cleaner::{CleaningPipeline, Comparison};
pub use config::{
    CleaningConfig, ConfigValidationError, EnrichmentBackend, EnrichmentConfig, PlotConfig,
    RunConfig, RunConfigBuilder,
};
pub use enrichment::{EnrichmentOutcome, OutcomeCounts, PathwayLookup, enrich_genes};
pub use error::{Result as VolcanoResult, ResultExt, VolcanoError};
pub use loader::TableLoader;
pub use pipeline::{RunOutput, RunPipeline, RunPipelineBuilder};
pub use report::RunReport;
pub use synthetic::{SyntheticConfig, synthetic_results};
pub use volcano::{
    OrderedLabels, VolcanoFrames, VolcanoParams, derive_neg_log10, label_by_thresholds,
    process_for_volcano, select_top_n, validate_probabilities,
};
