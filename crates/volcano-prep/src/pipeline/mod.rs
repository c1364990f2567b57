//! End-to-end run: load, clean, enrich, prepare, render, report.
//!
//! [`RunPipeline`] wires the stages together with a [`RunConfig`]. Each stage
//! is also usable on its own; this module only fixes their order and the
//! files written to the output directory.

use crate::cleaner::CleaningPipeline;
use crate::config::{EnrichmentBackend, RunConfig};
use crate::enrichment::{OutcomeCounts, PathwayLookup, attach_pathways, enrich_genes, gene_names};
use crate::error::{Result, ResultExt};
use crate::loader::TableLoader;
use crate::report::RunReport;
use crate::volcano::{VolcanoFrames, process_for_volcano};
use polars::prelude::DataFrame;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// File name of the cleaned table.
pub const CLEANED_FILE: &str = "output_data.csv";
/// File name of the annotated table.
pub const PROCESSED_FILE: &str = "volcano_data.csv";
/// File name of the top-N subset.
pub const TOP_GENES_FILE: &str = "top_genes.csv";

/// Tables produced by a run, plus its report.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub cleaned: DataFrame,
    pub volcano: VolcanoFrames,
    pub report: RunReport,
}

/// A configured end-to-end run.
///
/// # Example
///
/// ```rust,ignore
/// use volcano_prep::{RunConfig, RunPipeline};
///
/// let output = RunPipeline::builder()
///     .config(RunConfig::default())
///     .build()?
///     .run("results_deseq2.xlsx")?;
/// println!("{}", output.report.to_json_pretty()?);
/// ```
pub struct RunPipeline {
    config: RunConfig,
    lookup: Option<Arc<dyn PathwayLookup>>,
    allowed_genes: Option<HashSet<String>>,
    save_to_disk: bool,
}

static_assertions::assert_impl_all!(RunPipeline: Send, Sync);

impl RunPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> RunPipelineBuilder {
        RunPipelineBuilder::default()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage on the table at `input`.
    pub fn run(&self, input: impl AsRef<Path>) -> Result<RunOutput> {
        let input = input.as_ref();
        self.run_internal(input).inspect_err(|e| {
            error!("Run failed for {}: {}", input.display(), e);
        })
    }

    fn run_internal(&self, input: &Path) -> Result<RunOutput> {
        let start = Instant::now();
        let config = &self.config;
        info!("Starting volcano preparation for {}", input.display());

        // Step 1: load and clean
        let mut pipeline = CleaningPipeline::from_path(input)?;
        let rows_loaded = pipeline.frame().height();
        let cleaning = &config.cleaning;
        pipeline
            .clean(
                &cleaning.filter_column,
                cleaning.threshold,
                cleaning.comparison.as_str(),
                &cleaning.remove_column,
            )
            .context("Cleaning")?;

        // Step 2: optional protein-coding filter
        if let Some(allowed) = self.protein_coding_genes()? {
            info!("Step 2: Keeping protein-coding genes...");
            pipeline.filter_genes(&config.enrichment.gene_column, &allowed)?;
        }
        let mut cleaned = pipeline.into_frame();
        let rows_after_cleaning = cleaned.height();

        // Step 3: optional enrichment
        let mut enrichment_counts = None;
        if let Some(lookup) = self.lookup()? {
            info!("Step 3: Enriching genes via {}...", lookup.name());
            let enrichment = &config.enrichment;
            let genes = gene_names(&cleaned, &enrichment.gene_column)?;
            let results = enrich_genes(&genes, lookup.as_ref(), enrichment.workers)?;
            enrichment_counts = Some(OutcomeCounts::from_results(&results));
            cleaned = attach_pathways(
                cleaned,
                &enrichment.gene_column,
                &enrichment.output_column,
                &results,
            )?;
        }

        // Step 4: volcano preparation
        info!("Step 4: Preparing volcano data...");
        let params = &config.volcano;
        let volcano = process_for_volcano(cleaned.clone(), params).context("Volcano preparation")?;

        let mut report = RunReport::new(
            input,
            rows_loaded,
            rows_after_cleaning,
            &volcano,
            &params.label_column,
            &config.enrichment.gene_column,
            &params.ref_column,
        )?;
        report.enrichment = enrichment_counts;

        // Step 5: outputs
        if self.save_to_disk {
            info!("Step 5: Saving outputs to {}...", config.output_dir.display());
            report.outputs = self.write_outputs(&mut cleaned, &volcano)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        if self.save_to_disk {
            let path = report.save(&config.output_dir)?;
            report.outputs.push(path.display().to_string());
        }

        info!(
            "Run complete in {} ms: {} -> {} rows, {} in top {}",
            report.duration_ms,
            rows_loaded,
            rows_after_cleaning,
            volcano.top_n.height(),
            params.n
        );

        Ok(RunOutput {
            cleaned,
            volcano,
            report,
        })
    }

    fn protein_coding_genes(&self) -> Result<Option<HashSet<String>>> {
        if let Some(allowed) = &self.allowed_genes {
            return Ok(Some(allowed.clone()));
        }
        if !self.config.enrichment.protein_coding_only {
            return Ok(None);
        }

        #[cfg(feature = "enrichment")]
        {
            let client = crate::enrichment::BiomartClient::from_config(&self.config.enrichment)?;
            Ok(Some(client.protein_coding_genes()?))
        }
        #[cfg(not(feature = "enrichment"))]
        {
            Err(crate::error::VolcanoError::InvalidConfig(
                "protein-coding filter requires the 'enrichment' feature".to_string(),
            ))
        }
    }

    fn lookup(&self) -> Result<Option<Arc<dyn PathwayLookup>>> {
        if let Some(lookup) = &self.lookup {
            return Ok(Some(Arc::clone(lookup)));
        }

        let backend = self.config.enrichment.backend;
        if backend == EnrichmentBackend::None {
            return Ok(None);
        }

        #[cfg(feature = "enrichment")]
        {
            use crate::enrichment::{EnrichrClient, ReactomeScraper};
            let enrichment = &self.config.enrichment;
            let lookup: Arc<dyn PathwayLookup> = match backend {
                EnrichmentBackend::Enrichr => Arc::new(EnrichrClient::from_config(enrichment)?),
                EnrichmentBackend::Reactome => Arc::new(ReactomeScraper::from_config(enrichment)?),
                EnrichmentBackend::None => return Ok(None),
            };
            Ok(Some(lookup))
        }
        #[cfg(not(feature = "enrichment"))]
        {
            Err(crate::error::VolcanoError::InvalidConfig(format!(
                "enrichment backend {:?} requires the 'enrichment' feature",
                backend
            )))
        }
    }

    fn write_outputs(&self, cleaned: &mut DataFrame, volcano: &VolcanoFrames) -> Result<Vec<String>> {
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let mut processed = volcano.processed.clone();
        let mut top_n = volcano.top_n.clone();
        for (frame, name) in [
            (cleaned, CLEANED_FILE),
            (&mut processed, PROCESSED_FILE),
            (&mut top_n, TOP_GENES_FILE),
        ] {
            let path = dir.join(name);
            TableLoader::write_csv(frame, &path)?;
            written.push(path.display().to_string());
        }

        #[cfg(feature = "plot")]
        if self.config.plot.enabled {
            written.extend(self.render_plots(volcano)?);
        }

        Ok(written)
    }

    #[cfg(feature = "plot")]
    fn render_plots(&self, volcano: &VolcanoFrames) -> Result<Vec<String>> {
        use crate::plot::{BAR_PLOT_FILE, BarPlot, VOLCANO_PLOT_FILE, VolcanoPlot};

        let dir = &self.config.output_dir;
        let plot = &self.config.plot;
        let params = &self.config.volcano;

        let bar_path = dir.join(BAR_PLOT_FILE);
        BarPlot::from_config(plot).render(&volcano.processed, &bar_path)?;

        let volcano_path = dir.join(VOLCANO_PLOT_FILE);
        let top = plot.annotate_top.then_some(&volcano.top_n);
        VolcanoPlot::from_config(plot, &params.log_column).render(
            &volcano.processed,
            Some((params.label_column.as_str(), &volcano.labels)),
            top,
            &volcano_path,
        )?;

        Ok(vec![
            bar_path.display().to_string(),
            volcano_path.display().to_string(),
        ])
    }
}

/// Builder for [`RunPipeline`].
#[derive(Default)]
pub struct RunPipelineBuilder {
    config: Option<RunConfig>,
    lookup: Option<Arc<dyn PathwayLookup>>,
    allowed_genes: Option<HashSet<String>>,
    save_to_disk: Option<bool>,
}

impl RunPipelineBuilder {
    /// Set the run configuration.
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this lookup instead of the configured enrichment backend.
    pub fn lookup(mut self, lookup: Arc<dyn PathwayLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Keep only these genes after cleaning instead of downloading the
    /// protein-coding list.
    pub fn allowed_genes(mut self, genes: HashSet<String>) -> Self {
        self.allowed_genes = Some(genes);
        self
    }

    /// Enable or disable writing tables, plots and the report.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<RunPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(RunPipeline {
            config,
            lookup: self.lookup,
            allowed_genes: self.allowed_genes,
            save_to_disk: self.save_to_disk.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentOutcome;
    use crate::utils::string_values;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    struct StubLookup;

    impl PathwayLookup for StubLookup {
        fn lookup(&self, gene: &str) -> Result<Vec<String>> {
            match gene {
                "Nanog" => Ok(vec!["Stem cell maintenance".to_string()]),
                "Pou5f1" => Err(crate::error::VolcanoError::RemoteLookupFailed {
                    gene: gene.to_string(),
                    reason: "timed out".to_string(),
                }),
                _ => Ok(Vec::new()),
            }
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn write_input(dir: &Path) -> PathBuf {
        let mut df = df![
            "Unnamed: 0" => [0i64, 1, 2, 3, 4, 5],
            "row" => ["Actb", "Gapdh", "Sox2", "Nanog", "Pou5f1", "Klf4"],
            "log2FoldChange" => [Some(1.2), Some(-0.4), None, Some(3.1), Some(-2.2), Some(0.9)],
            "padj" => [Some(0.01), Some(0.5), Some(0.02), Some(0.003), Some(0.09), Some(0.1)],
        ]
        .unwrap();
        let path = dir.join("results.csv");
        TableLoader::write_csv(&mut df, &path).unwrap();
        path
    }

    fn config(output_dir: &Path) -> RunConfig {
        RunConfig::builder()
            .output_dir(output_dir)
            .top_n(2, false)
            .plots_enabled(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_without_enrichment() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());

        let output = RunPipeline::builder()
            .config(config(&dir.path().join("out")))
            .save_to_disk(false)
            .build()
            .unwrap()
            .run(&input)
            .unwrap();

        let report = &output.report;
        assert_eq!(report.rows_loaded, 6);
        assert_eq!(report.rows_after_cleaning, 3);
        assert_eq!(report.top_n_threshold, Some(0.01));
        assert!(report.enrichment.is_none());
        assert!(report.outputs.is_empty());

        let top: Vec<Option<&str>> = report.top_genes.iter().map(|t| t.gene.as_deref()).collect();
        assert_eq!(top, vec![Some("Nanog"), Some("Actb")]);
        assert!(!output.cleaned.get_column_names().iter().any(|c| c.as_str() == "Unnamed: 0"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_run_with_lookup_and_gene_filter() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let allowed: HashSet<String> = ["Actb", "Nanog", "Pou5f1", "Gapdh"]
            .into_iter()
            .map(String::from)
            .collect();

        let output = RunPipeline::builder()
            .config(config(&dir.path().join("out")))
            .lookup(Arc::new(StubLookup))
            .allowed_genes(allowed)
            .save_to_disk(false)
            .build()
            .unwrap()
            .run(&input)
            .unwrap();

        let counts = output.report.enrichment.unwrap();
        assert_eq!(counts.with_pathways, 1);
        assert_eq!(counts.no_results, 1);
        assert_eq!(counts.failed, 1);

        let pathways = string_values(
            output
                .cleaned
                .column("related pathway")
                .unwrap()
                .as_materialized_series(),
        )
        .unwrap();
        assert_eq!(
            pathways,
            vec![
                Some(EnrichmentOutcome::NoResults.to_string()),
                Some("Stem cell maintenance".to_string()),
                Some("Error processing gene Pou5f1: Remote lookup failed for 'Pou5f1': timed out".to_string()),
            ]
        );
    }

    #[test]
    fn test_run_saves_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("out");

        let output = RunPipeline::builder()
            .config(config(&out))
            .build()
            .unwrap()
            .run(&input)
            .unwrap();

        for name in [CLEANED_FILE, PROCESSED_FILE, TOP_GENES_FILE, crate::report::REPORT_FILE] {
            assert!(out.join(name).exists(), "missing {name}");
        }
        assert_eq!(output.report.outputs.len(), 4);

        let top = TableLoader::load(out.join(TOP_GENES_FILE)).unwrap();
        assert_eq!(top.height(), 2);
    }

    #[test]
    fn test_run_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunPipeline::builder()
            .config(config(dir.path()))
            .save_to_disk(false)
            .build()
            .unwrap()
            .run(dir.path().join("absent.csv"))
            .unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = RunConfig::default();
        config.volcano.n = 0;
        let err = RunPipeline::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
