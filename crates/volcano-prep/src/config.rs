//! Configuration types for a volcano preparation run.
//!
//! [`RunConfig`] groups the settings of every stage. It can be built with
//! [`RunConfig::builder()`] or deserialized from JSON; missing JSON fields
//! take their defaults.

use crate::cleaner::Comparison;
use crate::enrichment::MAX_WORKERS;
use crate::error::{Result, VolcanoError};
use crate::volcano::VolcanoParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remote source used for pathway enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentBackend {
    /// Skip enrichment
    #[default]
    None,
    /// Enrichr gene-set libraries
    Enrichr,
    /// Reactome content pages
    Reactome,
}

/// Row cleaning applied before volcano preparation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Column the threshold filter compares.
    pub filter_column: String,
    pub threshold: f64,
    pub comparison: Comparison,
    /// Column removed before any other step (usually the exported row index).
    pub remove_column: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            filter_column: "padj".to_string(),
            threshold: 0.1,
            comparison: Comparison::LessThan,
            remove_column: "Unnamed: 0".to_string(),
        }
    }
}

/// Pathway enrichment and gene-list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub backend: EnrichmentBackend,
    /// Concurrent lookups (1 to 8).
    pub workers: usize,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub enrichr_url: String,
    pub reactome_url: String,
    pub biomart_url: String,
    /// Marker selecting Enrichr libraries, e.g. `Mouse`.
    pub organism: String,
    /// Ensembl dataset queried for protein-coding genes.
    pub biomart_dataset: String,
    /// Keep only protein-coding genes after cleaning.
    pub protein_coding_only: bool,
    pub gene_column: String,
    /// Column holding the enrichment outcome text.
    pub output_column: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            backend: EnrichmentBackend::None,
            workers: MAX_WORKERS,
            timeout_secs: 30,
            enrichr_url: "https://maayanlab.cloud/Enrichr".to_string(),
            reactome_url: "https://reactome.org/content/".to_string(),
            biomart_url: "http://www.ensembl.org/biomart/martservice".to_string(),
            organism: "Mouse".to_string(),
            biomart_dataset: "mmusculus_gene_ensembl".to_string(),
            protein_coding_only: false,
            gene_column: "row".to_string(),
            output_column: "related pathway".to_string(),
        }
    }
}

/// Plot rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub gene_column: String,
    pub fold_change_column: String,
    /// Probability marked by the horizontal significance line.
    pub p_threshold: f64,
    /// Fold changes marked by the vertical significance lines.
    pub fold_change_bounds: (f64, f64),
    /// Annotate the top-N genes by name.
    pub annotate_top: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 1200,
            height: 900,
            gene_column: "row".to_string(),
            fold_change_column: "log2FoldChange".to_string(),
            p_threshold: 0.05,
            fold_change_bounds: (-2.0, 2.0),
            annotate_top: true,
        }
    }
}

/// Configuration for a full run.
///
/// # Example
///
/// ```rust,ignore
/// use volcano_prep::config::{RunConfig, EnrichmentBackend};
///
/// let config = RunConfig::builder()
///     .filter("padj", 0.05, Comparison::LessThan)
///     .top_n(20, false)
///     .enrichment_backend(EnrichmentBackend::Reactome)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory receiving tables, plots and the run report.
    pub output_dir: PathBuf,
    pub cleaning: CleaningConfig,
    pub volcano: VolcanoParams,
    pub enrichment: EnrichmentConfig,
    pub plot: PlotConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            cleaning: CleaningConfig::default(),
            volcano: VolcanoParams::default(),
            enrichment: EnrichmentConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl RunConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Read a JSON configuration file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !self.cleaning.threshold.is_finite() {
            return Err(ConfigValidationError::NonFinite {
                field: "cleaning.threshold".to_string(),
                value: self.cleaning.threshold,
            });
        }

        let volcano = &self.volcano;
        if let Some(bad) = volcano.thresholds.iter().find(|t| !t.is_finite()) {
            return Err(ConfigValidationError::NonFinite {
                field: "volcano.thresholds".to_string(),
                value: *bad,
            });
        }
        if volcano.labels.len() != volcano.thresholds.len() + 1 {
            return Err(ConfigValidationError::LabelCount {
                thresholds: volcano.thresholds.len(),
                labels: volcano.labels.len(),
            });
        }
        if volcano.thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigValidationError::UnsortedThresholds(
                volcano.thresholds.clone(),
            ));
        }
        if volcano.n <= 0 {
            return Err(ConfigValidationError::InvalidTopN(volcano.n));
        }

        if !(1..=MAX_WORKERS).contains(&self.enrichment.workers) {
            return Err(ConfigValidationError::InvalidWorkers(self.enrichment.workers));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        let plot = &self.plot;
        if !(plot.p_threshold > 0.0 && plot.p_threshold <= 1.0) {
            return Err(ConfigValidationError::InvalidProbability(plot.p_threshold));
        }
        if plot.fold_change_bounds.0 >= plot.fold_change_bounds.1 {
            return Err(ConfigValidationError::InvalidBounds(
                plot.fold_change_bounds.0,
                plot.fold_change_bounds.1,
            ));
        }
        if plot.width == 0 || plot.height == 0 {
            return Err(ConfigValidationError::InvalidPlotSize(plot.width, plot.height));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be finite)")]
    NonFinite { field: String, value: f64 },

    #[error("Found {labels} labels for {thresholds} thresholds (need one more label than thresholds)")]
    LabelCount { thresholds: usize, labels: usize },

    #[error("Thresholds must be strictly ascending: {0:?}")]
    UnsortedThresholds(Vec<f64>),

    #[error("Invalid top-N count: {0} (must be at least 1)")]
    InvalidTopN(i64),

    #[error("Invalid enrichment workers: {0} (must be between 1 and 8)")]
    InvalidWorkers(usize),

    #[error("Invalid HTTP timeout: must be at least 1 second")]
    InvalidTimeout,

    #[error("Invalid plot p-value threshold: {0} (must be in (0, 1])")]
    InvalidProbability(f64),

    #[error("Invalid fold-change bounds: ({0}, {1}) (lower must be below upper)")]
    InvalidBounds(f64, f64),

    #[error("Invalid plot size: {0}x{1}")]
    InvalidPlotSize(u32, u32),
}

impl From<ConfigValidationError> for VolcanoError {
    fn from(e: ConfigValidationError) -> Self {
        VolcanoError::InvalidConfig(e.to_string())
    }
}

/// Builder for [`RunConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    output_dir: Option<PathBuf>,
    cleaning: Option<CleaningConfig>,
    volcano: Option<VolcanoParams>,
    enrichment: Option<EnrichmentConfig>,
    plot: Option<PlotConfig>,
}

impl RunConfigBuilder {
    /// Set the output directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Replace the cleaning settings.
    pub fn cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.cleaning = Some(cleaning);
        self
    }

    /// Set the threshold filter applied during cleaning.
    pub fn filter(mut self, column: impl Into<String>, threshold: f64, comparison: Comparison) -> Self {
        let cleaning = self.cleaning.get_or_insert_with(CleaningConfig::default);
        cleaning.filter_column = column.into();
        cleaning.threshold = threshold;
        cleaning.comparison = comparison;
        self
    }

    /// Replace the volcano preparation parameters.
    pub fn volcano(mut self, params: VolcanoParams) -> Self {
        self.volcano = Some(params);
        self
    }

    /// Set the top-N count and direction.
    pub fn top_n(mut self, n: i64, highest: bool) -> Self {
        let volcano = self.volcano.get_or_insert_with(VolcanoParams::default);
        volcano.n = n;
        volcano.highest = highest;
        self
    }

    /// Replace the enrichment settings.
    pub fn enrichment(mut self, enrichment: EnrichmentConfig) -> Self {
        self.enrichment = Some(enrichment);
        self
    }

    /// Select the enrichment backend.
    pub fn enrichment_backend(mut self, backend: EnrichmentBackend) -> Self {
        self.enrichment
            .get_or_insert_with(EnrichmentConfig::default)
            .backend = backend;
        self
    }

    /// Set the number of concurrent enrichment lookups.
    pub fn workers(mut self, workers: usize) -> Self {
        self.enrichment
            .get_or_insert_with(EnrichmentConfig::default)
            .workers = workers;
        self
    }

    /// Enable or disable the protein-coding gene filter.
    pub fn protein_coding_only(mut self, enable: bool) -> Self {
        self.enrichment
            .get_or_insert_with(EnrichmentConfig::default)
            .protein_coding_only = enable;
        self
    }

    /// Replace the plot settings.
    pub fn plot(mut self, plot: PlotConfig) -> Self {
        self.plot = Some(plot);
        self
    }

    /// Enable or disable plot rendering.
    pub fn plots_enabled(mut self, enabled: bool) -> Self {
        self.plot.get_or_insert_with(PlotConfig::default).enabled = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `RunConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<RunConfig, ConfigValidationError> {
        let config = RunConfig {
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("output")),
            cleaning: self.cleaning.unwrap_or_default(),
            volcano: self.volcano.unwrap_or_default(),
            enrichment: self.enrichment.unwrap_or_default(),
            plot: self.plot.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.cleaning.filter_column, "padj");
        assert_eq!(config.cleaning.threshold, 0.1);
        assert_eq!(config.cleaning.comparison, Comparison::LessThan);
        assert_eq!(config.cleaning.remove_column, "Unnamed: 0");
        assert_eq!(config.volcano.thresholds, vec![0.01, 0.05, 0.1]);
        assert_eq!(config.volcano.n, 10);
        assert!(!config.volcano.highest);
        assert_eq!(config.enrichment.workers, 8);
        assert_eq!(config.enrichment.backend, EnrichmentBackend::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = RunConfig::builder()
            .output_dir("results")
            .filter("pvalue", 0.05, Comparison::LessThan)
            .top_n(25, true)
            .enrichment_backend(EnrichmentBackend::Reactome)
            .workers(4)
            .plots_enabled(false)
            .build()
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert_eq!(config.cleaning.filter_column, "pvalue");
        assert_eq!(config.cleaning.remove_column, "Unnamed: 0");
        assert_eq!(config.volcano.n, 25);
        assert!(config.volcano.highest);
        assert_eq!(config.enrichment.backend, EnrichmentBackend::Reactome);
        assert_eq!(config.enrichment.workers, 4);
        assert!(!config.plot.enabled);
    }

    #[test]
    fn test_validation_workers() {
        for workers in [0, 9] {
            let err = RunConfig::builder().workers(workers).build().unwrap_err();
            assert!(matches!(err, ConfigValidationError::InvalidWorkers(w) if w == workers));
        }
    }

    #[test]
    fn test_validation_top_n() {
        let err = RunConfig::builder().top_n(0, false).build().unwrap_err();
        assert!(matches!(err, ConfigValidationError::InvalidTopN(0)));
    }

    #[test]
    fn test_validation_thresholds() {
        let params = VolcanoParams {
            thresholds: vec![0.05, 0.01],
            labels: vec!["a".into(), "b".into(), "c".into()],
            ..VolcanoParams::default()
        };
        let err = RunConfig::builder().volcano(params).build().unwrap_err();
        assert!(matches!(err, ConfigValidationError::UnsortedThresholds(_)));

        let params = VolcanoParams {
            labels: vec!["a".into()],
            ..VolcanoParams::default()
        };
        let err = RunConfig::builder().volcano(params).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigValidationError::LabelCount { thresholds: 3, labels: 1 }
        ));
    }

    #[test]
    fn test_validation_plot() {
        let plot = PlotConfig {
            fold_change_bounds: (2.0, -2.0),
            ..PlotConfig::default()
        };
        let err = RunConfig::builder().plot(plot).build().unwrap_err();
        assert!(matches!(err, ConfigValidationError::InvalidBounds(..)));

        let plot = PlotConfig {
            p_threshold: 0.0,
            ..PlotConfig::default()
        };
        assert!(RunConfig::builder().plot(plot).build().is_err());
    }

    #[test]
    fn test_validation_error_converts() {
        let err: VolcanoError = ConfigValidationError::InvalidTopN(-1).into();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "output_dir": "custom_output",
            "cleaning": { "threshold": 0.05, "comparison": "greater_than" },
            "volcano": { "n": 5 },
            "enrichment": { "backend": "enrichr", "workers": 2 }
        }"#;

        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir.to_str().unwrap(), "custom_output");
        assert_eq!(config.cleaning.threshold, 0.05);
        assert_eq!(config.cleaning.comparison, Comparison::GreaterThan);
        assert_eq!(config.cleaning.filter_column, "padj");
        assert_eq!(config.volcano.n, 5);
        assert_eq!(config.enrichment.backend, EnrichmentBackend::Enrichr);
        assert_eq!(config.enrichment.workers, 2);
        assert!(config.plot.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "enrichment": { "workers": 12 } }"#).unwrap();

        let err = RunConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_config_serialization() {
        let config = RunConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
