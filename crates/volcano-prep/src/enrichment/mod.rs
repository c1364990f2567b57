//! Per-gene pathway enrichment.
//!
//! This module defines the [`PathwayLookup`] trait that the remote pathway
//! sources implement, and [`enrich_genes`], which runs lookups for many
//! genes on a bounded worker pool.
//!
//! Each gene's lookup is independent: a failure for one gene becomes an
//! [`EnrichmentOutcome::Failed`] entry for that gene and never aborts the
//! batch. Results are keyed by gene name, not by completion order.
//!
//! # Example
//!
//! ```rust,ignore
//! use volcano_prep::enrichment::{EnrichrClient, enrich_genes, gene_names, attach_pathways};
//!
//! let client = EnrichrClient::new()?;
//! let genes = gene_names(&frame, "row")?;
//! let results = enrich_genes(&genes, &client, 8)?;
//! let annotated = attach_pathways(frame, "row", "related pathway", &results)?;
//! ```

#[cfg(feature = "enrichment")]
mod biomart;
#[cfg(feature = "enrichment")]
mod enrichr;
#[cfg(feature = "enrichment")]
mod reactome;

#[cfg(feature = "enrichment")]
pub use biomart::BiomartClient;
#[cfg(feature = "enrichment")]
pub use enrichr::EnrichrClient;
#[cfg(feature = "enrichment")]
pub use reactome::ReactomeScraper;

use crate::error::{Result, VolcanoError};
use crate::utils::{is_string_dtype, require_column, string_values};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Upper bound on concurrent lookups.
pub const MAX_WORKERS: usize = 8;

/// A remote source of pathway names for a gene.
///
/// Implementations must be `Send + Sync` so one instance can serve every
/// worker of the lookup pool.
pub trait PathwayLookup: Send + Sync {
    /// Pathway or term names associated with `gene`.
    ///
    /// An empty vector means the source knows nothing about the gene.
    /// Network and decode failures are reported as
    /// [`VolcanoError::RemoteLookupFailed`].
    fn lookup(&self, gene: &str) -> Result<Vec<String>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Reject blank gene names before any request is made.
///
/// Any other text is passed to the source as-is; request builders encode
/// it, and a name the source does not know yields no pathways.
pub fn validate_gene_name(gene: &str) -> Result<()> {
    if gene.trim().is_empty() {
        return Err(VolcanoError::InvalidArgumentType(format!(
            "gene name must be a non-empty string, got {:?}",
            gene
        )));
    }
    Ok(())
}

/// Wrap any lookup error as a per-gene remote failure.
pub(crate) fn remote_failure(gene: &str, reason: impl fmt::Display) -> VolcanoError {
    VolcanoError::RemoteLookupFailed {
        gene: gene.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(feature = "enrichment")]
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("volcano-prep/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Result of enriching one gene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Pathways(Vec<String>),
    NoResults,
    /// Lookup failed; holds the rendered failure message.
    Failed(String),
}

impl EnrichmentOutcome {
    fn from_lookup(gene: &str, result: Result<Vec<String>>) -> Self {
        match result {
            Ok(pathways) if pathways.is_empty() => Self::NoResults,
            Ok(pathways) => Self::Pathways(pathways),
            Err(e) => {
                warn!("Lookup failed for gene {}: {}", gene, e);
                Self::Failed(format!("Error processing gene {}: {}", gene, e))
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for EnrichmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pathways(pathways) => f.write_str(&pathways.join("; ")),
            Self::NoResults => f.write_str("No related pathways found"),
            Self::Failed(message) => f.write_str(message),
        }
    }
}

/// Tally of enrichment outcomes, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub with_pathways: usize,
    pub no_results: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn from_results(results: &BTreeMap<String, EnrichmentOutcome>) -> Self {
        results.values().fold(Self::default(), |mut acc, outcome| {
            match outcome {
                EnrichmentOutcome::Pathways(_) => acc.with_pathways += 1,
                EnrichmentOutcome::NoResults => acc.no_results += 1,
                EnrichmentOutcome::Failed(_) => acc.failed += 1,
            }
            acc
        })
    }
}

/// Look up every gene on a pool of `workers` threads (`1..=8`).
///
/// Duplicate gene names are looked up once.
pub fn enrich_genes(
    genes: &[String],
    lookup: &dyn PathwayLookup,
    workers: usize,
) -> Result<BTreeMap<String, EnrichmentOutcome>> {
    if !(1..=MAX_WORKERS).contains(&workers) {
        return Err(VolcanoError::InvalidConfig(format!(
            "enrichment workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }

    let mut unique: Vec<&str> = genes.iter().map(String::as_str).collect();
    unique.sort_unstable();
    unique.dedup();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("enrichment-{i}"))
        .build()
        .map_err(|e| VolcanoError::InvalidConfig(format!("enrichment pool: {e}")))?;

    info!(
        "Enriching {} genes via {} on {} workers",
        unique.len(),
        lookup.name(),
        workers
    );

    let results: BTreeMap<String, EnrichmentOutcome> = pool.install(|| {
        unique
            .par_iter()
            .map(|gene| {
                debug!("Looking up {}", gene);
                let outcome = EnrichmentOutcome::from_lookup(gene, lookup.lookup(gene));
                (gene.to_string(), outcome)
            })
            .collect()
    });

    let counts = OutcomeCounts::from_results(&results);
    info!(
        "Enrichment done: {} with pathways, {} without, {} failed",
        counts.with_pathways, counts.no_results, counts.failed
    );
    Ok(results)
}

/// Gene names from a string column, skipping nulls.
pub fn gene_names(frame: &DataFrame, gene_column: &str) -> Result<Vec<String>> {
    let series = require_column(frame, gene_column)?;
    if !is_string_dtype(series.dtype()) {
        return Err(VolcanoError::InvalidArgumentType(format!(
            "gene column '{}' must hold strings, found {}",
            gene_column,
            series.dtype()
        )));
    }
    Ok(string_values(series)?.into_iter().flatten().collect())
}

/// Append `output_column` holding each row's enrichment outcome text.
///
/// Rows whose gene is null or absent from `results` get a null cell.
pub fn attach_pathways(
    mut frame: DataFrame,
    gene_column: &str,
    output_column: &str,
    results: &BTreeMap<String, EnrichmentOutcome>,
) -> Result<DataFrame> {
    let series = require_column(&frame, gene_column)?;
    let texts: Vec<Option<String>> = string_values(series)?
        .into_iter()
        .map(|gene| gene.and_then(|g| results.get(&g)).map(|o| o.to_string()))
        .collect();
    frame.with_column(Series::new(output_column.into(), texts))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed table; `Xist` always fails.
    struct FixedLookup {
        calls: AtomicUsize,
    }

    impl FixedLookup {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PathwayLookup for FixedLookup {
        fn lookup(&self, gene: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match gene {
                "Actb" => Ok(vec!["Cell Cycle".to_string(), "Gap junction".to_string()]),
                "Xist" => Err(remote_failure(gene, "connection reset")),
                _ => Ok(vec![]),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn genes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_failures_are_isolated_per_gene() {
        let lookup = FixedLookup::new();
        let results = enrich_genes(&genes(&["Xist", "Actb", "Sox2"]), &lookup, 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results["Actb"],
            EnrichmentOutcome::Pathways(vec!["Cell Cycle".into(), "Gap junction".into()])
        );
        assert_eq!(results["Sox2"], EnrichmentOutcome::NoResults);
        assert!(results["Xist"].is_failed());
        assert_eq!(
            results["Xist"].to_string(),
            "Error processing gene Xist: Remote lookup failed for 'Xist': connection reset"
        );
    }

    #[test]
    fn test_results_keyed_by_gene_and_deduplicated() {
        let lookup = FixedLookup::new();
        let results = enrich_genes(&genes(&["Sox2", "Actb", "Sox2"]), &lookup, 8).unwrap();
        let keys: Vec<&String> = results.keys().collect();
        assert_eq!(keys, vec!["Actb", "Sox2"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_worker_bounds() {
        let lookup = FixedLookup::new();
        for workers in [0, 9] {
            let err = enrich_genes(&genes(&["Actb"]), &lookup, workers).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_CONFIG");
        }
        assert!(enrich_genes(&genes(&["Actb"]), &lookup, 1).is_ok());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(EnrichmentOutcome::NoResults.to_string(), "No related pathways found");
        assert_eq!(
            EnrichmentOutcome::Pathways(vec!["A".into(), "B".into()]).to_string(),
            "A; B"
        );
    }

    #[test]
    fn test_outcome_counts() {
        let lookup = FixedLookup::new();
        let results = enrich_genes(&genes(&["Actb", "Xist", "Sox2", "Nanog"]), &lookup, 2).unwrap();
        assert_eq!(
            OutcomeCounts::from_results(&results),
            OutcomeCounts {
                with_pathways: 1,
                no_results: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn test_validate_gene_name() {
        assert!(validate_gene_name("Pou5f1").is_ok());
        assert!(validate_gene_name("Hist1h2a.1").is_ok());
        // unusual characters are left to the request encoder
        assert!(validate_gene_name("Actb; DROP").is_ok());
        assert!(validate_gene_name("<b>").is_ok());
        for bad in ["", " ", "\t\n"] {
            let err = validate_gene_name(bad).unwrap_err();
            assert!(matches!(err, VolcanoError::InvalidArgumentType(_)));
        }
    }

    #[test]
    fn test_gene_names_and_attach() {
        let frame = df![
            "row" => [Some("Actb"), None, Some("Sox2"), Some("Xist")],
            "padj" => [0.01, 0.02, 0.03, 0.04],
        ]
        .unwrap();

        let names = gene_names(&frame, "row").unwrap();
        assert_eq!(names, vec!["Actb", "Sox2", "Xist"]);

        let lookup = FixedLookup::new();
        let results = enrich_genes(&names, &lookup, 2).unwrap();
        let annotated = attach_pathways(frame, "row", "related pathway", &results).unwrap();

        let column = string_values(
            annotated
                .column("related pathway")
                .unwrap()
                .as_materialized_series(),
        )
        .unwrap();
        assert_eq!(column[0].as_deref(), Some("Cell Cycle; Gap junction"));
        assert_eq!(column[1], None);
        assert_eq!(column[2].as_deref(), Some("No related pathways found"));
        assert!(column[3].as_deref().unwrap().starts_with("Error processing gene Xist"));
    }

    #[test]
    fn test_gene_names_rejects_numeric_column() {
        let frame = df!["padj" => [0.1]].unwrap();
        let err = gene_names(&frame, "padj").unwrap_err();
        assert!(matches!(err, VolcanoError::InvalidArgumentType(_)));
    }
}
