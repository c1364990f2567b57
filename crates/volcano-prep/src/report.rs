//! Run report written next to the run outputs.

use crate::enrichment::OutcomeCounts;
use crate::error::Result;
use crate::utils::{column_names, float_values, has_column, require_numeric_column, string_values};
use crate::volcano::VolcanoFrames;
use chrono::Local;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the report inside the output directory.
pub const REPORT_FILE: &str = "run_report.json";

/// Row count of one label category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// One row of the top-N subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopGene {
    pub gene: Option<String>,
    pub value: Option<f64>,
}

/// Summary of a run, serialised as JSON for `--json` and the report file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated (RFC 3339)
    pub generated_at: String,
    pub input_file: String,
    /// Total execution time in milliseconds
    pub duration_ms: u64,
    pub rows_loaded: usize,
    pub rows_after_cleaning: usize,
    pub rows_processed: usize,
    pub columns: Vec<String>,
    /// Label counts in category order
    pub label_counts: Vec<LabelCount>,
    pub top_genes: Vec<TopGene>,
    /// Reference value at the top-N cutoff
    pub top_n_threshold: Option<f64>,
    pub enrichment: Option<OutcomeCounts>,
    /// Files written by the run
    pub outputs: Vec<String>,
}

impl RunReport {
    /// Summarise a finished volcano preparation.
    pub fn new(
        input_file: &Path,
        rows_loaded: usize,
        rows_after_cleaning: usize,
        frames: &VolcanoFrames,
        label_column: &str,
        gene_column: &str,
        ref_column: &str,
    ) -> Result<Self> {
        let label_counts = frames
            .labels
            .counts(&frames.processed, label_column)?
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect();

        Ok(Self {
            generated_at: Local::now().to_rfc3339(),
            input_file: input_file.display().to_string(),
            duration_ms: 0,
            rows_loaded,
            rows_after_cleaning,
            rows_processed: frames.processed.height(),
            columns: column_names(&frames.processed),
            label_counts,
            top_genes: top_genes(&frames.top_n, gene_column, ref_column)?,
            top_n_threshold: Some(frames.threshold),
            enrichment: None,
            outputs: Vec::new(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON into `output_dir`.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(REPORT_FILE);
        let mut file = File::create(&path)?;
        file.write_all(self.to_json_pretty()?.as_bytes())?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

/// Gene and reference value of each top-N row; a missing gene column
/// yields `None` names.
fn top_genes(top_n: &DataFrame, gene_column: &str, ref_column: &str) -> Result<Vec<TopGene>> {
    let values = float_values(require_numeric_column(top_n, ref_column)?)?;
    let genes = if has_column(top_n, gene_column) {
        string_values(top_n.column(gene_column)?.as_materialized_series())?
    } else {
        vec![None; top_n.height()]
    };
    Ok(genes
        .into_iter()
        .zip(values)
        .map(|(gene, value)| TopGene { gene, value })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volcano::{VolcanoParams, process_for_volcano};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn frames() -> VolcanoFrames {
        let df = df![
            "row" => ["Actb", "Gapdh", "Sox2", "Nanog"],
            "log2FoldChange" => [1.0, -2.5, 0.4, 3.0],
            "padj" => [0.001, 0.03, 0.2, 0.07],
        ]
        .unwrap();
        let params = VolcanoParams {
            n: 2,
            ..VolcanoParams::default()
        };
        process_for_volcano(df, &params).unwrap()
    }

    #[test]
    fn test_report_summarises_frames() {
        let report = RunReport::new(
            Path::new("results.csv"),
            6,
            4,
            &frames(),
            "significance",
            "row",
            "padj",
        )
        .unwrap();

        assert_eq!(report.rows_processed, 4);
        assert_eq!(
            report.label_counts,
            vec![
                LabelCount { label: "very significant".into(), count: 1 },
                LabelCount { label: "significant".into(), count: 1 },
                LabelCount { label: "trend".into(), count: 1 },
                LabelCount { label: "non-significant".into(), count: 1 },
            ]
        );
        let genes: Vec<Option<&str>> = report.top_genes.iter().map(|t| t.gene.as_deref()).collect();
        assert_eq!(genes, vec![Some("Actb"), Some("Gapdh")]);
        assert_eq!(report.top_n_threshold, Some(0.03));
    }

    #[test]
    fn test_report_serialisation() {
        let mut report =
            RunReport::new(Path::new("in.xlsx"), 4, 4, &frames(), "significance", "row", "padj")
                .unwrap();
        report.enrichment = Some(OutcomeCounts {
            with_pathways: 2,
            no_results: 1,
            failed: 1,
        });

        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"label_counts\""));
        assert!(json.contains("\"with_pathways\": 2"));

        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            RunReport::new(Path::new("in.csv"), 4, 4, &frames(), "significance", "row", "padj")
                .unwrap();
        let path = report.save(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE);
        assert!(fs::read_to_string(path).unwrap().contains("generated_at"));
    }

    #[test]
    fn test_top_genes_without_gene_column() {
        let df = df!["padj" => [0.01, 0.02]].unwrap();
        let top = top_genes(&df, "row", "padj").unwrap();
        assert_eq!(top.len(), 2);
        assert!(top.iter().all(|t| t.gene.is_none()));
    }
}
