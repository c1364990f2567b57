//! Preparation of cleaned results for volcano plotting.
//!
//! Three transforms run over a table in order:
//! 1. [`derive_neg_log10`] validates the probability column and appends
//!    `-log10(p)`
//! 2. [`label_by_thresholds`] assigns an ordered significance label
//! 3. [`select_top_n`] picks the most extreme rows, ties included
//!
//! [`process_for_volcano`] composes them; any failure aborts the whole call.

mod labeler;
mod probability;
mod top_n;

pub use labeler::{OrderedLabels, label_by_thresholds};
pub use probability::{DEFAULT_NEG_LOG10_COLUMN, derive_neg_log10, neg_log10, validate_probabilities};
pub use top_n::select_top_n;

use crate::error::Result;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters of a volcano preparation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolcanoParams {
    /// Probability column the `-log10` column is derived from.
    pub p_column: String,
    /// Name of the derived `-log10` column.
    pub log_column: String,
    /// Column bucketed for labels and ranked for top-N.
    pub ref_column: String,
    /// Name of the label column.
    pub label_column: String,
    pub thresholds: Vec<f64>,
    pub labels: Vec<String>,
    pub n: i64,
    /// Rank by largest values instead of smallest.
    pub highest: bool,
}

impl Default for VolcanoParams {
    fn default() -> Self {
        Self {
            p_column: "padj".to_string(),
            log_column: DEFAULT_NEG_LOG10_COLUMN.to_string(),
            ref_column: "padj".to_string(),
            label_column: "significance".to_string(),
            thresholds: vec![0.01, 0.05, 0.1],
            labels: vec![
                "very significant".to_string(),
                "significant".to_string(),
                "trend".to_string(),
                "non-significant".to_string(),
            ],
            n: 10,
            highest: false,
        }
    }
}

/// Output of [`process_for_volcano`].
#[derive(Debug, Clone)]
pub struct VolcanoFrames {
    /// Input table with the derived and label columns appended.
    pub processed: DataFrame,
    /// Top-N subset of `processed`.
    pub top_n: DataFrame,
    pub labels: OrderedLabels,
    /// Reference value at the top-N cutoff.
    pub threshold: f64,
}

/// Derive `-log10(p)`, label rows, and select the top-N subset.
pub fn process_for_volcano(frame: DataFrame, params: &VolcanoParams) -> Result<VolcanoFrames> {
    let rows = frame.height();

    let frame = derive_neg_log10(frame, &params.p_column, &params.log_column)?;
    let (processed, labels) = label_by_thresholds(
        frame,
        &params.ref_column,
        &params.label_column,
        &params.thresholds,
        &params.labels,
    )?;
    let (top_n, threshold) =
        select_top_n(&processed, &params.ref_column, params.n, params.highest)?;

    info!(
        "Volcano preparation complete: {} rows, {} in top {}",
        rows,
        top_n.height(),
        params.n
    );

    Ok(VolcanoFrames {
        processed,
        top_n,
        labels,
        threshold,
    })
}
