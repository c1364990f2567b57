//! Ordinal labelling of rows by threshold buckets.

use crate::error::{Result, VolcanoError};
use crate::utils::{float_values, require_numeric_column, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Label categories in rank order (lowest bucket first).
///
/// Mirrors the categories of the label column's `Enum` dtype, so styling and
/// reporting can rank labels without inspecting the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedLabels {
    categories: Vec<String>,
}

impl OrderedLabels {
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Position of `label` in the category order.
    pub fn rank(&self, label: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == label)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Ordered categorical dtype over these categories.
    pub fn dtype(&self) -> Result<DataType> {
        Ok(DataType::from_frozen_categories(FrozenCategories::new(
            self.categories.iter().map(String::as_str),
        )?))
    }

    /// Count rows per category of `label_column`, in category order.
    pub fn counts(&self, frame: &DataFrame, label_column: &str) -> Result<Vec<(String, usize)>> {
        let series = crate::utils::require_column(frame, label_column)?;
        let mut counts = vec![0usize; self.len()];
        for label in string_values(series)?.into_iter().flatten() {
            if let Some(idx) = self.rank(&label) {
                counts[idx] += 1;
            }
        }
        Ok(self.categories.iter().cloned().zip(counts).collect())
    }
}

fn validate_buckets<S: AsRef<str>>(thresholds: &[f64], labels: &[S]) -> Result<()> {
    if let Some(bad) = thresholds.iter().find(|t| !t.is_finite()) {
        return Err(VolcanoError::NonNumericThresholds(*bad));
    }

    if labels.len() != thresholds.len() + 1 {
        return Err(VolcanoError::LabelCountMismatch {
            thresholds: thresholds.len(),
            expected: thresholds.len() + 1,
            found: labels.len(),
        });
    }

    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(VolcanoError::UnsortedThresholds(thresholds.to_vec()));
    }

    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_ref()) {
            return Err(VolcanoError::DuplicateLabels(label.as_ref().to_string()));
        }
    }

    Ok(())
}

/// Index of the right-closed bucket holding `value`.
#[inline]
fn bucket_index(thresholds: &[f64], value: f64) -> usize {
    thresholds.partition_point(|&t| t < value)
}

/// Label each row by where `ref_column` falls among ascending `thresholds`.
///
/// Buckets are right-closed: `(-inf, t1]` gets `labels[0]`, `(t1, t2]` gets
/// `labels[1]`, and `(tk, +inf)` gets the last label. Rows with a missing
/// reference value get a null label. The thresholds must already be strictly
/// ascending; they are never reordered.
///
/// The label column is an ordered categorical (`Enum`) over exactly
/// `labels`, so sorting it follows bucket order rather than text order.
///
/// # Errors
///
/// Checked in order: [`VolcanoError::NonNumericThresholds`],
/// [`VolcanoError::LabelCountMismatch`], [`VolcanoError::UnsortedThresholds`],
/// [`VolcanoError::DuplicateLabels`], then the reference column lookup.
pub fn label_by_thresholds<S: AsRef<str>>(
    mut frame: DataFrame,
    ref_column: &str,
    label_column: &str,
    thresholds: &[f64],
    labels: &[S],
) -> Result<(DataFrame, OrderedLabels)> {
    validate_buckets(thresholds, labels)?;

    let values = float_values(require_numeric_column(&frame, ref_column)?)?;
    let assigned: Vec<Option<&str>> = values
        .iter()
        .map(|v| v.map(|x| labels[bucket_index(thresholds, x)].as_ref()))
        .collect();
    let ordered = OrderedLabels {
        categories: labels.iter().map(|l| l.as_ref().to_string()).collect(),
    };
    let column = Series::new(label_column.into(), assigned).cast(&ordered.dtype()?)?;
    frame.with_column(column)?;

    debug!(
        "Labelled '{}' into {} buckets as '{}'",
        ref_column,
        labels.len(),
        label_column
    );

    Ok((frame, ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels_of(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        string_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_low_medium_high() {
        let df = df!["score" => [0.5, 1.5, 2.5, 3.5]].unwrap();
        let (out, ordered) =
            label_by_thresholds(df, "score", "level", &[1.0, 2.0], &["Low", "Medium", "High"])
                .unwrap();

        assert_eq!(
            labels_of(&out, "level"),
            vec![
                Some("Low".to_string()),
                Some("Medium".to_string()),
                Some("High".to_string()),
                Some("High".to_string()),
            ]
        );
        assert_eq!(ordered.categories(), &["Low", "Medium", "High"]);
        assert_eq!(ordered.rank("Medium"), Some(1));
        assert_eq!(ordered.rank("Unknown"), None);
    }

    #[test]
    fn test_label_column_is_ordered_categorical() {
        let df = df!["score" => [Some(3.5), Some(0.5), None, Some(1.5), Some(2.5)]].unwrap();
        let (out, _) =
            label_by_thresholds(df, "score", "level", &[1.0, 2.0], &["Low", "Medium", "High"])
                .unwrap();

        let level = out.column("level").unwrap().as_materialized_series();
        assert!(matches!(level.dtype(), DataType::Enum(..)));
        assert_eq!(level.null_count(), 1);

        // "High" < "Low" < "Medium" as text; rank order must win
        let sorted = level
            .sort(SortOptions::default().with_nulls_last(true))
            .unwrap();
        assert_eq!(
            string_values(&sorted).unwrap(),
            vec![
                Some("Low".to_string()),
                Some("Medium".to_string()),
                Some("High".to_string()),
                Some("High".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_buckets_are_right_closed() {
        let df = df!["padj" => [0.01, 0.05, 0.051, 0.1, 0.2]].unwrap();
        let (out, _) = label_by_thresholds(
            df,
            "padj",
            "significance",
            &[0.01, 0.05, 0.1],
            &["very significant", "significant", "trend", "non-significant"],
        )
        .unwrap();

        let got: Vec<String> = labels_of(&out, "significance").into_iter().flatten().collect();
        assert_eq!(
            got,
            vec!["very significant", "significant", "trend", "trend", "non-significant"]
        );
    }

    #[test]
    fn test_missing_reference_gets_null_label() {
        let df = df!["score" => [Some(0.5), None]].unwrap();
        let (out, _) = label_by_thresholds(df, "score", "level", &[1.0], &["Low", "High"]).unwrap();
        assert_eq!(labels_of(&out, "level"), vec![Some("Low".to_string()), None]);
    }

    #[test]
    fn test_unsorted_thresholds() {
        let df = df!["score" => [1.0]].unwrap();
        let err = label_by_thresholds(df, "score", "level", &[2.0, 1.0], &["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, VolcanoError::UnsortedThresholds(_)));
    }

    #[test]
    fn test_repeated_threshold_is_unsorted() {
        let df = df!["score" => [1.0]].unwrap();
        let err = label_by_thresholds(df, "score", "level", &[1.0, 1.0], &["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, VolcanoError::UnsortedThresholds(_)));
    }

    #[test]
    fn test_label_count_mismatch() {
        let df = df!["score" => [1.0]].unwrap();
        let err = label_by_thresholds(df, "score", "level", &[1.0, 2.0], &["a", "b"]).unwrap_err();
        assert!(matches!(
            err,
            VolcanoError::LabelCountMismatch { expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn test_non_finite_threshold_checked_first() {
        let df = df!["score" => [1.0]].unwrap();
        let err = label_by_thresholds(df, "score", "level", &[f64::NAN], &["a"]).unwrap_err();
        assert!(matches!(err, VolcanoError::NonNumericThresholds(_)));
    }

    #[test]
    fn test_duplicate_labels() {
        let df = df!["score" => [1.0]].unwrap();
        let err = label_by_thresholds(df, "score", "level", &[1.0], &["a", "a"]).unwrap_err();
        assert!(matches!(err, VolcanoError::DuplicateLabels(ref l) if l == "a"));
    }

    #[test]
    fn test_reference_column_checks() {
        let df = df!["gene" => ["Actb"]].unwrap();
        let err = label_by_thresholds(df.clone(), "score", "level", &[1.0], &["a", "b"]).unwrap_err();
        assert!(matches!(err, VolcanoError::MissingColumn(_)));

        let err = label_by_thresholds(df, "gene", "level", &[1.0], &["a", "b"]).unwrap_err();
        assert!(matches!(err, VolcanoError::NonNumericColumn { .. }));
    }

    #[test]
    fn test_no_thresholds_single_bucket() {
        let df = df!["score" => [-5.0, 5.0]].unwrap();
        let (out, ordered) = label_by_thresholds(df, "score", "level", &[], &["all"]).unwrap();
        assert_eq!(ordered.len(), 1);
        assert_eq!(labels_of(&out, "level").into_iter().flatten().count(), 2);
    }

    #[test]
    fn test_counts_in_category_order() {
        let df = df!["score" => [Some(3.0), Some(0.1), Some(2.0), None]].unwrap();
        let (out, ordered) =
            label_by_thresholds(df, "score", "level", &[1.0], &["Low", "High"]).unwrap();
        let counts = ordered.counts(&out, "level").unwrap();
        assert_eq!(
            counts,
            vec![("Low".to_string(), 1), ("High".to_string(), 2)]
        );
    }
}
