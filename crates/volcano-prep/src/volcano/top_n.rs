//! Top-N row selection with ties at the cutoff included.

use crate::error::{Result, VolcanoError};
use crate::utils::{float_values, require_numeric_column};
use polars::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// Stable ordering of row positions by value, missing values last.
fn sorted_positions(values: &[Option<f64>], highest: bool) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..values.len()).collect();
    positions.sort_by(|&a, &b| match (values[a], values[b]) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if highest { ord.reverse() } else { ord }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    positions
}

/// Select the `n` most extreme rows of `ref_column`, plus every row tied
/// with the `n`th.
///
/// Rows are sorted descending when `highest`, ascending otherwise, with
/// equal values keeping their input order. The threshold is the value at
/// sorted position `n` (1-indexed). The returned subset holds every row at
/// or beyond the threshold, in sorted order, so it may exceed `n` rows.
///
/// # Errors
///
/// - [`VolcanoError::InvalidN`] unless `n > 0`
/// - [`VolcanoError::MissingColumn`] / [`VolcanoError::NonNumericColumn`]
///   for the reference column
/// - [`VolcanoError::NInsufficientRows`] if fewer than `n` rows hold a value
pub fn select_top_n(
    frame: &DataFrame,
    ref_column: &str,
    n: i64,
    highest: bool,
) -> Result<(DataFrame, f64)> {
    if n <= 0 {
        return Err(VolcanoError::InvalidN(n));
    }
    let values = float_values(require_numeric_column(frame, ref_column)?)?;

    let requested = usize::try_from(n).map_err(|_| VolcanoError::InvalidN(n))?;
    if requested > frame.height() {
        return Err(VolcanoError::NInsufficientRows {
            requested,
            available: frame.height(),
        });
    }

    let positions = sorted_positions(&values, highest);
    let threshold = values[positions[requested - 1]].ok_or_else(|| {
        VolcanoError::NInsufficientRows {
            requested,
            available: values.iter().flatten().count(),
        }
    })?;

    let selected: Vec<IdxSize> = positions
        .into_iter()
        .take_while(|&pos| match values[pos] {
            Some(v) if highest => v >= threshold,
            Some(v) => v <= threshold,
            None => false,
        })
        .map(|pos| pos as IdxSize)
        .collect();

    let subset = frame.take(&IdxCa::from_vec("positions".into(), selected))?;
    debug!(
        "Top {} by '{}' ({}): threshold {}, {} rows selected",
        n,
        ref_column,
        if highest { "highest" } else { "lowest" },
        threshold,
        subset.height()
    );

    Ok((subset, threshold))
}
