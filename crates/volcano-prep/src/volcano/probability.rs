//! Probability validation and the derived `-log10(p)` column.

use crate::error::{Result, VolcanoError};
use crate::utils::{float_values, is_float_dtype, missing_count, require_column};
use polars::prelude::*;
use tracing::debug;

/// Name given to the derived column when the caller has no preference.
pub const DEFAULT_NEG_LOG10_COLUMN: &str = "-log10(p-value)";

/// Check that every present value of `series` is a float in `[0, 1]`.
///
/// Missing values are ignored. Returns `Ok(true)` on success; any
/// violation is an error, never `Ok(false)`.
pub fn validate_probabilities(series: &Series) -> Result<bool> {
    let column = series.name().to_string();

    if missing_count(series)? == series.len() {
        return Ok(true);
    }
    if !is_float_dtype(series.dtype()) {
        return Err(VolcanoError::non_numeric(column, series.dtype()));
    }

    if let Some(value) = float_values(series)?
        .into_iter()
        .flatten()
        .find(|v| !(0.0..=1.0).contains(v))
    {
        return Err(VolcanoError::OutOfRange { column, value });
    }

    Ok(true)
}

/// `-log10(p)`; zero maps to `+inf` and missing maps to `NaN`.
#[inline]
pub fn neg_log10(p: Option<f64>) -> f64 {
    match p {
        None => f64::NAN,
        Some(0.0) => f64::INFINITY,
        Some(v) => -v.log10(),
    }
}

/// Append `output_column = -log10(source_column)` to the table.
///
/// The source column is validated first and any validation failure is
/// returned as is. An existing column named `output_column` is replaced.
pub fn derive_neg_log10(
    mut frame: DataFrame,
    source_column: &str,
    output_column: &str,
) -> Result<DataFrame> {
    let source = require_column(&frame, source_column)?;
    validate_probabilities(source)?;

    let derived: Vec<f64> = float_values(source)?.into_iter().map(neg_log10).collect();
    frame.with_column(Series::new(output_column.into(), derived))?;

    debug!("Derived '{}' from '{}'", output_column, source_column);
    Ok(frame)
}
