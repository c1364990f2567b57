//! Shared table helpers for the cleaning and volcano pipelines.
//!
//! Column lookups go through [`require_column`] so a missing column always
//! surfaces as [`VolcanoError::MissingColumn`] instead of a polars error.

use crate::error::{Result, VolcanoError};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a floating point type.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType holds text.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::String | DataType::Categorical(..) | DataType::Enum(..)
    )
}

// =============================================================================
// Column Access
// =============================================================================

/// Owned list of column names in table order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Check whether the table has a column with this name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Look up a column, failing with [`VolcanoError::MissingColumn`].
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    if !has_column(df, name) {
        return Err(VolcanoError::MissingColumn(name.to_string()));
    }
    Ok(df.column(name)?.as_materialized_series())
}

/// Look up a numeric column, failing on absence or a non-numeric dtype.
pub fn require_numeric_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    let series = require_column(df, name)?;
    if !is_numeric_dtype(series.dtype()) {
        return Err(VolcanoError::non_numeric(name, series.dtype()));
    }
    Ok(series)
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Read a numeric series as `f64`, mapping null and NaN to `None`.
pub fn float_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Per-row missing flags: null cells, plus NaN cells of float columns.
pub fn missing_mask(series: &Series) -> Result<Vec<bool>> {
    if is_float_dtype(series.dtype()) {
        return Ok(float_values(series)?.iter().map(Option::is_none).collect());
    }
    Ok(series
        .is_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect())
}

/// Count missing cells (null or NaN) in a series.
pub fn missing_count(series: &Series) -> Result<usize> {
    Ok(missing_mask(series)?.into_iter().filter(|m| *m).count())
}

/// Read a text series as owned strings, keeping nulls as `None`.
pub fn string_values(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Keep the rows whose mask entry is `true`.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    Ok(df.filter(&mask)?)
}

// =============================================================================
// Tests
// =============================================================================
