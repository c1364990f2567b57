//! Cleaning pipeline for differential expression tables.
//!
//! [`CleaningPipeline`] owns a table and applies chainable, validated
//! operations to it:
//! - Removing a column
//! - Dropping rows with missing values (null, or NaN in float columns)
//! - Filtering rows by a strict threshold comparison
//! - Restricting rows to a set of allowed gene names
//!
//! Every operation validates its arguments before touching the table, so a
//! failed call leaves the held table unchanged.

mod comparison;

pub use comparison::Comparison;

use crate::error::{Result, VolcanoError};
use crate::loader::TableLoader;
use crate::utils::{
    column_names, filter_rows, float_values, is_string_dtype, missing_mask, require_column,
    require_numeric_column, string_values,
};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A table under cleaning, plus the source it was loaded from.
///
/// # Example
///
/// ```rust,ignore
/// use volcano_prep::CleaningPipeline;
///
/// let mut pipeline = CleaningPipeline::from_path("results_deseq2.xlsx")?;
/// pipeline
///     .remove_column("Unnamed: 0")?
///     .drop_missing(None)?
///     .filter_threshold("padj", 0.1, "smaller")?;
/// let cleaned = pipeline.into_frame();
/// ```
#[derive(Debug, Clone)]
pub struct CleaningPipeline {
    source: PathBuf,
    frame: DataFrame,
}

static_assertions::assert_impl_all!(CleaningPipeline: Send, Sync);

impl CleaningPipeline {
    /// Load a table eagerly and wrap it in a pipeline.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let frame = TableLoader::load(path)?;
        Ok(Self {
            source: path.to_path_buf(),
            frame,
        })
    }

    /// Wrap an in-memory table.
    pub fn from_frame(source: impl Into<PathBuf>, frame: DataFrame) -> Self {
        Self {
            source: source.into(),
            frame,
        }
    }

    /// Path the table was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Current state of the table.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Remove every row with a missing value in any of `columns`.
    ///
    /// `None` or an empty slice checks every column. Named columns must exist.
    pub fn drop_missing(&mut self, columns: Option<&[&str]>) -> Result<&mut Self> {
        let targets: Vec<String> = match columns {
            Some(cols) if !cols.is_empty() => {
                for col in cols {
                    require_column(&self.frame, col)?;
                }
                cols.iter().map(|c| c.to_string()).collect()
            }
            _ => column_names(&self.frame),
        };

        let mut keep = vec![true; self.frame.height()];
        for name in &targets {
            let mask = missing_mask(require_column(&self.frame, name)?)?;
            for (k, missing) in keep.iter_mut().zip(mask) {
                *k &= !missing;
            }
        }

        let before = self.frame.height();
        if keep.iter().all(|k| *k) {
            debug!("No rows with missing values in {} columns", targets.len());
            return Ok(self);
        }

        self.frame = filter_rows(&self.frame, &keep)?;
        debug!(
            "Dropped {} rows with missing values ({} -> {})",
            before - self.frame.height(),
            before,
            self.frame.height()
        );
        Ok(self)
    }

    /// Keep rows whose `column` value strictly satisfies `comparison` against
    /// `threshold`. The comparison token is parsed case-insensitively.
    pub fn filter_threshold(
        &mut self,
        column: &str,
        threshold: f64,
        comparison: &str,
    ) -> Result<&mut Self> {
        require_column(&self.frame, column)?;
        let comparison: Comparison = comparison.parse()?;
        self.filter_by(column, threshold, comparison)
    }

    /// Typed form of [`CleaningPipeline::filter_threshold`].
    pub fn filter_by(
        &mut self,
        column: &str,
        threshold: f64,
        comparison: Comparison,
    ) -> Result<&mut Self> {
        let values = float_values(require_numeric_column(&self.frame, column)?)?;
        let keep: Vec<bool> = values
            .into_iter()
            .map(|v| comparison.passes(v, threshold))
            .collect();

        let before = self.frame.height();
        self.frame = filter_rows(&self.frame, &keep)?;
        debug!(
            "Filtered '{}' {} {}: {} -> {} rows",
            column,
            comparison,
            threshold,
            before,
            self.frame.height()
        );
        Ok(self)
    }

    /// Delete a column from the table.
    pub fn remove_column(&mut self, column: &str) -> Result<&mut Self> {
        require_column(&self.frame, column)?;
        self.frame = self.frame.drop(column)?;
        debug!("Removed column '{}'", column);
        Ok(self)
    }

    /// Keep rows whose gene name in `gene_column` is in `allowed`.
    pub fn filter_genes(&mut self, gene_column: &str, allowed: &HashSet<String>) -> Result<&mut Self> {
        let series = require_column(&self.frame, gene_column)?;
        if !is_string_dtype(series.dtype()) {
            return Err(VolcanoError::InvalidArgumentType(format!(
                "gene column '{}' must hold strings, found {}",
                gene_column,
                series.dtype()
            )));
        }

        let keep: Vec<bool> = string_values(series)?
            .into_iter()
            .map(|gene| gene.is_some_and(|g| allowed.contains(&g)))
            .collect();

        let before = self.frame.height();
        self.frame = filter_rows(&self.frame, &keep)?;
        debug!(
            "Kept {} of {} genes present in the allowed set",
            self.frame.height(),
            before
        );
        Ok(self)
    }

    /// Apply column removal, missing-value removal and threshold filtering,
    /// in that order, and return the resulting table.
    ///
    /// Row positions of a `DataFrame` are always dense, so the returned
    /// table is indexed `0..height` with no gaps. A failure in a later step
    /// leaves the effects of earlier steps in place.
    pub fn clean(
        &mut self,
        column_to_filter: &str,
        threshold: f64,
        comparison: &str,
        column_to_remove: &str,
    ) -> Result<DataFrame> {
        let rows_before = self.frame.height();
        info!("Cleaning table from {}", self.source.display());

        self.remove_column(column_to_remove)?
            .drop_missing(None)?
            .filter_threshold(column_to_filter, threshold, comparison)?;

        info!(
            "Cleaning complete: {} -> {} rows, {} columns",
            rows_before,
            self.frame.height(),
            self.frame.width()
        );
        Ok(self.frame.clone())
    }
}
