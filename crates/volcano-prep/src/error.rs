//! Error types for the cleaning and volcano preparation pipelines.
//!
//! Every pipeline failure maps onto one [`VolcanoError`] variant so callers
//! can match on the kind of failure instead of parsing messages.
//!
//! Errors are serializable as `{ code, message }` so the CLI can emit them
//! in its JSON output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum VolcanoError {
    /// Input file extension is neither `.csv` nor `.xlsx`.
    #[error("File format not supported: '{0}' (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    /// Input file could not be located.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    MissingColumn(String),

    /// Comparison token is neither a less-than nor a greater-than form.
    #[error("Invalid comparison '{0}': expected 'less_than' or 'greater_than'")]
    InvalidComparison(String),

    /// Column holds values of the wrong type for a numeric operation.
    #[error("Column '{column}' must be numeric, found {dtype}")]
    NonNumericColumn { column: String, dtype: String },

    /// Probability column holds a value outside [0, 1].
    #[error("Column '{column}' contains value {value} outside the range [0, 1]")]
    OutOfRange { column: String, value: f64 },

    /// A threshold is not a finite number.
    #[error("All thresholds must be finite numeric values, found {0}")]
    NonNumericThresholds(f64),

    /// Labels must number exactly one more than thresholds.
    #[error("Expected {expected} labels for {thresholds} thresholds, found {found}")]
    LabelCountMismatch {
        thresholds: usize,
        expected: usize,
        found: usize,
    },

    /// Thresholds are not strictly ascending.
    #[error("Thresholds must be sorted in strictly ascending order: {0:?}")]
    UnsortedThresholds(Vec<f64>),

    /// A label appears more than once.
    #[error("Label '{0}' appears more than once")]
    DuplicateLabels(String),

    /// Top-N count is not a positive integer.
    #[error("n must be a positive integer, found {0}")]
    InvalidN(i64),

    /// Top-N count exceeds the rows available.
    #[error("n = {requested} exceeds the {available} rows available")]
    NInsufficientRows { requested: usize, available: usize },

    /// Argument has the wrong shape or type for the operation.
    #[error("Invalid argument: {0}")]
    InvalidArgumentType(String),

    /// A remote enrichment lookup failed (network or decode).
    #[error("Remote lookup failed for '{gene}': {reason}")]
    RemoteLookupFailed { gene: String, reason: String },

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rendering a plot failed.
    #[error("Plot rendering failed: {0}")]
    Plot(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Spreadsheet reader error wrapper.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "enrichment" feature).
    #[cfg(feature = "enrichment")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VolcanoError>,
    },
}

impl VolcanoError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VolcanoError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a [`VolcanoError::NonNumericColumn`] from a column name and dtype.
    pub fn non_numeric(column: impl Into<String>, dtype: &polars::prelude::DataType) -> Self {
        VolcanoError::NonNumericColumn {
            column: column.into(),
            dtype: dtype.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::InvalidComparison(_) => "INVALID_COMPARISON",
            Self::NonNumericColumn { .. } => "NON_NUMERIC_COLUMN",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::NonNumericThresholds(_) => "NON_NUMERIC_THRESHOLDS",
            Self::LabelCountMismatch { .. } => "LABEL_COUNT_MISMATCH",
            Self::UnsortedThresholds(_) => "UNSORTED_THRESHOLDS",
            Self::DuplicateLabels(_) => "DUPLICATE_LABELS",
            Self::InvalidN(_) => "INVALID_N",
            Self::NInsufficientRows { .. } => "N_INSUFFICIENT_ROWS",
            Self::InvalidArgumentType(_) => "INVALID_ARGUMENT_TYPE",
            Self::RemoteLookupFailed { .. } => "REMOTE_LOOKUP_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Plot(_) => "PLOT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "enrichment")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is recovered per gene instead of aborting a batch.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RemoteLookupFailed { .. } => true,
            #[cfg(feature = "enrichment")]
            Self::HttpRequest(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl Serialize for VolcanoError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("VolcanoError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, VolcanoError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| VolcanoError::Polars(e).with_context(context))
    }
}
