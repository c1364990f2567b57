//! Threshold comparison used by row filtering.

use crate::error::VolcanoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a strict threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Keep values strictly below the threshold.
    #[default]
    LessThan,
    /// Keep values strictly above the threshold.
    GreaterThan,
}

impl Comparison {
    /// Apply the comparison; a missing value never passes.
    #[inline]
    pub fn passes(self, value: Option<f64>, threshold: f64) -> bool {
        match (self, value) {
            (_, None) => false,
            (Self::LessThan, Some(v)) => v < threshold,
            (Self::GreaterThan, Some(v)) => v > threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LessThan => "less_than",
            Self::GreaterThan => "greater_than",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparison {
    type Err = VolcanoError;

    /// Parse a comparison token, ignoring case and surrounding whitespace.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "less_than" | "smaller" | "lt" | "<" => Ok(Self::LessThan),
            "greater_than" | "larger" | "gt" | ">" => Ok(Self::GreaterThan),
            _ => Err(VolcanoError::InvalidComparison(token.to_string())),
        }
    }
}
