//! Synthetic differential expression results for demos and tests.

use crate::error::{Result, VolcanoError};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Shape of a synthetic result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub rows: usize,
    /// Rows whose fold change and p-value are both missing.
    pub missing: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            rows: 100,
            missing: 10,
            seed: 42,
        }
    }
}

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-10..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Build a DESeq2-shaped table: `Unnamed: 0`, `row`, `log2FoldChange`, `padj`.
///
/// Fold changes are standard normal, p-values uniform on `[0, 1)`.
pub fn synthetic_results(config: SyntheticConfig) -> Result<DataFrame> {
    if config.missing > config.rows {
        return Err(VolcanoError::InvalidConfig(format!(
            "missing rows ({}) exceed total rows ({})",
            config.missing, config.rows
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let missing: HashSet<usize> = sample(&mut rng, config.rows, config.missing)
        .into_iter()
        .collect();

    let mut fold_changes = Vec::with_capacity(config.rows);
    let mut padj = Vec::with_capacity(config.rows);
    for i in 0..config.rows {
        let fc = standard_normal(&mut rng);
        let p: f64 = rng.gen_range(0.0..1.0);
        if missing.contains(&i) {
            fold_changes.push(None);
            padj.push(None);
        } else {
            fold_changes.push(Some(fc));
            padj.push(Some(p));
        }
    }

    let df = df![
        "Unnamed: 0" => (0..config.rows as i64).collect::<Vec<_>>(),
        "row" => (0..config.rows).map(|i| format!("Gene{i}")).collect::<Vec<_>>(),
        "log2FoldChange" => fold_changes,
        "padj" => padj,
    ]?;
    debug!(
        "Generated {} synthetic rows ({} missing, seed {})",
        config.rows, config.missing, config.seed
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{float_values, missing_count};

    #[test]
    fn test_shape_and_missing_rows() {
        let df = synthetic_results(SyntheticConfig::default()).unwrap();
        assert_eq!(df.shape(), (100, 4));

        let fc = df.column("log2FoldChange").unwrap().as_materialized_series();
        let padj = df.column("padj").unwrap().as_materialized_series();
        assert_eq!(missing_count(fc).unwrap(), 10);
        assert_eq!(missing_count(padj).unwrap(), 10);

        // missing values line up across both columns
        let fc = float_values(fc).unwrap();
        let padj = float_values(padj).unwrap();
        assert!(fc.iter().zip(&padj).all(|(a, b)| a.is_none() == b.is_none()));
        assert!(padj.iter().flatten().all(|p| (0.0..1.0).contains(p)));
    }

    #[test]
    fn test_standard_normal_is_centred() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<f64> = (0..4000).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(draws.iter().all(|d| d.is_finite()));
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!((var - 1.0).abs() < 0.15, "variance {var}");
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = SyntheticConfig {
            rows: 20,
            missing: 3,
            seed: 7,
        };
        let a = synthetic_results(config).unwrap();
        let b = synthetic_results(config).unwrap();
        assert!(a.equals_missing(&b));
    }

    #[test]
    fn test_missing_exceeding_rows() {
        let err = synthetic_results(SyntheticConfig {
            rows: 2,
            missing: 3,
            seed: 1,
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
