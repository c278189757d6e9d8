//! Per-column standardization (z-scores).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::matrix::FeatureMatrix;

/// Standard scaler: `(x - mean) / std` per column, population std (ddof 0).
///
/// Zero-variance columns get scale 1.0, so they transform to constant 0.0.
///
/// # Example
///
/// ```
/// use conv_cluster_core::matrix::FeatureMatrix;
/// use conv_cluster_core::scaler::StandardScaler;
///
/// let m = FeatureMatrix::from_rows(vec!["a".into()], vec![vec![1.0], vec![3.0]]).unwrap();
/// let scaled = StandardScaler::fit_transform(&m).unwrap();
/// assert_eq!(scaled.column(0), vec![-1.0, 1.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

/// Mean and population standard deviation.
fn column_moments(column: &[f64]) -> (f64, f64) {
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    ///
    /// # Errors
    ///
    /// `EmptyInput` if the matrix has no rows.
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self> {
        let n = matrix.n_rows();
        if n == 0 {
            return Err(PipelineError::EmptyInput);
        }

        let mut means = Vec::with_capacity(matrix.n_cols());
        let mut scales = Vec::with_capacity(matrix.n_cols());
        for (j, name) in matrix.columns().iter().enumerate() {
            let column = matrix.column(j);
            let (mean, std) = column_moments(&column);

            // Constant columns keep their exact value as mean so every
            // scaled entry is exactly 0.0.
            if std > 10.0 * f64::EPSILON * mean.abs() && std.is_finite() {
                means.push(mean);
                scales.push(std);
            } else {
                warn!(column = %name, "Zero-variance feature column; scaled values will be 0.0");
                means.push(if column.iter().all(|&v| v == column[0]) { column[0] } else { mean });
                scales.push(1.0);
            }
        }

        debug!(n_rows = n, n_cols = matrix.n_cols(), "StandardScaler fitted");

        Ok(Self {
            columns: matrix.columns().to_vec(),
            means,
            scales,
        })
    }

    /// Apply the fitted transform.
    ///
    /// # Errors
    ///
    /// `ColumnMismatch` if `matrix` does not have the fitted columns in the
    /// fitted order.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if matrix.columns() != self.columns.as_slice() {
            return Err(PipelineError::ColumnMismatch {
                expected: self.columns.clone(),
                actual: matrix.columns().to_vec(),
            });
        }

        let n_cols = self.columns.len();
        let data: Vec<f64> = matrix
            .as_slice()
            .iter()
            .enumerate()
            .map(|(idx, &v)| {
                let j = idx % n_cols;
                (v - self.means[j]) / self.scales[j]
            })
            .collect();

        FeatureMatrix::from_flat(self.columns.clone(), data)
    }

    /// `fit` followed by `transform` on the same matrix.
    pub fn fit_transform(matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        Self::fit(matrix)?.transform(matrix)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Per-column divisor (1.0 for zero-variance columns).
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}
