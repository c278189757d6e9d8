//! Dense row-major matrices aligned 1:1 with the record collection.
//!
//! The same type carries both the feature matrix (columns = feature names)
//! and the 2D coordinate matrix produced by the embedder (columns =
//! `umap_x`, `umap_y`). Column names travel with the data so a fitted
//! transform can detect a column-order mismatch.

use serde::{Deserialize, Serialize};

use crate::config::constants::fields;
use crate::error::{PipelineError, Result};

/// Row-major dense `f64` matrix with named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

/// N×2 matrix of embedded coordinates.
pub type CoordinateMatrix = FeatureMatrix;

impl FeatureMatrix {
    /// Build a matrix from rows.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if any row length differs from `columns.len()`.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = columns.len();
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(PipelineError::dimension_mismatch(n_cols, row.len()));
            }
            data.extend(row);
        }
        Ok(Self {
            columns,
            data,
            n_rows,
        })
    }

    /// Build a matrix from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `data.len()` is not a multiple of the column count.
    pub fn from_flat(columns: Vec<String>, data: Vec<f64>) -> Result<Self> {
        let n_cols = columns.len();
        if n_cols == 0 {
            if !data.is_empty() {
                return Err(PipelineError::dimension_mismatch(0, data.len()));
            }
            return Ok(Self {
                columns,
                data,
                n_rows: 0,
            });
        }
        if data.len() % n_cols != 0 {
            return Err(PipelineError::dimension_mismatch(
                data.len().next_multiple_of(n_cols),
                data.len(),
            ));
        }
        let n_rows = data.len() / n_cols;
        Ok(Self {
            columns,
            data,
            n_rows,
        })
    }

    /// Build an N×2 coordinate matrix with the canonical output column names.
    pub fn coordinates(points: Vec<[f64; 2]>) -> Self {
        let n_rows = points.len();
        let data = points.into_iter().flatten().collect();
        Self {
            columns: vec![fields::UMAP_X.to_string(), fields::UMAP_Y.to_string()],
            data,
            n_rows,
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows()`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let n_cols = self.n_cols();
        &self.data[i * n_cols..(i + 1) * n_cols]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols() + j]
    }

    /// Copy of column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, j)).collect()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// True when every value is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// True when every row equals the first row exactly.
    ///
    /// An empty matrix is trivially identical.
    pub fn all_rows_identical(&self) -> bool {
        if self.n_rows <= 1 {
            return true;
        }
        let first = self.row(0);
        self.rows().skip(1).all(|row| row == first)
    }
}
