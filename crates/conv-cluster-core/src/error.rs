//! Error types for conv-cluster-core.
//!
//! Every stage of the pipeline returns [`PipelineError`]. There is no local
//! recovery: a malformed record invalidates the global statistics (scaling,
//! neighborhoods, density), so callers abort the run on the first error.
//!
//! # Examples
//!
//! ```rust
//! use conv_cluster_core::error::{PipelineError, Result};
//!
//! fn require_rows(n: usize) -> Result<()> {
//!     if n == 0 {
//!         return Err(PipelineError::EmptyInput);
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(require_rows(0), Err(PipelineError::EmptyInput)));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Unified error for all pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input collection contains zero records.
    #[error("Empty input: the record collection contains no records")]
    EmptyInput,

    /// A record lacks a required feature field.
    #[error("Missing field '{field}' in record '{record_id}'")]
    MissingField {
        /// Identifier of the offending record (or `#<index>` if it has none)
        record_id: String,
        /// Name of the missing field
        field: String,
    },

    /// A field is present but has the wrong type or a non-finite value.
    #[error("Invalid field '{field}' in record '{record_id}': {reason}")]
    InvalidField {
        /// Identifier of the offending record
        record_id: String,
        /// Name of the invalid field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// The input document does not have the expected top-level shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Too few points for the requested neighbor/cluster configuration.
    #[error("Degenerate input for {stage}: required {required} points, actual {actual}")]
    DegenerateInput {
        /// Pipeline stage that rejected the input
        stage: &'static str,
        /// Minimum number of points the configuration needs
        required: usize,
        /// Number of points supplied
        actual: usize,
    },

    /// A configuration parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two collections that must be aligned 1:1 have different lengths.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A transform was applied to a matrix with different feature columns.
    #[error("Column mismatch: fitted on {expected:?}, got {actual:?}")]
    ColumnMismatch {
        /// Columns the scaler was fitted on
        expected: Vec<String>,
        /// Columns of the matrix being transformed
        actual: Vec<String>,
    },

    /// Output could not be serialized or written.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Reading an input or configuration file failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be read, parsed or validated.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Create a `MissingField` error.
    pub fn missing_field(record_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            record_id: record_id.into(),
            field: field.into(),
        }
    }

    /// Create an `InvalidField` error.
    pub fn invalid_field(
        record_id: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            record_id: record_id.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a `DegenerateInput` error.
    pub fn degenerate(stage: &'static str, required: usize, actual: usize) -> Self {
        Self::DegenerateInput {
            stage,
            required,
            actual,
        }
    }

    /// Create an `InvalidParameter` error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create a `DimensionMismatch` error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create an `Io` error bound to a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Name of the pipeline stage this error belongs to.
    ///
    /// Used by the CLI to tell the user which stage aborted the run.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::EmptyInput
            | Self::MissingField { .. }
            | Self::InvalidField { .. }
            | Self::InvalidInput(_)
            | Self::Io { .. } => "load",
            Self::ColumnMismatch { .. } => "scale",
            Self::DegenerateInput { stage, .. } => stage,
            Self::InvalidParameter(_) | Self::Config(_) => "config",
            Self::DimensionMismatch { .. } => "annotate",
            Self::Serialization(_) => "persist",
        }
    }

    /// True when the failure happened while producing output rather than
    /// while reading or validating input.
    pub fn is_output_failure(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}
