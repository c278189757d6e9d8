//! Merge coordinates and cluster assignments back into the records.

use serde_json::{Number, Value};
use tracing::debug;

use crate::clustering::ClusterAssignment;
use crate::config::constants::fields;
use crate::error::{PipelineError, Result};
use crate::loader::FeatureRecord;
use crate::matrix::CoordinateMatrix;

/// Write `umap_x`/`umap_y` (when `coordinates` is given), `cluster` and
/// `cluster_probability` into each record, in order.
///
/// Existing values are overwritten, so annotating twice with the same
/// inputs gives the same records. Without coordinates the existing
/// coordinate fields are left as they are.
///
/// # Errors
///
/// `DimensionMismatch` if `coordinates` or `assignments` do not have one row
/// per record, or `coordinates` is not N×2.
pub fn annotate(
    records: &mut [FeatureRecord],
    coordinates: Option<&CoordinateMatrix>,
    assignments: &[ClusterAssignment],
) -> Result<()> {
    if assignments.len() != records.len() {
        return Err(PipelineError::dimension_mismatch(records.len(), assignments.len()));
    }
    if let Some(coords) = coordinates {
        if coords.n_rows() != records.len() {
            return Err(PipelineError::dimension_mismatch(records.len(), coords.n_rows()));
        }
        if coords.n_cols() != 2 {
            return Err(PipelineError::dimension_mismatch(2, coords.n_cols()));
        }
    }

    for (i, (record, assignment)) in records.iter_mut().zip(assignments).enumerate() {
        if let Some(coords) = coordinates {
            let point = [coords.get(i, 0), coords.get(i, 1)];
            record.raw.insert(fields::UMAP_X.to_string(), float_value(point[0])?);
            record.raw.insert(fields::UMAP_Y.to_string(), float_value(point[1])?);
            record.coordinates = Some(point);
        }

        record
            .raw
            .insert(fields::CLUSTER.to_string(), Value::from(assignment.label));
        record.raw.insert(
            fields::CLUSTER_PROBABILITY.to_string(),
            float_value(assignment.probability)?,
        );
        record.assignment = Some(*assignment);
    }

    debug!(
        records = records.len(),
        with_coordinates = coordinates.is_some(),
        "Records annotated"
    );
    Ok(())
}

fn float_value(v: f64) -> Result<Value> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| PipelineError::Serialization(format!("cannot represent {} in JSON", v)))
}
