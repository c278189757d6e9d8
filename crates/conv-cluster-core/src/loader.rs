//! Feature record loading and validation.
//!
//! Input is a JSON array of objects. Each object becomes a [`FeatureRecord`]
//! that keeps the whole source object (field order preserved) so the
//! annotated output is the input plus the derived fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::clustering::ClusterAssignment;
use crate::config::constants::{fields, DEFAULT_FEATURES};
use crate::error::{PipelineError, Result};
use crate::matrix::{CoordinateMatrix, FeatureMatrix};

/// Which fields of an input object carry the id, the facilitator and the
/// features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSchema {
    pub id_field: String,
    pub facilitator_field: String,
    /// Feature names in matrix column order.
    pub features: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            id_field: fields::CONV_ID.to_string(),
            facilitator_field: fields::FACILITATOR_NAME.to_string(),
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl InputSchema {
    /// Validate the schema.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an empty id field, an empty feature list, or
    /// duplicate feature names.
    pub fn validate(&self) -> Result<()> {
        if self.id_field.is_empty() {
            return Err(PipelineError::invalid_parameter("id_field must not be empty"));
        }
        if self.features.is_empty() {
            return Err(PipelineError::invalid_parameter("features must not be empty"));
        }
        for (i, name) in self.features.iter().enumerate() {
            if self.features[..i].contains(name) {
                return Err(PipelineError::invalid_parameter(format!(
                    "duplicate feature '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// One conversation's features plus its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: String,
    pub facilitator: Option<String>,
    /// Values in the schema's feature order (empty for coordinate-only loads).
    pub features: Vec<f64>,
    /// Source object; annotation writes the derived fields here too.
    pub raw: Map<String, Value>,
    pub coordinates: Option<[f64; 2]>,
    pub assignment: Option<ClusterAssignment>,
}

impl FeatureRecord {
    /// The record as it is written to the output array.
    pub fn to_json(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

/// Records and their feature matrix (row i ↔ record i).
#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub records: Vec<FeatureRecord>,
    pub matrix: FeatureMatrix,
}

/// Read and parse a JSON file.
///
/// # Errors
///
/// `Io` if the file cannot be read, `InvalidInput` if it is not valid JSON.
pub fn read_json(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| {
        PipelineError::InvalidInput(format!("{} is not valid JSON: {}", path.display(), e))
    })
}

/// Load feature records from a file.
pub fn load_from_path(path: impl AsRef<Path>, schema: &InputSchema) -> Result<LoadedRecords> {
    let path = path.as_ref();
    let loaded = load_records(read_json(path)?, schema)?;
    info!(
        path = %path.display(),
        records = loaded.records.len(),
        features = schema.features.len(),
        "Loaded feature records"
    );
    Ok(loaded)
}

/// Validate a JSON array into records and a feature matrix.
///
/// # Errors
///
/// - `InvalidInput` if `value` is not an array of objects
/// - `EmptyInput` if the array is empty
/// - `MissingField` if a record lacks a feature
/// - `InvalidField` if a feature is not a finite number, or the id or
///   facilitator is not a string or number
pub fn load_records(value: Value, schema: &InputSchema) -> Result<LoadedRecords> {
    schema.validate()?;
    let mut records = parse_records(value, schema)?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &mut records {
        let values = schema
            .features
            .iter()
            .map(|field| numeric_field(&record.raw, &record.id, field))
            .collect::<Result<Vec<f64>>>()?;
        record.features = values.clone();
        rows.push(values);
    }

    let matrix = FeatureMatrix::from_rows(schema.features.clone(), rows)?;
    debug!(
        n_rows = matrix.n_rows(),
        n_cols = matrix.n_cols(),
        "Feature matrix assembled"
    );
    Ok(LoadedRecords { records, matrix })
}

/// Parse records without requiring any feature (ids and raw objects only).
///
/// Used for already annotated files, where only coordinates or cluster
/// fields are read.
pub fn parse_records(value: Value, schema: &InputSchema) -> Result<Vec<FeatureRecord>> {
    let Value::Array(items) = value else {
        return Err(PipelineError::InvalidInput(format!(
            "expected a JSON array of records, found {}",
            json_type(&value)
        )));
    };
    if items.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Object(raw) = item else {
                return Err(PipelineError::InvalidInput(format!(
                    "record #{} is {}, expected an object",
                    index,
                    json_type(&item)
                )));
            };
            let fallback = format!("#{}", index);
            let id = text_field(&raw, &fallback, &schema.id_field)?.unwrap_or(fallback);
            let facilitator = text_field(&raw, &id, &schema.facilitator_field)?;
            Ok(FeatureRecord {
                id,
                facilitator,
                features: Vec::new(),
                raw,
                coordinates: None,
                assignment: None,
            })
        })
        .collect()
}

/// Extract existing 2D coordinates from annotated records.
///
/// # Errors
///
/// `MissingField` / `InvalidField` under the same rules as features.
pub fn load_coordinates(records: &[FeatureRecord], x_field: &str, y_field: &str) -> Result<CoordinateMatrix> {
    let points = records
        .iter()
        .map(|r| {
            Ok([
                numeric_field(&r.raw, &r.id, x_field)?,
                numeric_field(&r.raw, &r.id, y_field)?,
            ])
        })
        .collect::<Result<Vec<[f64; 2]>>>()?;
    Ok(CoordinateMatrix::coordinates(points))
}

/// Read `cluster` / `cluster_probability` from annotated records.
///
/// A missing probability defaults to 1.0 for clustered points and 0.0 for
/// noise.
pub fn load_assignments(records: &[FeatureRecord]) -> Result<Vec<ClusterAssignment>> {
    records
        .iter()
        .map(|r| {
            let label = match r.raw.get(fields::CLUSTER) {
                None => return Err(PipelineError::missing_field(&r.id, fields::CLUSTER)),
                Some(v) => v.as_i64().and_then(|l| i32::try_from(l).ok()).ok_or_else(|| {
                    PipelineError::invalid_field(
                        &r.id,
                        fields::CLUSTER,
                        format!("expected an integer label, found {}", v),
                    )
                })?,
            };
            if label < -1 {
                return Err(PipelineError::invalid_field(
                    &r.id,
                    fields::CLUSTER,
                    format!("label {} is below the noise label -1", label),
                ));
            }
            let probability = match r.raw.get(fields::CLUSTER_PROBABILITY) {
                None => {
                    if label < 0 {
                        0.0
                    } else {
                        1.0
                    }
                }
                Some(_) => numeric_field(&r.raw, &r.id, fields::CLUSTER_PROBABILITY)?,
            };
            Ok(ClusterAssignment::new(label, probability))
        })
        .collect()
}

fn numeric_field(raw: &Map<String, Value>, record_id: &str, field: &str) -> Result<f64> {
    let value = raw
        .get(field)
        .ok_or_else(|| PipelineError::missing_field(record_id, field))?;
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(PipelineError::invalid_field(
            record_id,
            field,
            format!("non-finite value {}", v),
        )),
        None => Err(PipelineError::invalid_field(
            record_id,
            field,
            format!("expected a number, found {}", json_type(value)),
        )),
    }
}

/// String (or number, rendered) field; `None` when absent or null.
fn text_field(raw: &Map<String, Value>, record_id: &str, field: &str) -> Result<Option<String>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(PipelineError::invalid_field(
            record_id,
            field,
            format!("expected a string, found {}", json_type(other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
