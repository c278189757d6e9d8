//! Pipeline driver: load → scale → embed → cluster → annotate → persist.
//!
//! Three entry points:
//!
//! - [`run`]: full pipeline over raw feature records
//! - [`recluster`]: re-cluster the coordinates of an already annotated file
//! - [`summarize`]: cluster summary of an already annotated file
//!
//! Each stage runs to completion before the next starts; the first error
//! aborts the run before anything is written.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::annotate::annotate;
use crate::clustering::{ClusterInput, ClusterPreset, ClusterResult, ClusterSummary, HdbscanClusterer};
use crate::config::PipelineConfig;
use crate::embedding::UmapEmbedder;
use crate::error::{PipelineError, Result};
use crate::loader::{
    load_assignments, load_coordinates, load_from_path, parse_records, read_json, FeatureRecord,
    LoadedRecords,
};
use crate::matrix::CoordinateMatrix;
use crate::persist::{sidecar_path, write_run, RunMetadata};
use crate::scaler::StandardScaler;

/// In-memory result of a pipeline run, before persistence.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Annotated records, input order.
    pub records: Vec<FeatureRecord>,
    /// `None` when the embedding stage was skipped.
    pub coordinates: Option<CoordinateMatrix>,
    pub clusters: ClusterResult,
    pub metadata: RunMetadata,
}

/// What a persisted run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output: PathBuf,
    pub metadata_path: PathBuf,
    pub record_count: usize,
    pub embedded: bool,
    pub summary: ClusterSummary,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records:  {}", self.record_count)?;
        write!(f, "{}", self.summary)?;
        writeln!(f, "Output:   {}", self.output.display())?;
        write!(f, "Metadata: {}", self.metadata_path.display())
    }
}

/// Scale, embed, cluster and annotate already loaded records.
///
/// # Errors
///
/// `Config` if the configuration is invalid, then any stage error.
pub fn run_records(config: &PipelineConfig, loaded: LoadedRecords) -> Result<RunOutcome> {
    config.validate()?;
    let LoadedRecords { mut records, matrix } = loaded;
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let scaled = StandardScaler::fit_transform(&matrix)?;
    info!(
        records = records.len(),
        features = scaled.n_cols(),
        "Features scaled"
    );

    let coordinates = if config.pipeline.embed {
        Some(UmapEmbedder::new(config.umap.clone()).fit_transform(&scaled)?)
    } else {
        None
    };

    let cluster_input = config.pipeline.cluster_input;
    let cluster_matrix = match (cluster_input, coordinates.as_ref()) {
        (ClusterInput::Embedding, Some(coords)) => coords,
        (ClusterInput::Embedding, None) => {
            return Err(PipelineError::Config(
                "[pipeline] clustering on the embedding requires embed = true".to_string(),
            ))
        }
        (ClusterInput::Features, _) => &scaled,
    };

    let params = config.hdbscan.resolve();
    let clusters = HdbscanClusterer::new(params.clone()).fit(cluster_matrix)?;

    annotate(&mut records, coordinates.as_ref(), &clusters.assignments)?;

    let metadata = RunMetadata::new(
        coordinates.as_ref().map(|_| &config.umap),
        &params,
        &clusters.summary,
        records.len(),
        cluster_input,
        config.input.features.clone(),
    );

    Ok(RunOutcome {
        records,
        coordinates,
        clusters,
        metadata,
    })
}

/// Re-cluster existing coordinates of annotated records, overwriting their
/// cluster fields. Coordinates are left untouched.
///
/// Uses the `granular` preset unless the configuration names one.
pub fn recluster_records(
    config: &PipelineConfig,
    mut records: Vec<FeatureRecord>,
    x_field: &str,
    y_field: &str,
) -> Result<RunOutcome> {
    config.validate()?;
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let coordinates = load_coordinates(&records, x_field, y_field)?;
    for (record, point) in records.iter_mut().zip(coordinates.rows()) {
        record.coordinates = Some([point[0], point[1]]);
    }

    let params = config.hdbscan.resolve_or(ClusterPreset::Granular);
    let clusters = HdbscanClusterer::new(params.clone()).fit(&coordinates)?;

    annotate(&mut records, None, &clusters.assignments)?;

    let metadata = RunMetadata::new(
        None,
        &params,
        &clusters.summary,
        records.len(),
        ClusterInput::Embedding,
        vec![x_field.to_string(), y_field.to_string()],
    );

    Ok(RunOutcome {
        records,
        coordinates: None,
        clusters,
        metadata,
    })
}

fn persist(config: &PipelineConfig, output: &Path, outcome: &RunOutcome) -> Result<RunReport> {
    let metadata_path = config
        .output
        .metadata_path
        .clone()
        .unwrap_or_else(|| sidecar_path(output));

    write_run(
        output,
        &metadata_path,
        &outcome.records,
        &outcome.metadata,
        config.output.pretty,
    )?;

    Ok(RunReport {
        output: output.to_path_buf(),
        metadata_path,
        record_count: outcome.records.len(),
        embedded: outcome.coordinates.is_some(),
        summary: outcome.clusters.summary.clone(),
    })
}

/// Full pipeline from a feature file to annotated output plus sidecar.
pub fn run(config: &PipelineConfig, input: &Path, output: &Path) -> Result<RunReport> {
    config.validate()?;
    let loaded = load_from_path(input, &config.input)?;
    let outcome = run_records(config, loaded)?;
    persist(config, output, &outcome)
}

/// Re-cluster the coordinates stored in `input` and write the result to
/// `output` (which may be `input` itself).
pub fn recluster(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
    x_field: &str,
    y_field: &str,
) -> Result<RunReport> {
    config.validate()?;
    let records = parse_records(read_json(input)?, &config.input)?;
    info!(path = %input.display(), records = records.len(), "Loaded annotated records");
    let outcome = recluster_records(config, records, x_field, y_field)?;
    persist(config, output, &outcome)
}

/// Cluster summary of an annotated file.
pub fn summarize(config: &PipelineConfig, input: &Path) -> Result<ClusterSummary> {
    let records = parse_records(read_json(input)?, &config.input)?;
    let assignments = load_assignments(&records)?;
    Ok(ClusterSummary::from_assignments(&assignments))
}
