//! Output persistence: annotated records plus the run metadata sidecar.
//!
//! Both documents are serialized in memory first, then written to temp
//! files and renamed into place. A previous output is moved aside before
//! the renames and put back if either of them fails, so an error leaves
//! the previous outputs (or nothing) on disk.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::clustering::{ClusterInput, ClusterSelectionMethod, ClusterSummary, HdbscanParams};
use crate::embedding::UmapParams;
use crate::error::{PipelineError, Result};
use crate::loader::FeatureRecord;
use crate::metric::DistanceMetric;

/// Embedding parameters recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmapParameters {
    pub random_state: u64,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub metric: DistanceMetric,
}

impl From<&UmapParams> for UmapParameters {
    fn from(p: &UmapParams) -> Self {
        Self {
            random_state: p.random_state,
            n_neighbors: p.n_neighbors,
            min_dist: p.min_dist,
            metric: p.metric,
        }
    }
}

/// Clustering parameters recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdbscanParameters {
    pub min_cluster_size: usize,
    pub min_samples: usize,
    pub metric: DistanceMetric,
    pub cluster_selection_epsilon: f64,
    pub cluster_selection_method: ClusterSelectionMethod,
}

impl From<&HdbscanParams> for HdbscanParameters {
    fn from(p: &HdbscanParams) -> Self {
        Self {
            min_cluster_size: p.min_cluster_size,
            min_samples: p.min_samples,
            metric: p.metric,
            cluster_selection_epsilon: p.cluster_selection_epsilon,
            cluster_selection_method: p.cluster_selection_method,
        }
    }
}

/// Parameters and summary counts of one run. Written once, next to the
/// output records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Absent when the run re-clustered existing coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub umap_parameters: Option<UmapParameters>,
    pub hdbscan_parameters: HdbscanParameters,
    pub num_clusters: usize,
    pub noise_points: usize,
    pub cluster_sizes: Vec<usize>,
    pub record_count: usize,
    pub cluster_input: ClusterInput,
    pub features: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new(
        umap: Option<&UmapParams>,
        hdbscan: &HdbscanParams,
        summary: &ClusterSummary,
        record_count: usize,
        cluster_input: ClusterInput,
        features: Vec<String>,
    ) -> Self {
        Self {
            umap_parameters: umap.map(UmapParameters::from),
            hdbscan_parameters: HdbscanParameters::from(hdbscan),
            num_clusters: summary.num_clusters,
            noise_points: summary.noise_points,
            cluster_sizes: summary.cluster_sizes.clone(),
            record_count,
            cluster_input,
            features,
            generated_at: Utc::now(),
        }
    }
}

/// `<dir>/<stem>.metadata.json` for an output at `<dir>/<stem>.<ext>`.
pub fn sidecar_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}.metadata.json", stem))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

fn reject_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        error!("persist error: {} is a directory", path.display());
        return Err(PipelineError::Serialization(format!(
            "cannot write {}: path is a directory",
            path.display()
        )));
    }
    Ok(())
}

/// Move an existing file at `path` to its backup location.
fn stash_previous(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(|e| {
        error!("persist error: cannot back up {}: {}", path.display(), e);
        PipelineError::Serialization(format!("failed to back up {}: {}", path.display(), e))
    })?;
    Ok(Some(backup))
}

/// Put `path` back the way `stash_previous` found it.
fn restore_previous(path: &Path, backup: Option<&Path>) {
    let restored = match backup {
        Some(backup) => fs::rename(backup, path),
        None => fs::remove_file(path),
    };
    if let Err(e) = restored {
        error!("persist error: cannot restore {}: {}", path.display(), e);
    }
}

fn to_bytes<T: Serialize>(value: &T, pretty: bool, what: &str) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    bytes.map_err(|e| {
        error!("persist error: {} serialization failed: {}", what, e);
        PipelineError::Serialization(format!("{} serialization failed: {}", what, e))
    })
}

fn write_temp(path: &Path, data: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            error!("persist error: cannot create {}: {}", parent.display(), e);
            PipelineError::Serialization(format!(
                "failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let temp = temp_path(path);
    fs::write(&temp, data).map_err(|e| {
        error!("persist error: write failed: {}", e);
        PipelineError::Serialization(format!("failed to write {}: {}", temp.display(), e))
    })?;
    Ok(temp)
}

fn commit(temp: &Path, path: &Path) -> Result<()> {
    fs::rename(temp, path).map_err(|e| {
        error!("persist error: rename failed: {}", e);
        let _ = fs::remove_file(temp);
        PipelineError::Serialization(format!("failed to move output into {}: {}", path.display(), e))
    })
}

/// Write the annotated records to `output` and the metadata to
/// `metadata_path`.
///
/// # Errors
///
/// `Serialization` if either document cannot be serialized or written, or
/// if either target is an existing directory.
pub fn write_run(
    output: &Path,
    metadata_path: &Path,
    records: &[FeatureRecord],
    metadata: &RunMetadata,
    pretty: bool,
) -> Result<()> {
    reject_directory(output)?;
    reject_directory(metadata_path)?;

    let array = Value::Array(records.iter().map(FeatureRecord::to_json).collect());
    let record_bytes = to_bytes(&array, pretty, "records")?;
    let metadata_bytes = to_bytes(metadata, true, "metadata")?;

    let records_temp = write_temp(output, &record_bytes)?;
    let metadata_temp = match write_temp(metadata_path, &metadata_bytes) {
        Ok(temp) => temp,
        Err(e) => {
            let _ = fs::remove_file(&records_temp);
            return Err(e);
        }
    };

    let backup = match stash_previous(output) {
        Ok(backup) => backup,
        Err(e) => {
            let _ = fs::remove_file(&records_temp);
            let _ = fs::remove_file(&metadata_temp);
            return Err(e);
        }
    };

    if let Err(e) = commit(&records_temp, output) {
        let _ = fs::remove_file(&metadata_temp);
        if let Some(backup) = &backup {
            restore_previous(output, Some(backup));
        }
        return Err(e);
    }
    if let Err(e) = commit(&metadata_temp, metadata_path) {
        restore_previous(output, backup.as_deref());
        return Err(e);
    }
    if let Some(backup) = &backup {
        let _ = fs::remove_file(backup);
    }

    info!(
        output = %output.display(),
        metadata = %metadata_path.display(),
        records = records.len(),
        num_clusters = metadata.num_clusters,
        "Run persisted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{parse_records, InputSchema};
    use serde_json::json;

    fn records() -> Vec<FeatureRecord> {
        parse_records(json!([{"conv_id": "c1", "cluster": 0}]), &InputSchema::default())
            .expect("records")
    }

    fn metadata(umap: Option<&UmapParams>) -> RunMetadata {
        RunMetadata::new(
            umap,
            &HdbscanParams::default(),
            &ClusterSummary::from_labels([0]),
            1,
            ClusterInput::Embedding,
            vec!["a".into()],
        )
    }

    #[test]
    fn test_sidecar_path_uses_stem() {
        assert_eq!(
            sidecar_path(Path::new("out/umap_data.json")),
            PathBuf::from("out/umap_data.metadata.json")
        );
        assert_eq!(sidecar_path(Path::new("data")), PathBuf::from("data.metadata.json"));
    }

    #[test]
    fn test_write_run_writes_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("nested").join("out.json");
        let meta_path = sidecar_path(&output);

        write_run(&output, &meta_path, &records(), &metadata(Some(&UmapParams::default())), true)
            .expect("write");

        let written: Value = serde_json::from_str(&fs::read_to_string(&output).expect("read")).expect("json");
        assert_eq!(written, json!([{"conv_id": "c1", "cluster": 0}]));

        let meta: Value = serde_json::from_str(&fs::read_to_string(&meta_path).expect("read")).expect("json");
        assert_eq!(meta["umap_parameters"]["random_state"], json!(100));
        assert_eq!(meta["umap_parameters"]["metric"], json!("euclidean"));
        assert_eq!(meta["hdbscan_parameters"]["min_cluster_size"], json!(5));
        assert_eq!(meta["hdbscan_parameters"]["cluster_selection_method"], json!("eom"));
        assert_eq!(meta["num_clusters"], json!(1));
        assert_eq!(meta["cluster_input"], json!("embedding"));
        assert!(meta["generated_at"].is_string());

        assert!(!temp_path(&output).exists());
        assert!(!temp_path(&meta_path).exists());
    }

    #[test]
    fn test_umap_parameters_omitted_without_embedding() {
        let json = serde_json::to_value(metadata(None)).expect("json");
        assert!(json.get("umap_parameters").is_none());
        assert!(json.get("hdbscan_parameters").is_some());
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("write");

        let output = dir.path().join("out.json");
        let meta_path = blocker.join("out.metadata.json");
        let err = write_run(&output, &meta_path, &records(), &metadata(None), false).unwrap_err();

        assert!(err.is_output_failure());
        assert!(!output.exists());
        assert!(!temp_path(&output).exists());
    }

    #[test]
    fn test_directory_metadata_keeps_previous_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.json");
        fs::write(&output, "OLD").expect("write");
        let meta_path = dir.path().join("meta");
        fs::create_dir(&meta_path).expect("mkdir");
        fs::write(meta_path.join("keep.txt"), "x").expect("write");

        let err = write_run(&output, &meta_path, &records(), &metadata(None), false).unwrap_err();

        assert!(err.is_output_failure());
        assert_eq!(fs::read_to_string(&output).expect("read"), "OLD");
        assert!(meta_path.join("keep.txt").exists());
        assert!(!temp_path(&output).exists());
        assert!(!temp_path(&meta_path).exists());
        assert!(!backup_path(&output).exists());
    }

    #[test]
    fn test_restore_previous_undoes_stash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.json");
        fs::write(&output, "OLD").expect("write");

        let backup = stash_previous(&output).expect("stash");
        assert_eq!(backup.as_deref(), Some(backup_path(&output).as_path()));
        fs::write(&output, "NEW").expect("write");

        restore_previous(&output, backup.as_deref());
        assert_eq!(fs::read_to_string(&output).expect("read"), "OLD");
        assert!(!backup_path(&output).exists());
    }

    #[test]
    fn test_restore_without_previous_removes_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.json");

        assert_eq!(stash_previous(&output).expect("stash"), None);
        fs::write(&output, "NEW").expect("write");

        restore_previous(&output, None);
        assert!(!output.exists());
    }

    #[test]
    fn test_overwrite_replaces_previous_and_drops_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.json");
        fs::write(&output, "OLD").expect("write");
        let meta_path = sidecar_path(&output);

        write_run(&output, &meta_path, &records(), &metadata(None), false).expect("write");

        let written: Value = serde_json::from_str(&fs::read_to_string(&output).expect("read")).expect("json");
        assert_eq!(written, json!([{"conv_id": "c1", "cluster": 0}]));
        assert!(!backup_path(&output).exists());
    }
}
