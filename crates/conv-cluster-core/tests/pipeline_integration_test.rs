//! End-to-end pipeline tests over real files.
//!
//! Each test writes a JSON input into a temp dir, runs a pipeline entry
//! point and inspects what landed on disk.

use std::fs;
use std::path::{Path, PathBuf};

use conv_cluster_core::clustering::ClusterInput;
use conv_cluster_core::config::PipelineConfig;
use conv_cluster_core::loader::InputSchema;
use conv_cluster_core::persist::sidecar_path;
use conv_cluster_core::pipeline::{recluster, run, summarize};
use conv_cluster_core::PipelineError;
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).expect("serialize")).expect("write input");
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read output")).expect("parse output")
}

/// Three blobs of 10 conversations each over three features.
fn three_blobs() -> Value {
    let centers = [(0.0, 0.0, 0.0), (20.0, 0.0, 10.0), (0.0, 25.0, -10.0)];
    let mut items = Vec::new();
    for (b, (cx, cy, cz)) in centers.iter().enumerate() {
        for i in 0..10 {
            let t = i as f64 * 0.07;
            items.push(json!({
                "conv_id": format!("conv-{}-{}", b, i),
                "facilitator_name": format!("fac-{}", b),
                "turn_sequence_entropy": cx + t,
                "speaking_time_gini_coefficient": cy - 0.5 * t,
                "num_turns_in_conversation": cz + 0.3 * t,
                "collection": "pilot",
            }));
        }
    }
    Value::Array(items)
}

fn blob_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.input = InputSchema {
        features: vec![
            "turn_sequence_entropy".into(),
            "speaking_time_gini_coefficient".into(),
            "num_turns_in_conversation".into(),
        ],
        ..Default::default()
    };
    config.umap = config.umap.with_n_neighbors(6).with_n_epochs(150);
    config
}

fn assert_valid_assignments(records: &[Value]) {
    let labels: Vec<i64> = records
        .iter()
        .map(|r| r["cluster"].as_i64().expect("cluster is an integer"))
        .collect();
    let num_clusters = labels.iter().copied().max().map_or(0, |m| (m + 1).max(0));
    for record in records {
        let label = record["cluster"].as_i64().expect("label");
        let prob = record["cluster_probability"].as_f64().expect("probability");
        assert!(label == -1 || (0..num_clusters).contains(&label));
        assert!((0.0..=1.0).contains(&prob));
        assert_eq!(label == -1, prob == 0.0, "record {}", record["conv_id"]);
    }
}

// =============================================================================
// run
// =============================================================================

#[test]
fn test_run_writes_annotated_records_and_sidecar() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let output = dir.path().join("out").join("umap_data.json");

    let report = run(&blob_config(), &input, &output).expect("run");
    println!("{}", report);

    assert_eq!(report.record_count, 30);
    assert!(report.embedded);
    assert_eq!(report.metadata_path, sidecar_path(&output));

    let written = read_json(&output);
    let records = written.as_array().expect("array");
    assert_eq!(records.len(), 30);
    for (i, record) in records.iter().enumerate() {
        let expected_id = format!("conv-{}-{}", i / 10, i % 10);
        assert_eq!(record["conv_id"], json!(expected_id));
        assert_eq!(record["collection"], json!("pilot"));
        assert!(record["umap_x"].is_f64());
        assert!(record["umap_y"].is_f64());
    }
    assert_valid_assignments(records);

    let meta = read_json(&report.metadata_path);
    assert_eq!(meta["record_count"], json!(30));
    assert_eq!(meta["umap_parameters"]["n_neighbors"], json!(6));
    assert_eq!(meta["umap_parameters"]["random_state"], json!(100));
    assert_eq!(meta["hdbscan_parameters"]["min_samples"], json!(3));
    assert_eq!(meta["num_clusters"], json!(report.summary.num_clusters));
    assert_eq!(meta["noise_points"], json!(report.summary.noise_points));
    assert_eq!(meta["cluster_input"], json!("embedding"));
    assert_eq!(meta["features"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_run_is_reproducible_across_files() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    run(&blob_config(), &input, &first).expect("first run");
    run(&blob_config(), &input, &second).expect("second run");

    assert_eq!(read_json(&first), read_json(&second));
}

#[test]
fn test_feature_clustering_recovers_blobs() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let output = dir.path().join("clusters.json");

    let mut config = blob_config();
    config.pipeline.embed = false;
    config.pipeline.cluster_input = ClusterInput::Features;

    let report = run(&config, &input, &output).expect("run");
    assert!(!report.embedded);
    assert_eq!(report.summary.num_clusters, 3);
    assert_eq!(report.summary.noise_points, 0);
    assert_eq!(report.summary.cluster_sizes, vec![10, 10, 10]);

    let written = read_json(&output);
    let records = written.as_array().expect("array");
    assert!(records[0].get("umap_x").is_none());
    for blob in 0..3 {
        let label = &records[blob * 10]["cluster"];
        assert!(records[blob * 10..(blob + 1) * 10]
            .iter()
            .all(|r| &r["cluster"] == label));
    }

    let meta = read_json(&report.metadata_path);
    assert!(meta.get("umap_parameters").is_none());
    assert_eq!(meta["cluster_input"], json!("features"));
}

#[test]
fn test_custom_metadata_path() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let output = dir.path().join("out.json");
    let meta_path = dir.path().join("meta").join("run.json");

    let mut config = blob_config();
    config.output.metadata_path = Some(meta_path.clone());
    config.output.pretty = false;

    let report = run(&config, &input, &output).expect("run");
    assert_eq!(report.metadata_path, meta_path);
    assert!(meta_path.exists());
    assert!(!sidecar_path(&output).exists());
    assert!(!fs::read_to_string(&output).expect("read").contains('\n'));
}

#[test]
fn test_identical_records_run_without_error() {
    let dir = TempDir::new().expect("tempdir");
    let record = json!({"conv_id": "same", "facilitator_name": "F", "a": 0.1, "b": -2.0, "c": 9.3});
    let input = write_json(dir.path(), "same.json", &json!([record, record, record]));
    let output = dir.path().join("out.json");

    let mut config = PipelineConfig::default();
    config.input.features = vec!["a".into(), "b".into(), "c".into()];
    config.umap = config.umap.with_n_neighbors(2);
    config.hdbscan.min_cluster_size = Some(3);
    config.hdbscan.min_samples = Some(2);

    let report = run(&config, &input, &output).expect("identical records must not fail");
    assert_eq!(report.summary.num_clusters, 0);
    assert_eq!(report.summary.noise_points, 3);

    let written = read_json(&output);
    for record in written.as_array().expect("array") {
        assert_eq!(record["umap_x"], json!(0.0));
        assert_eq!(record["umap_y"], json!(0.0));
        assert_eq!(record["cluster"], json!(-1));
        assert_eq!(record["cluster_probability"], json!(0.0));
    }
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_empty_input_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "empty.json", &json!([]));
    let output = dir.path().join("out.json");

    let err = run(&blob_config(), &input, &output).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyInput));
    assert!(!output.exists());
}

#[test]
fn test_missing_feature_names_the_record() {
    let dir = TempDir::new().expect("tempdir");
    let mut value = three_blobs();
    value[4]
        .as_object_mut()
        .expect("object")
        .remove("speaking_time_gini_coefficient");
    let input = write_json(dir.path(), "features.json", &value);
    let output = dir.path().join("out.json");

    let err = run(&blob_config(), &input, &output).unwrap_err();
    match err {
        PipelineError::MissingField { record_id, field } => {
            assert_eq!(record_id, "conv-0-4");
            assert_eq!(field, "speaking_time_gini_coefficient");
        }
        other => panic!("expected MissingField, got {:?}", other),
    }
    assert!(!output.exists());
    assert!(!sidecar_path(&output).exists());
}

#[test]
fn test_missing_input_file_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = run(
        &blob_config(),
        &dir.path().join("nope.json"),
        &dir.path().join("out.json"),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert!(!err.is_output_failure());
}

#[test]
fn test_unwritable_output_writes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("write blocker");
    let output = blocker.join("out.json");

    let err = run(&blob_config(), &input, &output).unwrap_err();
    assert!(err.is_output_failure());
    assert_eq!(err.stage(), "persist");
    let mut leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, vec!["blocker".to_string(), "features.json".to_string()]);
}

// =============================================================================
// recluster / summarize
// =============================================================================

/// Annotated records with coordinates in two tight groups and stale labels.
fn annotated() -> Value {
    let mut items = Vec::new();
    for i in 0..8 {
        items.push(json!({
            "conv_id": format!("a{}", i),
            "umap_x": i as f64 * 0.1,
            "umap_y": 1.0,
            "cluster": 4,
            "cluster_probability": 0.5,
        }));
    }
    for i in 0..8 {
        items.push(json!({
            "conv_id": format!("b{}", i),
            "umap_x": 30.0 + i as f64 * 0.1,
            "umap_y": -12.0,
            "cluster": 4,
            "cluster_probability": 0.5,
        }));
    }
    Value::Array(items)
}

#[test]
fn test_recluster_overwrites_in_place() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_json(dir.path(), "umap_data.json", &annotated());

    let config = PipelineConfig::recluster_defaults();
    let report = recluster(&config, &path, &path, "umap_x", "umap_y").expect("recluster");
    assert_eq!(report.summary.num_clusters, 2);
    assert_eq!(report.summary.cluster_sizes, vec![8, 8]);

    let written = read_json(&path);
    let records = written.as_array().expect("array");
    assert_eq!(records.len(), 16);
    let before = annotated();
    assert_eq!(records[3]["umap_x"], before[3]["umap_x"]);
    assert_eq!(records[3]["umap_y"], json!(1.0));
    assert_ne!(records[0]["cluster"], records[8]["cluster"]);
    assert_valid_assignments(records);

    let meta = read_json(&report.metadata_path);
    assert!(meta.get("umap_parameters").is_none());
    assert_eq!(meta["hdbscan_parameters"]["min_cluster_size"], json!(3));
    assert_eq!(meta["hdbscan_parameters"]["cluster_selection_epsilon"], json!(0.25));
    assert_eq!(meta["features"], json!(["umap_x", "umap_y"]));
}

#[test]
fn test_recluster_requires_coordinates() {
    let dir = TempDir::new().expect("tempdir");
    let input = write_json(dir.path(), "features.json", &three_blobs());
    let output = dir.path().join("out.json");

    let err = recluster(&PipelineConfig::recluster_defaults(), &input, &output, "umap_x", "umap_y")
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingField { ref field, .. } if field == "umap_x"));
    assert!(!output.exists());
}

#[test]
fn test_summarize_counts_existing_labels() {
    let dir = TempDir::new().expect("tempdir");
    let value = json!([
        {"conv_id": "c1", "cluster": 0, "cluster_probability": 0.9},
        {"conv_id": "c2", "cluster": 0, "cluster_probability": 1.0},
        {"conv_id": "c3", "cluster": 1, "cluster_probability": 0.4},
        {"conv_id": "c4", "cluster": -1, "cluster_probability": 0.0}
    ]);
    let path = write_json(dir.path(), "umap_data.json", &value);

    let summary = summarize(&PipelineConfig::default(), &path).expect("summarize");
    assert_eq!(summary.num_clusters, 2);
    assert_eq!(summary.noise_points, 1);
    assert_eq!(summary.cluster_sizes, vec![2, 1]);
}
