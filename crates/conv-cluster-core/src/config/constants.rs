//! Centralized constants for the pipeline.
//!
//! Field names, the default feature list, and the numeric constants of the
//! UMAP projection live here so the loader, the annotator and the tests agree
//! on a single source of truth.

/// JSON field names read from input records and written to output records.
pub mod fields {
    /// Default conversation identifier field.
    pub const CONV_ID: &str = "conv_id";

    /// Default facilitator name field.
    pub const FACILITATOR_NAME: &str = "facilitator_name";

    /// First embedded coordinate.
    pub const UMAP_X: &str = "umap_x";

    /// Second embedded coordinate.
    pub const UMAP_Y: &str = "umap_y";

    /// Cluster label (-1 = noise).
    pub const CLUSTER: &str = "cluster";

    /// Cluster membership probability in [0, 1].
    pub const CLUSTER_PROBABILITY: &str = "cluster_probability";
}

/// Numeric conversation features, in matrix column order.
///
/// `turn_count_variance` is excluded.
pub const DEFAULT_FEATURES: [&str; 23] = [
    "num_turns_in_conversation",
    "num_turns_facilitator",
    "num_observed_speakers",
    "avg_subst_responded_rate",
    "avg_mech_responded_rate",
    "avg_subst_responded_rate_nonself",
    "avg_subst_responded_rate_nonself_nonfac",
    "avg_subst_responded_rate_nonself_exclfac",
    "avg_subst_responded_rate_nonself_nonfac_exclfac",
    "gini_subst_responded_rate_nonself",
    "gini_subst_responded_rate_nonself_nonfac",
    "gini_subst_responded_rate_nonself_exclfac",
    "gini_subst_responded_rate_nonself_nonfac_exclfac",
    "total_turns_in_conversation",
    "total_speaking_time_seconds",
    "facilitator_speaking_percentage",
    "facilitator_turns_percentage",
    "speaking_time_gini_coefficient",
    "turn_distribution_gini_coefficient",
    "non_facilitator_speaking_gini_coefficient",
    "non_facilitator_turn_gini_coefficient",
    "turn_sequence_entropy",
    "substantive_responsivity_entropy",
];

/// Constants of the UMAP projection.
pub mod umap {
    /// Default random seed.
    pub const RANDOM_STATE: u64 = 100;

    /// Default neighborhood size.
    pub const N_NEIGHBORS: usize = 15;

    /// Default minimum distance between embedded points.
    pub const MIN_DIST: f64 = 0.1;

    /// Default effective scale of embedded points.
    pub const SPREAD: f64 = 1.0;

    /// Default initial SGD learning rate.
    pub const LEARNING_RATE: f64 = 1.0;

    /// Negative samples drawn per positive edge sample.
    pub const NEGATIVE_SAMPLE_RATE: usize = 5;

    /// Weight of negative samples in the cross-entropy objective.
    pub const REPULSION_STRENGTH: f64 = 1.0;

    /// Epoch count for datasets up to [`LARGE_DATASET_THRESHOLD`] points.
    pub const SMALL_DATASET_EPOCHS: usize = 500;

    /// Epoch count for larger datasets.
    pub const LARGE_DATASET_EPOCHS: usize = 200;

    pub const LARGE_DATASET_THRESHOLD: usize = 10_000;

    /// Number of nearest neighbors assumed locally connected.
    pub const LOCAL_CONNECTIVITY: f64 = 1.0;

    /// Binary search iterations for the per-point bandwidth.
    pub const SMOOTH_K_ITERATIONS: usize = 64;

    /// Convergence tolerance of the bandwidth search.
    pub const SMOOTH_K_TOLERANCE: f64 = 1e-5;

    /// Floor for the bandwidth, as a fraction of the mean neighbor distance.
    pub const MIN_K_DIST_SCALE: f64 = 1e-3;

    /// Gradient clip bound per coordinate.
    pub const GRADIENT_CLIP: f64 = 4.0;

    /// Half-width of the uniform random initialization box.
    pub const INIT_BOX: f64 = 10.0;

    /// Number of sample points used to fit the (a, b) curve.
    pub const CURVE_SAMPLES: usize = 300;
}
