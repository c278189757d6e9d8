//! 2D manifold projection (UMAP).
//!
//! # Algorithm
//!
//! 1. Exact k-nearest-neighbor graph of the scaled features ([`knn`])
//! 2. Fuzzy simplicial set: per-point smooth distances, fuzzy union ([`fuzzy`])
//! 3. Fit of the low-dimensional similarity curve from `min_dist` ([`curve`])
//! 4. Seeded random initialization and SGD layout ([`layout`])
//!
//! # Key Types
//!
//! - [`UmapParams`]: seed, neighborhood size, minimum distance, metric
//! - [`UmapEmbedder`]: runs the projection

pub mod curve;
pub mod embedder;
pub mod fuzzy;
pub mod knn;
pub mod layout;
pub mod params;

pub use embedder::UmapEmbedder;
pub use params::UmapParams;
