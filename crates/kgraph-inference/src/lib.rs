//! KGraph inference
//!
//! Native documents describing the same entity (sharing an identifier,
//! transitively) are merged into one inferred instance. A run is triggered by
//! one document and yields the INSERT / UPDATE / DELETE events that bring the
//! inferred stage up to date; applying them is the host's job.
//!
//! - [`reconcile`]: discovery, partitioning, merging and event emission
//! - [`inferred`]: inferred documents and their per-property alternatives
//! - [`union_find`]: the partitioning primitive

pub mod inferred;
pub mod reconcile;
pub mod union_find;

pub use inferred::{Alternative, InferredDocument};
pub use reconcile::{
    compare_inferred_instances, extract_reconcile_units, InferenceResult, InvolvedPayloads, Reconciler,
};
pub use union_find::UnionFind;
