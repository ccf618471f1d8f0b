//! KGraph structure maintenance
//!
//! Keeps the derived structure graph consistent with the instances being
//! ingested:
//!
//! - [`meta`]: vertices standing for types, spaces, properties and value kinds
//! - [`static_structure`]: the global vertices and edges a document requires
//! - [`tracker`]: per-document relations, link registration and type-drift repair
//! - [`semantics`]: operations contributed by meta-definition documents
//! - [`ingest`]: one atomic batch per ingested document
//!
//! Every component returns [`DbOperation`](kgraph_core::DbOperation)s; only
//! the [`Ingestor`] writes.

pub mod id_factory;
pub mod ingest;
pub mod instance;
pub mod meta;
pub mod semantics;
pub mod static_structure;
pub mod tracker;
pub mod value_kind;

pub use ingest::{IngestReport, Ingestor};
pub use instance::{Edge, StructuralInstance};
pub use meta::{create_meta_representation, MetaRepresentation};
pub use semantics::{SemanticsController, SemanticsHandler};
pub use static_structure::{
    prepare_global_vertices_and_edges, StaticStructureController, StructureContribution,
};
pub use tracker::{IncomingProperty, StructureTracker};
pub use value_kind::PropertyValueKind;
