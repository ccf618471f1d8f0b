//! KGraph core model
//!
//! Shared vocabulary for the structure and inference pipelines:
//!
//! - [`NormalizedDoc`]: a normalized JSON-LD document
//! - [`DocumentRef`], [`CollectionRef`], [`SpaceName`], [`DataStage`]: addressing
//! - [`DbOperation`]: write intents committed as one batch
//! - [`Event`]: insert/update/delete events for the primary event log
//! - [`KgError`]: the error taxonomy
//! - [`KgConfig`]: runtime configuration

pub mod collections;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod ids;
pub mod indexed;
pub mod operation;
pub mod reference;
pub mod vocab;

pub use config::KgConfig;
pub use document::NormalizedDoc;
pub use error::{KgError, Result};
pub use event::{Event, EventKind};
pub use ids::{name_uuid, IdUtils};
pub use indexed::IndexedDocument;
pub use operation::{DbOperation, UpsertOperation};
pub use reference::{CollectionRef, DataStage, DocumentRef, SpaceName, StaticCollection};
