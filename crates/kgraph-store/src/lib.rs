//! KGraph store accessor
//!
//! The structure and inference pipelines only talk to the backing graph store
//! through [`GraphStore`]: a narrow, async interface over collections of JSON
//! documents and edges, separated by [`DataStage`].
//!
//! ```text
//!   stage ─┬─ space collections      (instances, keyed by document uuid)
//!          ├─ internal vertices      (types, spaces, properties, ...)
//!          └─ internal edges         (space2type, type2property, ...)
//! ```
//!
//! Stored documents carry `_key`, `_id` (`<collection>/<key>`) and
//! `_collection`; edges additionally `_from` / `_to`.
//!
//! [`MemoryStore`] is the in-process reference implementation used by the
//! CLI host and the tests.

pub mod error;
pub mod memory;
pub mod persistence;

pub use error::{StoreError, StoreResult};
pub use memory::{ApplySummary, MemoryStore};

use async_trait::async_trait;
use kgraph_core::{CollectionRef, DataStage, DbOperation, DocumentRef, SpaceName};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// Read and batch-write access to the backing graph store.
///
/// Queries against a collection that does not exist return empty results.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create every internal collection in every stage. Idempotent.
    async fn ensure_schema(&self) -> StoreResult<()>;

    async fn collection_exists(&self, stage: DataStage, collection: &CollectionRef) -> StoreResult<bool>;

    async fn document_exists(&self, stage: DataStage, document: &DocumentRef) -> StoreResult<bool>;

    /// The subset of `candidates` not present in the store, in one round trip.
    async fn missing_documents(
        &self,
        stage: DataStage,
        candidates: &[DocumentRef],
    ) -> StoreResult<HashSet<DocumentRef>>;

    async fn get_document(&self, stage: DataStage, document: &DocumentRef) -> StoreResult<Option<Value>>;

    /// Batched lookup; absent documents are skipped.
    async fn get_documents(&self, stage: DataStage, documents: &[DocumentRef]) -> StoreResult<Vec<Value>>;

    async fn edges_from(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        from: &DocumentRef,
    ) -> StoreResult<Vec<Value>>;

    async fn edges_to(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        to: &DocumentRef,
    ) -> StoreResult<Vec<Value>>;

    /// Documents whose `field` equals `value`, or is an array containing it.
    async fn find_by_field(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>>;

    /// The instance `id` and every instance sharing one of its identifiers.
    /// `space = None` searches every space.
    async fn documents_sharing_identifier(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        id: Uuid,
    ) -> StoreResult<Vec<Value>>;

    /// Instances listing `identifier` among their identifiers (`@id` included).
    async fn instances_by_identifier(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        identifier: &str,
    ) -> StoreResult<Vec<Value>>;

    /// Instances whose `relation` field references the instance `id`.
    async fn documents_by_incoming_relation(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        id: Uuid,
        relation: &str,
    ) -> StoreResult<Vec<Value>>;

    /// Apply a batch atomically: readers never observe a partial batch.
    async fn apply(&self, stage: DataStage, operations: &[DbOperation]) -> StoreResult<ApplySummary>;
}

/// `_id` of a stored document or edge.
pub fn stored_id(value: &Value) -> Option<DocumentRef> {
    let raw = value.get(kgraph_core::vocab::ID)?.as_str()?;
    DocumentRef::parse(raw, false).ok()
}

/// Parse a `_from` / `_to` style reference field.
pub fn stored_ref(value: &Value, field: &str) -> Option<DocumentRef> {
    let raw = value.get(field)?.as_str()?;
    DocumentRef::parse(raw, true).ok()
}
