//! In-memory reference store.

use crate::error::StoreResult;
use crate::GraphStore;
use async_trait::async_trait;
use kgraph_core::collections;
use kgraph_core::document::reference_of;
use kgraph_core::vocab;
use kgraph_core::{
    CollectionRef, DataStage, DbOperation, DocumentRef, IdUtils, SpaceName, UpsertOperation,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoredCollection {
    pub edge: bool,
    /// Keyed by the document's `_key`.
    pub documents: BTreeMap<String, Value>,
}

/// Collections of one stage, keyed by name.
pub(crate) type StageState = BTreeMap<String, StoredCollection>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    /// Keyed by [`DataStage::as_str`].
    pub stages: BTreeMap<String, StageState>,
}

impl StoreState {
    fn stage(&self, stage: DataStage) -> Option<&StageState> {
        self.stages.get(stage.as_str())
    }

    fn stage_mut(&mut self, stage: DataStage) -> &mut StageState {
        self.stages.entry(stage.as_str().to_string()).or_default()
    }

    fn collection(&self, stage: DataStage, name: &str) -> Option<&StoredCollection> {
        self.stage(stage)?.get(name)
    }

    fn document(&self, stage: DataStage, document: &DocumentRef) -> Option<&Value> {
        self.collection(stage, document.collection().name())?
            .documents
            .get(&document.key().to_string())
    }

    /// Instance collections to search: the given space, or every non-internal one.
    fn space_collections<'a>(
        &'a self,
        stage: DataStage,
        space: Option<&SpaceName>,
    ) -> Vec<&'a StoredCollection> {
        let Some(state) = self.stage(stage) else {
            return Vec::new();
        };
        match space {
            Some(space) => state.get(space.as_str()).into_iter().collect(),
            None => state
                .iter()
                .filter(|(name, c)| !c.edge && !collections::is_internal(name))
                .map(|(_, c)| c)
                .collect(),
        }
    }
}

/// Counts of what a batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub upserted: usize,
    /// Insert-if-absent upserts that found an existing document.
    pub skipped: usize,
    pub deleted: usize,
}

impl std::ops::AddAssign for ApplySummary {
    fn add_assign(&mut self, other: Self) {
        self.upserted += other.upserted;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// A [`GraphStore`] held in process memory. Every batch is applied under a
/// single write lock.
#[derive(Clone)]
pub struct MemoryStore {
    ids: IdUtils,
    pub(crate) state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new(ids: IdUtils) -> Self {
        Self {
            ids,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub(crate) fn from_state(ids: IdUtils, state: StoreState) -> Self {
        Self {
            ids,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn id_utils(&self) -> &IdUtils {
        &self.ids
    }

    /// Number of documents in a collection (0 if it does not exist).
    pub fn count(&self, stage: DataStage, collection: &str) -> usize {
        self.state
            .read()
            .collection(stage, collection)
            .map_or(0, |c| c.documents.len())
    }

    /// All documents of a collection, in key order.
    pub fn documents(&self, stage: DataStage, collection: &str) -> Vec<Value> {
        self.state
            .read()
            .collection(stage, collection)
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of the collections present in a stage.
    pub fn collection_names(&self, stage: DataStage) -> Vec<String> {
        self.state
            .read()
            .stage(stage)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn references_instance(&self, value: &Value, id: Uuid) -> bool {
        let matches = |v: &Value| {
            v.as_str()
                .or_else(|| reference_of(v))
                .and_then(|iri| self.ids.get_uuid(iri))
                == Some(id)
        };
        match value {
            Value::Array(items) => items.iter().any(matches),
            other => matches(other),
        }
    }
}

fn field_matches(document: &Value, field: &str, expected: &Value) -> bool {
    match document.get(field) {
        Some(Value::Array(items)) => items.contains(expected),
        Some(value) => value == expected,
        None => false,
    }
}

fn identifiers_of(document: &Value) -> HashSet<&str> {
    document
        .get(vocab::IDENTIFIERS)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn upsert(state: &mut StageState, op: &UpsertOperation, summary: &mut ApplySummary) {
    let target = &op.target;
    let collection = state
        .entry(target.collection().name().to_string())
        .or_insert_with(|| StoredCollection {
            edge: target.collection().is_edge(),
            documents: BTreeMap::new(),
        });
    let key = target.key().to_string();
    if !op.override_if_exists && collection.documents.contains_key(&key) {
        summary.skipped += 1;
        return;
    }
    let mut payload = op.payload.clone();
    payload.insert(vocab::KEY, Value::String(key.clone()));
    payload.insert(vocab::ID, Value::String(target.id()));
    payload.insert(
        vocab::COLLECTION,
        Value::String(target.collection().name().to_string()),
    );
    if let Some(lifecycle) = &op.lifecycle_document {
        payload.insert(vocab::LIFECYCLE_DOCUMENT, Value::String(lifecycle.id()));
        if op.attach_to_original_document && !payload.contains_key(vocab::ORIGINAL_DOCUMENT) {
            payload.insert(vocab::ORIGINAL_DOCUMENT, Value::String(lifecycle.id()));
        }
    }
    collection.documents.insert(key, payload.into_value());
    summary.upserted += 1;
}

fn remove(state: &mut StageState, target: &DocumentRef) -> bool {
    state
        .get_mut(target.collection().name())
        .and_then(|c| c.documents.remove(&target.key().to_string()))
        .is_some()
}

/// Remove `target` and, transitively, everything whose lifecycle is bound to it.
fn remove_instance(state: &mut StageState, target: &DocumentRef, summary: &mut ApplySummary) {
    let mut pending = vec![target.id()];
    let mut seen = HashSet::new();
    while let Some(id) = pending.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Ok(doc) = DocumentRef::parse(&id, false) {
            if remove(state, &doc) {
                summary.deleted += 1;
            }
        }
        for collection in state.values() {
            for document in collection.documents.values() {
                let bound = document
                    .get(vocab::LIFECYCLE_DOCUMENT)
                    .and_then(Value::as_str)
                    == Some(id.as_str());
                if bound {
                    if let Some(dependent) = document.get(vocab::ID).and_then(Value::as_str) {
                        pending.push(dependent.to_string());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn ensure_schema(&self) -> StoreResult<()> {
        let mut state = self.state.write();
        let mut created = 0usize;
        for stage in DataStage::ALL {
            let collections = state.stage_mut(stage);
            for collection in collections::ALL {
                if !collections.contains_key(collection.name) {
                    collections.insert(
                        collection.name.to_string(),
                        StoredCollection {
                            edge: collection.edge,
                            documents: BTreeMap::new(),
                        },
                    );
                    created += 1;
                }
            }
        }
        tracing::debug!(created, "ensured internal collections");
        Ok(())
    }

    async fn collection_exists(&self, stage: DataStage, collection: &CollectionRef) -> StoreResult<bool> {
        Ok(self.state.read().collection(stage, collection.name()).is_some())
    }

    async fn document_exists(&self, stage: DataStage, document: &DocumentRef) -> StoreResult<bool> {
        Ok(self.state.read().document(stage, document).is_some())
    }

    async fn missing_documents(
        &self,
        stage: DataStage,
        candidates: &[DocumentRef],
    ) -> StoreResult<HashSet<DocumentRef>> {
        let state = self.state.read();
        Ok(candidates
            .iter()
            .filter(|c| state.document(stage, c).is_none())
            .cloned()
            .collect())
    }

    async fn get_document(&self, stage: DataStage, document: &DocumentRef) -> StoreResult<Option<Value>> {
        Ok(self.state.read().document(stage, document).cloned())
    }

    async fn get_documents(&self, stage: DataStage, documents: &[DocumentRef]) -> StoreResult<Vec<Value>> {
        let state = self.state.read();
        Ok(documents
            .iter()
            .filter_map(|d| state.document(stage, d).cloned())
            .collect())
    }

    async fn edges_from(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        from: &DocumentRef,
    ) -> StoreResult<Vec<Value>> {
        self.find_by_field(stage, collection, vocab::FROM, &Value::String(from.id()))
            .await
    }

    async fn edges_to(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        to: &DocumentRef,
    ) -> StoreResult<Vec<Value>> {
        self.find_by_field(stage, collection, vocab::TO, &Value::String(to.id()))
            .await
    }

    async fn find_by_field(
        &self,
        stage: DataStage,
        collection: &CollectionRef,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        let state = self.state.read();
        Ok(state
            .collection(stage, collection.name())
            .map(|c| {
                c.documents
                    .values()
                    .filter(|d| field_matches(d, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn documents_sharing_identifier(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        id: Uuid,
    ) -> StoreResult<Vec<Value>> {
        let state = self.state.read();
        let collections = state.space_collections(stage, space);
        let key = id.to_string();
        let Some(origin) = collections.iter().find_map(|c| c.documents.get(&key)) else {
            return Ok(Vec::new());
        };
        let wanted = identifiers_of(origin);
        let mut related = Vec::new();
        for collection in &collections {
            for (doc_key, document) in &collection.documents {
                if *doc_key == key || !identifiers_of(document).is_disjoint(&wanted) {
                    related.push(document.clone());
                }
            }
        }
        Ok(related)
    }

    async fn instances_by_identifier(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        identifier: &str,
    ) -> StoreResult<Vec<Value>> {
        let state = self.state.read();
        Ok(state
            .space_collections(stage, space)
            .iter()
            .flat_map(|c| c.documents.values())
            .filter(|d| identifiers_of(d).contains(identifier))
            .cloned()
            .collect())
    }

    async fn documents_by_incoming_relation(
        &self,
        stage: DataStage,
        space: Option<&SpaceName>,
        id: Uuid,
        relation: &str,
    ) -> StoreResult<Vec<Value>> {
        let state = self.state.read();
        Ok(state
            .space_collections(stage, space)
            .iter()
            .flat_map(|c| c.documents.values())
            .filter(|d| {
                d.get(relation)
                    .map_or(false, |v| self.references_instance(v, id))
            })
            .cloned()
            .collect())
    }

    async fn apply(&self, stage: DataStage, operations: &[DbOperation]) -> StoreResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        let mut state = self.state.write();
        let stage_state = state.stage_mut(stage);
        for operation in operations {
            match operation {
                DbOperation::Upsert(op) => upsert(stage_state, op, &mut summary),
                DbOperation::Delete { target } => {
                    if remove(stage_state, target) {
                        summary.deleted += 1;
                    }
                }
                DbOperation::DeleteInstance { target } => {
                    remove_instance(stage_state, target, &mut summary)
                }
            }
        }
        tracing::debug!(
            stage = %stage,
            operations = operations.len(),
            upserted = summary.upserted,
            skipped = summary.skipped,
            deleted = summary.deleted,
            "applied batch"
        );
        Ok(summary)
    }
}
