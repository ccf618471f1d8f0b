//! Ingestion orchestration.
//!
//! One atomic batch per document: the document itself, its structure, the
//! semantics of meta-definitions, and the bookkeeping of its outgoing links.
//!
//! ```text
//!   upsert(doc) ──► document ─► tracker (A) ─► semantics ─► outgoing links ─► resolved links (B)
//!   delete(doc) ──► tracker (C) ─► links back to unresolved ─► delete instance
//! ```

use crate::instance::Edge;
use crate::semantics::SemanticsController;
use crate::tracker::StructureTracker;
use kgraph_core::collections::{self, UNRESOLVED};
use kgraph_core::{
    name_uuid, vocab, CollectionRef, DataStage, DbOperation, DocumentRef, Event, EventKind, IdUtils,
    IndexedDocument, KgConfig, KgError, NormalizedDoc, Result, SpaceName, UpsertOperation,
};
use kgraph_store::{stored_id, stored_ref, ApplySummary, GraphStore};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Outcome of one committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document: DocumentRef,
    pub operations: usize,
    pub summary: ApplySummary,
}

pub struct Ingestor {
    store: Arc<dyn GraphStore>,
    ids: IdUtils,
    tracker: StructureTracker,
    semantics: SemanticsController,
}

impl Ingestor {
    pub fn new(store: Arc<dyn GraphStore>, config: &KgConfig) -> Self {
        let ids = config.id_utils();
        Self {
            tracker: StructureTracker::new(store.clone(), config.structure.track_incoming_links),
            semantics: SemanticsController::new(store.clone(), ids.clone()),
            store,
            ids,
        }
    }

    pub fn id_utils(&self) -> &IdUtils {
        &self.ids
    }

    pub fn tracker(&self) -> &StructureTracker {
        &self.tracker
    }

    pub fn semantics(&self) -> &SemanticsController {
        &self.semantics
    }

    /// Address of `doc` in `space`, derived from its `@id`.
    pub fn instance_ref(&self, space: &SpaceName, doc: &NormalizedDoc) -> Result<DocumentRef> {
        space.validate()?;
        let id = doc
            .id()
            .ok_or_else(|| KgError::MalformedDocument("document without @id".to_string()))?;
        let key = self.ids.get_uuid(id).ok_or_else(|| {
            KgError::MalformedDocument(format!("{id} is not an instance id of {}", self.ids.namespace()))
        })?;
        Ok(CollectionRef::from_space(space).doc(key))
    }

    // ========================================================================
    // Upsert
    // ========================================================================

    pub async fn upsert(&self, stage: DataStage, space: &SpaceName, doc: NormalizedDoc) -> Result<IngestReport> {
        let id = self.instance_ref(space, &doc)?;
        let operations = self.prepare_upsert_at(stage, id.clone(), doc).await?;
        self.commit(stage, id, &operations).await
    }

    /// The batch `upsert` would commit.
    pub async fn prepare_upsert(
        &self,
        stage: DataStage,
        space: &SpaceName,
        doc: NormalizedDoc,
    ) -> Result<Vec<DbOperation>> {
        let id = self.instance_ref(space, &doc)?;
        self.prepare_upsert_at(stage, id, doc).await
    }

    async fn prepare_upsert_at(
        &self,
        stage: DataStage,
        id: DocumentRef,
        doc: NormalizedDoc,
    ) -> Result<Vec<DbOperation>> {
        let document = IndexedDocument::root(id.clone(), doc);
        let mut operations: Vec<DbOperation> =
            vec![UpsertOperation::new(Some(id.clone()), document.to_payload(), id.clone()).into()];

        operations.extend(self.tracker.create_upsert_operations(stage, &id, &document).await?);
        operations.extend(self.semantics.create_upsert_operations(stage, &id, &document).await?);
        operations.extend(self.outgoing_link_operations(stage, &document).await?);
        operations.extend(self.resolution_operations(stage, &document).await?);

        tracing::debug!(document = %id, operations = operations.len(), "prepared upsert");
        Ok(operations)
    }

    /// Register resolvable links, record the rest as unresolved. Unresolved
    /// links of the previous version are dropped first.
    async fn outgoing_link_operations(
        &self,
        stage: DataStage,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        let id = &document.id;
        let mut operations: Vec<DbOperation> = self
            .store
            .edges_from(stage, &UNRESOLVED.collection(), id)
            .await?
            .iter()
            .filter_map(stored_id)
            .map(DbOperation::delete)
            .collect();

        let own_identifiers = document.doc.all_identifiers_including_id();
        let types = document.types();
        for (property, iri) in document.doc.iri_references() {
            if property.starts_with(vocab::META) || own_identifiers.contains(&iri) {
                continue;
            }
            let targets: BTreeSet<DocumentRef> = self
                .store
                .instances_by_identifier(stage, None, &iri)
                .await?
                .iter()
                .filter_map(stored_id)
                .filter(|target| target != id)
                .collect();
            if targets.is_empty() {
                operations.push(unresolved_link(id, &property, &iri));
                continue;
            }
            for target in targets {
                let link = Edge::new(id.clone(), id.clone(), target)
                    .with(vocab::ORIGINAL_LABEL, Value::String(property.clone()));
                operations.extend(self.tracker.register_outgoing_link(stage, id, &types, &link).await?);
            }
        }
        Ok(operations)
    }

    /// Links other documents recorded against one of this document's
    /// identifiers before it existed.
    async fn resolution_operations(
        &self,
        stage: DataStage,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        let mut pending: BTreeMap<DocumentRef, Value> = BTreeMap::new();
        for identifier in document.doc.all_identifiers_including_id() {
            for edge in self
                .store
                .find_by_field(stage, &UNRESOLVED.collection(), vocab::ORIGINAL_TO, &Value::String(identifier))
                .await?
            {
                if let Some(edge_id) = stored_id(&edge) {
                    pending.insert(edge_id, edge);
                }
            }
        }

        let mut operations = Vec::new();
        for (edge_id, edge) in pending {
            let Some(from) = stored_ref(&edge, vocab::FROM) else {
                continue;
            };
            if from == document.id {
                continue;
            }
            let label = edge.get(vocab::ORIGINAL_LABEL).cloned().unwrap_or(Value::Null);
            let resolved = Edge::new(edge_id.clone(), from, document.id.clone()).with(vocab::ORIGINAL_LABEL, label);
            tracing::debug!(link = %edge_id, target = %document.id, "resolving link");
            operations.extend(
                self.tracker
                    .create_resolution_operations(stage, document, &resolved)
                    .await?,
            );
            operations.push(DbOperation::delete(edge_id));
        }
        Ok(operations)
    }

    // ========================================================================
    // Delete / deprecate
    // ========================================================================

    pub async fn delete(&self, stage: DataStage, document: &DocumentRef) -> Result<IngestReport> {
        let operations = self.prepare_delete(stage, document).await?;
        self.commit(stage, document.clone(), &operations).await
    }

    /// Links pointing at the removed document fall back to unresolved, so a
    /// re-created document is linked again.
    pub async fn prepare_delete(&self, stage: DataStage, document: &DocumentRef) -> Result<Vec<DbOperation>> {
        if collections::is_internal(document.collection().name()) {
            return Err(KgError::MalformedDocument(format!("{document} is not an instance")));
        }
        let raw = self
            .store
            .get_document(stage, document)
            .await?
            .ok_or_else(|| KgError::NotFound(format!("document {document}")))?;
        let indexed = IndexedDocument::from_payload(raw)?;

        let mut operations = self
            .tracker
            .create_delete_operations(stage, &indexed.original_document)
            .await?;
        if let Some(iri) = indexed.doc.id() {
            for incoming in self
                .tracker
                .find_incoming_properties(stage, &indexed.original_document)
                .await?
            {
                operations.push(unresolved_link(&incoming.origin, &incoming.property, iri));
            }
        }
        operations.push(DbOperation::delete_instance(document.clone()));
        Ok(operations)
    }

    /// Apply the deprecation semantics of a meta-definition document.
    pub async fn deprecate(&self, stage: DataStage, space: &SpaceName, doc: &NormalizedDoc) -> Result<IngestReport> {
        let id = self.instance_ref(space, doc)?;
        let operations = self
            .semantics
            .create_meta_deprecation_operations(stage, space, doc)
            .await?;
        self.commit(stage, id, &operations).await
    }

    // ========================================================================
    // Inference events
    // ========================================================================

    /// Feed reconciliation events back through ingestion, one batch per event
    /// in order.
    pub async fn commit_inference_events(&self, stage: DataStage, events: &[Event]) -> Result<ApplySummary> {
        let mut total = ApplySummary::default();
        for event in events {
            event.space.validate()?;
            let id = CollectionRef::from_space(&event.space).doc(event.document_id);
            let operations = match event.kind {
                EventKind::Insert | EventKind::Update => {
                    let data = event.data.clone().ok_or_else(|| {
                        KgError::MalformedDocument(format!("{} event for {id} without payload", event.kind))
                    })?;
                    self.prepare_upsert_at(stage, id.clone(), data).await?
                }
                EventKind::Delete => {
                    if !self.store.document_exists(stage, &id).await? {
                        tracing::debug!(document = %id, "inferred instance already gone");
                        continue;
                    }
                    self.prepare_delete(stage, &id).await?
                }
            };
            total += self.commit(stage, id, &operations).await?.summary;
        }
        tracing::info!(
            events = events.len(),
            upserted = total.upserted,
            deleted = total.deleted,
            "committed inference events"
        );
        Ok(total)
    }

    /// The single instance carrying `identifier`.
    pub async fn lookup(&self, stage: DataStage, identifier: &str) -> Result<Option<IndexedDocument>> {
        let mut found = self.store.instances_by_identifier(stage, None, identifier).await?;
        match found.len() {
            0 => Ok(None),
            1 => IndexedDocument::from_payload(found.remove(0)).map(Some),
            n => Err(KgError::Ambiguous(format!("{n} instances carry {identifier}"))),
        }
    }

    async fn commit(&self, stage: DataStage, document: DocumentRef, operations: &[DbOperation]) -> Result<IngestReport> {
        let summary = self.store.apply(stage, operations).await?;
        tracing::info!(
            document = %document,
            %stage,
            operations = operations.len(),
            upserted = summary.upserted,
            skipped = summary.skipped,
            deleted = summary.deleted,
            "committed batch"
        );
        Ok(IngestReport {
            document,
            operations: operations.len(),
            summary,
        })
    }
}

/// Placeholder for a link whose target is not known yet. Keyed by origin,
/// property and target so an unchanged link keeps its id.
fn unresolved_link(origin: &DocumentRef, property: &str, iri: &str) -> DbOperation {
    let id = UNRESOLVED.doc(name_uuid(&[UNRESOLVED.name, &origin.id(), property, iri]));
    let mut payload = NormalizedDoc::new();
    payload.insert(vocab::FROM, Value::String(origin.id()));
    payload.insert(vocab::ORIGINAL_TO, Value::String(iri.to_string()));
    payload.insert(vocab::ORIGINAL_LABEL, Value::String(property.to_string()));
    UpsertOperation::new(Some(origin.clone()), payload, id).into()
}
