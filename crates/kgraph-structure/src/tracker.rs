//! Per-document structure tracking.
//!
//! Records, through document-relation edges, which structural edges a root
//! document contributed to, and keeps the link structure consistent when the
//! types of a link target drift or a link target is removed.

use crate::instance::{Edge, StructuralInstance};
use crate::static_structure::{document_vertex, StaticStructureController, StructureContribution};
use kgraph_core::collections::{DOCUMENT_RELATION, PROPERTY_TO_TYPE};
use kgraph_core::{
    vocab, DataStage, DbOperation, DocumentRef, IndexedDocument, KgError, Result, SpaceName,
    UpsertOperation,
};
use kgraph_store::{stored_id, stored_ref, GraphStore};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A property of some other root document pointing at a tracked document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncomingProperty {
    pub origin: DocumentRef,
    pub property: String,
    /// Types the origin document had when the link was registered.
    pub doc_types: Vec<String>,
}

/// A document relation targeting a tracked document, with the property→type
/// edge it points at.
#[derive(Debug, Clone)]
struct IncomingLink {
    relation: DocumentRef,
    origin: Option<DocumentRef>,
    doc_types: Vec<String>,
    property: Option<String>,
    /// The space→type edge of the target the link was registered against.
    space_type: Option<DocumentRef>,
}

pub struct StructureTracker {
    store: Arc<dyn GraphStore>,
    static_structure: StaticStructureController,
    track_incoming_links: bool,
}

impl StructureTracker {
    pub fn new(store: Arc<dyn GraphStore>, track_incoming_links: bool) -> Self {
        Self {
            static_structure: StaticStructureController::new(store.clone()),
            store,
            track_incoming_links,
        }
    }

    pub fn static_structure(&self) -> &StaticStructureController {
        &self.static_structure
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Structure maintenance for an ingested (or updated) document.
    pub async fn create_upsert_operations(
        &self,
        stage: DataStage,
        original_document: &DocumentRef,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        let contribution = self
            .static_structure
            .ensure_static_elements_and_clean_document_structure(stage, document, original_document)
            .await?;
        let mut operations = contribution.operations;
        if self.track_incoming_links {
            operations.extend(self.handle_updated_types(stage, document).await?);
        }
        operations.extend(add_new_document_relations(
            original_document,
            &contribution.required,
            &document.types(),
            None,
            true,
        ));
        Ok(operations)
    }

    /// A previously unresolved link from `resolved_edge.from` now points at
    /// `target`: create the property→type edges and register the relation on
    /// behalf of the link's origin.
    pub async fn create_resolution_operations(
        &self,
        stage: DataStage,
        target: &IndexedDocument,
        resolved_edge: &Edge,
    ) -> Result<Vec<DbOperation>> {
        let property = resolved_edge.original_label().ok_or_else(|| {
            KgError::MalformedDocument(format!("link {} without a property label", resolved_edge.id))
        })?;
        let mut origin = self.load(stage, &resolved_edge.from).await?;
        if origin.embedded {
            origin = self.load(stage, &origin.original_document).await?;
        }
        let contribution = self
            .static_structure
            .ensure_static_property_to_type_edges(
                stage,
                &origin.space(),
                &target.space(),
                property,
                &origin.types(),
                &target.types(),
            )
            .await?;
        Ok(with_relations(
            contribution,
            &origin.original_document,
            &origin.types(),
            Some(&target.original_document),
            false,
        ))
    }

    /// Retract every link registered against `document` before it is removed.
    pub async fn create_delete_operations(
        &self,
        stage: DataStage,
        document: &DocumentRef,
    ) -> Result<Vec<DbOperation>> {
        Ok(self
            .incoming_links(stage, document)
            .await?
            .into_iter()
            .map(|link| DbOperation::delete_instance(link.relation))
            .collect())
    }

    /// Register a resolved outgoing link of a root document being ingested.
    /// `doc_types` are the origin's new types; its stored version may be stale.
    pub async fn register_outgoing_link(
        &self,
        stage: DataStage,
        original_document: &DocumentRef,
        doc_types: &[String],
        link: &Edge,
    ) -> Result<Vec<DbOperation>> {
        let Some(property) = link.original_label() else {
            return Ok(Vec::new());
        };
        let Some(raw) = self.store.get_document(stage, &link.to).await? else {
            tracing::debug!(target_document = %link.to, "link target vanished, not registering");
            return Ok(Vec::new());
        };
        let target = IndexedDocument::from_payload(raw)?;
        let contribution = self
            .static_structure
            .ensure_static_property_to_type_edges(
                stage,
                &SpaceName::new(original_document.collection().name()),
                &target.space(),
                property,
                doc_types,
                &target.types(),
            )
            .await?;
        Ok(with_relations(
            contribution,
            original_document,
            doc_types,
            Some(&target.original_document),
            true,
        ))
    }

    /// Properties of other documents pointing at `target`, distinct.
    pub async fn find_incoming_properties(
        &self,
        stage: DataStage,
        target: &DocumentRef,
    ) -> Result<Vec<IncomingProperty>> {
        let properties: BTreeSet<IncomingProperty> = self
            .incoming_links(stage, target)
            .await?
            .into_iter()
            .filter_map(|link| {
                Some(IncomingProperty {
                    origin: link.origin?,
                    property: link.property?,
                    doc_types: link.doc_types,
                })
            })
            .collect();
        Ok(properties.into_iter().collect())
    }

    // ========================================================================
    // Type drift
    // ========================================================================

    /// Retract links registered against types the document lost, and register
    /// the known incoming properties against the types it gained.
    async fn handle_updated_types(
        &self,
        stage: DataStage,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        if document.embedded {
            return Ok(Vec::new());
        }
        let space = document.space();
        let mut new_space_types: HashMap<DocumentRef, String> = HashMap::new();
        for type_name in document.types() {
            new_space_types.insert(crate::id_factory::space_to_type(&space, &type_name), type_name);
        }

        let links = self.incoming_links(stage, &document.original_document).await?;
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let existing: HashSet<&DocumentRef> =
            links.iter().filter_map(|l| l.space_type.as_ref()).collect();

        let mut operations: Vec<DbOperation> = links
            .iter()
            .filter(|l| {
                l.space_type
                    .as_ref()
                    .map_or(false, |st| !new_space_types.contains_key(st))
            })
            .map(|l| DbOperation::delete_instance(l.relation.clone()))
            .collect();
        if !operations.is_empty() {
            tracing::debug!(document = %document.id, removed = operations.len(), "retracting links of dropped types");
        }

        let mut added_types: Vec<String> = new_space_types
            .iter()
            .filter(|(space_type, _)| !existing.contains(space_type))
            .map(|(_, name)| name.clone())
            .collect();
        if added_types.is_empty() {
            return Ok(operations);
        }
        added_types.sort();

        let incoming: BTreeSet<IncomingProperty> = links
            .into_iter()
            .filter_map(|link| {
                Some(IncomingProperty {
                    origin: link.origin?,
                    property: link.property?,
                    doc_types: link.doc_types,
                })
            })
            .collect();
        for property in incoming {
            let Some(raw) = self.store.get_document(stage, &property.origin).await? else {
                tracing::warn!(origin = %property.origin, "incoming link from a missing document");
                continue;
            };
            let origin = IndexedDocument::from_payload(raw)?;
            let contribution = self
                .static_structure
                .ensure_static_property_to_type_edges(
                    stage,
                    &origin.space(),
                    &space,
                    &property.property,
                    &origin.types(),
                    &added_types,
                )
                .await?;
            operations.extend(with_relations(
                contribution,
                &property.origin,
                &property.doc_types,
                Some(&document.original_document),
                false,
            ));
        }
        Ok(operations)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn incoming_links(&self, stage: DataStage, target: &DocumentRef) -> Result<Vec<IncomingLink>> {
        let relations_collection = DOCUMENT_RELATION.collection();
        if !self.store.collection_exists(stage, &relations_collection).await?
            || !self
                .store
                .collection_exists(stage, &PROPERTY_TO_TYPE.collection())
                .await?
        {
            return Ok(Vec::new());
        }
        let relations = self
            .store
            .find_by_field(
                stage,
                &relations_collection,
                vocab::TARGET_ORIGINAL_DOCUMENT,
                &Value::String(target.id()),
            )
            .await?;
        let relations: Vec<(Value, DocumentRef)> = relations
            .into_iter()
            .filter_map(|relation| {
                let to = stored_ref(&relation, vocab::TO)?;
                (to.collection().name() == PROPERTY_TO_TYPE.name).then_some((relation, to))
            })
            .collect();
        if relations.is_empty() {
            return Ok(Vec::new());
        }

        let edge_ids: Vec<DocumentRef> = relations.iter().map(|(_, to)| to.clone()).collect();
        let edges: HashMap<DocumentRef, Value> = self
            .store
            .get_documents(stage, &edge_ids)
            .await?
            .into_iter()
            .filter_map(|edge| Some((stored_id(&edge)?, edge)))
            .collect();

        Ok(relations
            .into_iter()
            .filter_map(|(relation, to)| {
                let edge = edges.get(&to);
                Some(IncomingLink {
                    relation: stored_id(&relation)?,
                    origin: relation
                        .get(vocab::ORIGINAL_DOCUMENT)
                        .and_then(Value::as_str)
                        .and_then(|raw| DocumentRef::parse(raw, false).ok()),
                    doc_types: string_array(relation.get(vocab::DOC_TYPES)),
                    property: edge
                        .and_then(|e| e.get(vocab::ORIGINAL_LABEL))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    space_type: edge.and_then(|e| stored_ref(e, vocab::TO)),
                })
            })
            .collect())
    }

    async fn load(&self, stage: DataStage, document: &DocumentRef) -> Result<IndexedDocument> {
        let raw = self
            .store
            .get_document(stage, document)
            .await?
            .ok_or_else(|| KgError::NotFound(format!("document {document}")))?;
        IndexedDocument::from_payload(raw)
    }
}

/// One document-relation edge from the root document's vertex to every
/// structural edge in `required`.
pub fn add_new_document_relations(
    original_document: &DocumentRef,
    required: &[StructuralInstance],
    doc_types: &[String],
    target_original_document: Option<&DocumentRef>,
    attach_to_original_document: bool,
) -> Vec<DbOperation> {
    let types = Value::Array(doc_types.iter().cloned().map(Value::String).collect());
    required
        .iter()
        .filter_map(StructuralInstance::as_edge)
        .map(|structural| {
            let mut relation = Edge::new(
                DOCUMENT_RELATION.doc(Uuid::new_v4()),
                document_vertex(original_document),
                structural.id.clone(),
            )
            .with(vocab::ORIGINAL_DOCUMENT, Value::String(original_document.id()))
            .with(
                vocab::DOC_COLLECTION,
                Value::String(original_document.collection().name().to_string()),
            )
            .with(vocab::DOC_TYPES, types.clone());
            if let Some(target) = target_original_document {
                relation = relation.with(vocab::TARGET_ORIGINAL_DOCUMENT, Value::String(target.id()));
            }
            UpsertOperation::new(Some(original_document.clone()), relation.payload(), relation.id)
                .with_flags(true, attach_to_original_document)
                .into()
        })
        .collect()
}

fn with_relations(
    contribution: StructureContribution,
    original_document: &DocumentRef,
    doc_types: &[String],
    target: Option<&DocumentRef>,
    attach_to_original_document: bool,
) -> Vec<DbOperation> {
    let mut operations = contribution.operations;
    operations.extend(add_new_document_relations(
        original_document,
        &contribution.required,
        doc_types,
        target,
        attach_to_original_document,
    ));
    operations
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}
