//! Meta-definition semantics.
//!
//! Documents of certain types (client configurations, type, property and
//! space definitions, ...) augment the global structure. Each handler is
//! triggered by one document type; for a matching document it emits the
//! additional operations for upsert and for deprecation.

mod client;
mod property_definition;
mod property_in_type;
mod space_definition;
mod type_definition;
mod type_in_space;

use crate::instance::Edge;
use kgraph_core::{
    vocab, DataStage, DbOperation, DocumentRef, IdUtils, IndexedDocument, KgError, NormalizedDoc,
    Result, SpaceName, StaticCollection, UpsertOperation,
};
use kgraph_core::collections::{PROPERTY_TO_TYPE, TYPES};
use kgraph_core::name_uuid;
use kgraph_store::{stored_id, GraphStore};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// What a handler may read while computing its operations.
pub struct SemanticsContext<'a> {
    pub store: &'a dyn GraphStore,
    pub ids: &'a IdUtils,
    pub stage: DataStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticsHandler {
    Client,
    TypeDefinition,
    PropertyDefinition,
    PropertyInTypeDefinition,
    SpaceDefinition,
    TypeInSpaceDefinition,
}

impl SemanticsHandler {
    pub const ALL: [SemanticsHandler; 6] = [
        SemanticsHandler::Client,
        SemanticsHandler::TypeDefinition,
        SemanticsHandler::PropertyDefinition,
        SemanticsHandler::PropertyInTypeDefinition,
        SemanticsHandler::SpaceDefinition,
        SemanticsHandler::TypeInSpaceDefinition,
    ];

    /// The document type this handler reacts to.
    pub fn trigger_type(&self) -> &'static str {
        match self {
            SemanticsHandler::Client => vocab::META_CLIENT_CONFIGURATION_TYPE,
            SemanticsHandler::TypeDefinition => vocab::META_TYPE_DEFINITION_TYPE,
            SemanticsHandler::PropertyDefinition => vocab::META_PROPERTY_DEFINITION_TYPE,
            SemanticsHandler::PropertyInTypeDefinition => vocab::META_PROPERTY_IN_TYPE_DEFINITION_TYPE,
            SemanticsHandler::SpaceDefinition => vocab::META_SPACE_DEFINITION_TYPE,
            SemanticsHandler::TypeInSpaceDefinition => vocab::META_TYPE_IN_SPACE_DEFINITION_TYPE,
        }
    }

    pub fn applies_to(&self, document: &NormalizedDoc) -> bool {
        document.has_type(self.trigger_type())
    }

    pub async fn upsert_operations(
        &self,
        ctx: &SemanticsContext<'_>,
        root: &DocumentRef,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        match self {
            SemanticsHandler::Client => Ok(client::upsert_operations(root, document)),
            SemanticsHandler::TypeDefinition => type_definition::upsert_operations(ctx, root, document).await,
            SemanticsHandler::PropertyDefinition => {
                property_definition::upsert_operations(ctx, root, document).await
            }
            SemanticsHandler::PropertyInTypeDefinition => {
                property_in_type::upsert_operations(ctx, root, document).await
            }
            SemanticsHandler::SpaceDefinition => space_definition::upsert_operations(ctx, root, document).await,
            SemanticsHandler::TypeInSpaceDefinition => Ok(type_in_space::upsert_operations(document)),
        }
    }

    pub async fn deprecation_operations(
        &self,
        ctx: &SemanticsContext<'_>,
        space: &SpaceName,
        document: &NormalizedDoc,
    ) -> Result<Vec<DbOperation>> {
        match self {
            SemanticsHandler::Client => Ok(Vec::new()),
            SemanticsHandler::TypeDefinition => {
                type_definition::deprecation_operations(ctx, space, document).await
            }
            SemanticsHandler::PropertyDefinition => {
                property_definition::deprecation_operations(ctx, space, document)
            }
            SemanticsHandler::PropertyInTypeDefinition => {
                property_in_type::deprecation_operations(ctx, space, document).await
            }
            SemanticsHandler::SpaceDefinition => Ok(space_definition::deprecation_operations(document)),
            SemanticsHandler::TypeInSpaceDefinition => Ok(type_in_space::deprecation_operations(document)),
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Runs every applicable handler over a document.
pub struct SemanticsController {
    store: Arc<dyn GraphStore>,
    ids: IdUtils,
    handlers: Vec<SemanticsHandler>,
}

impl SemanticsController {
    pub fn new(store: Arc<dyn GraphStore>, ids: IdUtils) -> Self {
        Self {
            store,
            ids,
            handlers: SemanticsHandler::ALL.to_vec(),
        }
    }

    pub fn handlers(&self) -> &[SemanticsHandler] {
        &self.handlers
    }

    pub async fn create_upsert_operations(
        &self,
        stage: DataStage,
        root: &DocumentRef,
        document: &IndexedDocument,
    ) -> Result<Vec<DbOperation>> {
        let ctx = self.context(stage);
        let mut operations = Vec::new();
        for handler in self.handlers.iter().filter(|h| h.applies_to(&document.doc)) {
            tracing::debug!(handler = ?handler, document = %document.id, "applying semantics");
            operations.extend(handler.upsert_operations(&ctx, root, document).await?);
        }
        Ok(operations)
    }

    pub async fn create_meta_deprecation_operations(
        &self,
        stage: DataStage,
        space: &SpaceName,
        document: &NormalizedDoc,
    ) -> Result<Vec<DbOperation>> {
        let ctx = self.context(stage);
        let mut operations = Vec::new();
        for handler in self.handlers.iter().filter(|h| h.applies_to(document)) {
            tracing::debug!(handler = ?handler, "deprecating meta definition");
            operations.extend(handler.deprecation_operations(&ctx, space, document).await?);
        }
        Ok(operations)
    }

    fn context(&self, stage: DataStage) -> SemanticsContext<'_> {
        SemanticsContext {
            store: self.store.as_ref(),
            ids: &self.ids,
            stage,
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Upsert of the definition itself plus an override edge from it to the
/// element it augments. Override edges of the previous version are retracted.
pub(crate) async fn handle_override_reference(
    ctx: &SemanticsContext<'_>,
    root: &DocumentRef,
    document: &IndexedDocument,
    original_to: Option<&str>,
    target: DocumentRef,
    overrides: StaticCollection,
) -> Result<Vec<DbOperation>> {
    let mut operations: Vec<DbOperation> = ctx
        .store
        .edges_from(ctx.stage, &overrides.collection(), &document.id)
        .await?
        .iter()
        .filter_map(stored_id)
        .map(DbOperation::delete)
        .collect();

    operations.push(
        UpsertOperation::new(Some(root.clone()), document.to_payload(), document.id.clone()).into(),
    );
    let mut edge = Edge::new(overrides.doc(Uuid::new_v4()), document.id.clone(), target)
        .with(vocab::ORIGINAL_DOCUMENT, Value::String(root.id()));
    if let Some(original_to) = original_to {
        edge = edge.with(vocab::ORIGINAL_TO, Value::String(original_to.to_string()));
    }
    operations.push(UpsertOperation::new(Some(root.clone()), edge.payload(), edge.id).into());
    Ok(operations)
}

/// Explicitly declared target types of a property: a type vertex and a
/// property→type edge from `from` for each.
pub(crate) fn handle_explicit_target_types(document: &NormalizedDoc, from: &DocumentRef) -> Vec<DbOperation> {
    let mut operations = Vec::new();
    for target_type in document.get_str_list(vocab::META_PROPERTY_TARGET_TYPES) {
        let type_vertex = crate::meta::create_meta_representation(&target_type, &TYPES.collection());
        let edge = Edge::new(
            PROPERTY_TO_TYPE.doc(name_uuid(&[PROPERTY_TO_TYPE.name, &from.id(), &target_type])),
            from.clone(),
            type_vertex.id.clone(),
        )
        .with(vocab::ORIGINAL_TO, Value::String(target_type.clone()));
        operations.push(UpsertOperation::structural(type_vertex.payload(), type_vertex.id).into());
        operations.push(UpsertOperation::structural(edge.payload(), edge.id).into());
    }
    operations
}

/// Meta-definitions reference their subject as `{"@id": ...}` or as a string.
pub(crate) fn required_reference<'a>(document: &'a NormalizedDoc, key: &str) -> Result<&'a str> {
    document
        .get_str(key)
        .ok_or_else(|| KgError::MalformedDocument(format!("meta definition without {key}")))
}

/// Instance address of a deprecated definition document.
pub(crate) fn definition_instance(
    ctx: &SemanticsContext<'_>,
    space: &SpaceName,
    document: &NormalizedDoc,
) -> Result<DocumentRef> {
    let id = document
        .id()
        .ok_or_else(|| KgError::MalformedDocument("definition without @id".to_string()))?;
    let key = ctx
        .ids
        .get_uuid(id)
        .ok_or_else(|| KgError::MalformedDocument(format!("{id} is not an instance id")))?;
    Ok(kgraph_core::CollectionRef::from_space(space).doc(key))
}
