//! Property-in-type definitions declare a property on a type independent of
//! any space.

use super::{
    definition_instance, handle_explicit_target_types, handle_override_reference, required_reference,
    SemanticsContext,
};
use crate::id_factory;
use crate::instance::Edge;
use crate::meta::meta_ref;
use kgraph_core::collections::{CLIENT_TYPE_PROPERTY, PROPERTIES, TYPES, TYPE_TO_PROPERTY};
use kgraph_core::{
    vocab, DbOperation, DocumentRef, IndexedDocument, NormalizedDoc, Result, SpaceName, UpsertOperation,
};
use kgraph_store::{stored_id, stored_ref};

pub(super) async fn upsert_operations(
    ctx: &SemanticsContext<'_>,
    root: &DocumentRef,
    document: &IndexedDocument,
) -> Result<Vec<DbOperation>> {
    let property = required_reference(&document.doc, vocab::META_PROPERTY)?;
    let type_name = required_reference(&document.doc, vocab::META_TYPE)?;
    let global = Edge::new(
        id_factory::global_type_to_property(type_name, property),
        meta_ref(type_name, &TYPES.collection()),
        meta_ref(property, &PROPERTIES.collection()),
    );
    let mut operations: Vec<DbOperation> =
        vec![UpsertOperation::structural(global.payload(), global.id.clone()).into()];
    operations.extend(
        handle_override_reference(
            ctx,
            root,
            document,
            Some(property),
            global.id.clone(),
            CLIENT_TYPE_PROPERTY,
        )
        .await?,
    );
    operations.extend(handle_explicit_target_types(&document.doc, &global.id));
    Ok(operations)
}

/// Forced removal drops the global edge and every space-scoped occurrence of
/// the property on the type; otherwise only the definition goes.
pub(super) async fn deprecation_operations(
    ctx: &SemanticsContext<'_>,
    space: &SpaceName,
    document: &NormalizedDoc,
) -> Result<Vec<DbOperation>> {
    if !document.get_bool(vocab::META_FORCED_REMOVAL).unwrap_or(false) {
        return Ok(vec![DbOperation::delete_instance(definition_instance(ctx, space, document)?)]);
    }
    let property = required_reference(document, vocab::META_PROPERTY)?;
    let type_name = required_reference(document, vocab::META_TYPE)?;
    let property_vertex = meta_ref(property, &PROPERTIES.collection());
    let type_vertex = meta_ref(type_name, &TYPES.collection());

    let mut operations = vec![DbOperation::delete_instance(id_factory::global_type_to_property(
        type_name, property,
    ))];
    let occurrences = ctx
        .store
        .edges_to(ctx.stage, &TYPE_TO_PROPERTY.collection(), &property_vertex)
        .await?;
    for occurrence in occurrences {
        let Some(space_type) = stored_ref(&occurrence, vocab::FROM) else {
            continue;
        };
        let on_type = ctx
            .store
            .get_document(ctx.stage, &space_type)
            .await?
            .and_then(|edge| stored_ref(&edge, vocab::TO))
            .map_or(false, |to| to == type_vertex);
        if on_type {
            if let Some(id) = stored_id(&occurrence) {
                operations.push(DbOperation::delete_instance(id));
            }
        }
    }
    tracing::info!(property, type_name, removed = operations.len(), "forced removal of property in type");
    Ok(operations)
}
