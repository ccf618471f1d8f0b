//! Type definitions override a type; deprecating one removes the type with
//! everything that hangs off it.

use super::{definition_instance, handle_override_reference, required_reference, SemanticsContext};
use crate::meta::{create_meta_representation, meta_ref};
use kgraph_core::collections::{
    DOCUMENT_RELATION, GLOBAL_TYPE_TO_PROPERTY, META_TYPE_OVERRIDE, PROPERTY_TO_PROPERTY_VALUE_TYPE,
    PROPERTY_TO_TYPE, SPACE_TO_TYPE, TYPES, TYPE_TO_PROPERTY,
};
use kgraph_core::{
    vocab, DbOperation, DocumentRef, IndexedDocument, NormalizedDoc, Result, SpaceName,
    StaticCollection, UpsertOperation,
};
use kgraph_store::stored_id;
use std::collections::BTreeSet;

pub(super) async fn upsert_operations(
    ctx: &SemanticsContext<'_>,
    root: &DocumentRef,
    document: &IndexedDocument,
) -> Result<Vec<DbOperation>> {
    let type_name = required_reference(&document.doc, vocab::META_TYPE)?;
    let type_vertex = create_meta_representation(type_name, &TYPES.collection());
    let mut operations = Vec::new();
    if !ctx.store.document_exists(ctx.stage, &type_vertex.id).await? {
        operations.push(UpsertOperation::structural(type_vertex.payload(), type_vertex.id.clone()).into());
    }
    operations.extend(
        handle_override_reference(
            ctx,
            root,
            document,
            Some(type_name),
            type_vertex.id,
            META_TYPE_OVERRIDE,
        )
        .await?,
    );
    Ok(operations)
}

/// Removes, in order: property links and value kinds under each space-scoped
/// property of the type, those properties, links targeting the type, its
/// space edges, its global properties, overrides, the type vertex and the
/// definition. Document relations to any removed edge go with it.
pub(super) async fn deprecation_operations(
    ctx: &SemanticsContext<'_>,
    space: &SpaceName,
    document: &NormalizedDoc,
) -> Result<Vec<DbOperation>> {
    let type_name = required_reference(document, vocab::META_TYPE)?;
    let type_vertex = meta_ref(type_name, &TYPES.collection());
    let mut edges: Vec<DocumentRef> = Vec::new();

    for space_type in related(ctx, SPACE_TO_TYPE, Direction::To, &type_vertex).await? {
        for type_property in related(ctx, TYPE_TO_PROPERTY, Direction::From, &space_type).await? {
            edges.extend(related(ctx, PROPERTY_TO_PROPERTY_VALUE_TYPE, Direction::From, &type_property).await?);
            edges.extend(related(ctx, PROPERTY_TO_TYPE, Direction::From, &type_property).await?);
            edges.push(type_property);
        }
        edges.extend(related(ctx, PROPERTY_TO_TYPE, Direction::To, &space_type).await?);
        edges.push(space_type);
    }
    for global in related(ctx, GLOBAL_TYPE_TO_PROPERTY, Direction::From, &type_vertex).await? {
        edges.extend(related(ctx, PROPERTY_TO_TYPE, Direction::From, &global).await?);
        edges.push(global);
    }
    edges.extend(related(ctx, PROPERTY_TO_TYPE, Direction::To, &type_vertex).await?);
    edges.extend(related(ctx, META_TYPE_OVERRIDE, Direction::To, &type_vertex).await?);

    let mut relations = BTreeSet::new();
    for edge in &edges {
        relations.extend(related(ctx, DOCUMENT_RELATION, Direction::To, edge).await?);
    }

    tracing::info!(
        type_name,
        edges = edges.len(),
        relations = relations.len(),
        "deprecating type"
    );
    let mut seen = BTreeSet::new();
    let mut operations: Vec<DbOperation> = relations.into_iter().map(DbOperation::delete).collect();
    operations.extend(
        edges
            .into_iter()
            .filter(|e| seen.insert(e.clone()))
            .map(DbOperation::delete),
    );
    operations.push(DbOperation::delete_instance(type_vertex));
    operations.push(DbOperation::delete_instance(definition_instance(ctx, space, document)?));
    Ok(operations)
}

enum Direction {
    From,
    To,
}

async fn related(
    ctx: &SemanticsContext<'_>,
    collection: StaticCollection,
    direction: Direction,
    anchor: &DocumentRef,
) -> Result<Vec<DocumentRef>> {
    let edges = match direction {
        Direction::From => ctx.store.edges_from(ctx.stage, &collection.collection(), anchor).await?,
        Direction::To => ctx.store.edges_to(ctx.stage, &collection.collection(), anchor).await?,
    };
    Ok(edges.iter().filter_map(stored_id).collect())
}
