use super::{
    definition_instance, handle_explicit_target_types, handle_override_reference, required_reference,
    SemanticsContext,
};
use crate::meta::create_meta_representation;
use kgraph_core::collections::{META_PROPERTY_OVERRIDE, PROPERTIES};
use kgraph_core::{
    vocab, DbOperation, DocumentRef, IndexedDocument, NormalizedDoc, Result, SpaceName, UpsertOperation,
};

pub(super) async fn upsert_operations(
    ctx: &SemanticsContext<'_>,
    root: &DocumentRef,
    document: &IndexedDocument,
) -> Result<Vec<DbOperation>> {
    let property = required_reference(&document.doc, vocab::META_PROPERTY)?;
    let property_vertex = create_meta_representation(property, &PROPERTIES.collection());
    let mut operations = Vec::new();
    if !ctx.store.document_exists(ctx.stage, &property_vertex.id).await? {
        operations.push(
            UpsertOperation::structural(property_vertex.payload(), property_vertex.id.clone()).into(),
        );
    }
    operations.extend(
        handle_override_reference(
            ctx,
            root,
            document,
            Some(property),
            property_vertex.id.clone(),
            META_PROPERTY_OVERRIDE,
        )
        .await?,
    );
    operations.extend(handle_explicit_target_types(&document.doc, &property_vertex.id));
    Ok(operations)
}

pub(super) fn deprecation_operations(
    ctx: &SemanticsContext<'_>,
    space: &SpaceName,
    document: &NormalizedDoc,
) -> Result<Vec<DbOperation>> {
    Ok(vec![DbOperation::delete_instance(definition_instance(ctx, space, document)?)])
}
