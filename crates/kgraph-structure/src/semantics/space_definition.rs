use super::{handle_override_reference, required_reference, SemanticsContext};
use crate::meta::{create_meta_representation, meta_ref};
use kgraph_core::collections::{META_SPACE_OVERRIDE, SPACES};
use kgraph_core::{
    vocab, DbOperation, DocumentRef, IndexedDocument, NormalizedDoc, Result, SpaceName, UpsertOperation,
};

pub(super) async fn upsert_operations(
    ctx: &SemanticsContext<'_>,
    root: &DocumentRef,
    document: &IndexedDocument,
) -> Result<Vec<DbOperation>> {
    let space = SpaceName::new(required_reference(&document.doc, vocab::SCHEMA_ORG_NAME)?);
    let space_vertex = create_meta_representation(space.as_str(), &SPACES.collection());
    let mut operations = Vec::new();
    if !ctx.store.document_exists(ctx.stage, &space_vertex.id).await? {
        operations.push(UpsertOperation::structural(space_vertex.payload(), space_vertex.id.clone()).into());
    }
    operations.extend(
        handle_override_reference(ctx, root, document, None, space_vertex.id, META_SPACE_OVERRIDE).await?,
    );
    Ok(operations)
}

/// A deprecated space definition takes the space vertex with it.
pub(super) fn deprecation_operations(document: &NormalizedDoc) -> Vec<DbOperation> {
    match document.get_str(vocab::META_SPACE) {
        Some(space) => vec![DbOperation::delete_instance(meta_ref(
            SpaceName::new(space).as_str(),
            &SPACES.collection(),
        ))],
        None => {
            tracing::warn!("space definition without a space, nothing to deprecate");
            Vec::new()
        }
    }
}
