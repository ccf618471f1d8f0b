use crate::id_factory;
use crate::instance::Edge;
use crate::meta::meta_ref;
use kgraph_core::collections::{SPACES, TYPES};
use kgraph_core::{vocab, DbOperation, IndexedDocument, NormalizedDoc, SpaceName, UpsertOperation};

/// One space→type edge per declared space.
pub(super) fn upsert_operations(document: &IndexedDocument) -> Vec<DbOperation> {
    let Some(type_name) = document.doc.get_str(vocab::META_TYPE) else {
        return Vec::new();
    };
    let type_vertex = meta_ref(type_name, &TYPES.collection());
    document
        .doc
        .get_str_list(vocab::META_SPACES)
        .iter()
        .map(|space| {
            let space = SpaceName::new(space);
            let edge = Edge::new(
                id_factory::space_to_type(&space, type_name),
                meta_ref(space.as_str(), &SPACES.collection()),
                type_vertex.clone(),
            );
            UpsertOperation::structural(edge.payload(), edge.id).into()
        })
        .collect()
}

pub(super) fn deprecation_operations(document: &NormalizedDoc) -> Vec<DbOperation> {
    match (document.get_str(vocab::META_TYPE), document.get_str(vocab::META_SPACE)) {
        (Some(type_name), Some(space)) => vec![DbOperation::delete_instance(id_factory::space_to_type(
            &SpaceName::new(space),
            type_name,
        ))],
        _ => Vec::new(),
    }
}
