//! Client configurations are stored as-is.

use kgraph_core::{DbOperation, DocumentRef, IndexedDocument, UpsertOperation};

pub(super) fn upsert_operations(root: &DocumentRef, document: &IndexedDocument) -> Vec<DbOperation> {
    vec![UpsertOperation::new(Some(root.clone()), document.to_payload(), document.id.clone()).into()]
}
