//! Meta representations: the vertices standing for types, spaces, properties
//! and property value kinds.

use kgraph_core::{name_uuid, vocab, CollectionRef, DocumentRef, NormalizedDoc};
use serde_json::Value;

/// A structural vertex derived from a semantic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaRepresentation {
    pub id: DocumentRef,
    /// The name it was derived from (type IRI, space name, ...).
    pub identifier: String,
    pub label: String,
}

impl MetaRepresentation {
    pub fn payload(&self) -> NormalizedDoc {
        let mut doc = NormalizedDoc::new();
        doc.insert(
            vocab::SCHEMA_ORG_IDENTIFIER,
            Value::String(self.identifier.clone()),
        );
        doc.insert(vocab::SCHEMA_ORG_NAME, Value::String(self.label.clone()));
        doc
    }
}

/// Reference of the vertex for `name` in `collection`. The same name in two
/// collections yields two different keys.
pub fn meta_ref(name: &str, collection: &CollectionRef) -> DocumentRef {
    collection.doc(name_uuid(&[collection.name(), name]))
}

pub fn create_meta_representation(name: &str, collection: &CollectionRef) -> MetaRepresentation {
    MetaRepresentation {
        id: meta_ref(name, collection),
        identifier: name.to_string(),
        label: label_from_name(name),
    }
}

/// Short label of a fully qualified name: JSON-LD keywords lose their `@`,
/// IRIs keep their fragment or last path segment.
pub fn label_from_name(name: &str) -> String {
    if let Some(keyword) = name.strip_prefix('@') {
        return keyword.to_string();
    }
    if let Some((_, fragment)) = name.rsplit_once('#') {
        return fragment.to_string();
    }
    let path = match name.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => name,
    };
    let path = path.split('?').next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path).to_string()
}
