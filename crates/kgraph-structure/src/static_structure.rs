//! Global structure derived from a single document.
//!
//! For an incoming document we derive which type, space, property and value
//! kind vertices and which edges between them must exist, and create the
//! missing ones. Structural elements are keyed deterministically, so a second
//! pass over the same document state creates nothing.

use crate::id_factory;
use crate::instance::{Edge, StructuralInstance};
use crate::meta::{create_meta_representation, MetaRepresentation};
use crate::value_kind::PropertyValueKind;
use kgraph_core::collections::{
    DOCUMENTS, DOCUMENT_RELATION, PROPERTIES, PROPERTY_VALUE_TYPES, SPACES, TYPES,
};
use kgraph_core::{
    vocab, DataStage, DbOperation, DocumentRef, IndexedDocument, Result, SpaceName,
    UpsertOperation,
};
use kgraph_store::{stored_id, GraphStore};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// What a structure derivation produced: the instances it requires (whether
/// or not they already existed) and the operations to apply.
#[derive(Debug, Default)]
pub struct StructureContribution {
    pub required: Vec<StructuralInstance>,
    pub operations: Vec<DbOperation>,
}

/// Vertex representing a root document in the structure graph.
pub fn document_vertex(root: &DocumentRef) -> DocumentRef {
    DOCUMENTS.doc(root.key())
}

pub struct StaticStructureController {
    store: Arc<dyn GraphStore>,
}

impl StaticStructureController {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Create the global vertices and edges `document` requires, then either
    /// register its document vertex (first sight) or retract the document
    /// relations of its previous version.
    pub async fn ensure_static_elements_and_clean_document_structure(
        &self,
        stage: DataStage,
        document: &IndexedDocument,
        original_document: &DocumentRef,
    ) -> Result<StructureContribution> {
        tracing::debug!(document = %document.id, "prepare global vertices and edges");
        let required = prepare_global_vertices_and_edges(document);

        tracing::debug!(document = %document.id, "create global vertices and edges");
        let mut operations = self.create_missing(stage, &required).await?;

        let vertex = document_vertex(original_document);
        if !self.store.document_exists(stage, &vertex).await? {
            tracing::debug!(document = %document.id, "create document representation");
            let representation = MetaRepresentation {
                id: vertex.clone(),
                identifier: original_document.id(),
                label: document
                    .doc
                    .id()
                    .map_or_else(|| original_document.key().to_string(), str::to_string),
            };
            operations.push(
                UpsertOperation::new(
                    Some(original_document.clone()),
                    representation.payload(),
                    vertex,
                )
                .into(),
            );
        } else {
            tracing::debug!(document = %document.id, "remove existing edges for updating");
            let previous = self
                .store
                .edges_from(stage, &DOCUMENT_RELATION.collection(), &vertex)
                .await?;
            operations.extend(
                previous
                    .iter()
                    .filter_map(stored_id)
                    .map(DbOperation::delete),
            );
        }
        Ok(StructureContribution {
            required,
            operations,
        })
    }

    /// Property-to-type edges between every origin type and every target type
    /// for `property`. Type and property vertices are assumed to exist.
    pub async fn ensure_static_property_to_type_edges(
        &self,
        stage: DataStage,
        origin_space: &SpaceName,
        target_space: &SpaceName,
        property: &str,
        origin_types: &[String],
        target_types: &[String],
    ) -> Result<StructureContribution> {
        let mut required = Vec::new();
        for origin_type in origin_types {
            let type_to_property =
                id_factory::space_type_to_property(origin_space, origin_type, property);
            for target_type in target_types {
                let edge = Edge::new(
                    id_factory::property_to_type(
                        origin_space,
                        origin_type,
                        property,
                        target_space,
                        target_type,
                    ),
                    type_to_property.clone(),
                    id_factory::space_to_type(target_space, target_type),
                )
                .with(vocab::ORIGINAL_LABEL, Value::String(property.to_string()));
                required.push(StructuralInstance::Edge(edge));
            }
        }
        let operations = self.create_missing(stage, &required).await?;
        Ok(StructureContribution {
            required,
            operations,
        })
    }

    /// Insert-if-absent operations for the required instances the store lacks.
    /// One batched existence check.
    pub async fn create_missing(
        &self,
        stage: DataStage,
        required: &[StructuralInstance],
    ) -> Result<Vec<DbOperation>> {
        if required.is_empty() {
            return Ok(Vec::new());
        }
        let candidates: Vec<DocumentRef> = required.iter().map(|i| i.id().clone()).collect();
        let missing = self.store.missing_documents(stage, &candidates).await?;
        Ok(required
            .iter()
            .filter(|i| missing.contains(i.id()))
            .map(|i| UpsertOperation::structural(i.payload(), i.id().clone()).into())
            .collect())
    }
}

/// Every vertex and edge the document requires, deduplicated, in a stable
/// order: types, space, space→type, properties, value kinds, type→property,
/// property→value kind.
///
/// A document without types contributes its space only.
pub fn prepare_global_vertices_and_edges(document: &IndexedDocument) -> Vec<StructuralInstance> {
    let space = document.space();
    let space_vertex = create_meta_representation(space.as_str(), &SPACES.collection());

    let mut types = document.types();
    dedup_in_order(&mut types);
    let type_vertices: Vec<MetaRepresentation> = types
        .iter()
        .map(|t| create_meta_representation(t, &TYPES.collection()))
        .collect();

    let mut vertices: Vec<StructuralInstance> = Vec::new();
    let mut edges: Vec<StructuralInstance> = Vec::new();

    let mut space_types = Vec::new();
    for type_vertex in &type_vertices {
        let id = id_factory::space_to_type(&space, &type_vertex.identifier);
        edges.push(Edge::new(id.clone(), space_vertex.id.clone(), type_vertex.id.clone()).into());
        space_types.push((id, type_vertex.identifier.clone()));
    }

    vertices.extend(type_vertices.into_iter().map(StructuralInstance::from));
    vertices.push(space_vertex.into());

    if !space_types.is_empty() {
        let properties = properties_with_value_kinds(document);
        let mut kind_vertices = Vec::new();
        for (property, kind) in &properties {
            vertices.push(create_meta_representation(property, &PROPERTIES.collection()).into());
            kind_vertices.push(create_meta_representation(&kind.name(), &PROPERTY_VALUE_TYPES.collection()));
        }
        vertices.extend(kind_vertices.into_iter().map(StructuralInstance::from));

        for (space_type, type_name) in &space_types {
            for (property, kind) in &properties {
                let type_to_property = id_factory::space_type_to_property(&space, type_name, property);
                let property_vertex = create_meta_representation(property, &PROPERTIES.collection());
                edges.push(
                    Edge::new(type_to_property.clone(), space_type.clone(), property_vertex.id).into(),
                );
                let kind_vertex =
                    create_meta_representation(&kind.name(), &PROPERTY_VALUE_TYPES.collection());
                edges.push(
                    Edge::new(
                        id_factory::property_to_value_kind(&type_to_property, &kind.name()),
                        type_to_property,
                        kind_vertex.id,
                    )
                    .into(),
                );
            }
        }
    }

    let mut seen = HashSet::new();
    vertices
        .into_iter()
        .chain(edges)
        .filter(|i| seen.insert(i.id().clone()))
        .collect()
}

/// Public (non-internal) keys with the shape of their value.
fn properties_with_value_kinds(document: &IndexedDocument) -> Vec<(String, PropertyValueKind)> {
    document
        .doc
        .iter()
        .filter(|(key, _)| !vocab::is_internal_key(key))
        .map(|(key, value)| (key.clone(), PropertyValueKind::classify(value)))
        .collect()
}

fn dedup_in_order(values: &mut Vec<String>) {
    let mut seen = HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::collections::{
        PROPERTY_TO_PROPERTY_VALUE_TYPE, SPACE_TO_TYPE, TYPE_TO_PROPERTY,
    };
    use kgraph_core::{CollectionRef, NormalizedDoc};
    use serde_json::json;
    use uuid::Uuid;

    fn indexed(value: serde_json::Value) -> IndexedDocument {
        let id = CollectionRef::new("myspace", false).doc(Uuid::new_v4());
        IndexedDocument::root(id, NormalizedDoc::from_value(value).unwrap())
    }

    fn count_in(required: &[StructuralInstance], collection: &str) -> usize {
        required
            .iter()
            .filter(|i| i.id().collection().name() == collection)
            .count()
    }

    #[test]
    fn test_typeless_document_contributes_its_space_only() {
        let required = prepare_global_vertices_and_edges(&indexed(json!({
            "http://schema.org/name": "x"
        })));
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].id().collection().name(), SPACES.name);
    }

    #[test]
    fn test_cross_product_of_types_and_properties() {
        let required = prepare_global_vertices_and_edges(&indexed(json!({
            "@type": ["http://x/A", "http://x/B"],
            "http://schema.org/name": "Homer",
            "http://schema.org/age": 39,
            "_internal": "skipped"
        })));
        assert_eq!(count_in(&required, TYPES.name), 2);
        assert_eq!(count_in(&required, SPACES.name), 1);
        assert_eq!(count_in(&required, SPACE_TO_TYPE.name), 2);
        // @type, name, age
        assert_eq!(count_in(&required, PROPERTIES.name), 3);
        // string_array, string, number
        assert_eq!(count_in(&required, PROPERTY_VALUE_TYPES.name), 3);
        assert_eq!(count_in(&required, TYPE_TO_PROPERTY.name), 6);
        assert_eq!(count_in(&required, PROPERTY_TO_PROPERTY_VALUE_TYPE.name), 6);
    }

    #[test]
    fn test_duplicate_types_are_collapsed() {
        let required = prepare_global_vertices_and_edges(&indexed(json!({
            "@type": ["http://x/A", "http://x/A"]
        })));
        assert_eq!(count_in(&required, TYPES.name), 1);
        assert_eq!(count_in(&required, SPACE_TO_TYPE.name), 1);
    }

    #[test]
    fn test_type_to_property_hangs_off_space_type_edge() {
        let required = prepare_global_vertices_and_edges(&indexed(json!({
            "@type": "http://x/A",
            "http://schema.org/name": "Homer"
        })));
        let space_type = id_factory::space_to_type(&SpaceName::new("myspace"), "http://x/A");
        let edge = required
            .iter()
            .filter_map(StructuralInstance::as_edge)
            .find(|e| {
                e.id == id_factory::space_type_to_property(
                    &SpaceName::new("myspace"),
                    "http://x/A",
                    "http://schema.org/name",
                )
            })
            .unwrap();
        assert_eq!(edge.from, space_type);
    }
}
