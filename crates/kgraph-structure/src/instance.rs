//! Structural instances: derived vertices and edges.

use crate::meta::MetaRepresentation;
use kgraph_core::{vocab, DocumentRef, NormalizedDoc};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: DocumentRef,
    pub from: DocumentRef,
    pub to: DocumentRef,
    /// Additional attributes stored with the edge.
    pub extra: NormalizedDoc,
}

impl Edge {
    pub fn new(id: DocumentRef, from: DocumentRef, to: DocumentRef) -> Self {
        Self {
            id,
            from,
            to,
            extra: NormalizedDoc::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Property name a link edge was created for.
    pub fn original_label(&self) -> Option<&str> {
        self.extra.get_str(vocab::ORIGINAL_LABEL)
    }

    pub fn payload(&self) -> NormalizedDoc {
        let mut doc = self.extra.clone();
        doc.insert(vocab::FROM, Value::String(self.from.id()));
        doc.insert(vocab::TO, Value::String(self.to.id()));
        doc
    }
}

/// Something the structure of a document requires to exist.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralInstance {
    Vertex(MetaRepresentation),
    Edge(Edge),
}

impl StructuralInstance {
    pub fn id(&self) -> &DocumentRef {
        match self {
            StructuralInstance::Vertex(v) => &v.id,
            StructuralInstance::Edge(e) => &e.id,
        }
    }

    pub fn payload(&self) -> NormalizedDoc {
        match self {
            StructuralInstance::Vertex(v) => v.payload(),
            StructuralInstance::Edge(e) => e.payload(),
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            StructuralInstance::Edge(e) => Some(e),
            StructuralInstance::Vertex(_) => None,
        }
    }
}

impl From<MetaRepresentation> for StructuralInstance {
    fn from(v: MetaRepresentation) -> Self {
        StructuralInstance::Vertex(v)
    }
}

impl From<Edge> for StructuralInstance {
    fn from(e: Edge) -> Self {
        StructuralInstance::Edge(e)
    }
}
