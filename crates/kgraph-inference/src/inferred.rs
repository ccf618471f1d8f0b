//! Inferred instances: the merged view over identifier-linked documents.

use kgraph_core::{vocab, NormalizedDoc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// A merged document with its provenance (`_inferenceOf`) and the
/// alternatives considered per property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferredDocument {
    doc: NormalizedDoc,
}

impl InferredDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_doc(doc: NormalizedDoc) -> Self {
        Self { doc }
    }

    pub fn doc(&self) -> &NormalizedDoc {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut NormalizedDoc {
        &mut self.doc
    }

    pub fn into_doc(self) -> NormalizedDoc {
        self.doc
    }

    /// Absolute ids of the contributing native documents.
    pub fn inference_of(&self) -> Vec<String> {
        self.doc.get_str_list(vocab::INFERENCE_OF)
    }

    pub fn set_inference_of(&mut self, ids: BTreeSet<String>) {
        self.doc.insert(
            vocab::INFERENCE_OF,
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
    }

    pub fn alternatives(&self) -> Option<&Map<String, Value>> {
        self.doc.get(vocab::META_ALTERNATIVE).and_then(Value::as_object)
    }

    /// Alternatives recorded for `key`.
    pub fn alternatives_for(&self, key: &str) -> Vec<Alternative> {
        self.alternatives()
            .and_then(|all| all.get(key))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Alternative::from_value).collect())
            .unwrap_or_default()
    }

    pub fn set_alternatives(&mut self, alternatives: Map<String, Value>) {
        self.doc.insert(vocab::META_ALTERNATIVE, Value::Object(alternatives));
    }
}

/// One candidate value of a property and who contributed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub selected: bool,
    pub users: Vec<String>,
    pub value: Value,
}

impl Alternative {
    /// Users are kept as plain strings so they never turn into links.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(vocab::META_SELECTED.to_string(), Value::Bool(self.selected));
        map.insert(
            vocab::META_USER.to_string(),
            Value::Array(self.users.iter().cloned().map(Value::String).collect()),
        );
        map.insert(vocab::META_VALUE.to_string(), self.value.clone());
        Value::Object(map)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            selected: map.get(vocab::META_SELECTED)?.as_bool()?,
            users: map
                .get(vocab::META_USER)
                .and_then(Value::as_array)
                .map(|u| u.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            value: map.get(vocab::META_VALUE).cloned().unwrap_or(Value::Null),
        })
    }
}
