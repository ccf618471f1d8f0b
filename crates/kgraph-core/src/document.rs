//! Normalized JSON-LD documents.
//!
//! A [`NormalizedDoc`] is the output of the (external) JSON-LD normalization:
//! an ordered map of fully qualified IRI keys to plain JSON values. A few
//! distinguished keys carry meaning for us:
//!
//! - `@id` / `@type`: identity and type list
//! - `http://schema.org/identifier`: additional identifiers (reconciliation)
//! - `meta/user`, `meta/propertyUpdates`: contributing user and per-field
//!   update timestamps
//! - keys starting with `_`: internal bookkeeping, never user data

use crate::error::{KgError, Result};
use crate::vocab;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDoc(Map<String, Value>);

impl NormalizedDoc {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(KgError::MalformedDocument(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keys carrying user data (internal `_` keys skipped).
    pub fn public_keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys().filter(|k| !vocab::is_internal_key(k))
    }

    /// Copy without any internal key.
    pub fn without_internal_keys(&self) -> NormalizedDoc {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !vocab::is_internal_key(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn id(&self) -> Option<&str> {
        self.0.get(vocab::JSONLD_ID).and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: &str) {
        self.0
            .insert(vocab::JSONLD_ID.to_string(), Value::String(id.to_string()));
    }

    pub fn types(&self) -> Vec<String> {
        string_list(self.0.get(vocab::JSONLD_TYPE))
    }

    pub fn has_type(&self, ty: &str) -> bool {
        self.types().iter().any(|t| t == ty)
    }

    pub fn set_types<I: IntoIterator<Item = String>>(&mut self, types: I) {
        let types: Vec<Value> = types.into_iter().map(Value::String).collect();
        self.0
            .insert(vocab::JSONLD_TYPE.to_string(), Value::Array(types));
    }

    pub fn identifiers(&self) -> BTreeSet<String> {
        string_list(self.0.get(vocab::SCHEMA_ORG_IDENTIFIER))
            .into_iter()
            .collect()
    }

    pub fn all_identifiers_including_id(&self) -> BTreeSet<String> {
        let mut identifiers = self.identifiers();
        if let Some(id) = self.id() {
            identifiers.insert(id.to_string());
        }
        identifiers
    }

    /// Replace the identifier list. Stored sorted so equal sets serialize equally.
    pub fn set_identifiers(&mut self, identifiers: BTreeSet<String>) {
        self.0.insert(
            vocab::SCHEMA_ORG_IDENTIFIER.to_string(),
            Value::Array(identifiers.into_iter().map(Value::String).collect()),
        );
    }

    pub fn add_identifiers<I: IntoIterator<Item = String>>(&mut self, identifiers: I) {
        let mut all = self.identifiers();
        all.extend(identifiers);
        self.set_identifiers(all);
    }

    // ------------------------------------------------------------------
    // Provenance
    // ------------------------------------------------------------------

    /// Id of the contributing user (`meta/user` as `{"@id": ..}` or plain string).
    pub fn user(&self) -> Option<String> {
        self.0
            .get(vocab::META_USER)
            .and_then(|v| reference_of(v).or_else(|| v.as_str()))
            .map(str::to_string)
    }

    /// Per-field last-change timestamps. Unparseable entries are skipped.
    pub fn field_update_times(&self) -> BTreeMap<String, DateTime<Utc>> {
        let mut times = BTreeMap::new();
        if let Some(Value::Object(map)) = self.0.get(vocab::META_PROPERTY_UPDATES) {
            for (key, value) in map {
                let parsed = value
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc));
                match parsed {
                    Some(ts) => {
                        times.insert(key.clone(), ts);
                    }
                    None => {
                        tracing::trace!(field = %key, "ignoring unparseable field update time")
                    }
                }
            }
        }
        times
    }

    pub fn set_field_update_time(&mut self, key: &str, at: DateTime<Utc>) {
        let entry = self
            .0
            .entry(vocab::META_PROPERTY_UPDATES.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), Value::String(at.to_rfc3339()));
        }
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// A single string-ish value: plain string, `{"@id": ..}` or `{"@value": ..}`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| match v {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map
                .get(vocab::JSONLD_ID)
                .or_else(|| map.get(vocab::JSONLD_VALUE))
                .and_then(Value::as_str),
            Value::Array(items) if items.len() == 1 => items[0].as_str().or_else(|| reference_of(&items[0])),
            _ => None,
        })
    }

    /// A list of string-ish values; a scalar is treated as a one-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        string_list(self.0.get(key))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Object(map) => map.get(vocab::JSONLD_VALUE).and_then(Value::as_bool),
            _ => None,
        })
    }

    /// `(property, target IRI)` for every IRI reference held by a public key.
    pub fn iri_references(&self) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        for (key, value) in &self.0 {
            if vocab::is_internal_key(key) || vocab::is_jsonld_keyword(key) {
                continue;
            }
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(iri) = reference_of(item) {
                            refs.push((key.clone(), iri.to_string()));
                        }
                    }
                }
                other => {
                    if let Some(iri) = reference_of(other) {
                        refs.push((key.clone(), iri.to_string()));
                    }
                }
            }
        }
        refs
    }
}

impl From<Map<String, Value>> for NormalizedDoc {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// `{"@id": iri}` → `iri`.
pub fn reference_of(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.contains_key(vocab::JSONLD_ID) => {
            map.get(vocab::JSONLD_ID).and_then(Value::as_str)
        }
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().or_else(|| reference_of(item)))
            .map(str::to_string)
            .collect(),
        Some(other) => reference_of(other).map(|s| vec![s.to_string()]).unwrap_or_default(),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> NormalizedDoc {
        NormalizedDoc::from_value(value).unwrap()
    }

    #[test]
    fn types_accept_scalar_and_array() {
        assert_eq!(doc(json!({"@type": "http://x/A"})).types(), vec!["http://x/A"]);
        assert_eq!(
            doc(json!({"@type": ["http://x/A", "http://x/B"]})).types(),
            vec!["http://x/A", "http://x/B"]
        );
        assert!(doc(json!({})).types().is_empty());
    }

    #[test]
    fn all_identifiers_include_the_id() {
        let d = doc(json!({
            "@id": "http://ns/1",
            "http://schema.org/identifier": ["foo", "bar"]
        }));
        let ids: Vec<_> = d.all_identifiers_including_id().into_iter().collect();
        assert_eq!(ids, vec!["bar", "foo", "http://ns/1"]);
    }

    #[test]
    fn user_reads_reference_or_plain_string() {
        let d = doc(json!({"https://core.kg.ebrains.eu/vocab/meta/user": {"@id": "http://u/1"}}));
        assert_eq!(d.user().as_deref(), Some("http://u/1"));
        let d = doc(json!({"https://core.kg.ebrains.eu/vocab/meta/user": "http://u/2"}));
        assert_eq!(d.user().as_deref(), Some("http://u/2"));
    }

    #[test]
    fn field_update_times_round_trip() {
        let mut d = NormalizedDoc::new();
        let at = DateTime::parse_from_rfc3339("2021-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        d.set_field_update_time("http://schema.org/name", at);
        assert_eq!(d.field_update_times().get("http://schema.org/name"), Some(&at));
    }

    #[test]
    fn iri_references_skip_internal_and_keywords() {
        let d = doc(json!({
            "@id": "http://ns/1",
            "_originalDocument": {"@id": "ignored"},
            "http://x/rel": [{"@id": "http://ns/2"}, "plain"],
            "http://x/single": {"@id": "http://ns/3"}
        }));
        assert_eq!(
            d.iri_references(),
            vec![
                ("http://x/rel".to_string(), "http://ns/2".to_string()),
                ("http://x/single".to_string(), "http://ns/3".to_string()),
            ]
        );
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(matches!(
            NormalizedDoc::from_value(json!([1, 2])),
            Err(KgError::MalformedDocument(_))
        ));
    }
}
