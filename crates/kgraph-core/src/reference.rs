//! Addressing: stages, spaces, collections and document references.

use crate::error::KgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Data-visibility tier an instance lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataStage {
    /// Raw, as-ingested documents.
    Native,
    /// Inferred (reconciled) instances, not yet released.
    InProgress,
    Released,
}

impl DataStage {
    pub const ALL: [DataStage; 3] = [DataStage::Native, DataStage::InProgress, DataStage::Released];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataStage::Native => "native",
            DataStage::InProgress => "in_progress",
            DataStage::Released => "released",
        }
    }
}

impl fmt::Display for DataStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named partition of instances. Names are lower-cased and `_` becomes `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceName(String);

impl SpaceName {
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase().replace('_', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A space's instances live in a collection named after the space, so
    /// names taken by an internal collection are refused.
    pub fn validate(&self) -> Result<(), KgError> {
        if crate::collections::is_internal(&self.0) {
            return Err(KgError::MalformedDocument(format!(
                "space name {} is reserved for an internal collection",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SpaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A collection in the backing store. Vertex and edge collections share one
/// namespace, so equality only looks at the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRef {
    name: String,
    edge: bool,
}

impl CollectionRef {
    pub fn new(name: impl Into<String>, edge: bool) -> Self {
        Self {
            name: name.into(),
            edge,
        }
    }

    pub fn from_space(space: &SpaceName) -> Self {
        Self::new(space.as_str(), false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_edge(&self) -> bool {
        self.edge
    }

    pub fn doc(&self, key: Uuid) -> DocumentRef {
        DocumentRef::new(self.clone(), key)
    }
}

impl PartialEq for CollectionRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CollectionRef {}

impl Hash for CollectionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Compile-time description of an internal collection.
#[derive(Debug, Clone, Copy)]
pub struct StaticCollection {
    pub name: &'static str,
    pub edge: bool,
}

impl StaticCollection {
    pub fn collection(&self) -> CollectionRef {
        CollectionRef::new(self.name, self.edge)
    }

    pub fn doc(&self, key: Uuid) -> DocumentRef {
        self.collection().doc(key)
    }
}

/// Address of a single vertex, edge or document: `<collection>/<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    collection: CollectionRef,
    key: Uuid,
}

impl DocumentRef {
    pub fn new(collection: CollectionRef, key: Uuid) -> Self {
        Self { collection, key }
    }

    /// Parse `<collection>/<uuid>`.
    pub fn parse(id: &str, edge: bool) -> Result<Self, KgError> {
        let (collection, key) = id
            .rsplit_once('/')
            .ok_or_else(|| KgError::MalformedDocument(format!("not a document id: {id}")))?;
        let key = Uuid::parse_str(key)
            .map_err(|e| KgError::MalformedDocument(format!("invalid key in {id}: {e}")))?;
        Ok(Self::new(CollectionRef::new(collection, edge), key))
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn id(&self) -> String {
        format!("{}/{}", self.collection.name(), self.key)
    }
}

impl PartialOrd for DocumentRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocumentRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.collection.name(), self.key).cmp(&(other.collection.name(), other.key))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.name(), self.key)
    }
}

impl Serialize for DocumentRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id())
    }
}

impl<'de> Deserialize<'de> for DocumentRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DocumentRef::parse(&raw, false).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_names_are_normalized() {
        assert_eq!(SpaceName::new("My_Space").as_str(), "my-space");
    }

    #[test]
    fn internal_collection_names_are_not_spaces() {
        for name in ["documents", "Types", "space2type", "unresolved"] {
            assert!(matches!(
                SpaceName::new(name).validate(),
                Err(KgError::MalformedDocument(_))
            ));
        }
        assert!(SpaceName::new("myspace").validate().is_ok());
        assert!(SpaceName::new("clients").validate().is_ok());
    }

    #[test]
    fn document_ref_round_trips_through_its_id() {
        let key = Uuid::new_v4();
        let r = CollectionRef::new("types", false).doc(key);
        let parsed = DocumentRef::parse(&r.id(), false).unwrap();
        assert_eq!(parsed, r);
        assert_eq!(parsed.key(), key);
    }

    #[test]
    fn collection_equality_ignores_edge_flag() {
        assert_eq!(CollectionRef::new("space2type", true), CollectionRef::new("space2type", false));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(DocumentRef::parse("no-slash", false).is_err());
        assert!(DocumentRef::parse("types/not-a-uuid", false).is_err());
    }
}
