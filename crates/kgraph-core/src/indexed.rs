//! Instance documents as they are kept in a space collection.

use crate::document::NormalizedDoc;
use crate::error::{KgError, Result};
use crate::reference::{DocumentRef, SpaceName};
use crate::vocab;
use serde_json::Value;
use uuid::Uuid;

/// Keys the indexer owns. They are lifted out of `doc` on read and written
/// back by [`IndexedDocument::to_payload`].
const BOOKKEEPING_KEYS: [&str; 7] = [
    vocab::KEY,
    vocab::ID,
    vocab::COLLECTION,
    vocab::EMBEDDED,
    vocab::ORIGINAL_DOCUMENT,
    vocab::LIFECYCLE_DOCUMENT,
    vocab::IDENTIFIERS,
];

/// A stored instance: its address, the root document it belongs to and the
/// normalized payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: DocumentRef,
    /// The root document; equal to `id` unless embedded.
    pub original_document: DocumentRef,
    pub embedded: bool,
    pub doc: NormalizedDoc,
}

impl IndexedDocument {
    pub fn root(id: DocumentRef, doc: NormalizedDoc) -> Self {
        Self {
            original_document: id.clone(),
            id,
            embedded: false,
            doc,
        }
    }

    pub fn embedded(id: DocumentRef, root: DocumentRef, doc: NormalizedDoc) -> Self {
        Self {
            id,
            original_document: root,
            embedded: true,
            doc,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.id.key()
    }

    /// Space the instance lives in (its collection name).
    pub fn space(&self) -> SpaceName {
        SpaceName::new(self.id.collection().name())
    }

    pub fn types(&self) -> Vec<String> {
        self.doc.types()
    }

    /// Payload handed to the store.
    pub fn to_payload(&self) -> NormalizedDoc {
        let mut payload = self.doc.clone();
        payload.insert(vocab::EMBEDDED, Value::Bool(self.embedded));
        payload.insert(
            vocab::ORIGINAL_DOCUMENT,
            Value::String(self.original_document.id()),
        );
        payload.insert(
            vocab::IDENTIFIERS,
            Value::Array(
                self.doc
                    .all_identifiers_including_id()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        payload
    }

    /// Rebuild from a stored payload (requires `_id`).
    pub fn from_payload(payload: Value) -> Result<Self> {
        let mut doc = NormalizedDoc::from_value(payload)?;
        let id = doc
            .get(vocab::ID)
            .and_then(Value::as_str)
            .ok_or_else(|| KgError::MalformedDocument("stored instance without _id".to_string()))
            .and_then(|raw| DocumentRef::parse(raw, false))?;
        let original_document = match doc.get(vocab::ORIGINAL_DOCUMENT).and_then(Value::as_str) {
            Some(raw) => DocumentRef::parse(raw, false)?,
            None => id.clone(),
        };
        let embedded = doc.get_bool(vocab::EMBEDDED).unwrap_or(false);
        for key in BOOKKEEPING_KEYS {
            doc.remove(key);
        }
        Ok(Self {
            id,
            original_document,
            embedded,
            doc,
        })
    }
}
