//! Store-agnostic write intents.
//!
//! Structure derivation and the semantics handlers never write directly: they
//! return a list of [`DbOperation`]s which the ingestion pipeline commits as
//! one batch.

use crate::document::NormalizedDoc;
use crate::reference::DocumentRef;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DbOperation {
    Upsert(UpsertOperation),
    /// Remove exactly this document or edge.
    Delete { target: DocumentRef },
    /// Remove this instance together with everything whose lifecycle is bound to it.
    DeleteInstance { target: DocumentRef },
}

impl DbOperation {
    pub fn delete(target: DocumentRef) -> Self {
        DbOperation::Delete { target }
    }

    pub fn delete_instance(target: DocumentRef) -> Self {
        DbOperation::DeleteInstance { target }
    }

    pub fn target(&self) -> &DocumentRef {
        match self {
            DbOperation::Upsert(upsert) => &upsert.target,
            DbOperation::Delete { target } | DbOperation::DeleteInstance { target } => target,
        }
    }

    pub fn as_upsert(&self) -> Option<&UpsertOperation> {
        match self {
            DbOperation::Upsert(upsert) => Some(upsert),
            _ => None,
        }
    }

    pub fn is_delete(&self) -> bool {
        !matches!(self, DbOperation::Upsert(_))
    }
}

impl From<UpsertOperation> for DbOperation {
    fn from(op: UpsertOperation) -> Self {
        DbOperation::Upsert(op)
    }
}

impl fmt::Display for DbOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbOperation::Upsert(op) => write!(f, "upsert {}", op.target),
            DbOperation::Delete { target } => write!(f, "delete {target}"),
            DbOperation::DeleteInstance { target } => write!(f, "delete-instance {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertOperation {
    /// Document whose removal also removes this one.
    pub lifecycle_document: Option<DocumentRef>,
    pub payload: NormalizedDoc,
    pub target: DocumentRef,
    /// `false`: keep an existing document untouched (insert-if-absent).
    pub override_if_exists: bool,
    /// Record the lifecycle document as the payload's original document.
    pub attach_to_original_document: bool,
}

impl UpsertOperation {
    pub fn new(lifecycle_document: Option<DocumentRef>, payload: NormalizedDoc, target: DocumentRef) -> Self {
        Self {
            lifecycle_document,
            payload,
            target,
            override_if_exists: true,
            attach_to_original_document: true,
        }
    }

    /// Insert-if-absent of a derived element with no owning document.
    pub fn structural(payload: NormalizedDoc, target: DocumentRef) -> Self {
        Self {
            lifecycle_document: None,
            payload,
            target,
            override_if_exists: false,
            attach_to_original_document: false,
        }
    }

    pub fn with_flags(mut self, override_if_exists: bool, attach_to_original_document: bool) -> Self {
        self.override_if_exists = override_if_exists;
        self.attach_to_original_document = attach_to_original_document;
        self
    }
}
