//! Events fed back into the primary event log.

use crate::document::NormalizedDoc;
use crate::reference::SpaceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Insert => "INSERT",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub space: SpaceName,
    pub document_id: Uuid,
    pub kind: EventKind,
    /// Payload of inserts and updates.
    pub data: Option<NormalizedDoc>,
    /// Absolute-URL id of the removed instance (deletes only).
    pub removed_instance: Option<String>,
    pub reported_at: DateTime<Utc>,
}

impl Event {
    pub fn upsert(space: SpaceName, document_id: Uuid, kind: EventKind, data: NormalizedDoc) -> Self {
        Self {
            space,
            document_id,
            kind,
            data: Some(data),
            removed_instance: None,
            reported_at: Utc::now(),
        }
    }

    pub fn delete(space: SpaceName, document_id: Uuid, absolute_id: String) -> Self {
        Self {
            space,
            document_id,
            kind: EventKind::Delete,
            data: None,
            removed_instance: Some(absolute_id),
            reported_at: Utc::now(),
        }
    }
}
