//! Store-level errors.

use kgraph_core::KgError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed stored document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for KgError {
    fn from(err: StoreError) -> Self {
        KgError::Store(err.to_string())
    }
}
