//! Error taxonomy shared by the structure and inference pipelines.

/// Errors raised while deriving structure or reconciling instances.
#[derive(Debug, thiserror::Error)]
pub enum KgError {
    /// A consistency rule of the derived graph does not hold. Aborts the
    /// current unit of work.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous reference: {0}")]
    Ambiguous(String),

    /// Input is missing something the computation requires (e.g. an id).
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Failure reported by the backing store. Never swallowed.
    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, KgError>;
