//! Instance ids and name-based ids.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for every name-based UUID minted by this workspace.
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x6b67_7261_7068_4e61_8d3e_5f0c_2a91_7e44);

/// Deterministic UUID for a sequence of name parts. Each part is prefixed
/// with its byte length, so no two part sequences share an encoding.
pub fn name_uuid(parts: &[&str]) -> Uuid {
    let encoded: String = parts
        .iter()
        .map(|part| format!("{}:{}", part.len(), part))
        .collect();
    Uuid::new_v5(&NAME_NAMESPACE, encoded.as_bytes())
}

/// Translates between instance UUIDs and their absolute-URL `@id` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdUtils {
    namespace: String,
}

impl IdUtils {
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        if !namespace.ends_with('/') {
            namespace.push('/');
        }
        Self { namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn build_absolute_url(&self, id: Uuid) -> String {
        format!("{}{}", self.namespace, id)
    }

    /// UUID of an instance IRI in our namespace. Bare UUID strings are
    /// accepted too; anything else yields `None`.
    pub fn get_uuid(&self, iri: &str) -> Option<Uuid> {
        let raw = iri.strip_prefix(self.namespace.as_str()).unwrap_or(iri);
        Uuid::parse_str(raw).ok()
    }

    pub fn is_internal_iri(&self, iri: &str) -> bool {
        iri.starts_with(self.namespace.as_str())
    }
}

impl Default for IdUtils {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_NAMESPACE)
    }
}
