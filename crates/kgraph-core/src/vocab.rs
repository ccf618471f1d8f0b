//! Vocabulary terms used by the structure and inference pipelines.
//!
//! JSON-LD keywords, the schema.org terms we rely on, and the `meta` namespace
//! for meta-instances (type/property/space definitions, client configuration).

pub const JSONLD_ID: &str = "@id";
pub const JSONLD_TYPE: &str = "@type";
pub const JSONLD_VALUE: &str = "@value";

pub const SCHEMA_ORG_IDENTIFIER: &str = "http://schema.org/identifier";
pub const SCHEMA_ORG_NAME: &str = "http://schema.org/name";

pub const NAMESPACE: &str = "https://core.kg.ebrains.eu/vocab/";
pub const META: &str = "https://core.kg.ebrains.eu/vocab/meta/";

pub const META_USER: &str = "https://core.kg.ebrains.eu/vocab/meta/user";
pub const META_SPACE: &str = "https://core.kg.ebrains.eu/vocab/meta/space";
pub const META_SPACES: &str = "https://core.kg.ebrains.eu/vocab/meta/spaces";
pub const META_TYPE: &str = "https://core.kg.ebrains.eu/vocab/meta/type";
pub const META_PROPERTY: &str = "https://core.kg.ebrains.eu/vocab/meta/property";
pub const META_PROPERTY_TARGET_TYPES: &str = "https://core.kg.ebrains.eu/vocab/meta/targetTypes";
pub const META_PROPERTY_UPDATES: &str = "https://core.kg.ebrains.eu/vocab/meta/propertyUpdates";
pub const META_FORCED_REMOVAL: &str = "https://core.kg.ebrains.eu/vocab/meta/forcedRemoval";

pub const META_ALTERNATIVE: &str = "https://core.kg.ebrains.eu/vocab/meta/alternative";
pub const META_SELECTED: &str = "https://core.kg.ebrains.eu/vocab/meta/selected";
pub const META_VALUE: &str = "https://core.kg.ebrains.eu/vocab/meta/value";

pub const META_CLIENT_CONFIGURATION_TYPE: &str =
    "https://core.kg.ebrains.eu/vocab/meta/ClientConfiguration";
pub const META_TYPE_DEFINITION_TYPE: &str = "https://core.kg.ebrains.eu/vocab/meta/TypeDefinition";
pub const META_PROPERTY_DEFINITION_TYPE: &str =
    "https://core.kg.ebrains.eu/vocab/meta/PropertyDefinition";
pub const META_PROPERTY_IN_TYPE_DEFINITION_TYPE: &str =
    "https://core.kg.ebrains.eu/vocab/meta/PropertyInTypeDefinition";
pub const META_SPACE_DEFINITION_TYPE: &str =
    "https://core.kg.ebrains.eu/vocab/meta/SpaceDefinition";
pub const META_TYPE_IN_SPACE_DEFINITION_TYPE: &str =
    "https://core.kg.ebrains.eu/vocab/meta/TypeInSpaceDefinition";

// Internal bookkeeping keys written by the indexer and the store.
pub const KEY: &str = "_key";
pub const ID: &str = "_id";
pub const COLLECTION: &str = "_collection";
pub const FROM: &str = "_from";
pub const TO: &str = "_to";
pub const EMBEDDED: &str = "_embedded";
pub const ORIGINAL_DOCUMENT: &str = "_originalDocument";
pub const LIFECYCLE_DOCUMENT: &str = "_lifecycleDocument";
pub const IDENTIFIERS: &str = "_identifiers";
pub const DOC_COLLECTION: &str = "_docCollection";
pub const DOC_TYPES: &str = "_docTypes";
pub const TARGET_ORIGINAL_DOCUMENT: &str = "_targetOriginalDocument";
pub const ORIGINAL_TO: &str = "_originalTo";
pub const ORIGINAL_LABEL: &str = "_originalLabel";
pub const INFERENCE_OF: &str = "_inferenceOf";

/// Internal keys are prefixed with `_` and never take part in structure
/// derivation or field merging.
pub fn is_internal_key(key: &str) -> bool {
    key.starts_with('_')
}

/// JSON-LD keywords (`@id`, `@type`, ...).
pub fn is_jsonld_keyword(key: &str) -> bool {
    key.starts_with('@')
}
