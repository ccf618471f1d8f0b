//! Internal collections holding the derived structure.
//!
//! ```text
//!   spaces ──space2type──► types ──(space-scoped) type2property──► properties
//!                            │                        │
//!                            │                        ├─property2propertyValueType──► propertyValueTypes
//!                            │                        └─property2type──► space2type (target)
//!                            └──globaltype2property──► properties
//!
//!   documents ──documentRelation──► any structural edge it contributed to
//! ```

use crate::reference::StaticCollection;

pub const TYPES: StaticCollection = StaticCollection { name: "types", edge: false };
pub const SPACES: StaticCollection = StaticCollection { name: "spaces", edge: false };
pub const PROPERTIES: StaticCollection = StaticCollection { name: "properties", edge: false };
pub const PROPERTY_VALUE_TYPES: StaticCollection = StaticCollection {
    name: "propertyValueTypes",
    edge: false,
};
pub const DOCUMENTS: StaticCollection = StaticCollection { name: "documents", edge: false };

pub const SPACE_TO_TYPE: StaticCollection = StaticCollection { name: "space2type", edge: true };
pub const TYPE_TO_PROPERTY: StaticCollection = StaticCollection {
    name: "type2property",
    edge: true,
};
pub const GLOBAL_TYPE_TO_PROPERTY: StaticCollection = StaticCollection {
    name: "globaltype2property",
    edge: true,
};
pub const PROPERTY_TO_PROPERTY_VALUE_TYPE: StaticCollection = StaticCollection {
    name: "property2propertyValueType",
    edge: true,
};
pub const PROPERTY_TO_TYPE: StaticCollection = StaticCollection {
    name: "property2type",
    edge: true,
};
pub const DOCUMENT_RELATION: StaticCollection = StaticCollection {
    name: "documentRelation",
    edge: true,
};
/// Links whose target was not known when the origin was ingested.
pub const UNRESOLVED: StaticCollection = StaticCollection { name: "unresolved", edge: true };

// Override edges from meta-definitions to the element they augment.
pub const META_TYPE_OVERRIDE: StaticCollection = StaticCollection {
    name: "metaTypeOverride",
    edge: true,
};
pub const META_SPACE_OVERRIDE: StaticCollection = StaticCollection {
    name: "metaSpaceOverride",
    edge: true,
};
pub const META_PROPERTY_OVERRIDE: StaticCollection = StaticCollection {
    name: "metaPropertyOverride",
    edge: true,
};
pub const CLIENT_TYPE_PROPERTY: StaticCollection = StaticCollection {
    name: "clientTypeProperty",
    edge: true,
};

/// Every collection `ensure_schema` creates up front.
pub const ALL: [StaticCollection; 16] = [
    TYPES,
    SPACES,
    PROPERTIES,
    PROPERTY_VALUE_TYPES,
    DOCUMENTS,
    SPACE_TO_TYPE,
    TYPE_TO_PROPERTY,
    GLOBAL_TYPE_TO_PROPERTY,
    PROPERTY_TO_PROPERTY_VALUE_TYPE,
    PROPERTY_TO_TYPE,
    DOCUMENT_RELATION,
    UNRESOLVED,
    META_TYPE_OVERRIDE,
    META_SPACE_OVERRIDE,
    META_PROPERTY_OVERRIDE,
    CLIENT_TYPE_PROPERTY,
];

/// Whether `name` belongs to one of the internal collections.
pub fn is_internal(name: &str) -> bool {
    ALL.iter().any(|c| c.name == name)
}
