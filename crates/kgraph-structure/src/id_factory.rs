//! Deterministic ids of structural edges.
//!
//! Every structural edge is keyed by the names it connects, so deriving the
//! same structure twice addresses the same edges.

use kgraph_core::collections::{
    GLOBAL_TYPE_TO_PROPERTY, PROPERTY_TO_PROPERTY_VALUE_TYPE, PROPERTY_TO_TYPE, SPACE_TO_TYPE,
    TYPE_TO_PROPERTY,
};
use kgraph_core::{name_uuid, DocumentRef, SpaceName};

pub fn space_to_type(space: &SpaceName, type_name: &str) -> DocumentRef {
    SPACE_TO_TYPE.doc(name_uuid(&[SPACE_TO_TYPE.name, space.as_str(), type_name]))
}

/// Property observed on a type within a space.
pub fn space_type_to_property(space: &SpaceName, type_name: &str, property: &str) -> DocumentRef {
    TYPE_TO_PROPERTY.doc(name_uuid(&[
        TYPE_TO_PROPERTY.name,
        space.as_str(),
        type_name,
        property,
    ]))
}

/// Space-independent property declared on a type.
pub fn global_type_to_property(type_name: &str, property: &str) -> DocumentRef {
    GLOBAL_TYPE_TO_PROPERTY.doc(name_uuid(&[GLOBAL_TYPE_TO_PROPERTY.name, type_name, property]))
}

pub fn property_to_value_kind(type_to_property: &DocumentRef, kind: &str) -> DocumentRef {
    PROPERTY_TO_PROPERTY_VALUE_TYPE.doc(name_uuid(&[
        PROPERTY_TO_PROPERTY_VALUE_TYPE.name,
        &type_to_property.id(),
        kind,
    ]))
}

/// Link from a property of `(origin space, origin type)` to `(target space, target type)`.
pub fn property_to_type(
    origin_space: &SpaceName,
    origin_type: &str,
    property: &str,
    target_space: &SpaceName,
    target_type: &str,
) -> DocumentRef {
    PROPERTY_TO_TYPE.doc(name_uuid(&[
        PROPERTY_TO_TYPE.name,
        origin_space.as_str(),
        origin_type,
        property,
        target_space.as_str(),
        target_type,
    ]))
}
