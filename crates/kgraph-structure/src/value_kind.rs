//! Classification of property values by shape.

use chrono::DateTime;
use kgraph_core::document::reference_of;
use serde_json::Value;
use std::fmt;

/// Shape of a property value as observed in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValueKind {
    String,
    StringArray,
    Number,
    NumberArray,
    Iri,
    IriArray,
    Object,
    Date,
    Boolean,
    Null,
    /// Anything else, tagged with what was found.
    Unknown(String),
}

impl PropertyValueKind {
    /// Classify a value. Total: unrecognized shapes become [`PropertyValueKind::Unknown`].
    ///
    /// Arrays are classified by their first element; an empty array counts as
    /// a string array. Strings that parse as RFC 3339 timestamps are dates.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Array(items) => match items.first() {
                None | Some(Value::String(_)) => Self::StringArray,
                Some(Value::Number(_)) => Self::NumberArray,
                Some(head) if reference_of(head).is_some() => Self::IriArray,
                Some(head) => Self::Unknown(format!("array of {}", json_type_name(head))),
            },
            Value::Object(_) if reference_of(value).is_some() => Self::Iri,
            Value::Object(_) => Self::Object,
            Value::String(s) => {
                if DateTime::parse_from_rfc3339(s).is_ok() {
                    Self::Date
                } else {
                    Self::String
                }
            }
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Null => Self::Null,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::StringArray => "string_array".to_string(),
            Self::Number => "number".to_string(),
            Self::NumberArray => "number_array".to_string(),
            Self::Iri => "iri".to_string(),
            Self::IriArray => "iri_array".to_string(),
            Self::Object => "object".to_string(),
            Self::Date => "date".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Null => "null".to_string(),
            Self::Unknown(found) => format!("unknown ({found})"),
        }
    }
}

impl fmt::Display for PropertyValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kind(value: Value) -> String {
        PropertyValueKind::classify(&value).name()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(kind(json!("Homer")), "string");
        assert_eq!(kind(json!(42)), "number");
        assert_eq!(kind(json!(true)), "boolean");
        assert_eq!(kind(json!(null)), "null");
        assert_eq!(kind(json!({"@id": "http://x/1"})), "iri");
        assert_eq!(kind(json!({"http://x/p": 1})), "object");
    }

    #[test]
    fn test_date_shaped_strings_are_dates() {
        assert_eq!(kind(json!("2021-03-04T05:06:07Z")), "date");
        assert_eq!(kind(json!("2021-03-04T05:06:07+02:00")), "date");
        assert_eq!(kind(json!("2021-03-04")), "string");
    }

    #[test]
    fn test_arrays_follow_their_head() {
        assert_eq!(kind(json!([])), "string_array");
        assert_eq!(kind(json!(["a", 1])), "string_array");
        assert_eq!(kind(json!([1.5, 2])), "number_array");
        assert_eq!(kind(json!([{"@id": "http://x/1"}])), "iri_array");
    }

    #[test]
    fn test_unrecognized_shapes_are_tagged_not_rejected() {
        assert_eq!(kind(json!([true])), "unknown (array of boolean)");
        assert_eq!(kind(json!([{"http://x/p": 1}])), "unknown (array of object)");
        assert_eq!(kind(json!([[1]])), "unknown (array of array)");
    }
}
