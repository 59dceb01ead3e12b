//! Declared constant fields.

use serde::{Deserialize, Serialize};

/// Declared type of a build-config field.
///
/// Serialized with the source-language type names used by the flavor
/// documents. Only string fields are tagged and rewritten today; the other
/// variants pass through every stage untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "String")]
    String,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
}

impl FieldType {
    /// Whether constants of this type participate in tagging and rewriting.
    pub fn is_rewritable(self) -> bool {
        matches!(self, FieldType::String)
    }
}

/// One declared field of one variant: the `{name, type, value}` record
/// emitted to flavor documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

impl FieldRecord {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            value: value.into(),
        }
    }
}

/// A declared constant together with its owning unit: the flattened form
/// consumed by the rewriter's known-constant set.
///
/// Created when the constant-table snapshot is taken and read-only from
/// then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFieldDef {
    pub unit: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_serializes_with_source_names() {
        let record = FieldRecord {
            name: "SERVER_URL".to_string(),
            field_type: FieldType::String,
            value: "https://a.example.com".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "String");

        let round: FieldRecord = serde_json::from_value(json).unwrap();
        assert_eq!(round, record);
    }

    #[test]
    fn only_strings_are_rewritable() {
        assert!(FieldType::String.is_rewritable());
        assert!(!FieldType::Boolean.is_rewritable());
        assert!(!FieldType::Int.is_rewritable());
    }
}
