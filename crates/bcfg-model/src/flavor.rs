//! Per-unit flavor field sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldRecord;

/// All declared fields of one build unit, keyed by variant name.
///
/// Field order within a variant is declaration order and is preserved
/// through serialization. This is both the per-unit slice of the constant
/// table and the shape of the emitted `<unit>.json` flavor document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlavorFieldSet {
    pub variants: BTreeMap<String, Vec<FieldRecord>>,
}

impl FlavorFieldSet {
    /// Variant names in document order.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Declared fields for one variant.
    pub fn fields(&self, variant: &str) -> Option<&[FieldRecord]> {
        self.variants.get(variant).map(Vec::as_slice)
    }

    /// The first variant in document order, used as the default flavor when
    /// none was selected explicitly.
    pub fn default_variant(&self) -> Option<&str> {
        self.variants.keys().next().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldRecord;

    #[test]
    fn document_shape_is_variant_to_field_list() {
        let mut set = FlavorFieldSet::default();
        set.variants.insert(
            "demo".to_string(),
            vec![FieldRecord::string("SERVER_URL", "https://a.example.com")],
        );
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["demo"][0]["name"], "SERVER_URL");
        assert_eq!(json["demo"][0]["value"], "https://a.example.com");
    }
}
