//! The known tagged-constant set.

use std::collections::{HashMap, HashSet};

use crate::field::ClassFieldDef;
use crate::table::ConstantTable;
use crate::tag;

/// Immutable snapshot of every `(unit, originalValue)` pair the rewriter may
/// legitimately encounter in bytecode.
///
/// A tag decoded from a module that is missing here indicates a stale or
/// mismatched build and must fail that module's rewrite.
#[derive(Debug, Clone, Default)]
pub struct TaggedSet {
    by_unit: HashMap<String, HashSet<String>>,
    len: usize,
}

impl TaggedSet {
    /// Build the set from a constant table.
    ///
    /// Accepts both untagged and already-tagged tables: a value in tag form
    /// contributes its decoded original value, so the set is stable across
    /// re-processing.
    pub fn from_table(table: &ConstantTable) -> Self {
        let mut set = Self::default();
        for (unit, flavors) in &table.units {
            for fields in flavors.variants.values() {
                for field in fields {
                    if !field.field_type.is_rewritable() {
                        continue;
                    }
                    let value = match tag::parse(&field.value) {
                        Some(tag) => tag.value,
                        None => field.value.as_str(),
                    };
                    set.insert(unit, value);
                }
            }
        }
        set
    }

    /// Build the set from flattened field definitions.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a ClassFieldDef>) -> Self {
        let mut set = Self::default();
        for field in fields {
            if !field.field_type.is_rewritable() {
                continue;
            }
            let value = match tag::parse(&field.value) {
                Some(tag) => tag.value,
                None => field.value.as_str(),
            };
            set.insert(&field.unit, value);
        }
        set
    }

    /// Add one known pair.
    pub fn insert(&mut self, unit: &str, value: &str) {
        let values = self.by_unit.entry(unit.to_string()).or_default();
        if values.insert(value.to_string()) {
            self.len += 1;
        }
    }

    /// Whether `(unit, value)` is a known tagged constant.
    pub fn contains(&self, unit: &str, value: &str) -> bool {
        self.by_unit
            .get(unit)
            .is_some_and(|values| values.contains(value))
    }

    /// Number of distinct known pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldRecord, FieldType};
    use crate::flavor::FlavorFieldSet;

    #[test]
    fn tagged_and_untagged_tables_produce_the_same_set() {
        let mut plain = FlavorFieldSet::default();
        plain.variants.insert(
            "demo".to_string(),
            vec![FieldRecord::string("SERVER_URL", "https://a.example.com")],
        );
        let mut tagged = FlavorFieldSet::default();
        tagged.variants.insert(
            "demo".to_string(),
            vec![FieldRecord::string(
                "SERVER_URL",
                "`BuildConfig#app#https://a.example.com`",
            )],
        );

        let mut plain_table = ConstantTable::default();
        plain_table.units.insert("app".to_string(), plain);
        let mut tagged_table = ConstantTable::default();
        tagged_table.units.insert("app".to_string(), tagged);

        let from_plain = TaggedSet::from_table(&plain_table);
        let from_tagged = TaggedSet::from_table(&tagged_table);
        assert!(from_plain.contains("app", "https://a.example.com"));
        assert!(from_tagged.contains("app", "https://a.example.com"));
        assert_eq!(from_plain.len(), 1);
        assert_eq!(from_tagged.len(), 1);
    }

    #[test]
    fn non_string_fields_are_skipped() {
        let defs = [ClassFieldDef {
            unit: "app".to_string(),
            name: "TIMEOUT".to_string(),
            field_type: FieldType::Int,
            value: "30".to_string(),
        }];
        let set = TaggedSet::from_fields(&defs);
        assert!(set.is_empty());
        assert!(!set.contains("app", "30"));
    }

    #[test]
    fn lookup_is_per_unit() {
        let mut set = TaggedSet::default();
        set.insert("app", "v");
        assert!(set.contains("app", "v"));
        assert!(!set.contains("lib", "v"));
    }
}
