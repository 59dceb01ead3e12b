//! The symbolic constant table.
//!
//! The table is the pre-compilation input the build controls directly: every
//! unit, every variant, every declared field. Tagging and collection are pure
//! transformations over it, so there is no reflective access to compiler
//! internals anywhere in the pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TableError, TagError};
use crate::field::ClassFieldDef;
use crate::flavor::FlavorFieldSet;
use crate::tag;

/// Declared constants of every participating build unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantTable {
    pub units: BTreeMap<String, FlavorFieldSet>,
}

impl ConstantTable {
    /// Load and validate a constant table from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or JSON problems, or when a unit name violates the tag
    /// grammar (such a unit could never be encoded into a tag).
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let text = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: ConstantTable =
            serde_json::from_str(&text).map_err(|source| TableError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        table.validate()?;
        Ok(table)
    }

    /// Check every unit name against the unit grammar.
    pub fn validate(&self) -> Result<(), TagError> {
        for unit in self.units.keys() {
            if !tag::is_valid_unit(unit) {
                return Err(TagError::InvalidUnit(unit.clone()));
            }
        }
        Ok(())
    }

    /// Flatten the table into per-field definitions, in unit then variant
    /// then declaration order.
    pub fn flattened(&self) -> Vec<ClassFieldDef> {
        let mut defs = Vec::new();
        for (unit, set) in &self.units {
            for fields in set.variants.values() {
                for field in fields {
                    defs.push(ClassFieldDef {
                        unit: unit.clone(),
                        name: field.name.clone(),
                        field_type: field.field_type,
                        value: field.value.clone(),
                    });
                }
            }
        }
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldRecord;

    fn sample() -> ConstantTable {
        let mut set = FlavorFieldSet::default();
        set.variants.insert(
            "demo".to_string(),
            vec![FieldRecord::string("SERVER_URL", "https://a.example.com")],
        );
        set.variants.insert(
            "prod".to_string(),
            vec![FieldRecord::string("SERVER_URL", "https://b.example.com")],
        );
        let mut table = ConstantTable::default();
        table.units.insert("app".to_string(), set);
        table
    }

    #[test]
    fn flattens_in_declaration_order() {
        let defs = sample().flattened();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].unit, "app");
        assert_eq!(defs[0].value, "https://a.example.com");
        assert_eq!(defs[1].value, "https://b.example.com");
    }

    #[test]
    fn rejects_invalid_unit_names() {
        let mut table = sample();
        let set = table.units.remove("app").unwrap();
        table.units.insert("bad unit!".to_string(), set);
        assert!(matches!(
            table.validate(),
            Err(TagError::InvalidUnit(name)) if name == "bad unit!"
        ));
    }

    #[test]
    fn parses_table_document() {
        let json = r#"{
            "units": {
                "app": {
                    "demo": [
                        {"name": "SERVER_URL", "type": "String", "value": "https://a.example.com"}
                    ]
                }
            }
        }"#;
        let table: ConstantTable = serde_json::from_str(json).unwrap();
        let fields = table.units["app"].fields("demo").unwrap();
        assert_eq!(fields[0].name, "SERVER_URL");
    }
}
