//! The constant tagger.
//!
//! Runs before compilation: every string constant in the table is wrapped in
//! the tag grammar so the value stays recognizable after the compiler inlines
//! it into bytecode. Pure transformation, input table untouched.

use bcfg_model::{ConstantTable, tag};
use tracing::debug;

use crate::error::{CollectError, Result};

/// Tag every string field of every unit and variant.
///
/// Already-tagged values pass through unchanged, so re-processing a table
/// (or a constant shared between variants) never double-wraps. Non-string
/// fields are copied verbatim.
///
/// # Errors
///
/// Fails with [`CollectError::Untaggable`] when a value cannot be expressed
/// in the grammar (it contains the fence character). This is fatal: leaving
/// the value untagged would let it inline beyond the rewriter's reach.
pub fn tag_table(table: &ConstantTable) -> Result<ConstantTable> {
    let mut tagged = table.clone();
    let mut wrapped = 0usize;
    for (unit, set) in &mut tagged.units {
        for fields in set.variants.values_mut() {
            for field in fields {
                if !field.field_type.is_rewritable() || tag::is_tagged(&field.value) {
                    continue;
                }
                field.value = tag::encode(unit, &field.value).map_err(|source| {
                    CollectError::Untaggable {
                        unit: unit.clone(),
                        name: field.name.clone(),
                        source,
                    }
                })?;
                wrapped += 1;
            }
        }
    }
    debug!(fields = wrapped, "tagged string constants");
    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use bcfg_model::{FieldRecord, FieldType, FlavorFieldSet};

    use super::*;

    fn table(value: &str) -> ConstantTable {
        let mut set = FlavorFieldSet::default();
        set.variants.insert(
            "demo".to_string(),
            vec![
                FieldRecord::string("SERVER_URL", value),
                FieldRecord {
                    name: "TIMEOUT".to_string(),
                    field_type: FieldType::Int,
                    value: "30".to_string(),
                },
            ],
        );
        let mut out = ConstantTable::default();
        out.units.insert("app".to_string(), set);
        out
    }

    #[test]
    fn wraps_string_fields_only() {
        let tagged = tag_table(&table("https://a.example.com")).unwrap();
        let fields = tagged.units["app"].fields("demo").unwrap();
        assert_eq!(fields[0].value, "`BuildConfig#app#https://a.example.com`");
        assert_eq!(fields[1].value, "30");
    }

    #[test]
    fn tagging_is_idempotent() {
        let once = tag_table(&table("https://a.example.com")).unwrap();
        let twice = tag_table(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn fence_in_value_is_fatal() {
        let err = tag_table(&table("back`tick")).expect_err("must fail");
        assert!(matches!(
            err,
            CollectError::Untaggable { unit, name, .. }
                if unit == "app" && name == "SERVER_URL"
        ));
    }
}
