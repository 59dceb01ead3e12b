//! The field collector.
//!
//! Read-only reporting pass over the constant table: per unit, enumerate the
//! declared string fields of every variant in declaration order, strip the
//! tag back off, and emit one `<unit>.json` flavor document. The documents
//! are what the runtime resolver loads, so collection must complete before
//! any rewriting that consumes the same snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bcfg_model::{ConstantTable, FieldRecord, FlavorFieldSet, tag};
use tracing::info;

use crate::error::{CollectError, Result};

/// Collect per-unit flavor field sets, values untagged.
///
/// Accepts tagged and untagged tables alike; only string fields are
/// collected (nothing else is resolvable at runtime).
pub fn collect_fields(table: &ConstantTable) -> BTreeMap<String, FlavorFieldSet> {
    let mut sets = BTreeMap::new();
    for (unit, set) in &table.units {
        let mut collected = FlavorFieldSet::default();
        for (variant, fields) in &set.variants {
            let records: Vec<FieldRecord> = fields
                .iter()
                .filter(|field| field.field_type.is_rewritable())
                .map(|field| {
                    let value = match tag::parse(&field.value) {
                        Some(tag) => tag.value,
                        None => field.value.as_str(),
                    };
                    FieldRecord {
                        name: field.name.clone(),
                        field_type: field.field_type,
                        value: value.to_string(),
                    }
                })
                .collect();
            collected.variants.insert(variant.clone(), records);
        }
        sets.insert(unit.clone(), collected);
    }
    sets
}

/// Write one unit's flavor document as `<dir>/<unit>.json`.
pub fn write_field_document(dir: &Path, unit: &str, set: &FlavorFieldSet) -> Result<PathBuf> {
    let path = dir.join(format!("{unit}.json"));
    let body = serde_json::to_vec_pretty(set).map_err(|source| CollectError::Serialize {
        unit: unit.to_string(),
        source,
    })?;
    fs::write(&path, body).map_err(|source| CollectError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Collect and write every unit's flavor document into `dir`.
pub fn write_field_documents(dir: &Path, table: &ConstantTable) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| CollectError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let sets = collect_fields(table);
    let mut paths = Vec::with_capacity(sets.len());
    for (unit, set) in &sets {
        paths.push(write_field_document(dir, unit, set)?);
    }
    info!(units = paths.len(), dir = %dir.display(), "wrote flavor documents");
    Ok(paths)
}
