//! The runtime resolver.
//!
//! Rewritten bytecode calls `resolve(unit, original)` in place of every
//! inlined string constant, from arbitrarily many threads and with no
//! initialization ordering, so the resolver is a lazily-populated map behind
//! a `RwLock` and resolution never fails: when anything is missing the
//! original value is returned and the program behaves exactly as compiled.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use bcfg_model::{FieldRecord, FlavorFieldSet};
use tracing::{debug, warn};

use crate::error::{ResolveError, Result};

#[derive(Debug, Default)]
struct UnitState {
    /// `None` when the unit has no readable document; such units resolve
    /// every value to itself.
    set: Option<FlavorFieldSet>,
    /// Explicitly selected flavor, if any. Falls back to the document's
    /// first variant.
    selected: Option<String>,
}

/// Per-process flavor state over a directory of `<unit>.json` documents.
#[derive(Debug)]
pub struct FlavorResolver {
    docs_dir: PathBuf,
    units: RwLock<HashMap<String, UnitState>>,
}

impl FlavorResolver {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            units: RwLock::new(HashMap::new()),
        }
    }

    /// The current value of the constant originally declared as `original`
    /// in `unit`.
    ///
    /// The declaring field is recovered by matching `original` against the
    /// unit's variants in document order; the result is that field's value
    /// under the currently selected flavor. When no document, field, or
    /// flavor override exists, `original` comes back unchanged.
    pub fn resolve(&self, unit: &str, original: &str) -> String {
        self.with_unit(unit, |state| {
            let set = state.set.as_ref()?;
            let name = declaring_field(set, original)?;
            let flavor = state
                .selected
                .as_deref()
                .or_else(|| set.default_variant())?;
            let field = set
                .fields(flavor)?
                .iter()
                .find(|field| field.name == name)?;
            Some(field.value.clone())
        })
        .unwrap_or_else(|| original.to_string())
    }

    /// Select the active flavor for a unit.
    pub fn set_flavor(&self, unit: &str, flavor: &str) -> Result<()> {
        self.ensure_loaded(unit);
        let mut units = self
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(state) = units.get_mut(unit) else {
            return Err(ResolveError::UnknownUnit(unit.to_string()));
        };
        let Some(set) = &state.set else {
            return Err(ResolveError::UnknownUnit(unit.to_string()));
        };
        if set.fields(flavor).is_none() {
            return Err(ResolveError::UnknownFlavor {
                unit: unit.to_string(),
                flavor: flavor.to_string(),
            });
        }
        debug!(unit, flavor, "selected flavor");
        state.selected = Some(flavor.to_string());
        Ok(())
    }

    /// The active flavor of a unit: the selected one, else the document's
    /// first variant, else `None` when the unit is unknown.
    pub fn current_flavor(&self, unit: &str) -> Option<String> {
        self.with_unit(unit, |state| {
            let set = state.set.as_ref()?;
            state
                .selected
                .clone()
                .or_else(|| set.default_variant().map(str::to_string))
        })
    }

    /// Flavor names declared by a unit, in document order.
    pub fn flavors(&self, unit: &str) -> Vec<String> {
        self.with_unit(unit, |state| {
            Some(
                state
                    .set
                    .as_ref()?
                    .variant_names()
                    .map(str::to_string)
                    .collect(),
            )
        })
        .unwrap_or_default()
    }

    /// Field records of a unit under its active flavor.
    pub fn fields(&self, unit: &str) -> Vec<FieldRecord> {
        self.with_unit(unit, |state| {
            let set = state.set.as_ref()?;
            let flavor = state
                .selected
                .as_deref()
                .or_else(|| set.default_variant())?;
            Some(set.fields(flavor)?.to_vec())
        })
        .unwrap_or_default()
    }

    // Lock poison is recovered everywhere: a panic in one thread must not
    // turn every later resolver call into a panic at an injected call site.
    fn with_unit<T>(&self, unit: &str, read: impl FnOnce(&UnitState) -> Option<T>) -> Option<T> {
        self.ensure_loaded(unit);
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        read(units.get(unit)?)
    }

    /// Load the unit's document on first touch.
    fn ensure_loaded(&self, unit: &str) {
        {
            let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
            if units.contains_key(unit) {
                return;
            }
        }
        let state = UnitState {
            set: load_document(&self.docs_dir.join(format!("{unit}.json"))),
            selected: None,
        };
        let mut units = self
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        units.entry(unit.to_string()).or_insert(state);
    }
}

/// First field (variants in document order) declared with `value`.
fn declaring_field<'a>(set: &'a FlavorFieldSet, value: &str) -> Option<&'a str> {
    for variant in set.variant_names() {
        if let Some(field) = set
            .fields(variant)?
            .iter()
            .find(|field| field.value == value)
        {
            return Some(&field.name);
        }
    }
    None
}

fn load_document(path: &Path) -> Option<FlavorFieldSet> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            debug!(path = %path.display(), %error, "no flavor document");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(set) => Some(set),
        Err(error) => {
            warn!(path = %path.display(), %error, "unreadable flavor document");
            None
        }
    }
}
