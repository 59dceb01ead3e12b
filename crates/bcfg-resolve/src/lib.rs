//! Runtime resolution of flavor-swappable constants.
//!
//! The rewriter redirects every tagged constant load to
//! `resolve(unit, original)`; this crate answers those calls from the flavor
//! documents the collector emitted. One process-wide resolver instance is
//! installed once and shared by every call site.

use std::path::PathBuf;
use std::sync::OnceLock;

pub mod error;
pub mod resolver;

pub use error::{ResolveError, Result};
pub use resolver::FlavorResolver;

static GLOBAL: OnceLock<FlavorResolver> = OnceLock::new();

/// Install the process-wide resolver over a documents directory.
///
/// The first installation wins; later calls return the existing instance
/// unchanged (there is no way to re-point call sites already compiled
/// against it).
pub fn install(docs_dir: impl Into<PathBuf>) -> &'static FlavorResolver {
    GLOBAL.get_or_init(|| FlavorResolver::new(docs_dir))
}

/// The installed resolver, if any.
pub fn global() -> Option<&'static FlavorResolver> {
    GLOBAL.get()
}

/// Resolve against the installed resolver; identity before installation.
pub fn resolve(unit: &str, original: &str) -> String {
    match global() {
        Some(resolver) => resolver.resolve(unit, original),
        None => original.to_string(),
    }
}
