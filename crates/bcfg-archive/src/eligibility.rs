//! Which entries and archives the rewriter may touch.

use std::collections::BTreeSet;
use std::path::Path;

/// Class name stems that are never rewritten: the resolver itself, the
/// resource index classes, and the constant-bag class whose fields are the
/// declarations being replaced.
const EXCLUDED_STEMS: [&str; 3] = ["BuildConfigDelegate", "BuildConfig", "R"];

/// Whether an archive entry name denotes a class file (not a directory).
pub fn is_class_entry(name: &str) -> bool {
    !name.ends_with('/') && name.ends_with(".class")
}

/// Whether a class entry is excluded from rewriting by name.
///
/// The check is on the final path segment with the `.class` suffix removed,
/// so `com/example/R$string.class` and a top-level `R.class` are both
/// excluded.
pub fn is_excluded_class(name: &str) -> bool {
    let Some(stem) = name
        .rsplit('/')
        .next()
        .and_then(|file| file.strip_suffix(".class"))
    else {
        return false;
    };
    EXCLUDED_STEMS.contains(&stem) || stem.starts_with("R$")
}

/// An entry the repackager should run through the class rewriter.
pub fn is_eligible_entry(name: &str) -> bool {
    is_class_entry(name) && !is_excluded_class(name)
}

/// First-party archive scope.
///
/// Dependency archives pass through the pipeline untouched; only archives
/// produced by the build's own units are opened. An archive belongs to a
/// unit when its file stem is the unit name or the unit name followed by a
/// `-` qualifier (`app.jar`, `lib-core-1.2.0.jar`).
#[derive(Debug, Clone, Default)]
pub struct ArchiveScope {
    units: BTreeSet<String>,
}

impl ArchiveScope {
    pub fn from_units<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            units: units.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `path` names an archive produced by a first-party unit.
    pub fn contains(&self, path: &Path) -> bool {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return false;
        };
        self.units.iter().any(|unit| {
            stem == unit
                || stem
                    .strip_prefix(unit.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_entries_only() {
        assert!(is_class_entry("com/example/Main.class"));
        assert!(!is_class_entry("com/example/"));
        assert!(!is_class_entry("META-INF/MANIFEST.MF"));
    }

    #[test]
    fn resolver_and_resource_classes_are_excluded() {
        assert!(is_excluded_class("com/android/BuildConfigDelegate.class"));
        assert!(is_excluded_class("com/example/BuildConfig.class"));
        assert!(is_excluded_class("com/example/R.class"));
        assert!(is_excluded_class("com/example/R$string.class"));
        assert!(!is_excluded_class("com/example/Router.class"));
        assert!(!is_excluded_class("com/example/Main.class"));
    }

    #[test]
    fn scope_matches_unit_stems() {
        let scope = ArchiveScope::from_units(["app", "lib-core"]);
        assert!(scope.contains(Path::new("/out/app.jar")));
        assert!(scope.contains(Path::new("/out/lib-core-1.2.0.jar")));
        assert!(!scope.contains(Path::new("/out/okhttp-4.9.0.jar")));
        assert!(!scope.contains(Path::new("/out/application.jar")));
    }
}
