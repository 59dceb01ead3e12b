//! Pipeline stage functions for the `apply` pass.
//!
//! Stages run in a fixed order: load the constant table, collect the flavor
//! documents, then rewrite class trees and archives against the immutable
//! tagged snapshot. Collection happens first so a crash mid-rewrite never
//! leaves rewritten classes without documents to resolve from.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use bcfg_archive::{
    ArchiveScope, ArchiveSummary, DirSummary, rewrite_archives as repack_archives,
    rewrite_class_dir,
};
use bcfg_collect::{tag_table, write_field_documents};
use bcfg_model::{ConstantTable, TaggedSet};

/// Load the constant table and take the immutable tagged snapshot.
///
/// The table is run through the tagger even when only its snapshot is
/// needed: an untaggable value is a configuration error and must abort the
/// pass before anything is rewritten.
pub fn load_snapshot(table_path: &Path) -> Result<(ConstantTable, TaggedSet)> {
    let table = ConstantTable::load(table_path)
        .with_context(|| format!("load constant table {}", table_path.display()))?;
    let tagged = tag_table(&table).context("tag constant table")?;
    let set = TaggedSet::from_table(&tagged);
    info!(
        units = table.units.len(),
        constants = set.len(),
        "loaded constant table"
    );
    Ok((table, set))
}

/// Collect and write the per-unit flavor documents.
pub fn collect_documents(docs_dir: &Path, table: &ConstantTable) -> Result<Vec<PathBuf>> {
    let span = info_span!("collect", docs_dir = %docs_dir.display());
    let _guard = span.enter();
    write_field_documents(docs_dir, table).context("write flavor documents")
}

/// Rewrite a loose class tree in place.
pub fn rewrite_classes(dir: &Path, tagged: &TaggedSet) -> Result<DirSummary> {
    let span = info_span!("rewrite_classes", dir = %dir.display());
    let _guard = span.enter();
    let start = Instant::now();
    let summary = rewrite_class_dir(dir, tagged)
        .with_context(|| format!("rewrite class tree {}", dir.display()))?;
    info!(
        scanned = summary.scanned,
        rewritten = summary.rewritten,
        call_sites = summary.call_sites,
        failures = summary.failures.len(),
        duration_ms = start.elapsed().as_millis(),
        "class tree pass complete"
    );
    Ok(summary)
}

/// First-party archives directly under `libs_dir`, in name order.
///
/// Everything else in the directory passes through untouched (and unopened).
pub fn discover_archives(libs_dir: &Path, scope: &ArchiveScope) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    let entries = fs::read_dir(libs_dir)
        .with_context(|| format!("read archive directory {}", libs_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read archive directory {}", libs_dir.display()))?
            .path();
        let is_archive = path
            .extension()
            .is_some_and(|ext| ext == "jar" || ext == "zip");
        if is_archive && scope.contains(&path) {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// Repackage the given archives against the snapshot.
pub fn rewrite_archives(
    paths: &[PathBuf],
    tagged: &TaggedSet,
) -> Vec<(PathBuf, bcfg_archive::Result<ArchiveSummary>)> {
    let span = info_span!("rewrite_archives", count = paths.len());
    let _guard = span.enter();
    let start = Instant::now();
    let results = repack_archives(paths, tagged);
    info!(
        archives = results.len(),
        failed = results.iter().filter(|(_, result)| result.is_err()).count(),
        duration_ms = start.elapsed().as_millis(),
        "archive pass complete"
    );
    results
}
