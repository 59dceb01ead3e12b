//! Archive repackaging: rewrite eligible entries, copy the rest verbatim.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bcfg_classfile::{RewriteOutcome, rewrite_class};
use bcfg_model::TaggedSet;
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::eligibility::is_eligible_entry;
use crate::error::{ArchiveError, Result};

/// What happened to one archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveSummary {
    pub entries: usize,
    /// Entries whose bytes changed.
    pub rewritten: usize,
    /// Resolver call sites introduced across all entries.
    pub call_sites: usize,
}

/// Rewrite every eligible entry of the zip archive at `path` in place.
///
/// The output is assembled in a temp file next to the original and swapped
/// in only after every entry has been written; any failure discards the temp
/// file and leaves the archive untouched (all-or-nothing). Ineligible
/// entries are raw-copied, preserving their compressed bytes, order, and
/// names.
pub fn rewrite_archive(path: &Path, tagged: &TaggedSet) -> Result<ArchiveSummary> {
    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let zip_err = |source| ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    let mut writer = ZipWriter::new(temp);

    let mut summary = ArchiveSummary {
        entries: archive.len(),
        ..ArchiveSummary::default()
    };
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(zip_err)?;
        let name = entry.name().to_string();
        if !is_eligible_entry(&name) {
            writer.raw_copy_file(entry).map_err(zip_err)?;
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(io_err)?;
        let mut options = SimpleFileOptions::default().compression_method(entry.compression());
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }
        drop(entry);

        let outcome = rewrite_class(&bytes, tagged)
            .map_err(|source| ArchiveError::Entry { name: name.clone(), source })?;
        if let RewriteOutcome::Rewritten { bytes: out, call_sites } = outcome {
            debug!(entry = %name, call_sites, "rewrote archive entry");
            summary.rewritten += 1;
            summary.call_sites += call_sites;
            bytes = out;
        }
        writer.start_file(name, options).map_err(zip_err)?;
        writer.write_all(&bytes).map_err(io_err)?;
    }

    let temp = writer.finish().map_err(zip_err)?;
    temp.persist(path).map_err(|source| ArchiveError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        archive = %path.display(),
        entries = summary.entries,
        rewritten = summary.rewritten,
        "repackaged archive"
    );
    Ok(summary)
}

/// Repackage independent archives in parallel. Each archive is
/// all-or-nothing on its own; one failed archive does not stop the others.
pub fn rewrite_archives(
    paths: &[PathBuf],
    tagged: &TaggedSet,
) -> Vec<(PathBuf, Result<ArchiveSummary>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), rewrite_archive(path, tagged)))
        .collect()
}
