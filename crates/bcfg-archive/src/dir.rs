//! Rewriting a directory tree of loose class files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bcfg_classfile::{RewriteOutcome, rewrite_class};
use bcfg_model::TaggedSet;
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::eligibility::is_excluded_class;
use crate::error::{ArchiveError, Result};

/// One class file that could not be rewritten. The file on disk is left as
/// it was.
#[derive(Debug)]
pub struct ModuleFailure {
    pub path: PathBuf,
    pub error: ArchiveError,
}

/// Outcome of a directory pass.
///
/// Failures do not stop the pass; each failed module keeps its original
/// bytes and is reported here so the caller can fail the overall run.
#[derive(Debug, Default)]
pub struct DirSummary {
    pub scanned: usize,
    pub rewritten: usize,
    pub call_sites: usize,
    pub failures: Vec<ModuleFailure>,
}

/// Rewrite every eligible `.class` file under `dir` in place.
///
/// Files are processed in parallel; each rewrite goes through a temp file in
/// the same directory and an atomic rename, so a crash mid-pass never leaves
/// a half-written class.
pub fn rewrite_class_dir(dir: &Path, tagged: &TaggedSet) -> Result<DirSummary> {
    let mut files = Vec::new();
    collect_class_files(dir, &mut files)?;

    let results: Vec<(PathBuf, Result<Option<usize>>)> = files
        .into_par_iter()
        .map(|path| {
            let result = rewrite_class_file(&path, tagged);
            (path, result)
        })
        .collect();

    let mut summary = DirSummary {
        scanned: results.len(),
        ..DirSummary::default()
    };
    for (path, result) in results {
        match result {
            Ok(Some(call_sites)) => {
                summary.rewritten += 1;
                summary.call_sites += call_sites;
            }
            Ok(None) => {}
            Err(error) => {
                warn!(path = %path.display(), %error, "module rewrite failed");
                summary.failures.push(ModuleFailure { path, error });
            }
        }
    }
    Ok(summary)
}

/// Rewrite a single loose class file in place. Returns the number of call
/// sites introduced, or `None` when the file was not touched.
pub fn rewrite_class_file(path: &Path, tagged: &TaggedSet) -> Result<Option<usize>> {
    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(io_err)?;
    let outcome = rewrite_class(&bytes, tagged).map_err(|source| ArchiveError::Class {
        path: path.to_path_buf(),
        source,
    })?;
    let RewriteOutcome::Rewritten { bytes, call_sites } = outcome else {
        return Ok(None);
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(&bytes).map_err(io_err)?;
    temp.persist(path).map_err(|source| ArchiveError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), call_sites, "rewrote class file");
    Ok(Some(call_sites))
}

fn collect_class_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let io_err = |source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_class_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "class") {
            let name = path.to_string_lossy();
            if !is_excluded_class(&name) {
                files.push(path);
            }
        }
    }
    Ok(())
}
