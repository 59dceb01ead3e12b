//! Repackaging compiled artifacts with rewritten constants.
//!
//! Two artifact shapes: zip archives (jars), repackaged all-or-nothing
//! through a temp file and atomic swap, and directory trees of loose class
//! files, rewritten per-file. Entry eligibility and the first-party archive
//! scope live in [`eligibility`].

pub mod dir;
pub mod eligibility;
pub mod error;
pub mod repack;

pub use dir::{DirSummary, ModuleFailure, rewrite_class_dir, rewrite_class_file};
pub use eligibility::{ArchiveScope, is_class_entry, is_eligible_entry, is_excluded_class};
pub use error::{ArchiveError, Result};
pub use repack::{ArchiveSummary, rewrite_archive, rewrite_archives};
