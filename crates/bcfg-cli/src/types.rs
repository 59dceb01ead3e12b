//! Result types shared by the apply pipeline and the summary printer.

use std::path::PathBuf;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A loose class tree.
    Classes,
    /// A zip archive.
    Archive,
}

impl TargetKind {
    pub fn label(self) -> &'static str {
        match self {
            TargetKind::Classes => "classes",
            TargetKind::Archive => "archive",
        }
    }
}

/// One processed rewrite target.
pub struct TargetSummary {
    pub name: String,
    pub kind: TargetKind,
    /// Class files scanned, or archive entries seen.
    pub modules: usize,
    pub rewritten: usize,
    pub call_sites: usize,
    /// `None` when the target succeeded.
    pub error: Option<String>,
}

/// Outcome of a full `apply` pass.
pub struct ApplyResult {
    pub docs_dir: PathBuf,
    pub documents: Vec<PathBuf>,
    pub targets: Vec<TargetSummary>,
    /// Per-module failures inside otherwise successful targets.
    pub errors: Vec<String>,
    pub has_errors: bool,
}
