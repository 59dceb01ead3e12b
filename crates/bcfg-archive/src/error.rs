use std::path::PathBuf;

use bcfg_classfile::ClassFileError;
use thiserror::Error;

/// Errors from archive repackaging and directory rewriting.
///
/// Every failure leaves the original artifact byte-for-byte intact; work in
/// progress lives in a temp file that is discarded on error.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error in {}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// One entry failed to rewrite; the whole archive is abandoned.
    #[error("failed to rewrite archive entry `{name}`")]
    Entry {
        name: String,
        #[source]
        source: ClassFileError,
    },

    #[error("failed to rewrite class file {}", path.display())]
    Class {
        path: PathBuf,
        #[source]
        source: ClassFileError,
    },

    /// The rewritten temp file could not replace the original.
    #[error("failed to replace {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
