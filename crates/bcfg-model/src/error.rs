use std::path::PathBuf;

use thiserror::Error;

/// Errors from tag grammar encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    /// Unit names must match `[A-Za-z0-9_-]+`.
    #[error("invalid unit name {0:?}")]
    InvalidUnit(String),

    /// Empty values cannot round-trip through the grammar.
    #[error("empty value for unit {0:?} cannot be tagged")]
    EmptyValue(String),

    /// The backtick fences the tag; a value containing one would break
    /// the closing delimiter and the round-trip invariant.
    #[error("value {value:?} for unit {unit:?} contains the tag fence")]
    FenceInValue { unit: String, value: String },

    /// Explicit decode was requested on text that is not a tag.
    #[error("not a tagged value: {0:?}")]
    NotTagged(String),
}

/// Errors loading or validating a constant table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read constant table {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse constant table {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Tag(#[from] TagError),
}
