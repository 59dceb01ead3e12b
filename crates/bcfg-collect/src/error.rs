use std::path::PathBuf;

use bcfg_model::TagError;
use thiserror::Error;

/// Errors from the tagging and collection passes.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A declared value cannot be expressed in the tag grammar. Fatal for
    /// the pass: a silently untagged constant would be inlined verbatim and
    /// never reach the resolver.
    #[error("cannot tag field `{name}` of unit `{unit}`")]
    Untaggable {
        unit: String,
        name: String,
        #[source]
        source: TagError,
    },

    #[error("failed to serialize field document for unit `{unit}`")]
    Serialize {
        unit: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write field document {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CollectError>;
