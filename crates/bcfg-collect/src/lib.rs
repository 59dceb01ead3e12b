//! Tagging and collection passes over the symbolic constant table.
//!
//! `tagger` wraps declared string constants in the tag grammar before
//! compilation; `collector` emits the per-unit flavor documents the runtime
//! resolver reads back. Both are pure passes over a [`ConstantTable`]
//! snapshot.
//!
//! [`ConstantTable`]: bcfg_model::ConstantTable

pub mod collector;
pub mod error;
pub mod tagger;

pub use collector::{collect_fields, write_field_document, write_field_documents};
pub use error::{CollectError, Result};
pub use tagger::tag_table;
