//! Data model for flavor-swappable build constants.
//!
//! A build-config constant starts life as a plain string value declared in a
//! constant table. Before compilation the tagger wraps it in the tag grammar
//! (`` `BuildConfig#unit#value` ``) so the value stays recognizable after the
//! compiler inlines it into bytecode. This crate owns that grammar plus the
//! serializable shapes shared by the tagging, collection, rewriting, and
//! resolution stages.

pub mod error;
pub mod field;
pub mod flavor;
pub mod set;
pub mod table;
pub mod tag;

pub use error::{TableError, TagError};
pub use field::{ClassFieldDef, FieldRecord, FieldType};
pub use flavor::FlavorFieldSet;
pub use set::TaggedSet;
pub use table::ConstantTable;
pub use tag::{Tag, decode, encode, is_tagged, is_valid_unit, parse};
