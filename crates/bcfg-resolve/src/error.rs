use thiserror::Error;

/// Errors from explicit resolver operations.
///
/// Resolution itself never fails; `resolve` falls back to the original
/// value. These errors only come from flavor selection and enumeration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No field document is loaded for the unit.
    #[error("no flavor document for unit `{0}`")]
    UnknownUnit(String),

    /// The unit's document does not declare the requested flavor.
    #[error("unit `{unit}` has no flavor `{flavor}`")]
    UnknownFlavor { unit: String, flavor: String },
}

pub type Result<T> = std::result::Result<T, ResolveError>;
