//! The tag grammar: `` `BuildConfig#<unit>#<value>` ``.
//!
//! The grammar is the wire format embedded in compiled string constants. It
//! must survive compiler inlining unchanged, so both sides are fenced with a
//! backtick and the marker is a fixed literal that legitimate configuration
//! values are unlikely to carry. Decoding is exact: the whole literal must
//! match the grammar, and `decode(encode(unit, value))` is lossless.

use crate::error::TagError;

/// Fixed marker literal recognizable after inlining.
pub const MARKER: &str = "BuildConfig";

/// Separates the marker, unit, and value segments.
pub const DELIMITER: char = '#';

/// Fences the whole tag on both sides.
pub const FENCE: char = '`';

/// A decoded tag: the provenance of one inlined constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Owning build unit, `[A-Za-z0-9_-]+`.
    pub unit: &'a str,
    /// Original declared value, fence-free.
    pub value: &'a str,
}

/// Returns true if `unit` matches the unit grammar `[A-Za-z0-9_-]+`.
pub fn is_valid_unit(unit: &str) -> bool {
    !unit.is_empty()
        && unit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Encode `(unit, value)` into the tag grammar.
///
/// # Errors
///
/// Fails when `unit` violates the unit grammar, when `value` is empty, or
/// when `value` contains the fence character (it could not round-trip).
pub fn encode(unit: &str, value: &str) -> Result<String, TagError> {
    if !is_valid_unit(unit) {
        return Err(TagError::InvalidUnit(unit.to_string()));
    }
    if value.is_empty() {
        return Err(TagError::EmptyValue(unit.to_string()));
    }
    if value.contains(FENCE) {
        return Err(TagError::FenceInValue {
            unit: unit.to_string(),
            value: value.to_string(),
        });
    }
    Ok(format!("{FENCE}{MARKER}{DELIMITER}{unit}{DELIMITER}{value}{FENCE}"))
}

/// Decode `text` against the tag grammar.
///
/// Returns `None` when the text is not a tag. Partial or embedded matches
/// are rejected: the entire literal must be one tag.
pub fn parse(text: &str) -> Option<Tag<'_>> {
    let interior = text.strip_prefix(FENCE)?.strip_suffix(FENCE)?;
    // A fence inside the interior means the suffix we stripped was not the
    // closing delimiter of this tag.
    if interior.contains(FENCE) {
        return None;
    }
    let rest = interior.strip_prefix(MARKER)?;
    let rest = rest.strip_prefix(DELIMITER)?;
    let (unit, value) = rest.split_once(DELIMITER)?;
    if !is_valid_unit(unit) || value.is_empty() {
        return None;
    }
    Some(Tag { unit, value })
}

/// Decode `text`, treating a grammar mismatch as an error.
///
/// Rewrite call sites use [`parse`] (a mismatch just means "not tagged");
/// this variant is for contexts where the caller already knows the text
/// should be a tag.
pub fn decode(text: &str) -> Result<Tag<'_>, TagError> {
    parse(text).ok_or_else(|| TagError::NotTagged(text.to_string()))
}

/// Returns true if `text` is exactly one tagged value.
pub fn is_tagged(text: &str) -> bool {
    parse(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes() {
        let tagged = encode("app", "https://a.example.com").unwrap();
        assert_eq!(tagged, "`BuildConfig#app#https://a.example.com`");
        let tag = parse(&tagged).expect("tag");
        assert_eq!(tag.unit, "app");
        assert_eq!(tag.value, "https://a.example.com");
    }

    #[test]
    fn value_may_contain_delimiter() {
        let tagged = encode("lib-core", "a#b#c").unwrap();
        let tag = parse(&tagged).expect("tag");
        assert_eq!(tag.unit, "lib-core");
        assert_eq!(tag.value, "a#b#c");
    }

    #[test]
    fn rejects_invalid_unit() {
        assert_eq!(
            encode("my unit", "v"),
            Err(TagError::InvalidUnit("my unit".to_string()))
        );
        assert_eq!(encode("", "v"), Err(TagError::InvalidUnit(String::new())));
    }

    #[test]
    fn rejects_fence_in_value() {
        assert!(matches!(
            encode("app", "a`b"),
            Err(TagError::FenceInValue { .. })
        ));
    }

    #[test]
    fn rejects_partial_and_embedded_matches() {
        assert!(parse("BuildConfig#app#v").is_none());
        assert!(parse("`BuildConfig#app#v").is_none());
        assert!(parse("prefix `BuildConfig#app#v` suffix").is_none());
        assert!(parse("`BuildConfig#app#a` `BuildConfig#app#b`").is_none());
        assert!(parse("`OtherMarker#app#v`").is_none());
        assert!(parse("`BuildConfig#app#`").is_none());
        assert!(parse("`BuildConfig##v`").is_none());
    }

    #[test]
    fn decode_reports_mismatch() {
        assert!(matches!(decode("plain"), Err(TagError::NotTagged(_))));
    }
}
