//! Modified UTF-8, the string encoding of constant pool Utf8 entries.
//!
//! Differs from standard UTF-8 in two ways: NUL is encoded as the two-byte
//! form `C0 80`, and characters above U+FFFF are encoded as a UTF-16
//! surrogate pair with each surrogate in the three-byte form.

use crate::error::{ClassFileError, Result};

/// Decode a modified UTF-8 byte sequence.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut out = String::with_capacity(bytes.len());
    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0usize;
    while pos < bytes.len() {
        let b0 = bytes[pos];
        let unit: u16 = if b0 & 0x80 == 0 {
            pos += 1;
            u16::from(b0)
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = *bytes.get(pos + 1).ok_or(ClassFileError::InvalidUtf8)?;
            if b1 & 0xC0 != 0x80 {
                return Err(ClassFileError::InvalidUtf8);
            }
            pos += 2;
            (u16::from(b0 & 0x1F) << 6) | u16::from(b1 & 0x3F)
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = *bytes.get(pos + 1).ok_or(ClassFileError::InvalidUtf8)?;
            let b2 = *bytes.get(pos + 2).ok_or(ClassFileError::InvalidUtf8)?;
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(ClassFileError::InvalidUtf8);
            }
            pos += 3;
            (u16::from(b0 & 0x0F) << 12) | (u16::from(b1 & 0x3F) << 6) | u16::from(b2 & 0x3F)
        } else {
            return Err(ClassFileError::InvalidUtf8);
        };
        units.push(unit);
    }
    // The units are UTF-16 code units; surrogate pairs combine here.
    let mut iter = units.into_iter().peekable();
    while let Some(unit) = iter.next() {
        let ch = if (0xD800..=0xDBFF).contains(&unit) {
            let low = iter.next().ok_or(ClassFileError::InvalidUtf8)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(ClassFileError::InvalidUtf8);
            }
            let code =
                0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
            char::from_u32(code).ok_or(ClassFileError::InvalidUtf8)?
        } else if (0xDC00..=0xDFFF).contains(&unit) {
            return Err(ClassFileError::InvalidUtf8);
        } else {
            char::from_u32(u32::from(unit)).ok_or(ClassFileError::InvalidUtf8)?
        };
        out.push(ch);
    }
    Ok(out)
}

/// Encode a string as modified UTF-8.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = u32::from(ch);
        if code == 0 {
            out.extend_from_slice(&[0xC0, 0x80]);
        } else if code < 0x80 {
            out.push(code as u8);
        } else if code < 0x800 {
            out.push(0xC0 | (code >> 6) as u8);
            out.push(0x80 | (code & 0x3F) as u8);
        } else if code < 0x10000 {
            push_three_byte(&mut out, code as u16);
        } else {
            let v = code - 0x10000;
            push_three_byte(&mut out, 0xD800 + (v >> 10) as u16);
            push_three_byte(&mut out, 0xDC00 + (v & 0x3FF) as u16);
        }
    }
    out
}

fn push_three_byte(out: &mut Vec<u8>, unit: u16) {
    out.push(0xE0 | (unit >> 12) as u8);
    out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
    out.push(0x80 | (unit & 0x3F) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let text = "https://a.example.com";
        assert_eq!(decode(&encode(text)).unwrap(), text);
        assert_eq!(encode(text), text.as_bytes());
    }

    #[test]
    fn nul_uses_two_byte_form() {
        let encoded = encode("a\0b");
        assert_eq!(encoded, [b'a', 0xC0, 0x80, b'b']);
        assert_eq!(decode(&encoded).unwrap(), "a\0b");
    }

    #[test]
    fn supplementary_chars_use_surrogate_pairs() {
        let text = "x\u{1F600}y";
        let encoded = encode(text);
        assert_eq!(encoded.len(), 8);
        assert_eq!(decode(&encoded).unwrap(), text);
    }

    #[test]
    fn rejects_unpaired_surrogate() {
        let mut bytes = Vec::new();
        push_three_byte(&mut bytes, 0xD800);
        assert_eq!(decode(&bytes), Err(ClassFileError::InvalidUtf8));
    }
}
