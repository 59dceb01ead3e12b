//! Constant pool parsing, serialization, and append-only mutation.
//!
//! Existing entries are never renumbered; the rewriter only appends the
//! handful of entries its call sequences need, deduplicating against the
//! entries already present.

use crate::bytes::{ByteReader, put_u16, put_u32};
use crate::error::{ClassFileError, Result};
use crate::mutf8;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// One constant pool entry.
///
/// Float and Double keep their raw bit patterns so serialization is
/// byte-exact regardless of NaN payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class { name_index: u16 },
    String { utf8_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Phantom second slot occupied by a Long or Double entry.
    Reserved,
}

/// The constant pool. Index 0 is unusable per the format.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u16()?;
        if count == 0 {
            return Err(ClassFileError::Malformed("empty constant pool".into()));
        }
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Reserved);
        while entries.len() < count as usize {
            let tag = reader.u8()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(mutf8::decode(reader.take(len)?)?)
                }
                TAG_INTEGER => Constant::Integer(reader.i32()?),
                TAG_FLOAT => Constant::Float(reader.u32()?),
                TAG_LONG => {
                    let high = u64::from(reader.u32()?);
                    let low = u64::from(reader.u32()?);
                    Constant::Long(((high << 32) | low) as i64)
                }
                TAG_DOUBLE => {
                    let high = u64::from(reader.u32()?);
                    let low = u64::from(reader.u32()?);
                    Constant::Double((high << 32) | low)
                }
                TAG_CLASS => Constant::Class { name_index: reader.u16()? },
                TAG_STRING => Constant::String { utf8_index: reader.u16()? },
                TAG_FIELDREF => Constant::FieldRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_METHODREF => Constant::MethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: reader.u8()?,
                    reference_index: reader.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType { descriptor_index: reader.u16()? },
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_index: reader.u16()?,
                    name_and_type_index: reader.u16()?,
                },
                TAG_MODULE => Constant::Module { name_index: reader.u16()? },
                TAG_PACKAGE => Constant::Package { name_index: reader.u16()? },
                other => {
                    return Err(ClassFileError::Malformed(format!(
                        "unknown constant pool tag {other}"
                    )));
                }
            };
            let two_slots = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            if two_slots {
                entries.push(Constant::Reserved);
            }
        }
        if entries.len() != count as usize {
            // A Long or Double in the final slot overran the declared count.
            return Err(ClassFileError::Malformed(
                "constant pool count mismatch".into(),
            ));
        }
        Ok(Self { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        put_u16(out, self.entries.len() as u16);
        for entry in &self.entries[1..] {
            match entry {
                Constant::Utf8(text) => {
                    out.push(TAG_UTF8);
                    let encoded = mutf8::encode(text);
                    put_u16(out, encoded.len() as u16);
                    out.extend_from_slice(&encoded);
                }
                Constant::Integer(v) => {
                    out.push(TAG_INTEGER);
                    put_u32(out, *v as u32);
                }
                Constant::Float(bits) => {
                    out.push(TAG_FLOAT);
                    put_u32(out, *bits);
                }
                Constant::Long(v) => {
                    out.push(TAG_LONG);
                    put_u32(out, ((*v as u64) >> 32) as u32);
                    put_u32(out, *v as u32);
                }
                Constant::Double(bits) => {
                    out.push(TAG_DOUBLE);
                    put_u32(out, (bits >> 32) as u32);
                    put_u32(out, *bits as u32);
                }
                Constant::Class { name_index } => {
                    out.push(TAG_CLASS);
                    put_u16(out, *name_index);
                }
                Constant::String { utf8_index } => {
                    out.push(TAG_STRING);
                    put_u16(out, *utf8_index);
                }
                Constant::FieldRef { class_index, name_and_type_index } => {
                    out.push(TAG_FIELDREF);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::MethodRef { class_index, name_and_type_index } => {
                    out.push(TAG_METHODREF);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::InterfaceMethodRef { class_index, name_and_type_index } => {
                    out.push(TAG_INTERFACE_METHODREF);
                    put_u16(out, *class_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::NameAndType { name_index, descriptor_index } => {
                    out.push(TAG_NAME_AND_TYPE);
                    put_u16(out, *name_index);
                    put_u16(out, *descriptor_index);
                }
                Constant::MethodHandle { reference_kind, reference_index } => {
                    out.push(TAG_METHOD_HANDLE);
                    out.push(*reference_kind);
                    put_u16(out, *reference_index);
                }
                Constant::MethodType { descriptor_index } => {
                    out.push(TAG_METHOD_TYPE);
                    put_u16(out, *descriptor_index);
                }
                Constant::Dynamic { bootstrap_index, name_and_type_index } => {
                    out.push(TAG_DYNAMIC);
                    put_u16(out, *bootstrap_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::InvokeDynamic { bootstrap_index, name_and_type_index } => {
                    out.push(TAG_INVOKE_DYNAMIC);
                    put_u16(out, *bootstrap_index);
                    put_u16(out, *name_and_type_index);
                }
                Constant::Module { name_index } => {
                    out.push(TAG_MODULE);
                    put_u16(out, *name_index);
                }
                Constant::Package { name_index } => {
                    out.push(TAG_PACKAGE);
                    put_u16(out, *name_index);
                }
                Constant::Reserved => {}
            }
        }
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(index as usize)
            .filter(|entry| !matches!(entry, Constant::Reserved))
            .ok_or(ClassFileError::BadPoolIndex(index))
    }

    /// Resolve a Utf8 entry.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassFileError::BadPoolIndex(index)),
        }
    }

    /// Resolve a String entry down to its text, or `None` if `index` does
    /// not point at a String constant.
    pub fn string_text(&self, index: u16) -> Option<&str> {
        match self.entries.get(index as usize)? {
            Constant::String { utf8_index } => match self.entries.get(*utf8_index as usize)? {
                Constant::Utf8(text) => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    /// Append an entry, returning its index.
    pub fn push(&mut self, entry: Constant) -> Result<u16> {
        let two_slots = matches!(entry, Constant::Long(_) | Constant::Double(_));
        let needed = if two_slots { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize {
            return Err(ClassFileError::PoolOverflow);
        }
        if self.entries.is_empty() {
            self.entries.push(Constant::Reserved);
        }
        let index = self.entries.len() as u16;
        self.entries.push(entry);
        if two_slots {
            self.entries.push(Constant::Reserved);
        }
        Ok(index)
    }

    fn find(&self, wanted: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry == wanted)
            .map(|index| index as u16)
    }

    fn ensure(&mut self, entry: Constant) -> Result<u16> {
        match self.find(&entry) {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    pub fn ensure_utf8(&mut self, text: &str) -> Result<u16> {
        self.ensure(Constant::Utf8(text.to_string()))
    }

    pub fn ensure_string(&mut self, text: &str) -> Result<u16> {
        let utf8_index = self.ensure_utf8(text)?;
        self.ensure(Constant::String { utf8_index })
    }

    pub fn ensure_class(&mut self, binary_name: &str) -> Result<u16> {
        let name_index = self.ensure_utf8(binary_name)?;
        self.ensure(Constant::Class { name_index })
    }

    pub fn ensure_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.ensure_utf8(name)?;
        let descriptor_index = self.ensure_utf8(descriptor)?;
        self.ensure(Constant::NameAndType { name_index, descriptor_index })
    }

    pub fn ensure_methodref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.ensure_class(class)?;
        let name_and_type_index = self.ensure_name_and_type(name, descriptor)?;
        self.ensure(Constant::MethodRef { class_index, name_and_type_index })
    }

    pub fn ensure_fieldref(&mut self, class_index: u16, name: &str, descriptor: &str) -> Result<u16> {
        let name_and_type_index = self.ensure_name_and_type(name, descriptor)?;
        self.ensure(Constant::FieldRef { class_index, name_and_type_index })
    }

    /// Number of slots, including the unusable index 0.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_deduplicates() {
        let mut pool = ConstantPool::default();
        let a = pool.ensure_string("hello").unwrap();
        let b = pool.ensure_string("hello").unwrap();
        assert_eq!(a, b);
        let before = pool.slot_count();
        pool.ensure_utf8("hello").unwrap();
        assert_eq!(pool.slot_count(), before);
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut pool = ConstantPool::default();
        pool.ensure_string("value").unwrap();
        pool.push(Constant::Long(-2)).unwrap();
        pool.push(Constant::Double(std::f64::consts::PI.to_bits()))
            .unwrap();
        let methodref = pool
            .ensure_methodref("com/android/BuildConfigDelegate", "getString", "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;")
            .unwrap();

        let mut out = Vec::new();
        pool.write(&mut out);
        let mut reader = ByteReader::new(&out);
        let parsed = ConstantPool::parse(&mut reader).unwrap();
        assert_eq!(parsed.slot_count(), pool.slot_count());
        assert!(matches!(
            parsed.get(methodref).unwrap(),
            Constant::MethodRef { .. }
        ));
    }

    #[test]
    fn long_occupies_two_slots() {
        let mut pool = ConstantPool::default();
        let long_index = pool.push(Constant::Long(7)).unwrap();
        let next = pool.ensure_utf8("after").unwrap();
        assert_eq!(next, long_index + 2);
        assert_eq!(
            pool.get(long_index + 1),
            Err(ClassFileError::BadPoolIndex(long_index + 1))
        );
    }
}
