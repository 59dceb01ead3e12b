//! Class file structure: parse and serialize.
//!
//! Everything outside the constant pool and the Code attributes we rewrite
//! is carried as opaque bytes, so unrelated sections survive byte-for-byte.

use crate::bytes::{ByteReader, put_u16, put_u32};
use crate::error::{ClassFileError, Result};
use crate::pool::ConstantPool;

const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;

/// A named attribute with raw contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub data: Vec<u8>,
}

/// A field or method.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    /// Index of the first attribute with the given name, if present.
    pub fn attribute_index(&self, pool: &ConstantPool, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attr| pool.utf8(attr.name_index).is_ok_and(|n| n == name))
    }
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        if reader.u32()? != MAGIC {
            return Err(ClassFileError::BadMagic);
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;
        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.u16()?);
        }
        let fields = parse_members(&mut reader)?;
        let methods = parse_members(&mut reader)?;
        let attributes = parse_attributes(&mut reader)?;
        if !reader.is_empty() {
            return Err(ClassFileError::Malformed(format!(
                "{} trailing bytes after class structure",
                reader.remaining()
            )));
        }
        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.minor_version);
        put_u16(&mut out, self.major_version);
        self.pool.write(&mut out);
        put_u16(&mut out, self.access_flags);
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);
        put_u16(&mut out, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u16(&mut out, *interface);
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out
    }

    /// Binary name of this class (e.g. `com/example/Main`).
    pub fn class_name(&self) -> Result<&str> {
        match self.pool.get(self.this_class)? {
            crate::pool::Constant::Class { name_index } => self.pool.utf8(*name_index),
            _ => Err(ClassFileError::BadPoolIndex(self.this_class)),
        }
    }

    /// Index of the method with the given name and descriptor.
    pub fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods.iter().position(|method| {
            self.pool.utf8(method.name_index).is_ok_and(|n| n == name)
                && self
                    .pool
                    .utf8(method.descriptor_index)
                    .is_ok_and(|d| d == descriptor)
        })
    }
}

fn parse_members(reader: &mut ByteReader<'_>) -> Result<Vec<MemberInfo>> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let access_flags = reader.u16()?;
        let name_index = reader.u16()?;
        let descriptor_index = reader.u16()?;
        let attributes = parse_attributes(reader)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn parse_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<AttributeInfo>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        let len = reader.u32()? as usize;
        let data = reader.take(len)?.to_vec();
        attributes.push(AttributeInfo { name_index, data });
    }
    Ok(attributes)
}

fn write_members(out: &mut Vec<u8>, members: &[MemberInfo]) {
    put_u16(out, members.len() as u16);
    for member in members {
        put_u16(out, member.access_flags);
        put_u16(out, member.name_index);
        put_u16(out, member.descriptor_index);
        write_attributes(out, &member.attributes);
    }
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    put_u16(out, attributes.len() as u16);
    for attr in attributes {
        put_u16(out, attr.name_index);
        put_u32(out, attr.data.len() as u32);
        out.extend_from_slice(&attr.data);
    }
}
