//! Code attribute decoding, relayout, and re-encoding.
//!
//! Instructions are decoded into a symbolic list so the rewriter can splice
//! in call sequences without worrying about byte offsets. Branch targets are
//! kept as *original* byte offsets; encoding lays the list out again,
//! patches every branch, and remaps the offsets embedded in the exception
//! table, LineNumberTable, LocalVariableTable(s), and StackMapTable.
//!
//! Rewrites only ever substitute a one-slot literal push with a call
//! sequence producing the same one slot, so the stack shape at every
//! original instruction boundary is unchanged and existing stack map frames
//! stay valid once their offsets are remapped.

use std::collections::{BTreeMap, BTreeSet};

use crate::bytes::{ByteReader, put_i32, put_u16, put_u32};
use crate::class::AttributeInfo;
use crate::error::{ClassFileError, Result};
use crate::pool::ConstantPool;

pub mod opcodes {
    pub const NOP: u8 = 0x00;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const IINC: u8 = 0x84;
    pub const GOTO: u8 = 0xA7;
    pub const JSR: u8 = 0xA8;
    pub const RET: u8 = 0xA9;
    pub const TABLESWITCH: u8 = 0xAA;
    pub const LOOKUPSWITCH: u8 = 0xAB;
    pub const ARETURN: u8 = 0xB0;
    pub const RETURN: u8 = 0xB1;
    pub const PUTSTATIC: u8 = 0xB3;
    pub const INVOKESTATIC: u8 = 0xB8;
    pub const WIDE: u8 = 0xC4;
    pub const IFNULL: u8 = 0xC6;
    pub const IFNONNULL: u8 = 0xC7;
    pub const GOTO_W: u8 = 0xC8;
    pub const JSR_W: u8 = 0xC9;
}

/// One decoded instruction. Branch targets are original byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// Position-independent instruction, opcode and operands verbatim.
    Plain(Vec<u8>),
    /// 16-bit branch (`ifeq`..`jsr`, `ifnull`, `ifnonnull`).
    Branch { opcode: u8, target: u32 },
    /// 32-bit branch (`goto_w`, `jsr_w`).
    BranchWide { opcode: u8, target: u32 },
    TableSwitch {
        default: u32,
        low: i32,
        high: i32,
        targets: Vec<u32>,
    },
    LookupSwitch {
        default: u32,
        pairs: Vec<(i32, u32)>,
    },
}

/// An instruction plus the original offset it was decoded from.
///
/// Inserted instructions carry `None`; when a replacement sequence stands in
/// for one original instruction, its first instruction inherits the original
/// offset so branches and frames that referenced the original land on the
/// start of the replacement.
#[derive(Debug, Clone)]
pub struct InsnEntry {
    pub insn: Insn,
    pub orig_offset: Option<u32>,
}

impl InsnEntry {
    pub fn inserted(insn: Insn) -> Self {
        Self { insn, orig_offset: None }
    }
}

/// Exception handler range, as original byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u32,
    pub end_pc: u32,
    pub handler_pc: u32,
    pub catch_type: u16,
}

/// A decoded Code attribute.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: Vec<InsnEntry>,
    pub exceptions: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
    orig_code_len: u32,
}

impl CodeAttribute {
    /// Build a fresh Code attribute (for an injected `<clinit>`).
    pub fn new(max_stack: u16, max_locals: u16, insns: Vec<InsnEntry>) -> Self {
        Self {
            max_stack,
            max_locals,
            insns,
            exceptions: Vec::new(),
            attributes: Vec::new(),
            orig_code_len: 0,
        }
    }

    /// Decode a Code attribute body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_len = reader.u32()?;
        let code = reader.take(code_len as usize)?;
        let insns = decode_instructions(code)?;
        let starts: BTreeSet<u32> = insns
            .iter()
            .filter_map(|entry| entry.orig_offset)
            .collect();
        validate_targets(&insns, &starts, code_len)?;

        let exception_count = reader.u16()?;
        let mut exceptions = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            let entry = ExceptionEntry {
                start_pc: u32::from(reader.u16()?),
                end_pc: u32::from(reader.u16()?),
                handler_pc: u32::from(reader.u16()?),
                catch_type: reader.u16()?,
            };
            if !starts.contains(&entry.start_pc)
                || !starts.contains(&entry.handler_pc)
                || !(starts.contains(&entry.end_pc) || entry.end_pc == code_len)
            {
                return Err(ClassFileError::Malformed(
                    "exception table offset is not an instruction boundary".into(),
                ));
            }
            exceptions.push(entry);
        }

        let attr_count = reader.u16()?;
        let mut attributes = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let name_index = reader.u16()?;
            let len = reader.u32()? as usize;
            attributes.push(AttributeInfo {
                name_index,
                data: reader.take(len)?.to_vec(),
            });
        }
        if !reader.is_empty() {
            return Err(ClassFileError::Malformed(
                "trailing bytes in Code attribute".into(),
            ));
        }
        Ok(Self {
            max_stack,
            max_locals,
            insns,
            exceptions,
            attributes,
            orig_code_len: code_len,
        })
    }

    /// Re-encode the attribute body, laying instructions out again and
    /// remapping every embedded offset.
    pub fn encode(&self, pool: &ConstantPool) -> Result<Vec<u8>> {
        let (offsets, new_code_len) = self.layout()?;
        let map = self.offset_map(&offsets);

        let mut code = Vec::with_capacity(new_code_len as usize);
        for (entry, offset) in self.insns.iter().zip(offsets.iter()) {
            emit_instruction(&mut code, entry, *offset, &map)?;
        }
        debug_assert_eq!(code.len() as u32, new_code_len);

        // The format caps code_length at 65535 regardless of what the
        // attribute carries, and every embedded offset is a u16.
        if new_code_len > u32::from(u16::MAX) {
            return Err(ClassFileError::OversizedMethod);
        }

        let mut out = Vec::new();
        put_u16(&mut out, self.max_stack);
        put_u16(&mut out, self.max_locals);
        put_u32(&mut out, new_code_len);
        out.extend_from_slice(&code);

        put_u16(&mut out, self.exceptions.len() as u16);
        for entry in &self.exceptions {
            put_u16(&mut out, map_exact(&map, entry.start_pc)? as u16);
            put_u16(
                &mut out,
                self.map_end(&map, entry.end_pc, new_code_len)? as u16,
            );
            put_u16(&mut out, map_exact(&map, entry.handler_pc)? as u16);
            put_u16(&mut out, entry.catch_type);
        }

        put_u16(&mut out, self.attributes.len() as u16);
        for attr in &self.attributes {
            let name = pool.utf8(attr.name_index).unwrap_or_default();
            let data = match name {
                "LineNumberTable" => remap_line_numbers(&attr.data, &map)?,
                "LocalVariableTable" | "LocalVariableTypeTable" => {
                    self.remap_local_variables(&attr.data, &map, new_code_len)?
                }
                "StackMapTable" => remap_stack_map(&attr.data, &map)?,
                _ => attr.data.clone(),
            };
            put_u16(&mut out, attr.name_index);
            put_u32(&mut out, data.len() as u32);
            out.extend_from_slice(&data);
        }
        Ok(out)
    }

    /// Compute the new offset of every instruction and the new code length.
    fn layout(&self) -> Result<(Vec<u32>, u32)> {
        let mut offsets = Vec::with_capacity(self.insns.len());
        let mut offset: u64 = 0;
        for entry in &self.insns {
            offsets.push(offset as u32);
            offset += instruction_size(&entry.insn, offset as u32) as u64;
            if offset > u64::from(u32::MAX) {
                return Err(ClassFileError::OversizedMethod);
            }
        }
        Ok((offsets, offset as u32))
    }

    fn offset_map(&self, offsets: &[u32]) -> BTreeMap<u32, u32> {
        self.insns
            .iter()
            .zip(offsets.iter())
            .filter_map(|(entry, new)| entry.orig_offset.map(|old| (old, *new)))
            .collect()
    }

    fn map_end(&self, map: &BTreeMap<u32, u32>, old: u32, new_code_len: u32) -> Result<u32> {
        if old == self.orig_code_len {
            Ok(new_code_len)
        } else {
            map_exact(map, old)
        }
    }

    fn remap_local_variables(
        &self,
        data: &[u8],
        map: &BTreeMap<u32, u32>,
        new_code_len: u32,
    ) -> Result<Vec<u8>> {
        let mut reader = ByteReader::new(data);
        let count = reader.u16()?;
        let mut out = Vec::with_capacity(data.len());
        put_u16(&mut out, count);
        for _ in 0..count {
            let start = u32::from(reader.u16()?);
            let length = u32::from(reader.u16()?);
            let rest = reader.take(6)?;
            let new_start = map_floor(map, start);
            let new_end = self.map_end_lenient(map, start + length, new_code_len);
            put_u16(&mut out, new_start as u16);
            put_u16(&mut out, new_end.saturating_sub(new_start) as u16);
            out.extend_from_slice(rest);
        }
        Ok(out)
    }

    fn map_end_lenient(&self, map: &BTreeMap<u32, u32>, old: u32, new_code_len: u32) -> u32 {
        if old >= self.orig_code_len {
            new_code_len
        } else {
            map_floor(map, old)
        }
    }
}

fn validate_targets(
    insns: &[InsnEntry],
    starts: &BTreeSet<u32>,
    code_len: u32,
) -> Result<()> {
    let check = |target: u32| -> Result<()> {
        if target < code_len && starts.contains(&target) {
            Ok(())
        } else {
            Err(ClassFileError::Malformed(format!(
                "branch target {target} is not an instruction boundary"
            )))
        }
    };
    for entry in insns {
        match &entry.insn {
            Insn::Branch { target, .. } | Insn::BranchWide { target, .. } => check(*target)?,
            Insn::TableSwitch { default, targets, .. } => {
                check(*default)?;
                for target in targets {
                    check(*target)?;
                }
            }
            Insn::LookupSwitch { default, pairs } => {
                check(*default)?;
                for (_, target) in pairs {
                    check(*target)?;
                }
            }
            Insn::Plain(_) => {}
        }
    }
    Ok(())
}

fn decode_instructions(code: &[u8]) -> Result<Vec<InsnEntry>> {
    let mut insns = Vec::new();
    let mut pos = 0usize;
    while pos < code.len() {
        let start = pos as u32;
        let opcode = code[pos];
        let insn = if is_branch16(opcode) {
            let operand = read_i16(code, pos + 1)?;
            pos += 3;
            Insn::Branch {
                opcode,
                target: offset_target(start, i32::from(operand))?,
            }
        } else if opcode == opcodes::GOTO_W || opcode == opcodes::JSR_W {
            let operand = read_i32(code, pos + 1)?;
            pos += 5;
            Insn::BranchWide {
                opcode,
                target: offset_target(start, operand)?,
            }
        } else if opcode == opcodes::TABLESWITCH {
            let mut cursor = pos + 1 + switch_padding(start);
            let default = offset_target(start, read_i32(code, cursor)?)?;
            let low = read_i32(code, cursor + 4)?;
            let high = read_i32(code, cursor + 8)?;
            if low > high {
                return Err(ClassFileError::Malformed("tableswitch low > high".into()));
            }
            cursor += 12;
            let count = (i64::from(high) - i64::from(low) + 1) as usize;
            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                targets.push(offset_target(start, read_i32(code, cursor)?)?);
                cursor += 4;
            }
            pos = cursor;
            Insn::TableSwitch { default, low, high, targets }
        } else if opcode == opcodes::LOOKUPSWITCH {
            let mut cursor = pos + 1 + switch_padding(start);
            let default = offset_target(start, read_i32(code, cursor)?)?;
            let npairs = read_i32(code, cursor + 4)?;
            if npairs < 0 {
                return Err(ClassFileError::Malformed("negative lookupswitch count".into()));
            }
            cursor += 8;
            let mut pairs = Vec::with_capacity(npairs as usize);
            for _ in 0..npairs {
                let key = read_i32(code, cursor)?;
                let target = offset_target(start, read_i32(code, cursor + 4)?)?;
                pairs.push((key, target));
                cursor += 8;
            }
            pos = cursor;
            Insn::LookupSwitch { default, pairs }
        } else if opcode == opcodes::WIDE {
            let modified = *code.get(pos + 1).ok_or(ClassFileError::Truncated)?;
            let len = if modified == opcodes::IINC { 6 } else { 4 };
            let end = pos + len;
            if end > code.len() {
                return Err(ClassFileError::Truncated);
            }
            let bytes = code[pos..end].to_vec();
            pos = end;
            Insn::Plain(bytes)
        } else {
            let len = plain_length(opcode).ok_or_else(|| {
                ClassFileError::Malformed(format!("unknown opcode 0x{opcode:02x}"))
            })?;
            let end = pos + len;
            if end > code.len() {
                return Err(ClassFileError::Truncated);
            }
            let bytes = code[pos..end].to_vec();
            pos = end;
            Insn::Plain(bytes)
        };
        insns.push(InsnEntry {
            insn,
            orig_offset: Some(start),
        });
    }
    Ok(insns)
}

fn emit_instruction(
    out: &mut Vec<u8>,
    entry: &InsnEntry,
    offset: u32,
    map: &BTreeMap<u32, u32>,
) -> Result<()> {
    match &entry.insn {
        Insn::Plain(bytes) => out.extend_from_slice(bytes),
        Insn::Branch { opcode, target } => {
            let displacement =
                i64::from(map_exact(map, *target)?) - i64::from(offset);
            let displacement =
                i16::try_from(displacement).map_err(|_| ClassFileError::OversizedMethod)?;
            out.push(*opcode);
            out.extend_from_slice(&displacement.to_be_bytes());
        }
        Insn::BranchWide { opcode, target } => {
            let displacement =
                i64::from(map_exact(map, *target)?) - i64::from(offset);
            let displacement =
                i32::try_from(displacement).map_err(|_| ClassFileError::OversizedMethod)?;
            out.push(*opcode);
            put_i32(out, displacement);
        }
        Insn::TableSwitch { default, low, high, targets } => {
            out.push(opcodes::TABLESWITCH);
            out.resize(out.len() + switch_padding(offset), 0);
            put_i32(out, switch_displacement(map, *default, offset)?);
            put_i32(out, *low);
            put_i32(out, *high);
            for target in targets {
                put_i32(out, switch_displacement(map, *target, offset)?);
            }
        }
        Insn::LookupSwitch { default, pairs } => {
            out.push(opcodes::LOOKUPSWITCH);
            out.resize(out.len() + switch_padding(offset), 0);
            put_i32(out, switch_displacement(map, *default, offset)?);
            put_i32(out, pairs.len() as i32);
            for (key, target) in pairs {
                put_i32(out, *key);
                put_i32(out, switch_displacement(map, *target, offset)?);
            }
        }
    }
    Ok(())
}

fn switch_displacement(map: &BTreeMap<u32, u32>, target: u32, offset: u32) -> Result<i32> {
    let displacement = i64::from(map_exact(map, target)?) - i64::from(offset);
    i32::try_from(displacement).map_err(|_| ClassFileError::OversizedMethod)
}

/// Size of an instruction when placed at `offset`.
fn instruction_size(insn: &Insn, offset: u32) -> usize {
    match insn {
        Insn::Plain(bytes) => bytes.len(),
        Insn::Branch { .. } => 3,
        Insn::BranchWide { .. } => 5,
        Insn::TableSwitch { targets, .. } => {
            1 + switch_padding(offset) + 12 + 4 * targets.len()
        }
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len(),
    }
}

/// Zero padding between a switch opcode and its 4-byte-aligned operands.
fn switch_padding(opcode_offset: u32) -> usize {
    3 - (opcode_offset as usize % 4)
}

fn is_branch16(opcode: u8) -> bool {
    (0x99..=opcodes::JSR).contains(&opcode)
        || opcode == opcodes::IFNULL
        || opcode == opcodes::IFNONNULL
}

/// Operand lengths for fixed-size instructions (opcode byte included).
fn plain_length(opcode: u8) -> Option<usize> {
    Some(match opcode {
        0x00..=0x0F => 1,                  // nop, const loads
        0x10 => 2,                         // bipush
        0x11 => 3,                         // sipush
        opcodes::LDC => 2,
        opcodes::LDC_W | opcodes::LDC2_W => 3,
        0x15..=0x19 => 2,                  // iload..aload
        0x1A..=0x35 => 1,                  // load_n, array loads
        0x36..=0x3A => 2,                  // istore..astore
        0x3B..=0x83 => 1,                  // store_n, array stores, stack ops, arithmetic
        opcodes::IINC => 3,
        0x85..=0x98 => 1,                  // conversions, comparisons
        opcodes::RET => 2,
        0xAC..=0xB1 => 1,                  // returns
        0xB2..=0xB5 => 3,                  // get/putstatic, get/putfield
        0xB6..=0xB8 => 3,                  // invokevirtual/special/static
        0xB9 | 0xBA => 5,                  // invokeinterface, invokedynamic
        0xBB => 3,                         // new
        0xBC => 2,                         // newarray
        0xBD => 3,                         // anewarray
        0xBE | 0xBF => 1,                  // arraylength, athrow
        0xC0 | 0xC1 => 3,                  // checkcast, instanceof
        0xC2 | 0xC3 => 1,                  // monitorenter/exit
        0xC5 => 4,                         // multianewarray
        _ => return None,
    })
}

fn offset_target(start: u32, displacement: i32) -> Result<u32> {
    let target = i64::from(start) + i64::from(displacement);
    u32::try_from(target).map_err(|_| {
        ClassFileError::Malformed(format!("branch target {target} out of range"))
    })
}

fn read_i16(code: &[u8], pos: usize) -> Result<i16> {
    let bytes = code.get(pos..pos + 2).ok_or(ClassFileError::Truncated)?;
    Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_i32(code: &[u8], pos: usize) -> Result<i32> {
    let bytes = code.get(pos..pos + 4).ok_or(ClassFileError::Truncated)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn map_exact(map: &BTreeMap<u32, u32>, old: u32) -> Result<u32> {
    map.get(&old)
        .copied()
        .ok_or_else(|| ClassFileError::Malformed(format!("unmappable offset {old}")))
}

/// Closest mapped offset at or before `old`. Used for debug tables whose
/// offsets are informational rather than verified.
fn map_floor(map: &BTreeMap<u32, u32>, old: u32) -> u32 {
    map.range(..=old)
        .next_back()
        .map(|(_, new)| *new)
        .unwrap_or(0)
}

fn remap_line_numbers(data: &[u8], map: &BTreeMap<u32, u32>) -> Result<Vec<u8>> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(data.len());
    put_u16(&mut out, count);
    for _ in 0..count {
        let start_pc = u32::from(reader.u16()?);
        let line = reader.u16()?;
        put_u16(&mut out, map_floor(map, start_pc) as u16);
        put_u16(&mut out, line);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// StackMapTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum VerificationType {
    Basic(u8),
    Object(u16),
    Uninitialized(u32),
}

#[derive(Debug)]
enum FrameKind {
    Same,
    SameLocals1(VerificationType),
    Chop(u8),
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

fn read_verification_type(reader: &mut ByteReader<'_>) -> Result<VerificationType> {
    let tag = reader.u8()?;
    Ok(match tag {
        0..=6 => VerificationType::Basic(tag),
        7 => VerificationType::Object(reader.u16()?),
        8 => VerificationType::Uninitialized(u32::from(reader.u16()?)),
        other => {
            return Err(ClassFileError::Malformed(format!(
                "unknown verification type tag {other}"
            )));
        }
    })
}

fn write_verification_type(
    out: &mut Vec<u8>,
    vtype: &VerificationType,
    map: &BTreeMap<u32, u32>,
) -> Result<()> {
    match vtype {
        VerificationType::Basic(tag) => out.push(*tag),
        VerificationType::Object(index) => {
            out.push(7);
            put_u16(out, *index);
        }
        VerificationType::Uninitialized(offset) => {
            // Points at a `new` instruction; must land exactly on it.
            out.push(8);
            put_u16(out, map_exact(map, *offset)? as u16);
        }
    }
    Ok(())
}

/// Parse the StackMapTable, convert frame deltas to absolute offsets, remap
/// them, and re-encode. Compact frame forms are promoted to their extended
/// forms when a remapped delta no longer fits.
fn remap_stack_map(data: &[u8], map: &BTreeMap<u32, u32>) -> Result<Vec<u8>> {
    let mut reader = ByteReader::new(data);
    let count = reader.u16()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<u32> = None;
    for _ in 0..count {
        let frame_type = reader.u8()?;
        let (delta, kind) = match frame_type {
            0..=63 => (u32::from(frame_type), FrameKind::Same),
            64..=127 => (
                u32::from(frame_type - 64),
                FrameKind::SameLocals1(read_verification_type(&mut reader)?),
            ),
            247 => {
                let delta = u32::from(reader.u16()?);
                (delta, FrameKind::SameLocals1(read_verification_type(&mut reader)?))
            }
            248..=250 => (u32::from(reader.u16()?), FrameKind::Chop(frame_type)),
            251 => (u32::from(reader.u16()?), FrameKind::Same),
            252..=254 => {
                let delta = u32::from(reader.u16()?);
                let mut locals = Vec::with_capacity(usize::from(frame_type - 251));
                for _ in 0..(frame_type - 251) {
                    locals.push(read_verification_type(&mut reader)?);
                }
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = u32::from(reader.u16()?);
                let local_count = reader.u16()?;
                let mut locals = Vec::with_capacity(local_count as usize);
                for _ in 0..local_count {
                    locals.push(read_verification_type(&mut reader)?);
                }
                let stack_count = reader.u16()?;
                let mut stack = Vec::with_capacity(stack_count as usize);
                for _ in 0..stack_count {
                    stack.push(read_verification_type(&mut reader)?);
                }
                (delta, FrameKind::Full { locals, stack })
            }
            other => {
                return Err(ClassFileError::Malformed(format!(
                    "reserved stack map frame type {other}"
                )));
            }
        };
        let absolute = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(absolute);
        frames.push((absolute, kind));
    }

    let mut out = Vec::with_capacity(data.len());
    put_u16(&mut out, count);
    let mut previous: Option<u32> = None;
    for (old_offset, kind) in frames {
        let new_offset = map_exact(map, old_offset)?;
        let delta = match previous {
            None => new_offset,
            Some(prev) => new_offset - prev - 1,
        };
        previous = Some(new_offset);
        let delta = u16::try_from(delta).map_err(|_| ClassFileError::OversizedMethod)?;
        match kind {
            FrameKind::Same => {
                if delta <= 63 {
                    out.push(delta as u8);
                } else {
                    out.push(251);
                    put_u16(&mut out, delta);
                }
            }
            FrameKind::SameLocals1(vtype) => {
                if delta <= 63 {
                    out.push(64 + delta as u8);
                } else {
                    out.push(247);
                    put_u16(&mut out, delta);
                }
                write_verification_type(&mut out, &vtype, map)?;
            }
            FrameKind::Chop(frame_type) => {
                out.push(frame_type);
                put_u16(&mut out, delta);
            }
            FrameKind::Append(locals) => {
                out.push(251 + locals.len() as u8);
                put_u16(&mut out, delta);
                for vtype in &locals {
                    write_verification_type(&mut out, vtype, map)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                out.push(255);
                put_u16(&mut out, delta);
                put_u16(&mut out, locals.len() as u16);
                for vtype in &locals {
                    write_verification_type(&mut out, vtype, map)?;
                }
                put_u16(&mut out, stack.len() as u16);
                for vtype in &stack {
                    write_verification_type(&mut out, vtype, map)?;
                }
            }
        }
    }
    if !reader.is_empty() {
        return Err(ClassFileError::Malformed(
            "trailing bytes in StackMapTable".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_body(code: &[u8]) -> CodeAttribute {
        let mut body = Vec::new();
        put_u16(&mut body, 1); // max_stack
        put_u16(&mut body, 1); // max_locals
        put_u32(&mut body, code.len() as u32);
        body.extend_from_slice(code);
        put_u16(&mut body, 0); // exceptions
        put_u16(&mut body, 0); // attributes
        CodeAttribute::decode(&body).expect("decode")
    }

    fn encoded_code(attr: &CodeAttribute) -> Vec<u8> {
        let pool = ConstantPool::default();
        let body = attr.encode(&pool).expect("encode");
        let code_len = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
        body[8..8 + code_len].to_vec()
    }

    #[test]
    fn stable_without_edits() {
        // goto +6 over an ldc/areturn pair, then goto back.
        let code = [
            opcodes::GOTO, 0x00, 0x06,
            opcodes::LDC, 0x02,
            opcodes::ARETURN,
            opcodes::GOTO, 0xFF, 0xFD, // -3, back to the ldc
        ];
        let attr = decode_body(&code);
        assert_eq!(attr.insns.len(), 4);
        assert_eq!(encoded_code(&attr), code);
    }

    #[test]
    fn branches_follow_inserted_instructions() {
        let code = [
            opcodes::GOTO, 0x00, 0x06,
            opcodes::LDC, 0x02,
            opcodes::ARETURN,
            opcodes::GOTO, 0xFF, 0xFD,
        ];
        let mut attr = decode_body(&code);
        // Replace the ldc with a 9-byte call sequence, keeping its offset.
        let orig = attr.insns[1].orig_offset;
        attr.insns.splice(
            1..2,
            [
                InsnEntry {
                    insn: Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x03]),
                    orig_offset: orig,
                },
                InsnEntry::inserted(Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x04])),
                InsnEntry::inserted(Insn::Plain(vec![opcodes::INVOKESTATIC, 0x00, 0x05])),
            ],
        );
        let out = encoded_code(&attr);
        // Forward goto now skips 9 bytes of replacement plus areturn: target 13.
        assert_eq!(&out[..3], &[opcodes::GOTO, 0x00, 0x0D]);
        // Backward goto at offset 13 returns to the sequence start at 3.
        assert_eq!(&out[13..], &[opcodes::GOTO, 0xFF, 0xF6]);
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn tableswitch_padding_recomputed_after_growth() {
        // Layout: ldc(2) iload_0(1) tableswitch. Opcode at 3 -> no padding.
        let mut code = vec![opcodes::LDC, 0x02, 0x1A];
        code.push(opcodes::TABLESWITCH);
        // default +17 (to the nop), low 0, high 0, one target +17.
        code.extend_from_slice(&17i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&17i32.to_be_bytes());
        code.push(opcodes::NOP);
        code.push(opcodes::RETURN);
        let mut attr = decode_body(&code);
        assert_eq!(attr.insns.len(), 5);

        let orig = attr.insns[0].orig_offset;
        attr.insns.splice(
            0..1,
            [
                InsnEntry {
                    insn: Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x03]),
                    orig_offset: orig,
                },
                InsnEntry::inserted(Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x04])),
                InsnEntry::inserted(Insn::Plain(vec![opcodes::INVOKESTATIC, 0x00, 0x05])),
            ],
        );
        let out = encoded_code(&attr);
        // Switch opcode moved to offset 10; operands align at 12 -> 1 pad byte.
        assert_eq!(out[10], opcodes::TABLESWITCH);
        let default = i32::from_be_bytes([out[12], out[13], out[14], out[15]]);
        let round = decode_instructions(&out).expect("re-decode");
        assert_eq!(round.len(), 5);
        // Both switch targets still reach the nop.
        let nop_offset = round
            .iter()
            .find(|entry| entry.insn == Insn::Plain(vec![opcodes::NOP]))
            .and_then(|entry| entry.orig_offset)
            .expect("nop");
        assert_eq!(10 + default as u32, nop_offset);
    }

    #[test]
    fn growth_past_the_code_length_limit_is_rejected() {
        // A straight-line method at exactly 65535 bytes, no exception table
        // and no code attributes. Any growth must fail, not emit an
        // oversized code_length.
        let mut code = vec![opcodes::NOP; 65532];
        code.extend_from_slice(&[opcodes::LDC, 0x02, opcodes::ARETURN]);
        let mut attr = decode_body(&code);

        let load_idx = attr.insns.len() - 2;
        let orig = attr.insns[load_idx].orig_offset;
        attr.insns.splice(
            load_idx..load_idx + 1,
            [
                InsnEntry {
                    insn: Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x03]),
                    orig_offset: orig,
                },
                InsnEntry::inserted(Insn::Plain(vec![opcodes::LDC_W, 0x00, 0x04])),
                InsnEntry::inserted(Insn::Plain(vec![opcodes::INVOKESTATIC, 0x00, 0x05])),
            ],
        );
        let pool = ConstantPool::default();
        assert_eq!(attr.encode(&pool), Err(ClassFileError::OversizedMethod));
    }

    #[test]
    fn rejects_branch_into_operands() {
        // goto +1 lands inside its own operand bytes.
        let code = [opcodes::GOTO, 0x00, 0x01, opcodes::RETURN];
        let mut body = Vec::new();
        put_u16(&mut body, 0);
        put_u16(&mut body, 0);
        put_u32(&mut body, code.len() as u32);
        body.extend_from_slice(&code);
        put_u16(&mut body, 0);
        put_u16(&mut body, 0);
        assert!(matches!(
            CodeAttribute::decode(&body),
            Err(ClassFileError::Malformed(_))
        ));
    }
}
