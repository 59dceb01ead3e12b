//! The class rewriter: turn tagged string loads into resolver calls.
//!
//! For every `ldc`/`ldc_w` that loads a string matching the tag grammar, the
//! single load is replaced with
//!
//! ```text
//! ldc_w  <unit string>
//! ldc_w  <original value string>
//! invokestatic  com/android/BuildConfigDelegate.getString(String,String)String
//! ```
//!
//! which leaves exactly one reference on the stack, so surrounding code and
//! existing stack map frames remain valid after offset remapping.
//!
//! Tagged `ConstantValue` attributes on static final String fields are
//! stripped and replaced with `<clinit>` assignments, because the VM applies
//! `ConstantValue` before any bytecode runs and a resolver call there would
//! be unreachable.

use bcfg_model::set::TaggedSet;
use bcfg_model::tag;

use crate::class::{ACC_FINAL, ACC_STATIC, AttributeInfo, ClassFile, MemberInfo};
use crate::code::{CodeAttribute, Insn, InsnEntry, opcodes};
use crate::error::{ClassFileError, Result};

/// Binary name of the runtime resolver class.
pub const DELEGATE_CLASS: &str = "com/android/BuildConfigDelegate";
pub const DELEGATE_METHOD: &str = "getString";
pub const DELEGATE_DESCRIPTOR: &str = "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;";

const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";
const CLINIT_NAME: &str = "<clinit>";
const CLINIT_DESCRIPTOR: &str = "()V";
const CODE_ATTR: &str = "Code";
const CONSTANT_VALUE_ATTR: &str = "ConstantValue";

/// Result of rewriting one class.
#[derive(Debug)]
pub enum RewriteOutcome {
    /// The class references no tagged constants; the input bytes stand.
    Unchanged,
    Rewritten {
        bytes: Vec<u8>,
        /// Resolver call sites introduced (load replacements plus field
        /// initializer assignments).
        call_sites: usize,
    },
}

/// Rewrite a single class file.
///
/// Every tagged string the class references must be present in `tagged`;
/// an unknown pair fails the whole class so a stale constant table cannot
/// produce a half-rewritten output.
pub fn rewrite_class(bytes: &[u8], tagged: &TaggedSet) -> Result<RewriteOutcome> {
    let mut class = ClassFile::parse(bytes)?;

    if !pool_has_tagged_string(&class, tagged)? {
        return Ok(RewriteOutcome::Unchanged);
    }

    let mut call_sites = 0usize;

    // Decode and edit every method whose code loads a tagged string. Methods
    // without tagged loads keep their raw attribute bytes untouched.
    let mut pending: Vec<(usize, usize, CodeAttribute, Vec<LoadSite>)> = Vec::new();
    for (method_idx, method) in class.methods.iter().enumerate() {
        let Some(attr_idx) = method.attribute_index(&class.pool, CODE_ATTR) else {
            continue;
        };
        let code = CodeAttribute::decode(&method.attributes[attr_idx].data)?;
        let sites = tagged_load_sites(&class, &code);
        if sites.is_empty() {
            continue;
        }
        call_sites += sites.len();
        pending.push((method_idx, attr_idx, code, sites));
    }

    let field_inits = tagged_constant_fields(&class)?;
    call_sites += field_inits.len();
    if pending.is_empty() && field_inits.is_empty() {
        return Ok(RewriteOutcome::Unchanged);
    }

    let delegate_ref =
        class
            .pool
            .ensure_methodref(DELEGATE_CLASS, DELEGATE_METHOD, DELEGATE_DESCRIPTOR)?;

    let mut edited: Vec<(usize, usize, CodeAttribute)> = Vec::new();
    for (method_idx, attr_idx, mut code, sites) in pending {
        apply_load_replacements(&mut class.pool, &mut code, sites, delegate_ref)?;
        code.max_stack = code
            .max_stack
            .checked_add(1)
            .ok_or(ClassFileError::OversizedMethod)?;
        edited.push((method_idx, attr_idx, code));
    }

    if !field_inits.is_empty() {
        inject_field_initializers(&mut class, &mut edited, &field_inits, delegate_ref)?;
    }

    for (method_idx, attr_idx, code) in &edited {
        let data = code.encode(&class.pool)?;
        class.methods[*method_idx].attributes[*attr_idx].data = data;
    }

    Ok(RewriteOutcome::Rewritten {
        bytes: class.to_bytes(),
        call_sites,
    })
}

/// Scan the constant pool once: does any String entry carry a tag?
///
/// This is also where unknown tags are caught, regardless of whether they
/// are reached through an `ldc` or a `ConstantValue`.
fn pool_has_tagged_string(class: &ClassFile, tagged: &TaggedSet) -> Result<bool> {
    let mut found = false;
    for index in 1..class.pool.slot_count() as u16 {
        let Some(text) = class.pool.string_text(index) else {
            continue;
        };
        let Some(tag) = tag::parse(text) else {
            continue;
        };
        if !tagged.contains(tag.unit, tag.value) {
            return Err(ClassFileError::UnknownTag {
                unit: tag.unit.to_string(),
                value: tag.value.to_string(),
            });
        }
        found = true;
    }
    Ok(found)
}

/// One tagged `ldc`/`ldc_w` found in a method body.
struct LoadSite {
    insn_idx: usize,
    unit: String,
    value: String,
}

/// Instruction indexes of `ldc`/`ldc_w` loads of tagged strings, with the
/// decoded unit and original value.
fn tagged_load_sites(class: &ClassFile, code: &CodeAttribute) -> Vec<LoadSite> {
    let mut sites = Vec::new();
    for (insn_idx, entry) in code.insns.iter().enumerate() {
        let Insn::Plain(bytes) = &entry.insn else {
            continue;
        };
        let pool_index = match bytes[0] {
            opcodes::LDC => u16::from(bytes[1]),
            opcodes::LDC_W => u16::from_be_bytes([bytes[1], bytes[2]]),
            _ => continue,
        };
        let Some(text) = class.pool.string_text(pool_index) else {
            continue;
        };
        if let Some(tag) = tag::parse(text) {
            sites.push(LoadSite {
                insn_idx,
                unit: tag.unit.to_string(),
                value: tag.value.to_string(),
            });
        }
    }
    sites
}

/// Replace each tagged load in `code` with the three-instruction resolver
/// call. The first instruction of each sequence inherits the load's offset.
///
/// Splicing back-to-front keeps the earlier site indexes valid.
fn apply_load_replacements(
    pool: &mut crate::pool::ConstantPool,
    code: &mut CodeAttribute,
    sites: Vec<LoadSite>,
    delegate_ref: u16,
) -> Result<()> {
    for LoadSite { insn_idx, unit, value } in sites.into_iter().rev() {
        let unit_index = pool.ensure_string(&unit)?;
        let value_index = pool.ensure_string(&value)?;
        let orig_offset = code.insns[insn_idx].orig_offset;
        code.insns.splice(
            insn_idx..insn_idx + 1,
            [
                InsnEntry {
                    insn: ldc_w(unit_index),
                    orig_offset,
                },
                InsnEntry::inserted(ldc_w(value_index)),
                InsnEntry::inserted(invokestatic(delegate_ref)),
            ],
        );
    }
    Ok(())
}

/// Static final String fields whose `ConstantValue` is tagged, as
/// `(field index, field name, unit, original value)`.
fn tagged_constant_fields(class: &ClassFile) -> Result<Vec<(usize, String, String, String)>> {
    let mut fields = Vec::new();
    for (field_idx, field) in class.fields.iter().enumerate() {
        if field.access_flags & (ACC_STATIC | ACC_FINAL) != (ACC_STATIC | ACC_FINAL) {
            continue;
        }
        if class.pool.utf8(field.descriptor_index)? != STRING_DESCRIPTOR {
            continue;
        }
        let Some(attr_idx) = field.attribute_index(&class.pool, CONSTANT_VALUE_ATTR) else {
            continue;
        };
        let data = &field.attributes[attr_idx].data;
        if data.len() != 2 {
            return Err(ClassFileError::Malformed(
                "ConstantValue attribute is not two bytes".into(),
            ));
        }
        let cv_index = u16::from_be_bytes([data[0], data[1]]);
        let Some(text) = class.pool.string_text(cv_index) else {
            continue;
        };
        if let Some(tag) = tag::parse(text) {
            let name = class.pool.utf8(field.name_index)?.to_string();
            fields.push((field_idx, name, tag.unit.to_string(), tag.value.to_string()));
        }
    }
    Ok(fields)
}

/// Strip tagged `ConstantValue` attributes and assign the fields from
/// `<clinit>` instead, creating the initializer if the class has none.
fn inject_field_initializers(
    class: &mut ClassFile,
    edited: &mut Vec<(usize, usize, CodeAttribute)>,
    field_inits: &[(usize, String, String, String)],
    delegate_ref: u16,
) -> Result<()> {
    let mut prologue = Vec::with_capacity(field_inits.len() * 4);
    for (field_idx, name, unit, value) in field_inits {
        let unit_index = class.pool.ensure_string(unit)?;
        let value_index = class.pool.ensure_string(value)?;
        let field_ref = class
            .pool
            .ensure_fieldref(class.this_class, name, STRING_DESCRIPTOR)?;
        prologue.extend([
            InsnEntry::inserted(ldc_w(unit_index)),
            InsnEntry::inserted(ldc_w(value_index)),
            InsnEntry::inserted(invokestatic(delegate_ref)),
            InsnEntry::inserted(putstatic(field_ref)),
        ]);

        let field = &mut class.fields[*field_idx];
        if let Some(attr_idx) = field.attribute_index(&class.pool, CONSTANT_VALUE_ATTR) {
            field.attributes.remove(attr_idx);
        }
    }

    match class.method_index(CLINIT_NAME, CLINIT_DESCRIPTOR) {
        Some(method_idx) => {
            // The initializer may already be in the edited set from the load
            // replacement pass; extend that copy rather than re-decoding.
            if let Some((_, _, code)) = edited
                .iter_mut()
                .find(|(edited_idx, _, _)| *edited_idx == method_idx)
            {
                code.insns.splice(0..0, prologue);
                code.max_stack = code.max_stack.max(2);
            } else {
                let attr_idx = class.methods[method_idx]
                    .attribute_index(&class.pool, CODE_ATTR)
                    .ok_or_else(|| {
                        ClassFileError::Malformed("<clinit> has no Code attribute".into())
                    })?;
                let mut code =
                    CodeAttribute::decode(&class.methods[method_idx].attributes[attr_idx].data)?;
                code.insns.splice(0..0, prologue);
                code.max_stack = code.max_stack.max(2);
                edited.push((method_idx, attr_idx, code));
            }
        }
        None => {
            prologue.push(InsnEntry::inserted(Insn::Plain(vec![opcodes::RETURN])));
            let code = CodeAttribute::new(2, 0, prologue);
            let code_name = class.pool.ensure_utf8(CODE_ATTR)?;
            let name_index = class.pool.ensure_utf8(CLINIT_NAME)?;
            let descriptor_index = class.pool.ensure_utf8(CLINIT_DESCRIPTOR)?;
            class.methods.push(MemberInfo {
                access_flags: ACC_STATIC,
                name_index,
                descriptor_index,
                attributes: vec![AttributeInfo {
                    name_index: code_name,
                    data: Vec::new(),
                }],
            });
            edited.push((class.methods.len() - 1, 0, code));
        }
    }
    Ok(())
}

fn ldc_w(index: u16) -> Insn {
    let [hi, lo] = index.to_be_bytes();
    Insn::Plain(vec![opcodes::LDC_W, hi, lo])
}

fn invokestatic(index: u16) -> Insn {
    let [hi, lo] = index.to_be_bytes();
    Insn::Plain(vec![opcodes::INVOKESTATIC, hi, lo])
}

fn putstatic(index: u16) -> Insn {
    let [hi, lo] = index.to_be_bytes();
    Insn::Plain(vec![opcodes::PUTSTATIC, hi, lo])
}
