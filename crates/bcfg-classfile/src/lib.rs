//! JVM class file parsing and tagged-constant rewriting.
//!
//! The rewriter takes a compiled class and replaces every load of a tagged
//! string constant (see `bcfg_model::tag`) with a call into the runtime
//! resolver, so the value the program observes can be switched per flavor
//! after compilation. Class files are parsed just deeply enough to do that
//! safely: the constant pool and the Code attributes are fully structured,
//! everything else rides along as opaque bytes.

pub mod bytes;
pub mod class;
pub mod code;
pub mod error;
pub mod mutf8;
pub mod pool;
pub mod rewrite;

pub use class::{AttributeInfo, ClassFile, MemberInfo};
pub use error::{ClassFileError, Result};
pub use pool::{Constant, ConstantPool};
pub use rewrite::{
    DELEGATE_CLASS, DELEGATE_DESCRIPTOR, DELEGATE_METHOD, RewriteOutcome, rewrite_class,
};
