use thiserror::Error;

/// Errors from class file parsing and rewriting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassFileError {
    /// The input does not start with the class file magic number.
    #[error("not a class file (bad magic number)")]
    BadMagic,

    /// The input ended before a complete structure could be read.
    #[error("truncated class file")]
    Truncated,

    /// The input is structurally invalid.
    #[error("malformed class file: {0}")]
    Malformed(String),

    /// A constant pool reference points outside the pool or at the wrong
    /// kind of entry.
    #[error("invalid constant pool index {0}")]
    BadPoolIndex(u16),

    /// Adding the rewrite support entries would exceed the 65535-entry pool
    /// limit.
    #[error("constant pool limit exceeded")]
    PoolOverflow,

    /// The rewritten method no longer fits the format's size limits
    /// (a 16-bit branch displacement or the code length overflowed).
    #[error("rewritten method exceeds bytecode size limits")]
    OversizedMethod,

    /// A literal matched the tag grammar but its pair is not in the known
    /// constant set. Indicates a stale or mismatched build; fatal for the
    /// module.
    #[error("tagged constant ({unit}, {value:?}) is not in the known constant set")]
    UnknownTag { unit: String, value: String },

    /// A constant pool Utf8 entry is not valid modified UTF-8.
    #[error("invalid modified UTF-8 in constant pool")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, ClassFileError>;
