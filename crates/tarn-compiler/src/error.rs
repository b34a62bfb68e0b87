//! Error taxonomy.
//!
//! Every fatal condition aborts compilation of the whole module; there is
//! no partial output. Translation errors are wrapped with the enclosing
//! method's qualified name and the offending source instruction as they
//! propagate outward.

use crate::il::IlOp;

/// Failures while translating one method body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    /// An opcode with no translation rule and no fallback match.
    #[error("unsupported instruction {op:?}")]
    Unsupported { op: IlOp },

    /// No call classification matched and speculative compilation failed.
    #[error("unresolved call to `{target}`")]
    UnresolvedCall { target: String },

    #[error("cannot resolve field ordinal for `{field}`")]
    FieldOrdinal { field: String },

    #[error("unsupported static field `{field}`")]
    StaticField { field: String },

    #[error("array literal element width {width} is unsupported")]
    ElementWidth { width: usize },

    /// The PUSHBYTES length prefix is a u16; longer literals cannot be
    /// encoded self-describingly.
    #[error("byte literal length {len} exceeds the u16 length-prefix range")]
    LiteralTooLong { len: usize },

    /// `no-emit-with-conversion` is only valid on a field initializer.
    #[error("invalid marker: no-emit-with-conversion on call target `{target}`")]
    InvalidMarker { target: String },

    #[error("inter-contract hash must be 20 bytes, got {len}")]
    HashLength { len: usize },

    #[error("branch target {target:#06x} not found in method")]
    UnresolvedBranch { target: u32 },

    #[error("branch displacement {offset} exceeds the signed 16-bit range")]
    BranchOverflow { offset: i64 },

    /// Context wrapper added at the method boundary.
    #[error("in `{method}` at {insn}: {source}")]
    InMethod {
        method: String,
        insn: String,
        source: Box<TranslateError>,
    },
}

impl TranslateError {
    /// Wrap with the enclosing method and offending instruction, unless
    /// already wrapped by a nested translation.
    pub(crate) fn in_method(self, method: &str, insn: &crate::il::SourceInstruction) -> Self {
        match self {
            TranslateError::InMethod { .. } => self,
            other => TranslateError::InMethod {
                method: method.to_owned(),
                insn: insn.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Failures while laying out and patching the module.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("module has no entry point")]
    MissingEntry,

    #[error("duplicate entry point: `{first}` and `{second}`")]
    DuplicateEntry { first: String, second: String },

    #[error("call-fix references unknown method `{callee}`")]
    UnknownCallee { callee: String },

    #[error("call displacement {offset} exceeds the signed 16-bit range")]
    CallOverflow { offset: i64 },

    #[error("entry address {addr:#x} exceeds the direct-call address range")]
    AddressOverflow { addr: u32 },
}

/// Top-level compilation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Link(#[from] LinkError),
}
