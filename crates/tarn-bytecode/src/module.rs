//! Compiled methods and the linked module.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::convention::CallConvention;
use crate::insn::Insn;

/// One translated method.
///
/// Instructions are kept in emission order; their `addr` fields are
/// method-relative until the module is linked, absolute afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledMethod {
    /// Qualified name, unique within the module.
    pub name: String,
    /// Externally visible name (marker attribute override or short name).
    pub display_name: String,
    pub is_public: bool,
    /// Designated module entry point; exactly one per module.
    pub is_entry: bool,
    /// Parameter type descriptors.
    pub params: Vec<String>,
    pub returns: bool,
    /// Absolute entry address, assigned during linking.
    pub entry: u32,
    pub insns: Vec<Insn>,
}

impl CompiledMethod {
    /// Total encoded byte length of the instruction stream.
    pub fn code_len(&self) -> u32 {
        self.insns.iter().map(Insn::encoded_len).sum()
    }

    /// Verify the gap-free layout invariant: each instruction starts one
    /// opcode byte plus the previous immediate after its predecessor.
    pub fn check_contiguous(&self) -> Result<(), ModuleError> {
        for pair in self.insns.windows(2) {
            let expect = pair[0].addr + pair[0].encoded_len();
            if pair[1].addr != expect {
                return Err(ModuleError::NotContiguous {
                    method: self.name.clone(),
                    at: pair[1].addr,
                    expect,
                });
            }
        }
        Ok(())
    }
}

/// A statically folded readonly constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstantValue {
    Int(i64),
    Bytes(Vec<u8>),
    Str(String),
    Bool(bool),
}

/// An event declaration surfaced in the module manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    /// Parameter type descriptors.
    pub params: Vec<String>,
}

/// The linked compilation output.
///
/// Method order is layout order: the entry method first, then the rest in
/// discovery order. Re-linking the same input reproduces the same order
/// and therefore byte-identical code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub convention: CallConvention,
    pub methods: IndexMap<String, CompiledMethod>,
    pub constants: IndexMap<String, ConstantValue>,
    pub events: IndexMap<String, EventDecl>,
}

impl Module {
    /// The designated entry method.
    pub fn entry(&self) -> Option<&CompiledMethod> {
        self.methods.values().find(|m| m.is_entry)
    }

    /// Concatenated byte stream of all methods in layout order.
    pub fn flat_code(&self) -> Vec<u8> {
        let total: u32 = self.methods.values().map(CompiledMethod::code_len).sum();
        let mut out = Vec::with_capacity(total as usize);
        for method in self.methods.values() {
            for insn in &method.insns {
                insn.encode_into(&mut out);
            }
        }
        out
    }

    /// Verify the contiguity invariant across the whole module.
    pub fn check_contiguous(&self) -> Result<(), ModuleError> {
        let mut cursor = 0u32;
        for method in self.methods.values() {
            if method.entry != cursor {
                return Err(ModuleError::NotContiguous {
                    method: method.name.clone(),
                    at: method.entry,
                    expect: cursor,
                });
            }
            method.check_contiguous()?;
            cursor += method.code_len();
        }
        Ok(())
    }
}

/// Structural violations detected in a linked module.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("method `{method}`: instruction at {at:#06x} breaks contiguity (expected {expect:#06x})")]
    NotContiguous { method: String, at: u32, expect: u32 },
}
