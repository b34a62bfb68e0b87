//! Encoded target instructions.
//!
//! An [`Insn`] holds its opcode, its fully encoded immediate bytes (length
//! prefixes included) and its assigned address: method-relative while the
//! owning method is being translated, absolute once the module is linked.
//! Branches and internal calls are emitted with placeholder immediates and
//! a deferred-patch marker that linking resolves.

use serde::{Deserialize, Serialize};

use crate::convention::{CallConvention, HASH_LEN};
use crate::op::Op;

/// One emitted VM instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insn {
    pub op: Op,
    /// Encoded immediate bytes, including any length prefix.
    pub imm: Vec<u8>,
    /// Method-relative before linking, absolute after.
    pub addr: u32,
    /// Deferred branch patch: source-level target address within the same
    /// method. Resolved during per-method linking.
    pub branch_fix: Option<u32>,
    /// Deferred call patch: qualified callee name. Resolved during module
    /// linking once every entry address is known.
    pub call_fix: Option<String>,
}

impl Insn {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            imm: Vec::new(),
            addr: 0,
            branch_fix: None,
            call_fix: None,
        }
    }

    /// Push an integer constant, using the single-byte form when one exists.
    pub fn push_int(value: i64) -> Self {
        if let Some(op) = Op::push_small(value) {
            return Self::new(op);
        }
        let bytes = encode_int(value);
        let mut imm = Vec::with_capacity(1 + bytes.len());
        imm.push(bytes.len() as u8);
        imm.extend_from_slice(&bytes);
        Self {
            imm,
            ..Self::new(Op::PushInt)
        }
    }

    /// Push a raw byte string (u16 little-endian length prefix).
    pub fn push_bytes(data: &[u8]) -> Self {
        let mut imm = Vec::with_capacity(2 + data.len());
        imm.extend_from_slice(&(data.len() as u16).to_le_bytes());
        imm.extend_from_slice(data);
        Self {
            imm,
            ..Self::new(Op::PushBytes)
        }
    }

    /// Push a UTF-8 string constant.
    pub fn push_str(s: &str) -> Self {
        Self::push_bytes(s.as_bytes())
    }

    /// Push a statically folded constant.
    pub fn push_constant(value: &crate::module::ConstantValue) -> Self {
        use crate::module::ConstantValue;
        match value {
            ConstantValue::Int(v) => Self::push_int(*v),
            ConstantValue::Bytes(b) => Self::push_bytes(b),
            ConstantValue::Str(s) => Self::push_str(s),
            ConstantValue::Bool(b) => Self::push_int(i64::from(*b)),
        }
    }

    /// A jump with a 2-byte placeholder displacement and a branch-fix
    /// marker for the given source-level target address.
    pub fn branch(op: Op, target: u32) -> Self {
        Self {
            imm: vec![0, 0],
            branch_fix: Some(target),
            ..Self::new(op)
        }
    }

    /// An internal call with a placeholder immediate sized for the active
    /// convention and a call-fix marker naming the callee.
    pub fn call(callee: &str, convention: CallConvention, rets: u8, args: u8) -> Self {
        let imm = match convention {
            CallConvention::Relative => vec![0, 0],
            CallConvention::Direct => vec![rets, args, 0, 0],
        };
        Self {
            imm,
            call_fix: Some(callee.to_owned()),
            ..Self::new(Op::Call)
        }
    }

    /// A dynamic call through a stack-resident code address.
    pub fn call_dyn(convention: CallConvention, rets: u8, args: u8) -> Self {
        let imm = match convention {
            CallConvention::Relative => Vec::new(),
            CallConvention::Direct => vec![rets, args],
        };
        Self {
            imm,
            ..Self::new(Op::CallDyn)
        }
    }

    /// An inter-contract call carrying the receiver hash. A zero-filled
    /// hash denotes a runtime-resolved target.
    pub fn app_call(hash: [u8; HASH_LEN], convention: CallConvention, rets: u8, args: u8) -> Self {
        let mut imm = match convention {
            CallConvention::Relative => Vec::with_capacity(HASH_LEN),
            CallConvention::Direct => vec![rets, args],
        };
        imm.extend_from_slice(&hash);
        Self {
            imm,
            ..Self::new(Op::AppCall)
        }
    }

    /// Total encoded length: one opcode byte plus the immediate.
    pub fn encoded_len(&self) -> u32 {
        1 + self.imm.len() as u32
    }

    /// Write the signed 16-bit branch displacement into the placeholder.
    pub fn patch_branch(&mut self, offset: i16) {
        debug_assert!(self.branch_fix.is_some());
        self.imm[..2].copy_from_slice(&offset.to_le_bytes());
    }

    /// Write the resolved call target into the placeholder. `Relative`
    /// takes a signed displacement at offset 0; `Direct` takes an absolute
    /// address after the two header bytes.
    pub fn patch_call(&mut self, convention: CallConvention, value: i32) {
        debug_assert!(self.call_fix.is_some());
        match convention {
            CallConvention::Relative => {
                self.imm[..2].copy_from_slice(&(value as i16).to_le_bytes());
            }
            CallConvention::Direct => {
                self.imm[2..4].copy_from_slice(&(value as u16).to_le_bytes());
            }
        }
    }

    /// Append the encoded form to a byte stream.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.op as u8);
        out.extend_from_slice(&self.imm);
    }
}

/// Minimal two's-complement little-endian encoding of an integer.
///
/// Trailing bytes that only repeat the sign are dropped, so the decoded
/// value is unambiguous at any length.
pub fn encode_int(value: i64) -> Vec<u8> {
    let mut bytes = value.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let msb_set = bytes[bytes.len() - 2] & 0x80 != 0;
        if (last == 0x00 && !msb_set) || (last == 0xff && msb_set) {
            bytes.pop();
        } else {
            break;
        }
    }
    bytes
}

/// Decode a minimal two's-complement little-endian integer.
pub fn decode_int(bytes: &[u8]) -> i64 {
    let mut buf = if bytes.last().is_some_and(|b| b & 0x80 != 0) {
        [0xff; 8]
    } else {
        [0x00; 8]
    };
    buf[..bytes.len()].copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}
