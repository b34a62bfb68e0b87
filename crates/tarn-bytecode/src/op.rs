//! Target VM opcode set.
//!
//! One byte per opcode. Most opcodes take no immediate; the exceptions are
//! the jump family (fixed 2-byte signed displacement), the constant pushes
//! (length-prefixed payloads) and the call family, whose immediate layout
//! depends on the module's [`CallConvention`].

use serde::{Deserialize, Serialize};

use crate::convention::CallConvention;

/// Immediate layout of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImmLen {
    /// No immediate bytes.
    None,
    /// Fixed number of immediate bytes.
    Fixed(usize),
    /// One length byte followed by that many payload bytes.
    Prefixed8,
    /// Two little-endian length bytes followed by that many payload bytes.
    Prefixed16,
}

/// A Tarn VM opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Op {
    // Constants
    Push0 = 0x00,
    /// Length-prefixed minimal two's-complement little-endian integer.
    PushInt = 0x01,
    /// u16-length-prefixed raw byte string.
    PushBytes = 0x02,
    PushM1 = 0x0f,
    Push1 = 0x11,
    Push2 = 0x12,
    Push3 = 0x13,
    Push4 = 0x14,
    Push5 = 0x15,
    Push6 = 0x16,
    Push7 = 0x17,
    Push8 = 0x18,
    Push9 = 0x19,
    Push10 = 0x1a,
    Push11 = 0x1b,
    Push12 = 0x1c,
    Push13 = 0x1d,
    Push14 = 0x1e,
    Push15 = 0x1f,
    Push16 = 0x20,

    // Flow control
    Nop = 0x61,
    Jmp = 0x62,
    JmpIf = 0x63,
    JmpIfNot = 0x64,
    Call = 0x65,
    Ret = 0x66,
    AppCall = 0x67,
    /// Invokes the system call whose name string is on top of the stack.
    Syscall = 0x68,
    /// Calls the code address on top of the stack.
    CallDyn = 0x69,
    Halt = 0x6a,

    // Operand and alt stack
    ToAlt = 0x6b,
    FromAlt = 0x6c,
    DupFromAlt = 0x6d,
    Depth = 0x6e,
    Drop = 0x6f,
    Dup = 0x70,
    Pick = 0x71,
    Roll = 0x72,
    Rot = 0x73,
    Swap = 0x74,
    Tuck = 0x75,
    /// Pops a position, then exchanges the top item with the item at that
    /// position (0 = top).
    Xswap = 0x76,

    // Byte strings
    Cat = 0x7e,
    SubStr = 0x7f,
    Left = 0x80,
    Size = 0x81,

    // Bitwise and identity
    Invert = 0x83,
    And = 0x84,
    Or = 0x85,
    Xor = 0x86,
    Equal = 0x87,

    // Arithmetic and comparison (native arbitrary-precision integers)
    Inc = 0x8b,
    Dec = 0x8c,
    Neg = 0x8d,
    Abs = 0x8e,
    Not = 0x8f,
    Add = 0x90,
    Sub = 0x91,
    Mul = 0x92,
    Div = 0x93,
    Mod = 0x94,
    Shl = 0x95,
    Shr = 0x96,
    BoolAnd = 0x97,
    BoolOr = 0x98,
    NumEqual = 0x99,
    NumNotEqual = 0x9a,
    Lt = 0x9b,
    Gt = 0x9c,
    Lte = 0x9d,
    Gte = 0x9e,
    Min = 0x9f,
    Max = 0xa0,
    Within = 0xa1,

    // Compound containers
    ArraySize = 0xc0,
    Pack = 0xc1,
    PickItem = 0xc3,
    SetItem = 0xc4,
    NewArray = 0xc5,
    NewStruct = 0xc6,
    /// Pops a length, pushes a zero-filled byte string.
    NewBuffer = 0xc7,
}

impl Op {
    /// Immediate layout under the given calling convention.
    ///
    /// The call family is the only group whose layout is
    /// convention-dependent; see [`CallConvention`] for the exact byte
    /// meanings.
    pub fn imm_len(self, convention: CallConvention) -> ImmLen {
        match self {
            Op::PushInt => ImmLen::Prefixed8,
            Op::PushBytes => ImmLen::Prefixed16,
            Op::Jmp | Op::JmpIf | Op::JmpIfNot => ImmLen::Fixed(2),
            Op::Call => match convention {
                CallConvention::Relative => ImmLen::Fixed(2),
                CallConvention::Direct => ImmLen::Fixed(4),
            },
            Op::CallDyn => match convention {
                CallConvention::Relative => ImmLen::None,
                CallConvention::Direct => ImmLen::Fixed(2),
            },
            Op::AppCall => match convention {
                CallConvention::Relative => ImmLen::Fixed(20),
                CallConvention::Direct => ImmLen::Fixed(22),
            },
            _ => ImmLen::None,
        }
    }

    /// Single-byte push form for small integers, if one exists.
    pub fn push_small(value: i64) -> Option<Op> {
        let op = match value {
            -1 => Op::PushM1,
            0 => Op::Push0,
            1 => Op::Push1,
            2 => Op::Push2,
            3 => Op::Push3,
            4 => Op::Push4,
            5 => Op::Push5,
            6 => Op::Push6,
            7 => Op::Push7,
            8 => Op::Push8,
            9 => Op::Push9,
            10 => Op::Push10,
            11 => Op::Push11,
            12 => Op::Push12,
            13 => Op::Push13,
            14 => Op::Push14,
            15 => Op::Push15,
            16 => Op::Push16,
            _ => return None,
        };
        Some(op)
    }

    /// The small-integer value of a single-byte push form, if this is one.
    pub fn small_value(self) -> Option<i64> {
        let v = match self {
            Op::PushM1 => -1,
            Op::Push0 => 0,
            Op::Push1 => 1,
            Op::Push2 => 2,
            Op::Push3 => 3,
            Op::Push4 => 4,
            Op::Push5 => 5,
            Op::Push6 => 6,
            Op::Push7 => 7,
            Op::Push8 => 8,
            Op::Push9 => 9,
            Op::Push10 => 10,
            Op::Push11 => 11,
            Op::Push12 => 12,
            Op::Push13 => 13,
            Op::Push14 => 14,
            Op::Push15 => 15,
            Op::Push16 => 16,
            _ => return None,
        };
        Some(v)
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Push0 => "PUSH0",
            Op::PushInt => "PUSHINT",
            Op::PushBytes => "PUSHBYTES",
            Op::PushM1 => "PUSHM1",
            Op::Push1 => "PUSH1",
            Op::Push2 => "PUSH2",
            Op::Push3 => "PUSH3",
            Op::Push4 => "PUSH4",
            Op::Push5 => "PUSH5",
            Op::Push6 => "PUSH6",
            Op::Push7 => "PUSH7",
            Op::Push8 => "PUSH8",
            Op::Push9 => "PUSH9",
            Op::Push10 => "PUSH10",
            Op::Push11 => "PUSH11",
            Op::Push12 => "PUSH12",
            Op::Push13 => "PUSH13",
            Op::Push14 => "PUSH14",
            Op::Push15 => "PUSH15",
            Op::Push16 => "PUSH16",
            Op::Nop => "NOP",
            Op::Jmp => "JMP",
            Op::JmpIf => "JMPIF",
            Op::JmpIfNot => "JMPIFNOT",
            Op::Call => "CALL",
            Op::Ret => "RET",
            Op::AppCall => "APPCALL",
            Op::Syscall => "SYSCALL",
            Op::CallDyn => "CALLDYN",
            Op::Halt => "HALT",
            Op::ToAlt => "TOALT",
            Op::FromAlt => "FROMALT",
            Op::DupFromAlt => "DUPFROMALT",
            Op::Depth => "DEPTH",
            Op::Drop => "DROP",
            Op::Dup => "DUP",
            Op::Pick => "PICK",
            Op::Roll => "ROLL",
            Op::Rot => "ROT",
            Op::Swap => "SWAP",
            Op::Tuck => "TUCK",
            Op::Xswap => "XSWAP",
            Op::Cat => "CAT",
            Op::SubStr => "SUBSTR",
            Op::Left => "LEFT",
            Op::Size => "SIZE",
            Op::Invert => "INVERT",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Xor => "XOR",
            Op::Equal => "EQUAL",
            Op::Inc => "INC",
            Op::Dec => "DEC",
            Op::Neg => "NEG",
            Op::Abs => "ABS",
            Op::Not => "NOT",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Shl => "SHL",
            Op::Shr => "SHR",
            Op::BoolAnd => "BOOLAND",
            Op::BoolOr => "BOOLOR",
            Op::NumEqual => "NUMEQUAL",
            Op::NumNotEqual => "NUMNOTEQUAL",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::Lte => "LTE",
            Op::Gte => "GTE",
            Op::Min => "MIN",
            Op::Max => "MAX",
            Op::Within => "WITHIN",
            Op::ArraySize => "ARRAYSIZE",
            Op::Pack => "PACK",
            Op::PickItem => "PICKITEM",
            Op::SetItem => "SETITEM",
            Op::NewArray => "NEWARRAY",
            Op::NewStruct => "NEWSTRUCT",
            Op::NewBuffer => "NEWBUFFER",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
