//! Bytecode format and compiled-module model for the Tarn VM.
//!
//! This crate contains:
//! - The target instruction set (`Op`, immediate layouts)
//! - Encoded instructions with deferred branch/call patch markers
//! - The compiled method and module model handed to the serializer
//! - The module-wide calling-convention option
//! - Dump helpers for listings in tests and diagnostics

pub mod convention;
pub mod dump;
pub mod insn;
pub mod module;
pub mod op;

#[cfg(test)]
mod insn_tests;

pub use convention::{CallConvention, HASH_LEN, NOTIFY_SYSCALL};
pub use dump::{dump_method, dump_module};
pub use insn::{Insn, decode_int, encode_int};
pub use module::{CompiledMethod, ConstantValue, EventDecl, Module, ModuleError};
pub use op::{ImmLen, Op};
