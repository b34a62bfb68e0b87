//! Human-readable instruction listings.

use std::fmt::Write as _;

use crate::module::{CompiledMethod, Module};

/// Render one method as `addr  MNEMONIC imm-bytes` lines.
pub fn dump_method(method: &CompiledMethod) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; {} @ {:#06x}", method.name, method.entry);
    for insn in &method.insns {
        let _ = write!(out, "{:04x}  {}", insn.addr, insn.op);
        if !insn.imm.is_empty() {
            let _ = write!(out, " ");
            for b in &insn.imm {
                let _ = write!(out, "{b:02x}");
            }
        }
        if let Some(target) = insn.branch_fix {
            let _ = write!(out, " ; ->{target:#06x}");
        }
        if let Some(callee) = &insn.call_fix {
            let _ = write!(out, " ; ->{callee}");
        }
        out.push('\n');
    }
    out
}

/// Render every method in layout order.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    for method in module.methods.values() {
        out.push_str(&dump_method(method));
        out.push('\n');
    }
    out
}
