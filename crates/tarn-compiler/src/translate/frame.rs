//! Frame emulation for locals and arguments.
//!
//! The target VM has no addressable local storage, so each method keeps
//! its arguments and locals in a single array parked on the alt stack:
//! arguments occupy the low indices, locals sit above them offset by the
//! parameter count. The array is fetched with DUPFROMALT for every access
//! so intervening operand-stack traffic never disturbs it.

use tarn_bytecode::{Insn, Op};

use crate::il::{IlOp, SourceInstruction, SourceMethod};

use super::Translator;

impl Translator<'_> {
    /// Allocate the frame array and move the incoming arguments into it.
    ///
    /// The call site reversed the arguments, so the first parameter
    /// arrives on top of the stack and is stored first.
    pub(crate) fn emit_prologue(&mut self, method: &SourceMethod, out: &mut Vec<Insn>) {
        self.emit(out, Insn::push_int(method.frame_size() as i64));
        self.emit(out, Insn::new(Op::NewArray));
        self.emit(out, Insn::new(Op::ToAlt));
        for i in 0..method.params.len() {
            self.emit_frame_store(i, out);
        }
    }

    /// Discard the frame array, restoring the caller's stack depth.
    pub(crate) fn emit_teardown(&mut self, out: &mut Vec<Insn>) {
        self.emit(out, Insn::new(Op::FromAlt));
        self.emit(out, Insn::new(Op::Drop));
    }

    pub(crate) fn emit_load_arg(&mut self, index: usize, out: &mut Vec<Insn>) {
        self.emit_frame_load(index, out);
    }

    pub(crate) fn emit_load_loc(&mut self, method: &SourceMethod, index: usize, out: &mut Vec<Insn>) {
        self.emit_frame_load(method.params.len() + index, out);
    }

    pub(crate) fn emit_store_arg(&mut self, index: usize, out: &mut Vec<Insn>) {
        self.emit_frame_store(index, out);
    }

    pub(crate) fn emit_store_loc(&mut self, method: &SourceMethod, index: usize, out: &mut Vec<Insn>) {
        self.emit_frame_store(method.params.len() + index, out);
    }

    /// `ldloca` is only meaningful ahead of a value-type initialization or
    /// a constructor call; there the "address" is the position in the
    /// frame array, so the index itself is pushed. Any other use degrades
    /// to an ordinary local load.
    pub(crate) fn emit_load_loca(
        &mut self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        index: usize,
        out: &mut Vec<Insn>,
    ) {
        if body[i + 1..].iter().take(2).any(is_ctor_consumer) {
            self.emit(out, Insn::push_int((method.params.len() + index) as i64));
        } else {
            self.emit_load_loc(method, index, out);
        }
    }

    /// Fetch the frame array, index it, push the element.
    fn emit_frame_load(&mut self, index: usize, out: &mut Vec<Insn>) {
        self.emit(out, Insn::new(Op::DupFromAlt));
        self.emit(out, Insn::push_int(index as i64));
        self.emit(out, Insn::new(Op::PickItem));
    }

    /// Fetch the frame array, roll the pending value over it, write the
    /// element. The value to store is on top of the stack on entry.
    fn emit_frame_store(&mut self, index: usize, out: &mut Vec<Insn>) {
        self.emit(out, Insn::new(Op::DupFromAlt));
        self.emit(out, Insn::push_int(index as i64));
        self.emit(out, Insn::push_int(2));
        self.emit(out, Insn::new(Op::Roll));
        self.emit(out, Insn::new(Op::SetItem));
    }
}

/// Does this instruction consume a frame index as an emulated address?
fn is_ctor_consumer(insn: &SourceInstruction) -> bool {
    match insn.op {
        IlOp::Initobj | IlOp::Newobj => true,
        IlOp::Call | IlOp::CallVirt => insn.method().is_some_and(|m| m.attrs.is_ctor),
        _ => false,
    }
}
