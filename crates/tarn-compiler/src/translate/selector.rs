//! The per-opcode dispatch table.
//!
//! One-to-one mappings (arithmetic, bitwise, stack, comparison) are
//! handled inline; conversions are no-ops because the VM's native integer
//! subsumes every source width; everything multi-step (locals, fields,
//! arrays, calls, branches, returns) delegates to the other translate
//! modules. Returns the number of following source instructions a fold
//! consumed.

use tarn_bytecode::{Insn, Op};

use crate::error::TranslateError;
use crate::il::{IlOp, SourceInstruction, SourceMethod};

use super::Translator;

impl Translator<'_> {
    pub(crate) fn translate_instruction(
        &mut self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let insn = &body[i];
        match insn.op {
            IlOp::Nop | IlOp::Break => self.one(out, Op::Nop),
            IlOp::Dup => self.one(out, Op::Dup),
            IlOp::Pop => self.one(out, Op::Drop),

            IlOp::Ret => {
                self.emit_teardown(out);
                self.one(out, Op::Ret)
            }

            IlOp::Ldc => {
                let value = self.expect_int(insn)?;
                self.emit(out, Insn::push_int(value));
                Ok(0)
            }
            IlOp::LdStr => {
                let s = match &insn.operand {
                    crate::il::Operand::Str(s) => s.clone(),
                    _ => return Err(TranslateError::Unsupported { op: insn.op }),
                };
                self.emit(out, Insn::push_str(&s));
                Ok(0)
            }
            IlOp::LdNull => {
                self.emit(out, Insn::push_bytes(&[]));
                Ok(0)
            }
            // Only meaningful inside a folded literal initializer.
            IlOp::LdToken => Err(TranslateError::Unsupported { op: insn.op }),

            IlOp::Ldarg => {
                let index = self.expect_index(insn)?;
                self.emit_load_arg(index, out);
                Ok(0)
            }
            IlOp::Starg => {
                let index = self.expect_index(insn)?;
                self.emit_store_arg(index, out);
                Ok(0)
            }
            IlOp::Ldloc => {
                let index = self.expect_index(insn)?;
                self.emit_load_loc(method, index, out);
                Ok(0)
            }
            IlOp::Stloc => {
                let index = self.expect_index(insn)?;
                self.emit_store_loc(method, index, out);
                Ok(0)
            }
            IlOp::Ldloca => {
                let index = self.expect_index(insn)?;
                self.emit_load_loca(method, body, i, index, out);
                Ok(0)
            }

            IlOp::Ldsfld => self.translate_ldsfld(insn, out),
            IlOp::Ldfld => self.translate_ldfld(insn, out),
            IlOp::Stfld => self.translate_stfld(insn, out),

            IlOp::Newarr => self.translate_newarr(method, body, i, out),
            IlOp::Newobj => self.translate_newobj(insn, out),
            IlOp::Initobj => self.translate_initobj(insn, out),
            IlOp::Ldelem => self.one(out, Op::PickItem),
            IlOp::Stelem => self.one(out, Op::SetItem),
            IlOp::Ldlen => self.one(out, Op::ArraySize),

            // The native integer subsumes every source numeric width, and
            // reference casts have no VM representation.
            IlOp::Box | IlOp::Unbox | IlOp::Castclass | IlOp::Conv => Ok(0),

            IlOp::Add => self.one(out, Op::Add),
            IlOp::Sub => self.one(out, Op::Sub),
            IlOp::Mul => self.one(out, Op::Mul),
            IlOp::Div => self.one(out, Op::Div),
            IlOp::Rem => self.one(out, Op::Mod),
            IlOp::Neg => self.one(out, Op::Neg),
            IlOp::Shl => self.one(out, Op::Shl),
            IlOp::Shr => self.one(out, Op::Shr),
            IlOp::And => self.one(out, Op::And),
            IlOp::Or => self.one(out, Op::Or),
            IlOp::Xor => self.one(out, Op::Xor),
            IlOp::Not => self.one(out, Op::Invert),

            IlOp::Ceq => self.one(out, Op::NumEqual),
            IlOp::Cgt => self.one(out, Op::Gt),
            IlOp::Clt => self.one(out, Op::Lt),
            IlOp::CgtUn => {
                self.emit_abs_normalize(out);
                self.one(out, Op::Gt)
            }
            IlOp::CltUn => {
                self.emit_abs_normalize(out);
                self.one(out, Op::Lt)
            }

            IlOp::Br => self.jump(out, Op::Jmp, insn),
            IlOp::Brtrue => self.jump(out, Op::JmpIf, insn),
            IlOp::Brfalse => self.jump(out, Op::JmpIfNot, insn),

            IlOp::Beq => self.cmp_branch(out, Op::NumEqual, false, insn),
            IlOp::Bne => self.cmp_branch(out, Op::NumNotEqual, false, insn),
            IlOp::Bge => self.cmp_branch(out, Op::Gte, false, insn),
            IlOp::Bgt => self.cmp_branch(out, Op::Gt, false, insn),
            IlOp::Ble => self.cmp_branch(out, Op::Lte, false, insn),
            IlOp::Blt => self.cmp_branch(out, Op::Lt, false, insn),
            IlOp::BgeUn => self.cmp_branch(out, Op::Gte, true, insn),
            IlOp::BgtUn => self.cmp_branch(out, Op::Gt, true, insn),
            IlOp::BleUn => self.cmp_branch(out, Op::Lte, true, insn),
            IlOp::BltUn => self.cmp_branch(out, Op::Lt, true, insn),

            IlOp::Call | IlOp::CallVirt => self.translate_call(method, body, i, out),
        }
    }

    fn one(&mut self, out: &mut Vec<Insn>, op: Op) -> Result<usize, TranslateError> {
        self.emit(out, Insn::new(op));
        Ok(0)
    }

    fn jump(
        &mut self,
        out: &mut Vec<Insn>,
        op: Op,
        insn: &SourceInstruction,
    ) -> Result<usize, TranslateError> {
        let target = insn
            .target()
            .ok_or(TranslateError::Unsupported { op: insn.op })?;
        self.emit(out, Insn::branch(op, target));
        Ok(0)
    }

    /// Compound compare-and-branch: explicit compare then jump-if-true.
    ///
    /// Unsigned variants normalize both operands through ABS before the
    /// signed compare. That only matches true unsigned semantics for the
    /// common small-value case; kept as-is for output compatibility.
    fn cmp_branch(
        &mut self,
        out: &mut Vec<Insn>,
        cmp: Op,
        unsigned: bool,
        insn: &SourceInstruction,
    ) -> Result<usize, TranslateError> {
        let target = insn
            .target()
            .ok_or(TranslateError::Unsupported { op: insn.op })?;
        if unsigned {
            self.emit_abs_normalize(out);
        }
        self.emit(out, Insn::new(cmp));
        self.emit(out, Insn::branch(Op::JmpIf, target));
        Ok(0)
    }

    /// ABS both comparison operands.
    fn emit_abs_normalize(&mut self, out: &mut Vec<Insn>) {
        self.emit(out, Insn::new(Op::Abs));
        self.emit(out, Insn::new(Op::Swap));
        self.emit(out, Insn::new(Op::Abs));
        self.emit(out, Insn::new(Op::Swap));
    }

    /// Static field load: a folded readonly constant or an event slot.
    fn translate_ldsfld(
        &mut self,
        insn: &SourceInstruction,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let field = insn
            .field()
            .ok_or(TranslateError::Unsupported { op: insn.op })?;
        // Event slots have no VM value; the call classifier scans back to
        // this load when the delegate is invoked.
        if field.is_delegate() {
            return Ok(0);
        }
        let Some(value) = self.src.constants.get(&field.qualified()) else {
            return Err(TranslateError::StaticField {
                field: field.qualified(),
            });
        };
        self.emit(out, Insn::push_constant(value));
        Ok(0)
    }

    fn expect_int(&self, insn: &SourceInstruction) -> Result<i64, TranslateError> {
        insn.int()
            .ok_or(TranslateError::Unsupported { op: insn.op })
    }

    fn expect_index(&self, insn: &SourceInstruction) -> Result<usize, TranslateError> {
        self.expect_int(insn)?
            .try_into()
            .map_err(|_| TranslateError::Unsupported { op: insn.op })
    }
}
