//! Call-site classification and emission.
//!
//! Every call instruction is classified once, from statically available
//! metadata, into one of the call kinds below; each kind has its own
//! calling-convention emission. Classification order follows the marker
//! precedence: no-emit, delegate notify/dynamic, intrinsic alias, system
//! call, internal method, inter-contract, then the closed helper table.
//! An unmatched target is fatal unless it can be speculatively compiled.

use tarn_bytecode::{HASH_LEN, Insn, NOTIFY_SYSCALL, Op};

use crate::error::TranslateError;
use crate::il::{IlOp, MethodRef, SourceInstruction, SourceMethod, TypeKind};

use super::Translator;

/// Resolved call kind for one call site.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CallKind {
    /// Compile-time marker method; nothing is emitted.
    NoEmit,
    /// Event raise through a delegate-typed static field.
    Notify(String),
    /// Delegate invocation through a stack-resident code address.
    Dynamic,
    /// The call collapses to a single aliased opcode.
    Intrinsic(Op),
    Syscall(String),
    /// Deferred call-fix against a method of this module.
    Internal(String),
    /// Cross-contract call; zero hash means runtime-resolved target.
    InterContract([u8; HASH_LEN]),
    /// Compiler-synthesized helper with a fixed opcode expansion.
    Helper(Vec<Op>),
}

/// Where the delegate about to be invoked came from.
enum DelegateSource {
    EventField(String),
    Bound,
}

impl Translator<'_> {
    pub(crate) fn translate_call(
        &mut self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let mref = body[i]
            .method()
            .ok_or(TranslateError::Unsupported { op: body[i].op })?
            .clone();
        let kind = self.classify_call(method, body, i, &mref)?;
        self.emit_call_kind(kind, &mref, out)?;
        Ok(0)
    }

    /// Classify one call site. Pure except for the method-table lookup.
    pub(crate) fn classify_call(
        &self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        mref: &MethodRef,
    ) -> Result<CallKind, TranslateError> {
        if mref.attrs.no_emit_with_conversion {
            // Only valid on a field initializer, never a call site.
            return Err(TranslateError::InvalidMarker {
                target: mref.name.clone(),
            });
        }
        if mref.attrs.no_emit {
            return Ok(CallKind::NoEmit);
        }

        if self.is_delegate_invoke(mref) {
            return Ok(match self.find_delegate_source(method, body, i) {
                Some(DelegateSource::EventField(event)) => CallKind::Notify(event),
                _ => CallKind::Dynamic,
            });
        }

        if let Some(op) = mref.attrs.op_alias {
            return Ok(CallKind::Intrinsic(op));
        }
        if let Some(name) = &mref.attrs.syscall {
            return Ok(CallKind::Syscall(name.clone()));
        }
        if self.methods.contains_key(&mref.name) || self.src.find_method(&mref.name).is_some() {
            return Ok(CallKind::Internal(mref.name.clone()));
        }
        if let Some(hash) = &mref.attrs.appcall {
            let hash: [u8; HASH_LEN] = hash
                .as_slice()
                .try_into()
                .map_err(|_| TranslateError::HashLength { len: hash.len() })?;
            return Ok(CallKind::InterContract(hash));
        }
        if let Some(ops) = helper_ops(mref) {
            return Ok(CallKind::Helper(ops));
        }

        Err(TranslateError::UnresolvedCall {
            target: mref.name.clone(),
        })
    }

    pub(crate) fn emit_call_kind(
        &mut self,
        kind: CallKind,
        mref: &MethodRef,
        out: &mut Vec<Insn>,
    ) -> Result<(), TranslateError> {
        let convention = self.convention;
        let rets = u8::from(mref.returns);
        match kind {
            CallKind::NoEmit => {}
            CallKind::Notify(event) => {
                // Pack the event name above the arguments into one array
                // and hand it to the fixed notify system call.
                let n = mref.param_count;
                self.emit(out, Insn::push_str(&event));
                self.emit(out, Insn::push_int(n as i64 + 1));
                self.emit(out, Insn::new(Op::Pack));
                self.emit(out, Insn::push_str(NOTIFY_SYSCALL));
                self.emit(out, Insn::new(Op::Syscall));
            }
            CallKind::Dynamic => {
                // The callee address was pushed before the arguments;
                // roll it to the top after reversing them.
                let n = mref.param_count;
                self.emit_reverse(n, out);
                self.emit(out, Insn::push_int(n as i64));
                self.emit(out, Insn::new(Op::Roll));
                self.emit(out, Insn::call_dyn(convention, rets, n as u8));
            }
            CallKind::Intrinsic(op) => {
                self.emit(out, Insn::new(op));
            }
            CallKind::Syscall(name) => {
                let n = mref.arg_slots();
                self.emit_reverse(n, out);
                self.emit(out, Insn::push_str(&name));
                self.emit(out, Insn::new(Op::Syscall));
            }
            CallKind::Internal(callee) => {
                if !self.speculate(&callee) {
                    return Err(TranslateError::UnresolvedCall { target: callee });
                }
                let n = mref.arg_slots();
                self.emit_reverse(n, out);
                self.emit(out, Insn::call(&callee, convention, rets, n as u8));
            }
            CallKind::InterContract(hash) => {
                let n = mref.arg_slots();
                self.emit_reverse(n, out);
                if hash == [0u8; HASH_LEN] {
                    // Runtime-resolved target: the hash was pushed before
                    // the arguments, bring it back on top.
                    self.emit(out, Insn::push_int(n as i64));
                    self.emit(out, Insn::new(Op::Roll));
                }
                self.emit(out, Insn::app_call(hash, convention, rets, n as u8));
            }
            CallKind::Helper(ops) => {
                for op in ops {
                    self.emit(out, Insn::new(op));
                }
            }
        }
        Ok(())
    }

    /// Reverse the top `n` stack slots.
    ///
    /// Small arities use fixed forms; larger ones exchange pairwise from
    /// both ends through the position-exchange primitive. Applying the
    /// sequence twice restores the original order.
    pub(crate) fn emit_reverse(&mut self, n: usize, out: &mut Vec<Insn>) {
        match n {
            0 | 1 => {}
            2 => self.emit(out, Insn::new(Op::Swap)),
            3 => {
                self.emit(out, Insn::new(Op::Swap));
                self.emit(out, Insn::new(Op::Rot));
            }
            _ => {
                for k in 0..n / 2 {
                    let (near, far) = (k, n - 1 - k);
                    if near == 0 {
                        self.emit(out, Insn::push_int(far as i64));
                        self.emit(out, Insn::new(Op::Xswap));
                    } else {
                        // Exchange two interior positions via the top.
                        self.emit(out, Insn::push_int(near as i64));
                        self.emit(out, Insn::new(Op::Xswap));
                        self.emit(out, Insn::push_int(far as i64));
                        self.emit(out, Insn::new(Op::Xswap));
                        self.emit(out, Insn::push_int(near as i64));
                        self.emit(out, Insn::new(Op::Xswap));
                    }
                }
            }
        }
    }

    fn is_delegate_invoke(&self, mref: &MethodRef) -> bool {
        mref.short_name() == "Invoke"
            && self.src.type_kind(&mref.declaring) == Some(TypeKind::Delegate)
    }

    /// Walk backwards from the call site for the instruction that put the
    /// delegate on the evaluation path.
    fn find_delegate_source(
        &self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
    ) -> Option<DelegateSource> {
        for insn in body[..i].iter().rev() {
            match insn.op {
                IlOp::Ldsfld => {
                    if let Some(field) = insn.field()
                        && field.is_delegate()
                    {
                        return Some(DelegateSource::EventField(field.name.clone()));
                    }
                }
                IlOp::Castclass => {
                    if insn.type_ref().is_some_and(|t| t.kind == TypeKind::Delegate) {
                        return Some(DelegateSource::Bound);
                    }
                }
                IlOp::Ldarg => {
                    let index = insn.int().and_then(|v| usize::try_from(v).ok())?;
                    let param = method.params.get(index)?;
                    if self.src.type_kind(param) == Some(TypeKind::Delegate) {
                        return Some(DelegateSource::Bound);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// The closed fallback table of compiler-synthesized helpers.
///
/// Numeric conversions are identities on the VM's native big integer;
/// operator helpers and the string surface map to single opcodes.
fn helper_ops(mref: &MethodRef) -> Option<Vec<Op>> {
    let ops = match mref.short_name() {
        "ToByte" | "ToSByte" | "ToInt16" | "ToUInt16" | "ToInt32" | "ToUInt32" | "ToInt64"
        | "ToUInt64" | "ToBigInteger" | "op_Implicit" | "op_Explicit" => vec![],
        "op_Addition" => vec![Op::Add],
        "op_Subtraction" => vec![Op::Sub],
        "op_Multiply" => vec![Op::Mul],
        "op_Division" => vec![Op::Div],
        "op_Modulus" => vec![Op::Mod],
        "op_UnaryNegation" => vec![Op::Neg],
        "op_Equality" => vec![Op::NumEqual],
        "op_Inequality" => vec![Op::NumNotEqual],
        "op_LessThan" => vec![Op::Lt],
        "op_LessThanOrEqual" => vec![Op::Lte],
        "op_GreaterThan" => vec![Op::Gt],
        "op_GreaterThanOrEqual" => vec![Op::Gte],
        "Concat" if mref.declaring == "System.String" => vec![Op::Cat],
        "Substring" if mref.declaring == "System.String" && mref.param_count == 2 => {
            vec![Op::SubStr]
        }
        "get_Length" if mref.declaring == "System.String" => vec![Op::Size],
        "get_Chars" if mref.declaring == "System.String" => vec![Op::Push1, Op::SubStr],
        "Break" if mref.declaring == "System.Diagnostics.Debugger" => vec![Op::Nop],
        _ => return None,
    };
    Some(ops)
}
