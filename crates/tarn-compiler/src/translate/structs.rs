//! Struct and array emulation.
//!
//! The target VM has one generic container type for both structs and
//! arrays, plus flat byte strings. Value-type construction, field access
//! and array literals are all lowered onto those, with two folding paths:
//! - the front-end's `dup; ldtoken <blob>; call InitializeArray` idiom is
//!   folded into constant element pushes (or one PUSHBYTES for byte
//!   arrays)
//! - byte arrays additionally get a forward scan for per-element constant
//!   store idioms, collapsing any contiguous constant run into a single
//!   PUSHBYTES
//!
//! Folds report how many following source instructions they consumed so
//! the dispatch loop does not retranslate them. A partially recognized
//! pattern degrades to a zero-filled buffer plus ordinary element stores;
//! it never aborts.

use tarn_bytecode::{Insn, Op};

use crate::error::TranslateError;
use crate::il::{IlOp, Operand, SourceInstruction, SourceMethod};

use super::{CallKind, Translator};

/// A recognized run of constant byte stores.
struct ConstRun {
    buffer: Vec<u8>,
    skip: usize,
}

impl Translator<'_> {
    /// Translate `newarr`. Returns the number of following source
    /// instructions consumed by literal folding.
    pub(crate) fn translate_newarr(
        &mut self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let elem = body[i]
            .type_ref()
            .ok_or(TranslateError::Unsupported { op: IlOp::Newarr })?
            .clone();

        if elem.is_byte() {
            return self.translate_byte_array(method, body, i, out);
        }

        let Some((blob, skip)) = match_init_idiom(body, i) else {
            self.emit(out, Insn::new(Op::NewArray));
            return Ok(0);
        };

        let width = elem
            .elem_width()
            .ok_or(TranslateError::ElementWidth { width: 0 })?;
        if blob.len() % width != 0 {
            return Err(TranslateError::ElementWidth { width });
        }

        self.emit(out, Insn::new(Op::NewArray));
        for (index, chunk) in blob.chunks(width).enumerate() {
            self.emit(out, Insn::new(Op::Dup));
            self.emit(out, Insn::push_int(index as i64));
            self.emit(out, Insn::push_int(decode_elem(chunk)));
            self.emit(out, Insn::new(Op::SetItem));
        }
        Ok(skip)
    }

    /// Byte arrays lower to flat byte strings instead of containers.
    fn translate_byte_array(
        &mut self,
        method: &SourceMethod,
        body: &[SourceInstruction],
        i: usize,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        if let Some((blob, skip)) = match_init_idiom(body, i) {
            // The array length was already pushed; cancel it.
            self.emit(out, Insn::new(Op::Drop));
            self.emit_byte_literal(blob, out)?;
            return Ok(skip);
        }

        // Per-element store idioms need a statically known length, taken
        // from the immediately preceding constant push.
        let static_len = (i > 0 && body[i - 1].op == IlOp::Ldc)
            .then(|| body[i - 1].int())
            .flatten()
            .and_then(|v| usize::try_from(v).ok());

        if let Some(len) = static_len {
            // Shape A: repeated `dup; ldc idx; ldc val; stelem`.
            if let Some(run) = scan_const_run(&body[i + 1..], len, |insn| insn.op == IlOp::Dup) {
                self.emit(out, Insn::new(Op::Drop));
                self.emit_byte_literal(&run.buffer, out)?;
                return Ok(run.skip);
            }

            // Shape B: spilled to a local, then `ldloc k; ldc idx;
            // ldc val; stelem` repeated. The spill store is re-emitted
            // against the folded buffer. A `stloc` without a resolved
            // slot operand never matches this shape.
            if body.len() > i + 1
                && body[i + 1].op == IlOp::Stloc
                && let Some(slot) = body[i + 1].int().and_then(|v| usize::try_from(v).ok())
            {
                let is_reread = |insn: &SourceInstruction| {
                    insn.op == IlOp::Ldloc && insn.int() == Some(slot as i64)
                };
                if let Some(run) = scan_const_run(&body[i + 2..], len, is_reread) {
                    self.emit(out, Insn::new(Op::Drop));
                    self.emit_byte_literal(&run.buffer, out)?;
                    self.emit_store_loc(method, slot, out);
                    return Ok(1 + run.skip);
                }
            }
        }

        // Degraded fallback: zero-filled buffer of the pushed length,
        // populated by whatever stelem opcodes follow.
        self.emit(out, Insn::new(Op::NewBuffer));
        Ok(0)
    }

    /// Emit a folded byte literal. The PUSHBYTES length prefix is a u16,
    /// so longer literals are a fatal overflow, not a wrapped prefix.
    fn emit_byte_literal(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<Insn>,
    ) -> Result<(), TranslateError> {
        if bytes.len() > usize::from(u16::MAX) {
            return Err(TranslateError::LiteralTooLong { len: bytes.len() });
        }
        self.emit(out, Insn::push_bytes(bytes));
        Ok(())
    }

    /// Translate `initobj`: the frame index of the target local was pushed
    /// by the preceding `ldloca`; allocate the struct and store it there.
    pub(crate) fn translate_initobj(
        &mut self,
        insn: &SourceInstruction,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let ty = insn
            .type_ref()
            .ok_or(TranslateError::Unsupported { op: IlOp::Initobj })?;
        let count = self
            .src
            .field_count(&ty.name)
            .ok_or_else(|| TranslateError::FieldOrdinal {
                field: ty.name.clone(),
            })?;

        self.emit(out, Insn::push_int(count as i64));
        self.emit(out, Insn::new(Op::NewStruct));
        // Stack: index, struct. Bring the frame array in and reorder to
        // array, index, struct before writing.
        self.emit(out, Insn::new(Op::DupFromAlt));
        self.emit(out, Insn::new(Op::Rot));
        self.emit(out, Insn::new(Op::Rot));
        self.emit(out, Insn::new(Op::SetItem));
        Ok(0)
    }

    /// Translate `newobj`.
    pub(crate) fn translate_newobj(
        &mut self,
        insn: &SourceInstruction,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let mref = insn
            .method()
            .ok_or(TranslateError::Unsupported { op: IlOp::Newobj })?
            .clone();

        // Constructor-as-intrinsic: the aliased opcode is the whole
        // construction.
        if let Some(op) = mref.attrs.op_alias {
            self.emit(out, Insn::new(op));
            return Ok(0);
        }

        // The VM's integer already is a big integer; the byte-array
        // constructor is the identity.
        if mref.declaring == "System.Numerics.BigInteger" {
            return Ok(0);
        }

        // Exceptions have no VM representation.
        if is_exception(&mref.declaring, self.src) {
            self.emit(out, Insn::new(Op::Nop));
            for _ in 0..mref.param_count {
                self.emit(out, Insn::new(Op::Drop));
            }
            return Ok(0);
        }

        let count = self.src.field_count(&mref.declaring).ok_or_else(|| {
            TranslateError::FieldOrdinal {
                field: mref.declaring.clone(),
            }
        })?;
        self.emit(out, Insn::push_int(count as i64));
        self.emit(out, Insn::new(Op::NewStruct));

        // A bodied constructor runs as an ordinary internal call with the
        // fresh struct as its receiver.
        if self.src.find_method(&mref.name).is_some() {
            let kind = CallKind::Internal(mref.name.clone());
            self.emit_call_kind(kind, &mref, out)?;
        }
        Ok(0)
    }

    /// Field load: push the ordinal, index the container.
    pub(crate) fn translate_ldfld(
        &mut self,
        insn: &SourceInstruction,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let ordinal = self.field_ordinal(insn)?;
        self.emit(out, Insn::push_int(ordinal as i64));
        self.emit(out, Insn::new(Op::PickItem));
        Ok(0)
    }

    /// Field store: push the ordinal, swap it under the value, write.
    pub(crate) fn translate_stfld(
        &mut self,
        insn: &SourceInstruction,
        out: &mut Vec<Insn>,
    ) -> Result<usize, TranslateError> {
        let ordinal = self.field_ordinal(insn)?;
        self.emit(out, Insn::push_int(ordinal as i64));
        self.emit(out, Insn::new(Op::Swap));
        self.emit(out, Insn::new(Op::SetItem));
        Ok(0)
    }

    fn field_ordinal(&self, insn: &SourceInstruction) -> Result<usize, TranslateError> {
        let field = insn.field().ok_or(TranslateError::Unsupported { op: insn.op })?;
        self.src
            .field_ordinal(field)
            .ok_or_else(|| TranslateError::FieldOrdinal {
                field: field.qualified(),
            })
    }
}

/// Match `dup; ldtoken <blob>; call InitializeArray` right after the
/// `newarr` at `i`. Returns the blob and the consumed instruction count.
fn match_init_idiom(body: &[SourceInstruction], i: usize) -> Option<(&[u8], usize)> {
    let window = body.get(i + 1..i + 4)?;
    if window[0].op != IlOp::Dup || window[1].op != IlOp::LdToken {
        return None;
    }
    let Operand::Bytes(blob) = &window[1].operand else {
        return None;
    };
    let is_init = matches!(window[2].op, IlOp::Call | IlOp::CallVirt)
        && window[2].method().is_some_and(|m| m.is_array_init());
    is_init.then_some((blob.as_slice(), 3))
}

/// Scan groups of `<head>; ldc idx; ldc val; stelem` with constant
/// in-range indices, folding the longest prefix run into a buffer.
fn scan_const_run(
    body: &[SourceInstruction],
    len: usize,
    head: impl Fn(&SourceInstruction) -> bool,
) -> Option<ConstRun> {
    let mut buffer = vec![0u8; len];
    let mut groups = 0;
    while let Some(group) = body.get(groups * 4..groups * 4 + 4) {
        if !head(&group[0])
            || group[1].op != IlOp::Ldc
            || group[2].op != IlOp::Ldc
            || group[3].op != IlOp::Stelem
        {
            break;
        }
        let Some(index) = group[1].int().and_then(|v| usize::try_from(v).ok()) else {
            break;
        };
        // A value outside the byte range is not a constant byte store;
        // the run ends and the rest degrades to the buffer fallback.
        let Some(value) = group[2].int().and_then(|v| u8::try_from(v).ok()) else {
            break;
        };
        if index >= len {
            break;
        }
        buffer[index] = value;
        groups += 1;
    }
    (groups > 0).then_some(ConstRun {
        buffer,
        skip: groups * 4,
    })
}

/// Signed little-endian element decode for a literal blob chunk.
fn decode_elem(chunk: &[u8]) -> i64 {
    tarn_bytecode::decode_int(chunk)
}

/// Exception identification: a declared exception type, or an external
/// type following the platform naming convention.
fn is_exception(type_name: &str, src: &crate::il::SourceModule) -> bool {
    match src.type_kind(type_name) {
        Some(kind) => kind == crate::il::TypeKind::Exception,
        None => type_name.ends_with("Exception"),
    }
}
