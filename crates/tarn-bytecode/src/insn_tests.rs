//! Tests for instruction encoding and integer immediates.

use crate::convention::CallConvention;
use crate::insn::{Insn, decode_int, encode_int};
use crate::op::Op;

#[test]
fn encode_int_is_minimal() {
    assert_eq!(encode_int(0), vec![0x00]);
    assert_eq!(encode_int(1), vec![0x01]);
    assert_eq!(encode_int(127), vec![0x7f]);
    // 128 needs a zero sign byte so it is not read back as -128.
    assert_eq!(encode_int(128), vec![0x80, 0x00]);
    assert_eq!(encode_int(-1), vec![0xff]);
    assert_eq!(encode_int(-128), vec![0x80]);
    assert_eq!(encode_int(-129), vec![0x7f, 0xff]);
    assert_eq!(encode_int(0x1234), vec![0x34, 0x12]);
}

#[test]
fn int_round_trip() {
    for v in [
        0,
        1,
        -1,
        127,
        128,
        -128,
        -129,
        255,
        256,
        65535,
        -65536,
        i64::MAX,
        i64::MIN,
    ] {
        assert_eq!(decode_int(&encode_int(v)), v, "value {v}");
    }
}

#[test]
fn push_int_uses_small_forms() {
    assert_eq!(Insn::push_int(0).op, Op::Push0);
    assert_eq!(Insn::push_int(-1).op, Op::PushM1);
    assert_eq!(Insn::push_int(16).op, Op::Push16);
    assert!(Insn::push_int(5).imm.is_empty());

    let big = Insn::push_int(300);
    assert_eq!(big.op, Op::PushInt);
    assert_eq!(big.imm, vec![2, 0x2c, 0x01]);
}

#[test]
fn push_bytes_prefixes_u16_length() {
    let i = Insn::push_bytes(&[0xaa, 0xbb, 0xcc]);
    assert_eq!(i.op, Op::PushBytes);
    assert_eq!(i.imm, vec![0x03, 0x00, 0xaa, 0xbb, 0xcc]);
    assert_eq!(i.encoded_len(), 6);
}

#[test]
fn branch_has_placeholder_and_marker() {
    let b = Insn::branch(Op::JmpIf, 0x20);
    assert_eq!(b.imm, vec![0, 0]);
    assert_eq!(b.branch_fix, Some(0x20));
    assert_eq!(b.encoded_len(), 3);
}

#[test]
fn call_placeholder_sizes_match_convention() {
    let rel = Insn::call("M::f", CallConvention::Relative, 1, 2);
    assert_eq!(rel.imm.len(), 2);
    assert_eq!(rel.call_fix.as_deref(), Some("M::f"));

    let dir = Insn::call("M::f", CallConvention::Direct, 1, 2);
    assert_eq!(dir.imm.len(), 4);
    assert_eq!(&dir.imm[..2], &[1, 2]);
}

#[test]
fn patch_branch_writes_signed_le() {
    let mut b = Insn::branch(Op::Jmp, 0);
    b.patch_branch(-3);
    assert_eq!(b.imm, vec![0xfd, 0xff]);
}

#[test]
fn patch_call_respects_convention() {
    let mut rel = Insn::call("f", CallConvention::Relative, 0, 0);
    rel.patch_call(CallConvention::Relative, 40);
    assert_eq!(rel.imm, vec![40, 0]);

    let mut dir = Insn::call("f", CallConvention::Direct, 1, 3);
    dir.patch_call(CallConvention::Direct, 0x0102);
    assert_eq!(dir.imm, vec![1, 3, 0x02, 0x01]);
}

#[test]
fn encode_into_appends_opcode_then_imm() {
    let mut out = Vec::new();
    Insn::push_int(300).encode_into(&mut out);
    Insn::new(Op::Ret).encode_into(&mut out);
    assert_eq!(out, vec![Op::PushInt as u8, 2, 0x2c, 0x01, Op::Ret as u8]);
}
