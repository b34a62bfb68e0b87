//! Tests for call classification and calling-convention emission.

use tarn_bytecode::{CallConvention, Insn, NOTIFY_SYSCALL, Op};

use crate::error::{CompileError, TranslateError};
use crate::il::{FieldRef, IlOp, Operand, TypeKind, TypeRef};
use crate::test_utils::{add_type, entry, method, mnemonics, module, mref, seq};
use crate::{Translator, compile, il};

/// Evaluate the stack-shuffling subset on a plain value stack.
fn run_shuffle(insns: &[Insn], stack: &mut Vec<i64>) {
    for insn in insns {
        if let Some(v) = insn.op.small_value() {
            stack.push(v);
            continue;
        }
        let top = stack.len() - 1;
        match insn.op {
            Op::Swap => stack.swap(top, top - 1),
            Op::Rot => {
                let third = stack.remove(top - 2);
                stack.push(third);
            }
            Op::Xswap => {
                let n = stack.pop().unwrap() as usize;
                let top = stack.len() - 1;
                stack.swap(top, top - n);
            }
            other => panic!("unexpected {other} in shuffle"),
        }
    }
}

#[test]
fn argument_reversal_reverses_and_is_an_involution() {
    let src = il::SourceModule::default();
    for n in 0..=6usize {
        let mut t = Translator::new(&src, CallConvention::Relative);
        let mut out = Vec::new();
        t.emit_reverse(n, &mut out);

        let original: Vec<i64> = (0..n as i64).collect();
        let mut stack = original.clone();
        run_shuffle(&out, &mut stack);
        let reversed: Vec<i64> = original.iter().rev().copied().collect();
        assert_eq!(stack, reversed, "n = {n}");

        run_shuffle(&out, &mut stack);
        assert_eq!(stack, original, "double application, n = {n}");
    }
}

#[test]
fn scenario_c_instance_syscall() {
    let mut target = mref("Tarn.Blockchain::GetHeight", 1, true);
    target.is_instance = true;
    target.attrs.syscall = Some("Foo".to_owned());

    let src = module(vec![entry(method(
        "C::m",
        2,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Ldarg, Operand::Int(1)),
            (IlOp::CallVirt, Operand::Method(target)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let out = compile(&src, CallConvention::Relative).expect("compile");
    let insns = &out.methods["C::m"].insns;
    let ops = mnemonics(insns);

    // Receiver plus one argument: reversed with a single SWAP, then the
    // name push and the bare system-call opcode.
    assert!(ops.windows(3).any(|w| w == ["SWAP", "PUSHBYTES", "SYSCALL"]));
    let name = insns.iter().find(|i| i.op == Op::PushBytes).expect("name");
    assert_eq!(name.imm, vec![3, 0, b'F', b'o', b'o']);
    let syscall = insns.iter().find(|i| i.op == Op::Syscall).expect("syscall");
    assert!(syscall.imm.is_empty());
}

#[test]
fn no_emit_call_produces_nothing() {
    let mut marker = mref("C.Helpers::Assert", 1, false);
    marker.attrs.no_emit = true;

    let with_marker = module(vec![entry(method(
        "C::m",
        1,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Call, Operand::Method(marker)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let without = module(vec![entry(method(
        "C::m",
        1,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);

    let a = compile(&with_marker, CallConvention::Relative).expect("compile");
    let b = compile(&without, CallConvention::Relative).expect("compile");
    assert_eq!(
        mnemonics(&a.methods["C::m"].insns),
        mnemonics(&b.methods["C::m"].insns)
    );
}

#[test]
fn conversion_marker_on_call_site_is_fatal() {
    let mut marker = mref("C.Helpers::AsReadonly", 1, false);
    marker.attrs.no_emit_with_conversion = true;

    let src = module(vec![entry(method(
        "C::m",
        1,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Call, Operand::Method(marker)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let err = compile(&src, CallConvention::Relative).unwrap_err();
    let CompileError::Translate(TranslateError::InMethod { source, .. }) = err else {
        panic!("expected wrapped translate error");
    };
    assert_eq!(
        *source,
        TranslateError::InvalidMarker {
            target: "C.Helpers::AsReadonly".to_owned()
        }
    );
}

#[test]
fn intrinsic_alias_collapses_to_one_opcode() {
    let mut alias = mref("Tarn.Helper::Sha", 1, true);
    alias.attrs.op_alias = Some(Op::Size);

    let src = module(vec![entry(method(
        "C::m",
        1,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Call, Operand::Method(alias)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let out = compile(&src, CallConvention::Relative).expect("compile");
    let ops = mnemonics(&out.methods["C::m"].insns);
    assert!(ops.contains(&"SIZE"));
    assert!(!ops.contains(&"CALL"));
}

#[test]
fn helper_table_covers_operators_and_strings() {
    let cases: Vec<(crate::il::MethodRef, Vec<&str>)> = vec![
        (mref("System.Numerics.BigInteger::op_Addition", 2, true), vec!["ADD"]),
        (mref("System.Numerics.BigInteger::op_Equality", 2, true), vec!["NUMEQUAL"]),
        (mref("System.String::Concat", 2, true), vec!["CAT"]),
        (mref("System.String::Substring", 2, true), vec!["SUBSTR"]),
        (mref("System.Numerics.BigInteger::ToInt32", 1, true), vec![]),
    ];
    for (target, expect) in cases {
        let name = target.name.clone();
        let src = module(vec![entry(method(
            "C::m",
            2,
            0,
            seq(vec![
                (IlOp::Ldarg, Operand::Int(0)),
                (IlOp::Ldarg, Operand::Int(1)),
                (IlOp::Call, Operand::Method(target)),
                (IlOp::Ret, Operand::None),
            ]),
        ))]);
        let out = compile(&src, CallConvention::Relative).expect("compile");
        let ops = mnemonics(&out.methods["C::m"].insns);
        for op in &expect {
            assert!(ops.contains(op), "{name} expects {op}");
        }
        assert!(!ops.contains(&"CALL"), "{name} must not call");
    }
}

#[test]
fn string_indexer_expands_to_substring() {
    let target = mref("System.String::get_Chars", 1, true);
    let src = module(vec![entry(method(
        "C::m",
        2,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Ldarg, Operand::Int(1)),
            (IlOp::CallVirt, Operand::Method(target)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let out = compile(&src, CallConvention::Relative).expect("compile");
    let ops = mnemonics(&out.methods["C::m"].insns);
    assert!(ops.windows(2).any(|w| w == ["PUSH1", "SUBSTR"]));
}

#[test]
fn delegate_field_invoke_becomes_notify() {
    let mut src = il::SourceModule::default();
    add_type(&mut src, "C.TransferEvent", TypeKind::Delegate, &[]);
    let event_field = FieldRef {
        declaring: "C".to_owned(),
        name: "Transferred".to_owned(),
        ty: Some(TypeRef::new("C.TransferEvent", TypeKind::Delegate)),
    };
    let mut invoke = mref("C.TransferEvent::Invoke", 2, false);
    invoke.is_instance = true;
    src.methods.insert(
        "C::m".to_owned(),
        entry(method(
            "C::m",
            2,
            0,
            seq(vec![
                (IlOp::Ldsfld, Operand::Field(event_field)),
                (IlOp::Ldarg, Operand::Int(0)),
                (IlOp::Ldarg, Operand::Int(1)),
                (IlOp::CallVirt, Operand::Method(invoke)),
                (IlOp::Ret, Operand::None),
            ]),
        )),
    );

    let out = compile(&src, CallConvention::Relative).expect("compile");
    let insns = &out.methods["C::m"].insns;
    let ops = mnemonics(insns);
    assert!(
        ops.windows(5)
            .any(|w| w == ["PUSHBYTES", "PUSH3", "PACK", "PUSHBYTES", "SYSCALL"])
    );

    let pushes: Vec<_> = insns.iter().filter(|i| i.op == Op::PushBytes).collect();
    assert_eq!(&pushes[0].imm[2..], b"Transferred");
    assert_eq!(&pushes[1].imm[2..], NOTIFY_SYSCALL.as_bytes());
}

#[test]
fn bound_delegate_invoke_becomes_dynamic_call() {
    for convention in [CallConvention::Relative, CallConvention::Direct] {
        let mut src = il::SourceModule::default();
        add_type(&mut src, "C.Callback", TypeKind::Delegate, &[]);
        let mut invoke = mref("C.Callback::Invoke", 1, true);
        invoke.is_instance = true;
        let mut m = method(
            "C::m",
            1,
            0,
            seq(vec![
                (IlOp::Ldarg, Operand::Int(0)),
                (IlOp::Ldc, Operand::Int(5)),
                (IlOp::CallVirt, Operand::Method(invoke)),
                (IlOp::Ret, Operand::None),
            ]),
        );
        m.params = vec!["C.Callback".to_owned()];
        src.methods.insert("C::m".to_owned(), entry(m));

        let out = compile(&src, convention).expect("compile");
        let insns = &out.methods["C::m"].insns;
        let ops = mnemonics(insns);
        // One argument: no reversal, roll the code address over it.
        assert!(ops.windows(3).any(|w| w == ["PUSH1", "ROLL", "CALLDYN"]));

        let dyn_call = insns.iter().find(|i| i.op == Op::CallDyn).expect("calldyn");
        match convention {
            CallConvention::Relative => assert!(dyn_call.imm.is_empty()),
            CallConvention::Direct => assert_eq!(dyn_call.imm, vec![1, 1]),
        }
    }
}

#[test]
fn inter_contract_call_carries_receiver_hash() {
    let mut target = mref("C.Token::BalanceOf", 2, true);
    target.attrs.appcall = Some(vec![0x11; 20]);

    for convention in [CallConvention::Relative, CallConvention::Direct] {
        let src = module(vec![entry(method(
            "C::m",
            2,
            0,
            seq(vec![
                (IlOp::Ldarg, Operand::Int(0)),
                (IlOp::Ldarg, Operand::Int(1)),
                (IlOp::Call, Operand::Method(target.clone())),
                (IlOp::Ret, Operand::None),
            ]),
        ))]);
        let out = compile(&src, convention).expect("compile");
        let insns = &out.methods["C::m"].insns;

        let call = insns.iter().find(|i| i.op == Op::AppCall).expect("appcall");
        match convention {
            CallConvention::Relative => assert_eq!(call.imm, vec![0x11; 20]),
            CallConvention::Direct => {
                assert_eq!(&call.imm[..2], &[1, 2]);
                assert_eq!(&call.imm[2..], &[0x11; 20]);
            }
        }
    }
}

#[test]
fn zero_hash_appcall_rolls_runtime_target() {
    let mut target = mref("C.Token::Forward", 2, true);
    target.attrs.appcall = Some(vec![0; 20]);

    let src = module(vec![entry(method(
        "C::m",
        3,
        0,
        seq(vec![
            (IlOp::Ldarg, Operand::Int(0)),
            (IlOp::Ldarg, Operand::Int(1)),
            (IlOp::Ldarg, Operand::Int(2)),
            (IlOp::Call, Operand::Method(target)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let out = compile(&src, CallConvention::Relative).expect("compile");
    let ops = mnemonics(&out.methods["C::m"].insns);
    // The hash slot below the two reversed arguments comes back on top.
    assert!(ops.windows(3).any(|w| w == ["PUSH2", "ROLL", "APPCALL"]));
}

#[test]
fn short_receiver_hash_is_fatal() {
    let mut target = mref("C.Token::Broken", 0, false);
    target.attrs.appcall = Some(vec![1, 2, 3]);

    let src = module(vec![entry(method(
        "C::m",
        0,
        0,
        seq(vec![
            (IlOp::Call, Operand::Method(target)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let err = compile(&src, CallConvention::Relative).unwrap_err();
    let CompileError::Translate(TranslateError::InMethod { source, .. }) = err else {
        panic!("expected wrapped translate error");
    };
    assert_eq!(*source, TranslateError::HashLength { len: 3 });
}

#[test]
fn unknown_call_target_is_fatal() {
    let target = mref("C.Missing::Nowhere", 0, false);
    let src = module(vec![entry(method(
        "C::m",
        0,
        0,
        seq(vec![
            (IlOp::Call, Operand::Method(target)),
            (IlOp::Ret, Operand::None),
        ]),
    ))]);
    let err = compile(&src, CallConvention::Relative).unwrap_err();
    let CompileError::Translate(TranslateError::InMethod { source, .. }) = err else {
        panic!("expected wrapped translate error");
    };
    assert_eq!(
        *source,
        TranslateError::UnresolvedCall {
            target: "C.Missing::Nowhere".to_owned()
        }
    );
}
