//! Shared fixture builders for tests.

use crate::il::{
    IlOp, MarkerAttrs, MethodRef, Operand, SourceInstruction, SourceMethod, SourceModule, TypeDef,
    TypeKind, TypeRef,
};

/// Build an instruction stream with sequential addresses.
pub fn seq(items: Vec<(IlOp, Operand)>) -> Vec<SourceInstruction> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, (op, operand))| SourceInstruction::new(i as u32, op, operand))
        .collect()
}

/// A static method with int-typed parameters and locals.
pub fn method(
    name: &str,
    params: usize,
    locals: usize,
    body: Vec<SourceInstruction>,
) -> SourceMethod {
    SourceMethod {
        name: name.to_owned(),
        declaring: name.split("::").next().unwrap_or("C").to_owned(),
        params: vec!["System.Int32".to_owned(); params],
        locals: vec!["System.Int32".to_owned(); locals],
        returns: true,
        is_public: true,
        is_entry: false,
        is_instance: false,
        attrs: MarkerAttrs::default(),
        body,
    }
}

pub fn entry(mut method: SourceMethod) -> SourceMethod {
    method.is_entry = true;
    method
}

pub fn module(methods: Vec<SourceMethod>) -> SourceModule {
    let mut src = SourceModule::default();
    for m in methods {
        src.methods.insert(m.name.clone(), m);
    }
    src
}

pub fn mref(name: &str, param_count: usize, returns: bool) -> MethodRef {
    MethodRef {
        name: name.to_owned(),
        declaring: name.split("::").next().unwrap_or("C").to_owned(),
        param_count,
        returns,
        is_instance: false,
        attrs: MarkerAttrs::default(),
    }
}

/// The runtime helper behind compiler-emitted array literals.
pub fn array_init_ref() -> MethodRef {
    mref(
        "System.Runtime.CompilerServices.RuntimeHelpers::InitializeArray",
        2,
        false,
    )
}

pub fn byte_type() -> TypeRef {
    TypeRef::new("System.Byte", TypeKind::Value)
}

pub fn int_type() -> TypeRef {
    TypeRef::new("System.Int32", TypeKind::Value)
}

/// Register a value type with the given fields.
pub fn add_type(src: &mut SourceModule, name: &str, kind: TypeKind, fields: &[&str]) {
    src.types.insert(
        name.to_owned(),
        TypeDef {
            name: name.to_owned(),
            kind,
            fields: fields.iter().map(|f| (*f).to_owned()).collect(),
        },
    );
}

/// Mnemonic list of a method's emitted opcodes, for sequence assertions.
pub fn mnemonics(insns: &[tarn_bytecode::Insn]) -> Vec<&'static str> {
    insns.iter().map(|i| i.op.mnemonic()).collect()
}
