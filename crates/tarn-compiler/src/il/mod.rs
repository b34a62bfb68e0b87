//! Source-side data model.
//!
//! These types are handed over by the external IL loader and are read-only
//! to the compiler: typed opcodes with resolved operands, method and type
//! descriptors, and the small closed set of recognized marker attributes.
//! All lookups are `Option`-returning probes; nothing here panics on
//! missing metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tarn_bytecode::{ConstantValue, EventDecl, Op};

/// Source opcode kinds the selector handles.
///
/// Variants carry no data; resolved operands travel in [`Operand`]. The
/// conversion family is collapsed into a single `Conv` kind because every
/// integer width maps onto the VM's native arbitrary-precision integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IlOp {
    Nop,
    Break,
    Dup,
    Pop,
    Ret,

    Ldc,
    LdStr,
    LdNull,
    LdToken,

    Ldarg,
    Starg,
    Ldloc,
    Stloc,
    Ldloca,

    Ldsfld,
    Ldfld,
    Stfld,

    Newarr,
    Newobj,
    Initobj,
    Ldelem,
    Stelem,
    Ldlen,

    Box,
    Unbox,
    Castclass,
    Conv,

    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Not,

    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,

    Br,
    Brtrue,
    Brfalse,
    Beq,
    Bne,
    Bge,
    BgeUn,
    Bgt,
    BgtUn,
    Ble,
    BleUn,
    Blt,
    BltUn,

    Call,
    CallVirt,
}

impl IlOp {
    /// True for the compound compare-and-branch family.
    pub fn is_cmp_branch(self) -> bool {
        matches!(
            self,
            IlOp::Beq
                | IlOp::Bne
                | IlOp::Bge
                | IlOp::BgeUn
                | IlOp::Bgt
                | IlOp::BgtUn
                | IlOp::Ble
                | IlOp::BleUn
                | IlOp::Blt
                | IlOp::BltUn
        )
    }
}

/// Resolved instruction operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    /// Branch target: address of another instruction in the same method.
    Target(u32),
    Int(i64),
    Str(String),
    /// Raw data blob (e.g. the initializer behind an `ldtoken`).
    Bytes(Vec<u8>),
    Field(FieldRef),
    Method(MethodRef),
    Type(TypeRef),
}

/// One input instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceInstruction {
    pub addr: u32,
    pub op: IlOp,
    pub operand: Operand,
}

impl SourceInstruction {
    pub fn new(addr: u32, op: IlOp, operand: Operand) -> Self {
        Self { addr, op, operand }
    }

    pub fn int(&self) -> Option<i64> {
        match &self.operand {
            Operand::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<u32> {
        match &self.operand {
            Operand::Target(t) => Some(*t),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldRef> {
        match &self.operand {
            Operand::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn type_ref(&self) -> Option<&TypeRef> {
        match &self.operand {
            Operand::Type(t) => Some(t),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x} {:?}", self.addr, self.op)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Target(t) => write!(f, " ->{t:#06x}"),
            Operand::Int(v) => write!(f, " {v}"),
            Operand::Str(s) => write!(f, " {s:?}"),
            Operand::Bytes(b) => write!(f, " [{} bytes]", b.len()),
            Operand::Field(fr) => write!(f, " {}", fr.qualified()),
            Operand::Method(m) => write!(f, " {}", m.name),
            Operand::Type(t) => write!(f, " {}", t.name),
        }
    }
}

/// Recognized marker attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerAttrs {
    /// Pure compile-time marker method; call sites produce nothing.
    pub no_emit: bool,
    /// Readonly-field-initializer conversion marker. Only valid on a field
    /// initializer; seeing it on a call target is a hard error.
    pub no_emit_with_conversion: bool,
    /// System-call name; the call site emits it length-prefixed.
    pub syscall: Option<String>,
    /// The call site collapses to this single VM opcode.
    pub op_alias: Option<Op>,
    /// Inter-contract receiver hash (20 bytes; zero-filled for a
    /// runtime-resolved target).
    pub appcall: Option<Vec<u8>>,
    pub display_name: Option<String>,
    pub is_ctor: bool,
}

/// Kind of a source type, as resolved by the loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Value,
    Delegate,
    Exception,
}

/// Reference to a source type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeRef {
    pub fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }

    /// Element byte width for array-literal decoding, if this is a
    /// fixed-width primitive integer type.
    pub fn elem_width(&self) -> Option<usize> {
        match self.name.as_str() {
            "System.Byte" | "System.SByte" | "System.Boolean" => Some(1),
            "System.Int16" | "System.UInt16" | "System.Char" => Some(2),
            "System.Int32" | "System.UInt32" => Some(4),
            "System.Int64" | "System.UInt64" => Some(8),
            _ => None,
        }
    }

    /// Byte arrays are emulated as flat byte buffers, not containers.
    pub fn is_byte(&self) -> bool {
        self.name == "System.Byte"
    }
}

/// Reference to a field, with its declaring type and resolved type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub declaring: String,
    pub name: String,
    pub ty: Option<TypeRef>,
}

impl FieldRef {
    pub fn qualified(&self) -> String {
        format!("{}::{}", self.declaring, self.name)
    }

    /// True when the field holds a multicast delegate (an event slot).
    pub fn is_delegate(&self) -> bool {
        self.ty
            .as_ref()
            .is_some_and(|t| t.kind == TypeKind::Delegate)
    }
}

/// Reference to a call target, with the metadata classification needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodRef {
    /// Qualified name, `Declaring::Short`.
    pub name: String,
    pub declaring: String,
    pub param_count: usize,
    pub returns: bool,
    pub is_instance: bool,
    pub attrs: MarkerAttrs,
}

impl MethodRef {
    /// Name without the declaring-type prefix.
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// The runtime helper that backs compiler-emitted array literals.
    pub fn is_array_init(&self) -> bool {
        self.declaring.ends_with("RuntimeHelpers") && self.short_name() == "InitializeArray"
    }

    /// Number of stack slots a call site pops, receiver included.
    pub fn arg_slots(&self) -> usize {
        self.param_count + usize::from(self.is_instance)
    }
}

/// Declared source type with its fields in declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<String>,
}

/// One input method body with its entry metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceMethod {
    /// Qualified name, unique within the module.
    pub name: String,
    pub declaring: String,
    /// Parameter type descriptors.
    pub params: Vec<String>,
    /// Local variable type descriptors.
    pub locals: Vec<String>,
    pub returns: bool,
    pub is_public: bool,
    /// Designated contract entry point.
    pub is_entry: bool,
    pub is_instance: bool,
    pub attrs: MarkerAttrs,
    /// Address-ordered instruction stream.
    pub body: Vec<SourceInstruction>,
}

impl SourceMethod {
    /// Externally visible name: attribute override or the short name.
    pub fn display_name(&self) -> &str {
        if let Some(name) = &self.attrs.display_name {
            return name;
        }
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// Frame array size: arguments at low indices, locals above them.
    pub fn frame_size(&self) -> usize {
        self.params.len() + self.locals.len()
    }
}

/// The whole source module handed over by the loader.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceModule {
    pub types: IndexMap<String, TypeDef>,
    pub methods: IndexMap<String, SourceMethod>,
    /// Statically folded readonly constants, by qualified field name.
    pub constants: IndexMap<String, ConstantValue>,
    pub events: IndexMap<String, EventDecl>,
}

impl SourceModule {
    pub fn find_method(&self, name: &str) -> Option<&SourceMethod> {
        self.methods.get(name)
    }

    /// Zero-based ordinal of a field among its declaring type's fields.
    pub fn field_ordinal(&self, field: &FieldRef) -> Option<usize> {
        self.types
            .get(&field.declaring)
            .and_then(|ty| ty.fields.iter().position(|f| f == &field.name))
    }

    /// Field count of a declared type.
    pub fn field_count(&self, type_name: &str) -> Option<usize> {
        self.types.get(type_name).map(|ty| ty.fields.len())
    }

    pub fn type_kind(&self, type_name: &str) -> Option<TypeKind> {
        self.types.get(type_name).map(|ty| ty.kind)
    }
}
