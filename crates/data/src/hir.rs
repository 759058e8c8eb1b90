//! Typed, name-resolved representation of a contract handed from semantic analysis to code
//! generation. Every expression carries exactly one resolved [`Type`].

use crate::{
    index::{EventId, FunctionId, ImmutableId, IndexVec, LocalId, StorageId},
    types::{ExternalSignature, Mutability, Type},
};
use alloy_primitives::{B256, Bytes, U256};
use vyc_syntax::Span;

pub use vyc_syntax::ast::{BinOp, BoolOp, CmpOp};

#[derive(Debug, Clone, Default)]
pub struct Contract {
    pub storage: IndexVec<StorageId, StorageVar>,
    pub immutables: IndexVec<ImmutableId, ImmutableVar>,
    pub events: IndexVec<EventId, Event>,
    pub functions: IndexVec<FunctionId, Function>,
    pub constructor: Option<FunctionId>,
    pub fallback: Option<FunctionId>,
}

impl Contract {
    /// Bytes of immutable data appended to the runtime code.
    pub fn immutables_size(&self) -> u32 {
        self.immutables.iter().map(|imm| imm.ty.memory_size()).sum()
    }

    /// Functions reachable through the selector dispatcher, in declaration order.
    pub fn external_functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions.iter_enumerated().filter(|(_, f)| f.kind == FunctionKind::External)
    }
}

#[derive(Debug, Clone)]
pub struct StorageVar {
    pub name: String,
    pub ty: Type,
    pub slot: u64,
}

#[derive(Debug, Clone)]
pub struct ImmutableVar {
    pub name: String,
    pub ty: Type,
    /// Byte offset inside the immutables section.
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub fields: Vec<EventField>,
    pub topic0: B256,
}

#[derive(Debug, Clone)]
pub struct EventField {
    pub name: String,
    pub ty: Type,
    pub indexed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    External,
    Internal,
    Constructor,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    pub mutability: Mutability,
    /// Leading entries of `locals`.
    pub params: Vec<LocalId>,
    pub locals: IndexVec<LocalId, Local>,
    pub returns: Option<Type>,
    /// Values of the trailing parameters that may be omitted by callers.
    pub defaults: Vec<TypedExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Function {
    pub fn required_params(&self) -> usize {
        self.params.len() - self.defaults.len()
    }

    pub fn param_types(&self) -> impl Iterator<Item = &Type> {
        self.params.iter().map(|&p| &self.locals[p].ty)
    }

    /// Signature seen by external callers. Only meaningful for external functions.
    pub fn signature(&self) -> ExternalSignature {
        ExternalSignature {
            name: self.name.clone(),
            params: self.param_types().cloned().collect(),
            returns: self.returns.clone(),
            mutability: self.mutability,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assign {
        target: TypedExpr,
        value: TypedExpr,
    },
    AugAssign {
        target: TypedExpr,
        op: BinOp,
        value: TypedExpr,
    },
    /// Call whose result, if any, is discarded.
    Call(Call),
    /// Creation call whose address is discarded.
    Expr(TypedExpr),
    If {
        test: TypedExpr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// `for var in range(start, end)`, at most `bound` iterations.
    ForRange {
        var: LocalId,
        start: TypedExpr,
        end: TypedExpr,
        bound: u64,
        body: Vec<Stmt>,
    },
    /// Iterates over the elements of a memory or storage array.
    ForIn {
        var: LocalId,
        iter: TypedExpr,
        body: Vec<Stmt>,
    },
    Return(Option<TypedExpr>),
    /// `reason` is a string, encoded as `Error(string)` revert data.
    Assert {
        test: TypedExpr,
        reason: Option<TypedExpr>,
    },
    Raise(Option<TypedExpr>),
    Log {
        event: EventId,
        args: Vec<TypedExpr>,
    },
    Break,
    Continue,
    Pass,
}

#[derive(Debug, Clone)]
pub struct TypedExpr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl TypedExpr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn as_literal(&self) -> Option<U256> {
        match self.kind {
            ExprKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the expression denotes a persistent location (storage or immutable).
    pub fn is_state_location(&self) -> bool {
        match &self.kind {
            ExprKind::Storage(_) | ExprKind::Immutable(_) => true,
            ExprKind::Index { base, .. } | ExprKind::Field { base, .. } => {
                base.is_state_location()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Word value as its raw 256-bit representation. Signed integers are two's complement,
    /// `bytesM` are left aligned.
    Literal(U256),
    /// `Bytes`/`String` literal.
    BytesLiteral(Bytes),
    Local(LocalId),
    Storage(StorageId),
    Immutable(ImmutableId),
    /// Array element or `HashMap` value.
    Index {
        base: Box<TypedExpr>,
        index: Box<TypedExpr>,
    },
    Field {
        base: Box<TypedExpr>,
        index: usize,
    },
    Env(EnvVar),
    AddressMember {
        address: Box<TypedExpr>,
        member: AddressMember,
    },
    Neg(Box<TypedExpr>),
    Invert(Box<TypedExpr>),
    Not(Box<TypedExpr>),
    Binary {
        op: BinOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Compare {
        op: CmpOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    /// Array literal.
    List(Vec<TypedExpr>),
    /// Struct constructor, fields in declaration order.
    Struct(Vec<TypedExpr>),
    /// Call of a function that returns a value.
    Call(Call),
    Create(Box<CreationCall>),
    Len(Box<TypedExpr>),
    /// Zero value of the expression's type.
    Empty,
    Keccak256(Box<TypedExpr>),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub target: CallTarget,
    pub args: Vec<TypedExpr>,
}

#[derive(Debug, Clone)]
pub enum CallTarget {
    Internal(FunctionId),
    External {
        address: Box<TypedExpr>,
        signature: ExternalSignature,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    MsgSender,
    MsgValue,
    TxOrigin,
    BlockTimestamp,
    BlockNumber,
    ChainId,
    SelfAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMember {
    Balance,
    Codesize,
    Codehash,
    IsContract,
}

/// How the init code of a created contract is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationStrategy {
    /// EIP-1167 forwarder to the target.
    MinimalProxy,
    /// The target's code is init code; ABI-encoded arguments are appended to it.
    FactoryForward,
    /// The target's code, wrapped in an init code that returns it verbatim.
    RuntimeCopy,
}

/// Resolved call to one of the creation builtins. Evaluates to the new contract's address.
#[derive(Debug, Clone)]
pub struct CreationCall {
    pub strategy: CreationStrategy,
    pub target: TypedExpr,
    /// Forwarded constructor arguments. Empty unless the strategy is `FactoryForward`.
    pub args: Vec<TypedExpr>,
    pub value: Option<TypedExpr>,
    /// Present for CREATE2.
    pub salt: Option<TypedExpr>,
    /// With `false` a failed deployment yields the zero address instead of reverting.
    pub revert_on_failure: bool,
    /// Bytes of the target's code skipped when copying it. Only used by `FactoryForward`.
    pub code_offset: u32,
}

impl CreationCall {
    pub fn uses_create2(&self) -> bool {
        self.salt.is_some()
    }
}
