//! Untyped syntax tree. Every node keeps the span it was parsed from; names borrow from the
//! source text.

use crate::diagnostic::Span;
use alloy_primitives::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub inner: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(inner: T, span: Span) -> Self {
        Self { inner, span }
    }
}

pub type Ident<'src> = Spanned<&'src str>;

#[derive(Debug, Clone, PartialEq)]
pub struct Module<'src> {
    pub items: Vec<Item<'src>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item<'src> {
    /// `name: T`, `name: public(T)`, `name: constant(T) = value`, `name: immutable(T)` and the
    /// legacy event form `Name: event({...})`
    Variable(VariableDecl<'src>),
    Struct(StructDef<'src>),
    Interface(InterfaceDef<'src>),
    Event(EventDef<'src>),
    Function(FunctionDef<'src>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl<'src> {
    pub name: Ident<'src>,
    pub annotation: Expr<'src>,
    pub value: Option<Expr<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field<'src> {
    pub name: Ident<'src>,
    pub annotation: Expr<'src>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef<'src> {
    pub name: Ident<'src>,
    pub fields: Vec<Field<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDef<'src> {
    pub name: Ident<'src>,
    /// Field annotations may be wrapped in `indexed(...)`.
    pub fields: Vec<Field<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDef<'src> {
    pub name: Ident<'src>,
    pub functions: Vec<InterfaceFunction<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceFunction<'src> {
    pub name: Ident<'src>,
    pub params: Vec<Param<'src>>,
    pub returns: Option<Expr<'src>>,
    pub mutability: Ident<'src>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef<'src> {
    pub decorators: Vec<Expr<'src>>,
    pub name: Ident<'src>,
    pub params: Vec<Param<'src>>,
    pub returns: Option<Expr<'src>>,
    pub body: Vec<Stmt<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param<'src> {
    pub name: Ident<'src>,
    pub annotation: Expr<'src>,
    pub default: Option<Expr<'src>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt<'src> {
    pub kind: StmtKind<'src>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind<'src> {
    /// The target is only valid as a plain name; anything else is rejected during validation.
    AnnAssign {
        target: Expr<'src>,
        annotation: Expr<'src>,
        value: Option<Expr<'src>>,
    },
    /// More than one target means a chained assignment (`x = y = 3`).
    Assign {
        targets: Vec<Expr<'src>>,
        value: Expr<'src>,
    },
    AugAssign {
        target: Expr<'src>,
        op: BinOp,
        value: Expr<'src>,
    },
    If {
        test: Expr<'src>,
        body: Vec<Stmt<'src>>,
        orelse: Vec<Stmt<'src>>,
    },
    For {
        target: Ident<'src>,
        annotation: Option<Expr<'src>>,
        iter: Expr<'src>,
        body: Vec<Stmt<'src>>,
        /// Only present so that `for ... else` can be rejected with a precise location.
        orelse: Option<Vec<Stmt<'src>>>,
    },
    While {
        test: Expr<'src>,
        body: Vec<Stmt<'src>>,
    },
    Return(Option<Expr<'src>>),
    Assert {
        test: Expr<'src>,
        msg: Option<Expr<'src>>,
    },
    Raise(Option<Expr<'src>>),
    Log(Expr<'src>),
    Pass,
    Break,
    Continue,
    Expr(Expr<'src>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr<'src> {
    pub kind: ExprKind<'src>,
    pub span: Span,
}

impl<'src> Expr<'src> {
    pub fn new(kind: ExprKind<'src>, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn as_name(&self) -> Option<&'src str> {
        match self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// `self.<attr>`
    pub fn as_self_attribute(&self) -> Option<&Ident<'src>> {
        match &self.kind {
            ExprKind::Attribute { value, attr } if value.as_name() == Some("self") => Some(attr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<'src> {
    Name(&'src str),
    Int(U256),
    /// Digits following the `0x` prefix, case preserved.
    Hex(&'src str),
    Str(String),
    /// `b"..."`
    Bytes(Vec<u8>),
    Bool(bool),
    List(Vec<Expr<'src>>),
    /// Multi-element subscript index, as in `HashMap[K, V]`.
    Tuple(Vec<Expr<'src>>),
    /// Keys are arbitrary expressions here; only identifiers survive validation.
    Dict(Vec<(Expr<'src>, Expr<'src>)>),
    Attribute {
        value: Box<Expr<'src>>,
        attr: Ident<'src>,
    },
    Subscript {
        value: Box<Expr<'src>>,
        index: Box<Expr<'src>>,
    },
    /// `lower:upper`, only produced as the index of a subscript.
    Slice {
        lower: Option<Box<Expr<'src>>>,
        upper: Option<Box<Expr<'src>>>,
    },
    Call {
        func: Box<Expr<'src>>,
        args: Vec<Expr<'src>>,
        keywords: Vec<Keyword<'src>>,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    BoolOp {
        op: BoolOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    Compare {
        op: CmpOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr<'src>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword<'src> {
    pub name: Ident<'src>,
    pub value: Expr<'src>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Invert,
    Not,
}
