//! Abstract syntax tree: the input artifact this crate consumes.
//!
//! Per spec.md §1/§6, producing this tree (lexing, parsing) is an external
//! collaborator's job; this crate only defines the shape of the tree it
//! accepts and the source-span format threaded through every node
//! (`(file-id, byte-offset-begin, byte-offset-end)`, see `diagnostics::Span`).
//! Type annotations here are *unresolved* (`TypeAnn::Named` for structs/
//! interfaces, raw literal text for integers wider than a machine word);
//! `resolver.rs`/`typechecker.rs` turn them into arena `TypeId`s.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Span;
use crate::types::{Mutability, Visibility};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeAnn {
    Bool,
    UInt(u16),
    Int(u16),
    Decimal(u8),
    FixedBytes(u8),
    Account,
    Array(Box<TypeAnn>, u32),
    DynArray(Box<TypeAnn>, u32),
    Bytes(u32),
    StringTy(u32),
    Mapping(Box<TypeAnn>, Box<TypeAnn>),
    /// A struct or interface name, resolved against the module symbol table.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

/// How an external call reaches its target, per spec.md §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Target's code runs in its own state.
    Plain,
    /// Target's code runs in the caller's state; restricted to trusted
    /// internal dispatch per spec.md §4.4.
    Delegate,
    /// Target must not mutate state; call fails if it tries.
    Static,
}

/// An environment query builtin (spec.md §4.1 "may read state and
/// environment"); see `builtins.rs` for the full registry of names/types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvQuery {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLiteral { digits: String, span: Span },
    DecimalLiteral { text: String, span: Span },
    BoolLiteral { value: bool, span: Span },
    BytesLiteral { bytes: Vec<u8>, span: Span },
    StringLiteral { value: String, span: Span },
    Ident { name: String, span: Span },
    EnvQuery { query: EnvQuery, span: Span },
    FieldAccess { base: Box<Expr>, field: String, span: Span },
    Index { base: Box<Expr>, index: Box<Expr>, span: Span },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
    Unary { op: UnOp, operand: Box<Expr>, span: Span },
    /// Internal call or a call to a builtin/environment function by name.
    Call { callee: String, args: Vec<Expr>, span: Span },
    /// External call through an interface-typed expression.
    ExternalCall {
        target: Box<Expr>,
        interface: String,
        method: String,
        args: Vec<Expr>,
        kind: CallKind,
        span: Span,
    },
    StructLiteral { name: String, fields: Vec<(String, Expr)>, span: Span },
    Cast { operand: Box<Expr>, ty: TypeAnn, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::DecimalLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::BytesLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::Ident { span, .. }
            | Expr::EnvQuery { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Index { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::ExternalCall { span, .. }
            | Expr::StructLiteral { span, .. }
            | Expr::Cast { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Let { name: String, ty: Option<TypeAnn>, value: Expr, span: Span },
    Assign { target: Expr, value: Expr, span: Span },
    Expr { expr: Expr, span: Span },
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>, span: Span },
    /// A `for` loop over a bounded integer range; spec.md §4.4 requires the
    /// bound be statically known so bounds checks can be hoisted in §4.5.
    ForRange { var: String, start: Expr, end: Expr, body: Vec<Stmt>, span: Span },
    Break { span: Span },
    Continue { span: Span },
    Return { value: Option<Expr>, span: Span },
    Revert { message: Option<Expr>, span: Span },
    Assert { cond: Expr, message: Option<String>, span: Span },
    Emit { event: String, args: Vec<Expr>, span: Span },
    /// An explicitly unchecked region: arithmetic inside skips the
    /// checked-arithmetic prologue per spec.md §4.4.
    Unchecked { body: Vec<Stmt>, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::ForRange { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Return { span, .. }
            | Stmt::Revert { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Emit { span, .. }
            | Stmt::Unchecked { span, .. } => *span,
        }
    }
}

/// Persistent/transient/immutable placement annotation on a state variable
/// declaration, consumed by `layout.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageClass {
    #[default]
    Persistent,
    Transient,
    Immutable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVarDecl {
    pub name: String,
    pub ty: TypeAnn,
    pub class: StorageClass,
    /// An explicit `@slot(n)` annotation, checked for non-overlap by the
    /// layout planner.
    pub explicit_slot: Option<u64>,
    /// A `@pack` annotation requesting this scalar share a slot with its
    /// declaration-order neighbor.
    pub packed: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, TypeAnn)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSigAnn {
    pub name: String,
    pub params: Vec<(String, TypeAnn)>,
    pub ret: Option<TypeAnn>,
    pub mutability: Mutability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub functions: Vec<FunctionSigAnn>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: String,
    pub ty: TypeAnn,
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecl {
    pub name: String,
    pub params: Vec<EventParam>,
    pub anonymous: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<(String, TypeAnn)>,
    pub ret: Option<TypeAnn>,
    pub mutability: Mutability,
    pub visibility: Visibility,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A single compilation unit (spec.md §3 "a module is compiled in three
/// phases"). `implements` names interfaces this module asserts structural
/// conformance to (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub state_vars: Vec<StateVarDecl>,
    pub structs: Vec<StructDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub events: Vec<EventDecl>,
    pub functions: Vec<FunctionDecl>,
    pub constructor: Option<FunctionDecl>,
    pub implements: Vec<String>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module { name: name.into(), ..Default::default() }
    }
}
