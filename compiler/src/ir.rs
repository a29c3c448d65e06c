//! Tree-structured intermediate representation, built by `ir_builder` and
//! consumed by `optimizer` and `scheduler`.
//!
//! Per spec.md §3's invariant, every `IrNode` yields exactly one VM word
//! when evaluated (composites are represented by a pointer word, per
//! `types::TypeArena::layout_of`'s doc comment). Each node records its
//! result type, a purity flag used by the optimizer's CSE and
//! constant-propagation passes, and a provenance span for diagnostics raised
//! during later phases (e.g. an internal-compiler-error during scheduling).

use crate::diagnostics::Span;
use crate::types::TypeId;

/// A side-effect classification used by the optimizer to decide which nodes
/// are safe to reorder, deduplicate (CSE), or drop when unused (DCE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// No observable effect beyond producing its result; safe to reorder,
    /// common-subexpression-eliminate, or drop if unused.
    Pure,
    /// Reads mutable state (storage, transient storage, environment); safe
    /// to reorder with other reads but not across a write, and not safe to
    /// drop if a later read of the same location must see updates from
    /// between them.
    Reads,
    /// Writes mutable state, calls externally, emits a log, or can revert.
    /// Never reordered relative to another `Writes` node and never removed
    /// even if its result is unused.
    Writes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Lt,
    Gt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrUnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageRegion {
    Persistent,
    Transient,
}

/// One IR node. `ty` is the node's result type; `effect` its side-effect
/// classification; `span` its originating source location (or
/// `Span::synthetic()` for compiler-generated nodes like the shared
/// checked-arithmetic revert stub).
#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    pub kind: IrKind,
    pub ty: TypeId,
    pub effect: EffectKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrKind {
    ConstInt(Vec<u8>),
    ConstBool(bool),

    Local(u32),

    /// A read from a fixed storage/transient-storage slot (scalars, and the
    /// length word of a dynamic array/bytes/string).
    StorageRead { region: StorageRegion, slot: u64, bit_offset: u16, bit_width: u16 },
    StorageWrite {
        region: StorageRegion,
        slot: u64,
        bit_offset: u16,
        bit_width: u16,
        value: Box<IrNode>,
    },
    /// A mapping or dynamic-array element access: the concrete slot is not
    /// known until the key/index is evaluated, so this node carries the base
    /// slot and a lowered key expression instead of a resolved slot number.
    MappingRead { base_slot: u64, key: Box<IrNode> },
    MappingWrite { base_slot: u64, key: Box<IrNode>, value: Box<IrNode> },

    ImmutableRead { offset: u32 },

    Binary { op: IrBinOp, checked: bool, lhs: Box<IrNode>, rhs: Box<IrNode> },
    Unary { op: IrUnOp, operand: Box<IrNode> },

    /// A boolean short-circuit `&&`/`||`, lowered to a branch rather than a
    /// bitwise `Binary` so the right operand is only evaluated when it can
    /// affect the result — required because the right operand may have
    /// side effects (e.g. `a() && b()` where `b` writes state).
    ShortCircuit { is_and: bool, lhs: Box<IrNode>, rhs: Box<IrNode> },

    EnvQuery(&'static str),

    /// Internal call by resolved function index.
    CallInternal { function: u32, args: Vec<IrNode> },
    /// External call through an interface method selector.
    CallExternal {
        kind: crate::ast::CallKind,
        target: Box<IrNode>,
        selector: [u8; 4],
        args: Vec<IrNode>,
    },

    Keccak256(Vec<IrNode>),

    Cast { from: TypeId, operand: Box<IrNode> },

    /// A struct field access, addressed by the field's position within
    /// `base`'s memory-frame layout rather than by name (the scheduler has
    /// no symbol table, only `TypeArena::layout_of`).
    FieldOffset { base: Box<IrNode>, field_index: u32 },
    /// An array/dynamic-array element access at a statically-unknown index,
    /// addressed relative to `base`'s element region.
    ElementOffset { base: Box<IrNode>, index: Box<IrNode> },
}

/// One statement-level IR node. Unlike `IrNode` (always exactly one value),
/// a statement may have no result, and loop/branch statements carry nested
/// blocks directly rather than lowering to a single tree, since the
/// scheduler needs explicit block boundaries to normalize stack shape at
/// join points (spec.md §4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum IrStmt {
    Eval(IrNode),
    Let { local: u32, value: IrNode },
    Assign { local: u32, value: IrNode },
    StorageAssign(IrNode),
    If { cond: IrNode, then_branch: Vec<IrStmt>, else_branch: Vec<IrStmt> },
    /// A `for` loop already desugared to a bounded counting loop with an
    /// explicit induction-variable local.
    Loop { induction: u32, start: IrNode, end: IrNode, body: Vec<IrStmt> },
    Break,
    Continue,
    Return(Option<IrNode>),
    Revert(Option<IrNode>),
    Assert(IrNode),
    Emit { event: u32, args: Vec<IrNode> },
}

/// One function's lowered body, plus the metadata the scheduler needs to
/// assign virtual registers and build the external dispatcher entry.
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    pub name: String,
    pub param_count: u32,
    pub body: Vec<IrStmt>,
    pub external: bool,
    /// 4-byte selector, present only for externally reachable functions.
    pub selector: Option<[u8; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrModule {
    pub functions: Vec<IrFunction>,
    pub constructor: Option<IrFunction>,
}
