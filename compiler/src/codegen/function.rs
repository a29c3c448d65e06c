//! Per-function code generation: walks one `ir::IrFunction`'s statements and
//! expressions, emitting opcodes through the shared module `Emitter` and
//! tracking virtual-register residency through `stack::LocalRegisters`.
//!
//! Calling convention (spec.md §4.6, generalized for this crate's opcode
//! vocabulary): a caller pushes arguments in left-to-right order; at entry
//! the callee's parameters are therefore already stack-resident at positions
//! `1..=param_count` (`ir_builder::lower_function` guarantees parameter
//! locals get ids `0..param_count` in that same order). `CallInternal`
//! leaves the callee's return value on top without disturbing the pushed
//! arguments beneath it — the call site is responsible for discarding them
//! (see `emit_call_cleanup`).
//!
//! Storage/transient-storage/memory writes follow one fixed operand order
//! throughout this module: push the address (slot or byte offset) first,
//! then evaluate the value, so the value ends up on top and the `*Store`
//! opcode's pop order is always (value, then address).

use num_bigint::BigInt;
use num_traits::Zero;

use crate::ast::{CallKind, EventDecl};
use crate::codegen::emit::{Emitter, LabelId};
use crate::codegen::stack::{LocalLocation, LocalRegisters};
use crate::config::CompilerConfig;
use crate::constfold::{bigint_to_const_int, const_int_to_bigint, to_word_bytes};
use crate::diagnostics::{Diagnostic, Span};
use crate::ir::{EffectKind, IrBinOp, IrFunction, IrKind, IrNode, IrStmt, IrUnOp, StorageRegion};
use crate::opcode::Opcode;
use crate::sourcemap::{JumpKind, SourceMap};
use crate::types::TypeArena;

/// Scratch memory region used to stage operands for `Keccak256` (mapping-key
/// derivation, event-data hashing). Placed well above where any single
/// function's spilled-local frame is expected to reach; functions do not
/// execute concurrently in this VM's model, so one fixed region is safe to
/// reuse across every call.
const HASH_SCRATCH_BASE: u32 = 0x0001_0000;

pub struct FunctionContext<'a> {
    pub arena: &'a TypeArena,
    pub config: &'a CompilerConfig,
    pub events: &'a [EventDecl],
    /// Maps an `IrKind::CallInternal`/`CallExternal`-style function index
    /// (the `decls.functions` hash-iteration order `ir_builder` numbers
    /// calls by) to that callee's emitted entry label.
    pub call_targets: &'a [LabelId],
}

struct FunctionCodegen<'a, 'ctx> {
    ctx: &'ctx FunctionContext<'ctx>,
    emitter: &'a mut Emitter,
    source_map: &'a mut SourceMap,
    locals: LocalRegisters,
    depth: u32,
    /// Deepest value `depth` has reached anywhere in the function body,
    /// checked against `CompilerConfig::max_stack_depth` once the body is
    /// fully emitted (see `emit_function`) — the real, for-cause enforcement
    /// of spec.md §9's stack-depth ceiling, as opposed to `resource_lint`'s
    /// advisory pre-scheduling projection from source shape alone.
    max_depth: u32,
    /// Nesting depth inside `if`/loop bodies, 0 at the function's top level.
    /// A local declared while this is nonzero is forced to memory residency
    /// (see `bind_local`) since its declaring statement may run more than
    /// once (a loop iterating) or not at all on the path actually taken (the
    /// other arm of an `if`), either of which would desynchronize a
    /// stack-resident slot's assumed position from its real one.
    block_depth: u32,
    loop_labels: Vec<(LabelId, LabelId)>,
}

/// Emit one function's body at the emitter's current position, after its
/// entry label has already been placed by the caller (the dispatcher/module
/// driver owns label placement so internal calls can forward-reference a
/// function emitted later in the stream).
pub fn emit_function(
    f: &IrFunction,
    ctx: &FunctionContext,
    emitter: &mut Emitter,
    source_map: &mut SourceMap,
) -> Result<(), Diagnostic> {
    let mut locals = LocalRegisters::new(ctx.config.virtual_register_budget);
    locals.seed_params(f.param_count);
    let mut gen = FunctionCodegen {
        ctx,
        emitter,
        source_map,
        locals,
        depth: f.param_count,
        max_depth: f.param_count,
        block_depth: 0,
        loop_labels: Vec::new(),
    };
    gen.emit_block(&f.body)?;
    // A function whose body falls through (no explicit `return` on every
    // path) still must leave the one result word every `CallInternal` call
    // site assumes; synthesize an unused zero rather than nothing.
    gen.push_const(&BigInt::zero());
    gen.raw(Opcode::Return, 0);
    if gen.max_depth > ctx.config.max_stack_depth {
        return Err(Diagnostic::ice(
            "ICE0605",
            Span::synthetic(),
            format!(
                "function `{}` requires operand stack depth {}, exceeding the configured \
                 ceiling of {} words",
                f.name, gen.max_depth, ctx.config.max_stack_depth
            ),
        ));
    }
    Ok(())
}

impl<'a, 'ctx> FunctionCodegen<'a, 'ctx> {
    fn raw(&mut self, op: Opcode, delta: i32) {
        self.depth = (self.depth as i32 + delta) as u32;
        self.max_depth = self.max_depth.max(self.depth);
        self.emitter.emit(op);
    }

    fn push_const(&mut self, value: &BigInt) {
        self.raw(Opcode::Push(to_word_bytes(value).to_vec()), 1);
    }

    fn push_u32(&mut self, value: u32) {
        self.push_const(&BigInt::from(value));
    }

    fn emit_block(&mut self, stmts: &[IrStmt]) -> Result<(), Diagnostic> {
        for s in stmts {
            self.emit_stmt(s)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &IrStmt) -> Result<(), Diagnostic> {
        match stmt {
            IrStmt::Eval(node) => {
                self.emit_expr(node)?;
                // An expression statement's value is always discarded;
                // pure subexpressions with no result worth keeping were
                // already dropped by the optimizer's DCE pass, so a
                // standalone `Eval` reaching codegen still has a value on
                // top (e.g. a call kept for its side effect) that must be
                // popped to keep the stack balanced between statements.
                self.raw(Opcode::Pop, -1);
            }
            IrStmt::Let { local, value } => {
                self.emit_expr(value)?;
                self.bind_local(*local);
            }
            IrStmt::Assign { local, value } => {
                self.emit_expr(value)?;
                self.store_local(*local);
            }
            IrStmt::StorageAssign(node) => {
                self.emit_expr(node)?;
            }
            IrStmt::If { cond, then_branch, else_branch } => {
                self.emit_expr(cond)?;
                let else_label = self.emitter.new_label();
                let end_label = self.emitter.new_label();
                self.raw_jump_if_zero(else_label);
                self.block_depth += 1;
                self.emit_block(then_branch)?;
                self.block_depth -= 1;
                self.jump(end_label);
                self.place_label(else_label);
                self.block_depth += 1;
                self.emit_block(else_branch)?;
                self.block_depth -= 1;
                self.place_label(end_label);
            }
            IrStmt::Loop { induction, start, end, body } => {
                self.emit_expr(start)?;
                self.bind_local(*induction);
                let cond_label = self.emitter.new_label();
                let continue_label = self.emitter.new_label();
                let break_label = self.emitter.new_label();
                self.place_label(cond_label);
                self.load_local(*induction);
                self.emit_expr(end)?;
                self.raw(Opcode::Lt, -1);
                self.raw_jump_if_zero(break_label);
                self.loop_labels.push((continue_label, break_label));
                self.block_depth += 1;
                self.emit_block(body)?;
                self.block_depth -= 1;
                self.loop_labels.pop();
                self.place_label(continue_label);
                self.load_local(*induction);
                self.push_const(&BigInt::from(1));
                self.raw(Opcode::AddChecked, -1);
                self.store_local(*induction);
                self.jump(cond_label);
                self.place_label(break_label);
            }
            IrStmt::Break => {
                let (_, break_label) = *self
                    .loop_labels
                    .last()
                    .ok_or_else(|| Diagnostic::ice("ICE0601", node_span(), "break outside loop at codegen"))?;
                self.jump(break_label);
            }
            IrStmt::Continue => {
                let (continue_label, _) = *self
                    .loop_labels
                    .last()
                    .ok_or_else(|| Diagnostic::ice("ICE0602", node_span(), "continue outside loop at codegen"))?;
                self.jump(continue_label);
            }
            IrStmt::Return(value) => {
                let span = value.as_ref().map(|v| v.span).unwrap_or_else(node_span);
                if let Some(v) = value {
                    self.emit_expr(v)?;
                }
                self.source_map.push(self.emitter.position(), span, JumpKind::OutOf);
                self.raw(Opcode::Return, 0);
            }
            IrStmt::Revert(value) => {
                let span = value.as_ref().map(|v| v.span).unwrap_or_else(node_span);
                if let Some(v) = value {
                    self.emit_expr(v)?;
                } else {
                    self.push_const(&BigInt::zero());
                }
                self.source_map.push(self.emitter.position(), span, JumpKind::OutOf);
                self.raw(Opcode::Revert, 0);
            }
            IrStmt::Assert(cond) => {
                self.emit_expr(cond)?;
                self.raw(Opcode::Assert, -1);
            }
            IrStmt::Emit { event, args } => {
                self.emit_event(*event, args)?;
            }
        }
        Ok(())
    }

    fn bind_local(&mut self, id: u32) {
        let location = if self.block_depth > 0 {
            self.locals.declare_forced_memory(id)
        } else {
            self.locals.declare(id)
        };
        match location {
            LocalLocation::Stack { .. } => {}
            LocalLocation::Memory { offset } => self.store_to_memory(offset),
        }
    }

    fn load_local(&mut self, id: u32) {
        match self.locals.location(id) {
            LocalLocation::Stack { position } => {
                let n = self.depth - position;
                self.raw(Opcode::Dup(n as u8), 1);
            }
            LocalLocation::Memory { offset } => {
                self.push_u32(offset);
                self.raw(Opcode::MLoad, 0);
            }
        }
    }

    fn store_local(&mut self, id: u32) {
        match self.locals.location(id) {
            LocalLocation::Stack { position } => {
                let n = self.depth - position;
                // Overwrite the stack-resident slot in place: swap the new
                // value down to the local's position, discarding the stale
                // value that surfaces on top.
                self.raw(Opcode::Swap(n as u8), 0);
                self.raw(Opcode::Pop, -1);
            }
            LocalLocation::Memory { offset } => self.store_to_memory(offset),
        }
    }

    /// Store the value currently on top of the stack to a memory offset,
    /// respecting the address-then-value `*Store` convention even though
    /// the value was computed (and is therefore on top) before the address.
    fn store_to_memory(&mut self, offset: u32) {
        self.push_u32(offset);
        self.raw(Opcode::Swap(1), 0);
        self.raw(Opcode::MStore, -2);
    }

    fn jump(&mut self, label: LabelId) {
        self.emitter.jump(label);
    }

    fn raw_jump_if_zero(&mut self, label: LabelId) {
        self.raw(Opcode::IsZero, 0);
        self.emitter.jump_if(label);
        self.depth -= 1;
    }

    fn place_label(&mut self, label: LabelId) {
        self.emitter.place_label(label);
    }

    fn emit_event(&mut self, event: u32, args: &[IrNode]) -> Result<(), Diagnostic> {
        let decl = self.ctx.events.get(event as usize).ok_or_else(|| {
            Diagnostic::ice("ICE0603", node_span(), "event index out of range at codegen")
        })?;
        let mut topic_count = 0u8;
        let mut data_args: Vec<&IrNode> = Vec::new();
        for (param, arg) in decl.params.iter().zip(args) {
            if param.indexed {
                self.emit_expr(arg)?;
                topic_count += 1;
            } else {
                data_args.push(arg);
            }
        }
        // Non-indexed fields are hashed together into the log's data word,
        // the same composition scheme this crate uses for nested mapping
        // keys: a single `Keccak256` over every data-field word in order.
        if data_args.is_empty() {
            self.push_const(&BigInt::zero());
        } else {
            let mut offset = HASH_SCRATCH_BASE;
            for a in &data_args {
                self.emit_expr(a)?;
                self.store_to_memory(offset);
                offset += 32;
            }
            self.push_u32(HASH_SCRATCH_BASE);
            self.push_u32((data_args.len() as u32) * 32);
            self.raw(Opcode::Keccak256, -1);
        }
        self.raw(Opcode::Log { topic_count }, -(topic_count as i32 + 1));
        Ok(())
    }

    fn emit_expr(&mut self, node: &IrNode) -> Result<(), Diagnostic> {
        match &node.kind {
            IrKind::ConstInt(bytes) => self.push_const(&const_int_to_bigint(bytes)),
            IrKind::ConstBool(b) => self.push_const(&BigInt::from(*b as u64)),
            IrKind::Local(id) => self.load_local(*id),
            IrKind::StorageRead { region, slot, bit_offset, bit_width } => {
                self.emit_storage_read(*region, *slot, *bit_offset, *bit_width)
            }
            IrKind::StorageWrite { region, slot, bit_offset, bit_width, value } => {
                self.emit_storage_write(*region, *slot, *bit_offset, *bit_width, value)?
            }
            IrKind::MappingRead { base_slot, key } => {
                self.emit_mapping_slot(*base_slot, key)?;
                self.raw(Opcode::SLoad, 0);
            }
            IrKind::MappingWrite { base_slot, key, value } => {
                self.emit_mapping_slot(*base_slot, key)?;
                self.emit_expr(value)?;
                self.raw(Opcode::SStore, -2);
            }
            IrKind::ImmutableRead { offset } => self.raw(Opcode::ImmutableLoad(*offset), 1),
            IrKind::Binary { op, checked, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                self.raw(binary_opcode(*op, *checked), -1);
            }
            IrKind::Unary { op, operand } => self.emit_unary(*op, operand)?,
            IrKind::ShortCircuit { is_and, lhs, rhs } => self.emit_short_circuit(*is_and, lhs, rhs)?,
            IrKind::EnvQuery(name) => self.raw(Opcode::Env(name), 1),
            IrKind::CallInternal { function, args } => {
                self.emit_call_internal(*function, args, node.span)?
            }
            IrKind::CallExternal { kind, target, selector, args } => {
                self.emit_call_external(*kind, target, *selector, args, node.span)?
            }
            IrKind::Keccak256(operands) => self.emit_hash(operands)?,
            IrKind::Cast { operand, .. } => self.emit_expr(operand)?,
            IrKind::FieldOffset { base, field_index } => self.emit_field_offset(base, *field_index, node)?,
            IrKind::ElementOffset { base, index } => self.emit_element_offset(base, index, node)?,
        }
        Ok(())
    }

    fn emit_storage_read(&mut self, region: StorageRegion, slot: u64, bit_offset: u16, bit_width: u16) {
        self.push_const(&BigInt::from(slot));
        self.raw(storage_load_opcode(region), 0);
        if bit_offset != 0 {
            self.push_const(&BigInt::from(bit_offset));
            self.raw(Opcode::Shr, -1);
        }
        if bit_width < 256 {
            let mask = (BigInt::from(1) << bit_width as u32) - 1;
            self.push_const(&mask);
            self.raw(Opcode::BitAnd, -1);
        }
    }

    /// Packed fields (`bit_width < 256`) need a read-modify-write: load the
    /// slot, clear the field's bits, OR in the shifted new value, store.
    /// Whole-word fields (`bit_offset == 0 && bit_width == 256`) skip the
    /// read entirely.
    fn emit_storage_write(
        &mut self,
        region: StorageRegion,
        slot: u64,
        bit_offset: u16,
        bit_width: u16,
        value: &IrNode,
    ) -> Result<(), Diagnostic> {
        self.push_const(&BigInt::from(slot));
        if bit_offset == 0 && bit_width == 256 {
            self.emit_expr(value)?;
            self.raw(Opcode::SStore, -2);
            return Ok(());
        }
        // Build the cleared-and-merged word, then push slot again for the
        // store (the first push above was consumed by the read).
        self.raw(Opcode::Dup(0), 1);
        self.raw(storage_load_opcode(region), 0);
        let field_mask = (BigInt::from(1) << bit_width as u32) - 1;
        let shifted_mask = &field_mask << bit_offset as u32;
        let cleared_mask = (!shifted_mask.clone()) & ((BigInt::from(1) << 256u32) - 1);
        self.push_const(&cleared_mask);
        self.raw(Opcode::BitAnd, -1);
        self.emit_expr(value)?;
        if bit_offset != 0 {
            self.push_const(&BigInt::from(bit_offset));
            self.raw(Opcode::Shl, -1);
        }
        self.raw(Opcode::BitOr, -1);
        self.raw(Opcode::Swap(1), 0);
        self.raw(Opcode::SStore, -2);
        Ok(())
    }

    /// Derive a mapping/dynamic-array element's storage slot by hashing the
    /// declared base slot together with the (possibly already-composite,
    /// for nested mappings) key: write both as adjacent 32-byte words into
    /// scratch memory and `Keccak256` the 64-byte region, mirroring
    /// `layout::derive_mapping_slot`'s `keccak256(base_slot || key)`
    /// convention at runtime rather than at layout-planning time.
    fn emit_mapping_slot(&mut self, base_slot: u64, key: &IrNode) -> Result<(), Diagnostic> {
        self.push_const(&BigInt::from(base_slot));
        self.store_to_memory(HASH_SCRATCH_BASE);
        self.emit_expr(key)?;
        self.store_to_memory(HASH_SCRATCH_BASE + 32);
        self.push_u32(HASH_SCRATCH_BASE);
        self.push_u32(64);
        self.raw(Opcode::Keccak256, -1);
        Ok(())
    }

    fn emit_hash(&mut self, operands: &[IrNode]) -> Result<(), Diagnostic> {
        let mut offset = HASH_SCRATCH_BASE;
        for o in operands {
            self.emit_expr(o)?;
            self.store_to_memory(offset);
            offset += 32;
        }
        self.push_u32(HASH_SCRATCH_BASE);
        self.push_u32((operands.len() as u32) * 32);
        self.raw(Opcode::Keccak256, -1);
        Ok(())
    }

    fn emit_unary(&mut self, op: IrUnOp, operand: &IrNode) -> Result<(), Diagnostic> {
        match op {
            IrUnOp::Neg => {
                self.push_const(&BigInt::zero());
                self.emit_expr(operand)?;
                self.raw(Opcode::SubChecked, -1);
            }
            IrUnOp::Not => {
                self.emit_expr(operand)?;
                self.raw(Opcode::IsZero, 0);
            }
            IrUnOp::BitNot => {
                self.emit_expr(operand)?;
                self.raw(Opcode::BitNot, 0);
            }
        }
        Ok(())
    }

    /// `&&`/`||` short-circuit: the right side is only evaluated when it can
    /// change the result, so it must be a branch rather than a plain
    /// bitwise op (spec.md §4.4: the right operand may have side effects).
    fn emit_short_circuit(&mut self, is_and: bool, lhs: &IrNode, rhs: &IrNode) -> Result<(), Diagnostic> {
        self.emit_expr(lhs)?;
        let short_circuit_label = self.emitter.new_label();
        let end_label = self.emitter.new_label();
        self.raw(Opcode::Dup(0), 1);
        if is_and {
            self.raw_jump_if_zero(short_circuit_label);
        } else {
            self.raw(Opcode::IsZero, 0);
            self.raw_jump_if_zero(short_circuit_label);
        }
        self.raw(Opcode::Pop, -1);
        self.emit_expr(rhs)?;
        self.jump(end_label);
        self.place_label(short_circuit_label);
        self.place_label(end_label);
        Ok(())
    }

    fn emit_call_internal(
        &mut self,
        function: u32,
        args: &[IrNode],
        span: crate::diagnostics::Span,
    ) -> Result<(), Diagnostic> {
        for a in args {
            self.emit_expr(a)?;
        }
        let label = *self.ctx.call_targets.get(function as usize).ok_or_else(|| {
            Diagnostic::ice("ICE0604", node_span(), "internal call target out of range at codegen")
        })?;
        self.source_map.push(self.emitter.position(), span, JumpKind::Into);
        self.emitter.call_internal(label);
        // Net effect once the callee returns: args stay conceptually
        // consumed, one result word appears. The cleanup below physically
        // removes them.
        self.depth += 1;
        for _ in args {
            self.raw(Opcode::Swap(1), 0);
            self.raw(Opcode::Pop, -1);
        }
        Ok(())
    }

    /// `CallExternal`/`CallDelegate`/`CallStatic` are declared as a fixed
    /// 4-operand, 1-result primitive (target, selector, ABI-encoded-args
    /// pointer, args byte length -> result), per `opcode.rs`'s `-3` net
    /// stack delta. Arguments are ABI-encoded into scratch memory first
    /// (one 32-byte word per argument — this crate has no dynamic-length
    /// ABI types reaching a call site yet) rather than spread across the
    /// stack, so the call site's arity is fixed regardless of callee arity.
    fn emit_call_external(
        &mut self,
        kind: CallKind,
        target: &IrNode,
        selector: [u8; 4],
        args: &[IrNode],
        span: crate::diagnostics::Span,
    ) -> Result<(), Diagnostic> {
        self.emit_expr(target)?;
        self.push_const(&BigInt::from_bytes_be(num_bigint::Sign::Plus, &selector));
        let mut offset = HASH_SCRATCH_BASE;
        for a in args {
            self.emit_expr(a)?;
            self.store_to_memory(offset);
            offset += 32;
        }
        self.push_u32(HASH_SCRATCH_BASE);
        self.push_u32((args.len() as u32) * 32);
        let op = match kind {
            CallKind::Plain => Opcode::CallExternal,
            CallKind::Delegate => Opcode::CallDelegate,
            CallKind::Static => Opcode::CallStatic,
        };
        self.source_map.push(self.emitter.position(), span, JumpKind::Into);
        self.raw(op, -3);
        Ok(())
    }

    fn emit_field_offset(&mut self, base: &IrNode, field_index: u32, node: &IrNode) -> Result<(), Diagnostic> {
        self.emit_expr(base)?;
        let offset = struct_field_byte_offset(self.ctx.arena, base.ty, field_index);
        if offset != 0 {
            self.push_u32(offset);
            self.raw(Opcode::AddWrap, -1);
        }
        if self.ctx.arena.layout_of(node.ty).by_value {
            self.raw(Opcode::MLoad, 0);
        }
        Ok(())
    }

    fn emit_element_offset(&mut self, base: &IrNode, index: &IrNode, node: &IrNode) -> Result<(), Diagnostic> {
        self.emit_expr(base)?;
        let elem_size = self.ctx.arena.layout_of(node.ty).mem_size;
        self.emit_expr(index)?;
        self.push_u32(elem_size);
        self.raw(Opcode::MulWrap, -1);
        self.raw(Opcode::AddWrap, -1);
        if self.ctx.arena.layout_of(node.ty).by_value {
            self.raw(Opcode::MLoad, 0);
        }
        Ok(())
    }
}

fn storage_load_opcode(region: StorageRegion) -> Opcode {
    match region {
        StorageRegion::Persistent => Opcode::SLoad,
        StorageRegion::Transient => Opcode::TLoad,
    }
}

fn binary_opcode(op: IrBinOp, checked: bool) -> Opcode {
    use IrBinOp::*;
    match (op, checked) {
        (Add, true) => Opcode::AddChecked,
        (Add, false) => Opcode::AddWrap,
        (Sub, true) => Opcode::SubChecked,
        (Sub, false) => Opcode::SubWrap,
        (Mul, true) => Opcode::MulChecked,
        (Mul, false) => Opcode::MulWrap,
        (Div, true) => Opcode::DivChecked,
        (Div, false) => Opcode::DivWrap,
        (Mod, true) => Opcode::ModChecked,
        (Mod, false) => Opcode::ModWrap,
        (BitAnd, _) => Opcode::BitAnd,
        (BitOr, _) => Opcode::BitOr,
        (BitXor, _) => Opcode::BitXor,
        (Shl, _) => Opcode::Shl,
        (Shr, _) => Opcode::Shr,
        (Eq, _) => Opcode::Eq,
        (Lt, _) => Opcode::Lt,
        (Gt, _) => Opcode::Gt,
    }
}

/// Byte offset of `field_index` within a struct's memory-frame layout, the
/// sum of every preceding field's `mem_size` (no padding beyond each field's
/// own natural size — this crate never packs struct fields in memory, only
/// in storage).
fn struct_field_byte_offset(arena: &TypeArena, struct_ty: crate::types::TypeId, field_index: u32) -> u32 {
    let crate::types::TypeData::Struct(sid) = arena.get(struct_ty) else {
        return 0;
    };
    let def = arena.struct_def(*sid);
    def.fields[..field_index as usize].iter().map(|f| arena.layout_of(f.ty).mem_size).sum()
}

fn node_span() -> crate::diagnostics::Span {
    crate::diagnostics::Span::synthetic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::emit::Emitter;
    use crate::ir::{IrFunction, IrStmt};
    use crate::types::TypeArena;

    fn identity_function() -> IrFunction {
        IrFunction {
            name: "id".into(),
            param_count: 1,
            body: vec![IrStmt::Return(Some(IrNode {
                kind: IrKind::Local(0),
                ty: crate::types::TypeId(0),
                effect: EffectKind::Pure,
                span: node_span(),
            }))],
            external: true,
            selector: Some([0x8e, 0x8d, 0xbf, 0x82]),
        }
    }

    #[test]
    fn identity_function_emits_a_dup_and_return() {
        let arena = TypeArena::new();
        let config = CompilerConfig::default();
        let events: Vec<EventDecl> = Vec::new();
        let call_targets: Vec<LabelId> = Vec::new();
        let ctx = FunctionContext { arena: &arena, config: &config, events: &events, call_targets: &call_targets };
        let mut emitter = Emitter::new();
        let mut source_map = SourceMap::default();
        let f = identity_function();
        emit_function(&f, &ctx, &mut emitter, &mut source_map).unwrap();
        let opcodes = emitter.finish();
        assert!(matches!(opcodes[0], Opcode::Dup(0)));
        assert!(matches!(opcodes.last(), Some(Opcode::Return)));
    }

    #[test]
    fn a_function_whose_depth_exceeds_the_configured_ceiling_is_an_internal_compiler_error() {
        let arena = TypeArena::new();
        let mut config = CompilerConfig::default();
        config.max_stack_depth = 0;
        let events: Vec<EventDecl> = Vec::new();
        let call_targets: Vec<LabelId> = Vec::new();
        let ctx = FunctionContext { arena: &arena, config: &config, events: &events, call_targets: &call_targets };
        let mut emitter = Emitter::new();
        let mut source_map = SourceMap::default();
        let f = identity_function();
        let err = emit_function(&f, &ctx, &mut emitter, &mut source_map)
            .expect_err("a single resident parameter already exceeds a zero-depth ceiling");
        assert_eq!(err.code, "ICE0605");
        assert!(err.is_ice);
    }
}
