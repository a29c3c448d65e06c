//! Register scheduler and assembler (spec.md §4.6): turns optimized IR into
//! a flat `Vec<Opcode>` plus a source map, deciding virtual-register
//! residency (`stack`), resolving jump/call targets (`emit`), walking each
//! function's statements and expressions (`function`), and building the
//! external selector dispatcher (`dispatcher`).
//!
//! `generate` is the module-level entry point: it reserves one label per
//! declared function up front (so an internal call can forward-reference a
//! body emitted later in the stream), bridges `IrKind::CallInternal`'s
//! `decls.functions` hash-iteration-order numbering to those labels, then
//! emits, in order: the constructor (if any), the dispatcher, and every
//! function body. Its output still addresses jumps and calls by
//! opcode-vector index; `finalizer` performs the byte-level fix-up, peephole
//! pass, and deploy/runtime bytecode split.

pub mod dispatcher;
pub mod emit;
pub mod finalizer;
pub mod function;
pub mod stack;

use crate::ast::EventDecl;
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, Span};
use crate::ir::IrModule;
use crate::opcode::Opcode;
use crate::resolver::DeclTable;
use crate::sourcemap::SourceMap;
use crate::types::TypeArena;

use emit::{Emitter, LabelId};
use function::FunctionContext;

/// One module's assembled, label-resolved instruction stream, ready for
/// `finalizer`'s byte-level fixup and deploy/runtime bytecode split.
pub struct CodegenOutput {
    pub opcodes: Vec<Opcode>,
    pub source_map: SourceMap,
    /// Opcode-vector index the constructor body starts at, if the module
    /// declares one.
    pub constructor_start: Option<u32>,
    /// Opcode-vector index the dispatcher — and so the runtime bytecode —
    /// starts at.
    pub runtime_start: u32,
}

pub fn generate(
    module: &IrModule,
    decls: &DeclTable,
    events: &[EventDecl],
    arena: &TypeArena,
    config: &CompilerConfig,
) -> Result<CodegenOutput, Diagnostic> {
    let mut emitter = Emitter::new();
    let mut source_map = SourceMap::default();

    let function_labels: Vec<LabelId> = module.functions.iter().map(|_| emitter.new_label()).collect();
    let call_targets = bridge_call_targets(module, decls, &function_labels)?;
    let ctx = FunctionContext { arena, config, events, call_targets: &call_targets };

    let constructor_start = match &module.constructor {
        Some(ctor) => {
            let start = emitter.position();
            function::emit_function(ctor, &ctx, &mut emitter, &mut source_map)?;
            Some(start)
        }
        None => None,
    };

    let runtime_start = emitter.position();
    dispatcher::emit_dispatcher(&module.functions, &function_labels, &mut emitter);

    for (f, label) in module.functions.iter().zip(&function_labels) {
        emitter.place_label(*label);
        function::emit_function(f, &ctx, &mut emitter, &mut source_map)?;
    }

    let opcodes = emitter.finish();
    Ok(CodegenOutput { opcodes, source_map, constructor_start, runtime_start })
}

/// `ir_builder::lower_expr` numbers an `IrKind::CallInternal`'s callee by its
/// position in `decls.functions`'s hash-iteration order, which generally
/// differs from `module.functions`'s declaration-order `Vec` (`HashMap`
/// iteration order is not insertion order). Build the lookup once rather
/// than re-deriving it at every call site during codegen.
fn bridge_call_targets(
    module: &IrModule,
    decls: &DeclTable,
    function_labels: &[LabelId],
) -> Result<Vec<LabelId>, Diagnostic> {
    let decl_order: Vec<String> = decls.functions.keys().cloned().collect();
    let mut call_targets = Vec::with_capacity(decl_order.len());
    for name in &decl_order {
        let ir_index = module.functions.iter().position(|f| &f.name == name).ok_or_else(|| {
            Diagnostic::ice(
                "ICE0700",
                Span::synthetic(),
                format!("declared function '{name}' missing from lowered module"),
            )
        })?;
        call_targets.push(function_labels[ir_index]);
    }
    Ok(call_targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrFunction, IrStmt};

    fn decls_with(names: &[&str]) -> DeclTable {
        let mut decls = DeclTable::default();
        for name in names {
            decls.functions.insert(
                name.to_string(),
                crate::types::FunctionSig {
                    name: name.to_string(),
                    params: Vec::new(),
                    ret: None,
                    mutability: crate::types::Mutability::Nonpayable,
                    visibility: crate::types::Visibility::Internal,
                },
            );
        }
        decls
    }

    #[test]
    fn call_targets_follow_decl_table_order_not_module_order() {
        // `module.functions` is declared b-then-a, but `decls.functions`
        // (a `HashMap`) may enumerate them in either order; the bridge must
        // map each decl-order slot to the matching label regardless.
        let module = IrModule {
            functions: vec![
                IrFunction { name: "b".into(), param_count: 0, body: vec![IrStmt::Return(None)], external: false, selector: None },
                IrFunction { name: "a".into(), param_count: 0, body: vec![IrStmt::Return(None)], external: false, selector: None },
            ],
            constructor: None,
        };
        let decls = decls_with(&["a", "b"]);
        let mut emitter = Emitter::new();
        let labels: Vec<LabelId> = module.functions.iter().map(|_| emitter.new_label()).collect();
        let call_targets = bridge_call_targets(&module, &decls, &labels).unwrap();
        let decl_order: Vec<String> = decls.functions.keys().cloned().collect();
        for (slot, name) in decl_order.iter().enumerate() {
            let expected_ir_index = module.functions.iter().position(|f| &f.name == name).unwrap();
            assert_eq!(call_targets[slot], labels[expected_ir_index]);
        }
    }
}
