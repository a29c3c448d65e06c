//! Compiler core: translates a module's AST into deployable bytecode for a
//! stack-based, gas-metered contract VM.
//!
//! [`compile_module`] is the single entry point, implementing spec.md §7's
//! seven-stage pipeline and its error-propagation policy: phases (i)+(ii)
//! (declaration collection, structural interface checking, type checking,
//! and recursion rejection) accumulate diagnostics across every function in
//! the module before deciding whether to continue; if any of them produced
//! an `Error`-severity diagnostic, phases (iii) onward (layout planning, IR
//! lowering, optimization, codegen, finalization) never run, and the partial
//! diagnostic list is returned instead of a half-built artifact set.
//!
//! Per spec.md §1, lexing/parsing (producing the `ast::Module` this crate
//! consumes) and encoding the output artifacts to an external wire format
//! (JSON, a file on disk) are both external collaborators' jobs; this crate
//! only owns the analysis and code generation in between.

pub mod abi;
pub mod ast;
pub mod builtins;
pub mod call_graph;
pub mod codegen;
pub mod config;
pub mod constfold;
pub mod diagnostics;
pub mod ir;
pub mod ir_builder;
pub mod layout;
pub mod lint;
pub mod opcode;
pub mod optimizer;
pub mod resolver;
pub mod resource_lint;
pub mod sourcemap;
pub mod symbol;
pub mod typechecker;
pub mod types;

use std::sync::Arc;

use tracing::debug;

pub use codegen::finalizer::FinalizedOutput;
pub use config::{CompilerConfig, OptimizationLevel};
pub use diagnostics::{Diagnostic, DiagnosticSink, Severity};
pub use resolver::ImportedSignatures;

/// Everything a successful compilation produces: the four artifacts spec.md
/// §6 names (deploy bytecode, runtime bytecode plus source map, ABI
/// descriptor, storage layout descriptor), plus any non-fatal lint/resource
/// diagnostics collected along the way. Encoding these to JSON or writing
/// them to disk is the caller's job.
pub struct CompileArtifacts {
    pub deploy_bytecode: Vec<u8>,
    pub runtime_bytecode: Vec<u8>,
    pub source_map: sourcemap::SourceMap,
    pub abi: abi::AbiDescriptor,
    pub storage_layout: Vec<layout::StorageEntry>,
    /// Advisory diagnostics (`lint`'s style checks, `resource_lint`'s stack
    /// depth projection). Never contains an `Error`-severity entry: if the
    /// module had one, compilation stopped before this struct was built.
    pub warnings: Vec<Diagnostic>,
}

/// Compile one module end to end.
///
/// `imported` is the read-only cache of already-compiled modules' exported
/// interface/struct signatures (spec.md §5); a module with no cross-module
/// references can pass `&ImportedSignatures::default()`.
pub fn compile_module(
    module: &ast::Module,
    imported: &Arc<ImportedSignatures>,
    config: &CompilerConfig,
) -> Result<CompileArtifacts, Vec<Diagnostic>> {
    let mut arena = types::TypeArena::new();
    let mut sink = DiagnosticSink::new();

    debug!(module = %module.name, "phase (i): collecting declarations");
    let (decls, decl_diagnostics) = resolver::collect_declarations(module, &mut arena, imported);
    sink.extend(decl_diagnostics.into_vec());

    debug!(module = %module.name, "phase (ii): type checking");
    typechecker::check_module(module, &mut arena, &decls, imported, &mut sink);
    call_graph::check_no_recursion(module, &mut sink);

    if sink.has_errors() {
        return Err(sink.into_vec());
    }

    debug!(module = %module.name, "phase (iii): planning storage layout");
    let layout = layout::plan_layout(&module.state_vars, &decls, &arena, &mut sink);
    if sink.has_errors() {
        return Err(sink.into_vec());
    }

    debug!(module = %module.name, "phase (iv): lowering to IR");
    let mut ir_module = ir_builder::build_module(module, &mut arena, &decls, imported, &layout)
        .map_err(|d| vec![d])?;
    recompute_selectors(&mut ir_module, &decls, &arena);

    debug!(module = %module.name, optimization_level = ?config.optimization_level, "phase (v): optimizing IR");
    optimizer::optimize_module(&mut ir_module, &arena, config);

    debug!(module = %module.name, "phase (vi): scheduling registers and assembling opcodes");
    let codegen_output =
        codegen::generate(&ir_module, &decls, &module.events, &arena, config).map_err(|d| vec![d])?;

    debug!(module = %module.name, "phase (vii): finalizing bytecode");
    let FinalizedOutput { deploy_bytecode, runtime_bytecode, source_map } =
        codegen::finalizer::finalize(codegen_output).map_err(|d| vec![d])?;

    let abi = abi::build(module, &decls, &arena, imported);
    let storage_layout = layout::describe(&decls.state_vars, &layout, &arena);

    let mut warnings = lint::lint_module(module, &lint::LintConfig::default());
    warnings.extend(resource_lint::project_stack_depth(module, config));

    Ok(CompileArtifacts { deploy_bytecode, runtime_bytecode, source_map, abi, storage_layout, warnings })
}

/// `ir_builder::lower_function` derives a placeholder selector from the
/// function's name alone, before its parameter types are fully resolved in
/// `DeclTable`; recompute the real one here from the resolved signature so
/// the IR's selector matches `abi::build`'s (spec.md §4.6/§8 scenario 5).
fn recompute_selectors(ir_module: &mut ir::IrModule, decls: &resolver::DeclTable, arena: &types::TypeArena) {
    let mut all: Vec<&mut ir::IrFunction> = ir_module.functions.iter_mut().collect();
    if let Some(ctor) = ir_module.constructor.as_mut() {
        all.push(ctor);
    }
    for f in all {
        if f.selector.is_some()
            && let Some(sig) = decls.functions.get(&f.name)
        {
            f.selector = Some(ir_builder::selector_from_sig(&sig.name, &sig.params, arena));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::types::{Mutability, Visibility};

    fn s() -> Span {
        Span::new(0, 0, 1)
    }

    #[test]
    fn empty_module_compiles_to_empty_dispatcher() {
        let module = ast::Module::new("empty");
        let imported = Arc::new(ImportedSignatures::default());
        let config = CompilerConfig::default();
        let artifacts = compile_module(&module, &imported, &config).expect("empty module compiles");
        assert!(artifacts.abi.entries.is_empty());
        assert!(artifacts.storage_layout.is_empty());
        assert!(!artifacts.runtime_bytecode.is_empty());
    }

    #[test]
    fn duplicate_struct_definitions_stop_before_codegen() {
        let mut module = ast::Module::new("dup");
        let field = vec![("x".to_string(), ast::TypeAnn::Bool)];
        module.structs.push(ast::StructDecl { name: "Pair".into(), fields: field.clone(), span: s() });
        module.structs.push(ast::StructDecl { name: "Pair".into(), fields: field, span: s() });
        let imported = Arc::new(ImportedSignatures::default());
        let config = CompilerConfig::default();
        let err = compile_module(&module, &imported, &config).expect_err("duplicate struct is an error");
        assert!(err.iter().any(|d| d.code == "E0120"));
    }

    #[test]
    fn recursive_function_is_rejected_before_layout() {
        let mut module = ast::Module::new("rec");
        module.functions.push(ast::FunctionDecl {
            name: "loop_forever".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![ast::Stmt::Expr {
                expr: ast::Expr::Call { callee: "loop_forever".into(), args: vec![], span: s() },
                span: s(),
            }],
            span: s(),
        });
        let imported = Arc::new(ImportedSignatures::default());
        let config = CompilerConfig::default();
        let err = compile_module(&module, &imported, &config).expect_err("self-recursion is rejected");
        assert!(err.iter().any(|d| d.code == "E0720"));
    }
}
