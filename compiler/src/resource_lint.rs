//! Stack depth projection.
//!
//! Grounded on the teacher's `resource_lint.rs` — an abstract stack
//! simulation that walked a word's body tracking resource handles to flag
//! leaks. This target has no resource handles to leak (no channels, no weave
//! strands): what it has instead is a single operand stack shared by every
//! call frame and a hard ceiling on it (`CompilerConfig::max_stack_depth`,
//! spec.md §4.6/§9 "stack too deep" resource error, enforced for real at
//! `codegen`/`finalizer` time by the spill-until-ceiling policy). Repointed
//! here: the same shape of analysis — walk each function's body, track a
//! worst-case depth instead of a resource tag — now projects whether a
//! function is *likely* to exceed that ceiling before the scheduler runs it,
//! so the author gets a diagnostic pointing at the function instead of a
//! runtime trap.
//!
//! The projection is conservative, not exact: it doesn't know `ir_builder`'s
//! actual register allocation, only the shape of the source expression tree.
//! It is a warning, never an error — an expensive but compiling function is
//! still correct.

use std::collections::HashMap;

use crate::ast::{Expr, FunctionDecl, Module, Stmt};
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostic;

/// Project each function's worst-case operand stack depth and warn about any
/// whose projection exceeds `config.max_stack_depth`.
///
/// Functions are visited in call-graph order (callees before callers) so a
/// caller's projection already accounts for the deepest callee it reaches;
/// a function that recurses (directly or mutually) is skipped here since
/// `call_graph::check_no_recursion` already rejects it as a hard error
/// elsewhere in the pipeline, and this analyzer is conservative rather than
/// get stuck walking a cycle when run standalone (e.g. from a lint-only CLI
/// invocation that never calls `check_no_recursion`).
pub fn project_stack_depth(module: &Module, config: &CompilerConfig) -> Vec<Diagnostic> {
    let mut analyzer = StackDepthAnalyzer::new(module);
    let mut out = Vec::new();
    let mut all: Vec<&FunctionDecl> = module.functions.iter().collect();
    if let Some(ctor) = &module.constructor {
        all.push(ctor);
    }
    for f in all {
        let depth = analyzer.projected_depth(&f.name);
        if depth > config.max_stack_depth {
            out.push(Diagnostic::warning(
                "R0001",
                f.span,
                format!(
                    "function `{}` is projected to reach an operand stack depth of {depth}, \
                     above the configured ceiling of {}; this may trap with a stack-too-deep \
                     error at runtime",
                    f.name, config.max_stack_depth
                ),
            ));
        }
    }
    out
}

struct StackDepthAnalyzer<'m> {
    module: &'m Module,
    by_name: HashMap<&'m str, &'m FunctionDecl>,
    memo: HashMap<String, u32>,
    in_progress: Vec<String>,
}

/// Fixed cost charged for a call to a function whose body we can't inspect
/// (an external/builtin call), standing in for the callee's own frame.
const OPAQUE_CALL_COST: u32 = 4;

impl<'m> StackDepthAnalyzer<'m> {
    fn new(module: &'m Module) -> Self {
        let mut by_name = HashMap::new();
        for f in &module.functions {
            by_name.insert(f.name.as_str(), f);
        }
        if let Some(ctor) = &module.constructor {
            by_name.insert(ctor.name.as_str(), ctor);
        }
        StackDepthAnalyzer { module, by_name, memo: HashMap::new(), in_progress: Vec::new() }
    }

    fn projected_depth(&mut self, name: &str) -> u32 {
        if let Some(d) = self.memo.get(name) {
            return *d;
        }
        if self.in_progress.iter().any(|n| n == name) {
            // A recursive cycle slipped past `check_no_recursion`: treat it
            // as already at the ceiling rather than loop forever.
            return u32::MAX;
        }
        let Some(&f) = self.by_name.get(name) else {
            return OPAQUE_CALL_COST;
        };
        self.in_progress.push(name.to_string());
        let depth = self.block_depth(&f.body);
        self.in_progress.pop();
        self.memo.insert(name.to_string(), depth);
        depth
    }

    fn block_depth(&mut self, body: &[Stmt]) -> u32 {
        body.iter().map(|s| self.stmt_depth(s)).max().unwrap_or(0)
    }

    fn stmt_depth(&mut self, stmt: &Stmt) -> u32 {
        match stmt {
            Stmt::Let { value, .. } | Stmt::Expr { expr: value, .. } => self.expr_depth(value),
            Stmt::Assign { target, value, .. } => self.expr_depth(target).max(self.expr_depth(value)),
            Stmt::If { cond, then_branch, else_branch, .. } => {
                let cond_depth = self.expr_depth(cond);
                let then_depth = self.block_depth(then_branch);
                let else_depth = else_branch.as_ref().map(|b| self.block_depth(b)).unwrap_or(0);
                cond_depth.max(then_depth).max(else_depth)
            }
            Stmt::ForRange { start, end, body, .. } => {
                self.expr_depth(start).max(self.expr_depth(end)).max(self.block_depth(body))
            }
            Stmt::Return { value: Some(v), .. } | Stmt::Revert { message: Some(v), .. } => self.expr_depth(v),
            Stmt::Assert { cond, .. } => self.expr_depth(cond),
            Stmt::Emit { args, .. } => args.iter().map(|a| self.expr_depth(a)).max().unwrap_or(0),
            Stmt::Unchecked { body, .. } => self.block_depth(body),
            Stmt::Return { value: None, .. } | Stmt::Revert { message: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } => 0,
        }
    }

    fn expr_depth(&mut self, expr: &Expr) -> u32 {
        match expr {
            Expr::IntLiteral { .. }
            | Expr::DecimalLiteral { .. }
            | Expr::BoolLiteral { .. }
            | Expr::BytesLiteral { .. }
            | Expr::StringLiteral { .. }
            | Expr::Ident { .. }
            | Expr::EnvQuery { .. } => 1,
            Expr::FieldAccess { base, .. } => 1 + self.expr_depth(base),
            Expr::Index { base, index, .. } => 1 + self.expr_depth(base).max(self.expr_depth(index)),
            Expr::Binary { lhs, rhs, .. } => 1 + self.expr_depth(lhs).max(self.expr_depth(rhs)),
            Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => 1 + self.expr_depth(operand),
            Expr::Call { callee, args, .. } => {
                let args_depth = args.iter().map(|a| self.expr_depth(a)).max().unwrap_or(0);
                let callee_depth = if self.module.functions.iter().any(|f| &f.name == callee) {
                    self.projected_depth(callee)
                } else {
                    OPAQUE_CALL_COST
                };
                args_depth.max(1 + callee_depth)
            }
            Expr::ExternalCall { target, args, .. } => {
                let target_depth = self.expr_depth(target);
                let args_depth = args.iter().map(|a| self.expr_depth(a)).max().unwrap_or(0);
                // A cross-module call runs on the callee's own frame; it
                // costs this function nothing beyond evaluating the target
                // and arguments.
                target_depth.max(args_depth)
            }
            Expr::StructLiteral { fields, .. } => {
                1 + fields.iter().map(|(_, v)| self.expr_depth(v)).max().unwrap_or(0)
            }
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

    fn int(n: &str) -> Expr {
        Expr::IntLiteral { digits: n.to_string(), span: s() }
    }

    fn func(name: &str, body: Vec<Stmt>) -> FunctionDecl {
        FunctionDecl {
            name: name.to_string(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body,
            span: s(),
        }
    }

    #[test]
    fn shallow_function_is_silent() {
        let mut module = Module::new("m");
        module.functions.push(func("f", vec![Stmt::Expr { expr: int("1"), span: s() }]));
        let config = CompilerConfig::default();
        assert!(project_stack_depth(&module, &config).is_empty());
    }

    #[test]
    fn deeply_nested_binary_expression_is_flagged() {
        let mut expr = int("1");
        for _ in 0..2000 {
            expr = Expr::Binary { op: crate::ast::BinOp::Add, lhs: Box::new(expr), rhs: Box::new(int("1")), span: s() };
        }
        let mut module = Module::new("m");
        module.functions.push(func("f", vec![Stmt::Expr { expr, span: s() }]));
        let config = CompilerConfig::default();
        let diagnostics = project_stack_depth(&module, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "R0001");
    }

    #[test]
    fn call_chain_depth_accumulates_through_callees() {
        let mut deep_expr = int("1");
        for _ in 0..1200 {
            deep_expr = Expr::Binary { op: crate::ast::BinOp::Add, lhs: Box::new(deep_expr), rhs: Box::new(int("1")), span: s() };
        }
        let mut module = Module::new("m");
        module.functions.push(func("leaf", vec![Stmt::Expr { expr: deep_expr, span: s() }]));
        module.functions.push(func(
            "caller",
            vec![Stmt::Expr { expr: Expr::Call { callee: "leaf".into(), args: vec![], span: s() }, span: s() }],
        ));
        let config = CompilerConfig::default();
        let diagnostics = project_stack_depth(&module, &config);
        assert!(diagnostics.iter().any(|d| d.message.contains("caller")));
    }

    #[test]
    fn external_call_does_not_add_to_caller_depth() {
        let mut module = Module::new("m");
        let target = Expr::Ident { name: "peer".into(), span: s() };
        module.functions.push(func(
            "caller",
            vec![Stmt::Expr {
                expr: Expr::ExternalCall {
                    target: Box::new(target),
                    interface: "Peer".into(),
                    method: "poke".into(),
                    args: vec![],
                    kind: crate::ast::CallKind::Plain,
                    span: s(),
                },
                span: s(),
            }],
        ));
        let config = CompilerConfig::default();
        assert!(project_stack_depth(&module, &config).is_empty());
    }
}
