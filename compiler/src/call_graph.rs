//! Internal call graph analysis: detects recursive cycles among a module's
//! functions via Tarjan's strongly-connected-components algorithm.
//!
//! Grounded on the teacher's `call_graph.rs` (mutual-recursion detection for
//! musttail eligibility); repointed here to a harder question, since this
//! target has no tail-call optimization and a fixed maximum operand-stack
//! depth (spec.md §4.6, §9 "stack too deep" resource error): any recursive
//! cycle, direct or mutual, can in principle recurse past that ceiling, so
//! `resolver`/`typechecker` treat one as a compile error rather than an
//! optimization opportunity.

use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, Module, Stmt};
use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Reject every recursive cycle in `module` as a compile error, pointing at
/// the first function in source order that participates in each cycle.
pub fn check_no_recursion(module: &Module, sink: &mut DiagnosticSink) {
    let graph = CallGraph::build(module);
    let mut reported: HashSet<String> = HashSet::new();
    for cycle in graph.recursive_cycles() {
        if cycle.iter().any(|name| reported.contains(name)) {
            continue;
        }
        reported.extend(cycle.iter().cloned());
        let Some(f) = module.functions.iter().find(|f| cycle.contains(&f.name)) else { continue };
        let mut members: Vec<&String> = cycle.iter().collect();
        members.sort();
        let cycle_desc = members.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> ");
        sink.push(Diagnostic::error(
            "E0720",
            f.span,
            format!(
                "function `{}` participates in a recursive call cycle ({cycle_desc}); \
                 this target has no tail-call optimization and a fixed maximum operand \
                 stack depth, so unbounded recursion cannot compile",
                f.name
            ),
        ));
    }
}

/// A call graph over one module's functions (internal calls only; an
/// `ExternalCall` never recurses back into this module's own stack frame).
#[derive(Debug, Clone)]
pub struct CallGraph {
    edges: HashMap<String, HashSet<String>>,
    functions: HashSet<String>,
    recursive_sccs: Vec<HashSet<String>>,
}

impl CallGraph {
    /// Build a call graph from every function and the constructor in
    /// `module`. Calls to names outside `module.functions` (builtins,
    /// environment queries) are not edges in this graph.
    pub fn build(module: &Module) -> Self {
        let functions: HashSet<String> = module.functions.iter().map(|f| f.name.clone()).collect();
        let mut edges: HashMap<String, HashSet<String>> = HashMap::new();

        for f in &module.functions {
            edges.insert(f.name.clone(), extract_calls(&f.body, &functions));
        }

        let mut graph = CallGraph { edges, functions, recursive_sccs: Vec::new() };
        graph.recursive_sccs = graph.find_sccs();
        graph
    }

    pub fn is_recursive(&self, name: &str) -> bool {
        self.recursive_sccs.iter().any(|scc| scc.contains(name))
    }

    pub fn are_mutually_recursive(&self, a: &str, b: &str) -> bool {
        self.recursive_sccs.iter().any(|scc| scc.contains(a) && scc.contains(b))
    }

    pub fn get_cycle(&self, name: &str) -> Option<&HashSet<String>> {
        self.recursive_sccs.iter().find(|scc| scc.contains(name))
    }

    pub fn recursive_cycles(&self) -> &[HashSet<String>] {
        &self.recursive_sccs
    }

    pub fn callees(&self, name: &str) -> Option<&HashSet<String>> {
        self.edges.get(name)
    }

    /// Find strongly connected components via Tarjan's algorithm, keeping
    /// only those that represent recursion: multi-function SCCs (mutual
    /// recursion) and single-function SCCs where the function calls itself
    /// (direct recursion).
    fn find_sccs(&self) -> Vec<HashSet<String>> {
        let mut index_counter = 0;
        let mut stack: Vec<String> = Vec::new();
        let mut on_stack: HashSet<String> = HashSet::new();
        let mut indices: HashMap<String, usize> = HashMap::new();
        let mut lowlinks: HashMap<String, usize> = HashMap::new();
        let mut sccs: Vec<HashSet<String>> = Vec::new();

        for name in &self.functions {
            if !indices.contains_key(name) {
                self.tarjan_visit(name, &mut index_counter, &mut stack, &mut on_stack, &mut indices, &mut lowlinks, &mut sccs);
            }
        }

        sccs.into_iter()
            .filter(|scc| {
                if scc.len() > 1 {
                    true
                } else {
                    let name = scc.iter().next().unwrap();
                    self.edges.get(name).map(|callees| callees.contains(name)).unwrap_or(false)
                }
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn tarjan_visit(
        &self,
        name: &str,
        index_counter: &mut usize,
        stack: &mut Vec<String>,
        on_stack: &mut HashSet<String>,
        indices: &mut HashMap<String, usize>,
        lowlinks: &mut HashMap<String, usize>,
        sccs: &mut Vec<HashSet<String>>,
    ) {
        let index = *index_counter;
        *index_counter += 1;
        indices.insert(name.to_string(), index);
        lowlinks.insert(name.to_string(), index);
        stack.push(name.to_string());
        on_stack.insert(name.to_string());

        if let Some(callees) = self.edges.get(name) {
            for callee in callees {
                if !self.functions.contains(callee) {
                    continue;
                }
                if !indices.contains_key(callee) {
                    self.tarjan_visit(callee, index_counter, stack, on_stack, indices, lowlinks, sccs);
                    let callee_lowlink = *lowlinks.get(callee).unwrap();
                    let lowlink = lowlinks.get_mut(name).unwrap();
                    *lowlink = (*lowlink).min(callee_lowlink);
                } else if on_stack.contains(callee) {
                    let callee_index = *indices.get(callee).unwrap();
                    let lowlink = lowlinks.get_mut(name).unwrap();
                    *lowlink = (*lowlink).min(callee_index);
                }
            }
        }

        if lowlinks.get(name) == indices.get(name) {
            let mut scc = HashSet::new();
            loop {
                let w = stack.pop().unwrap();
                on_stack.remove(&w);
                scc.insert(w.clone());
                if w == name {
                    break;
                }
            }
            sccs.push(scc);
        }
    }
}

fn extract_calls(body: &[Stmt], known: &HashSet<String>) -> HashSet<String> {
    let mut calls = HashSet::new();
    for stmt in body {
        extract_calls_stmt(stmt, known, &mut calls);
    }
    calls
}

fn extract_calls_stmt(stmt: &Stmt, known: &HashSet<String>, calls: &mut HashSet<String>) {
    match stmt {
        Stmt::Let { value, .. } | Stmt::Expr { expr: value, .. } => extract_calls_expr(value, known, calls),
        Stmt::Assign { target, value, .. } => {
            extract_calls_expr(target, known, calls);
            extract_calls_expr(value, known, calls);
        }
        Stmt::If { cond, then_branch, else_branch, .. } => {
            extract_calls_expr(cond, known, calls);
            for s in then_branch {
                extract_calls_stmt(s, known, calls);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    extract_calls_stmt(s, known, calls);
                }
            }
        }
        Stmt::ForRange { start, end, body, .. } => {
            extract_calls_expr(start, known, calls);
            extract_calls_expr(end, known, calls);
            for s in body {
                extract_calls_stmt(s, known, calls);
            }
        }
        Stmt::Return { value: Some(value), .. } => extract_calls_expr(value, known, calls),
        Stmt::Revert { message: Some(message), .. } => extract_calls_expr(message, known, calls),
        Stmt::Assert { cond, .. } => extract_calls_expr(cond, known, calls),
        Stmt::Emit { args, .. } => {
            for a in args {
                extract_calls_expr(a, known, calls);
            }
        }
        Stmt::Unchecked { body, .. } => {
            for s in body {
                extract_calls_stmt(s, known, calls);
            }
        }
        Stmt::Return { value: None, .. } | Stmt::Revert { message: None, .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

fn extract_calls_expr(expr: &Expr, known: &HashSet<String>, calls: &mut HashSet<String>) {
    match expr {
        Expr::Call { callee, args, .. } => {
            if known.contains(callee) {
                calls.insert(callee.clone());
            }
            for a in args {
                extract_calls_expr(a, known, calls);
            }
        }
        Expr::FieldAccess { base, .. } => extract_calls_expr(base, known, calls),
        Expr::Index { base, index, .. } => {
            extract_calls_expr(base, known, calls);
            extract_calls_expr(index, known, calls);
        }
        Expr::Binary { lhs, rhs, .. } => {
            extract_calls_expr(lhs, known, calls);
            extract_calls_expr(rhs, known, calls);
        }
        Expr::Unary { operand, .. } | Expr::Cast { operand, .. } => extract_calls_expr(operand, known, calls),
        Expr::ExternalCall { target, args, .. } => {
            // Never an edge: runs in a different call frame (spec.md §4.4), but
            // its argument expressions can still contain internal calls.
            extract_calls_expr(target, known, calls);
            for a in args {
                extract_calls_expr(a, known, calls);
            }
        }
        Expr::StructLiteral { fields, .. } => {
            for (_, value) in fields {
                extract_calls_expr(value, known, calls);
            }
        }
        Expr::IntLiteral { .. }
        | Expr::DecimalLiteral { .. }
        | Expr::BoolLiteral { .. }
        | Expr::BytesLiteral { .. }
        | Expr::StringLiteral { .. }
        | Expr::Ident { .. }
        | Expr::EnvQuery { .. } => {}
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

    fn func(name: &str, calls: &[&str]) -> crate::ast::FunctionDecl {
        let body = calls
            .iter()
            .map(|callee| Stmt::Expr {
                expr: Expr::Call { callee: callee.to_string(), args: vec![], span: s() },
                span: s(),
            })
            .collect();
        crate::ast::FunctionDecl {
            name: name.to_string(),
            params: vec![],
            ret: None,
            mutability: Mutability::Nonpayable,
            visibility: Visibility::Internal,
            body,
            span: s(),
        }
    }

    fn module_of(functions: Vec<crate::ast::FunctionDecl>) -> Module {
        let mut module = Module::new("m");
        module.functions = functions;
        module
    }

    #[test]
    fn acyclic_calls_are_not_recursive() {
        let module = module_of(vec![func("foo", &["bar"]), func("bar", &[]), func("baz", &["foo"])]);
        let graph = CallGraph::build(&module);
        assert!(!graph.is_recursive("foo"));
        assert!(!graph.is_recursive("bar"));
        assert!(!graph.is_recursive("baz"));
        assert!(graph.recursive_cycles().is_empty());
    }

    #[test]
    fn direct_self_call_is_recursive() {
        let module = module_of(vec![func("countdown", &["countdown"]), func("helper", &[])]);
        let graph = CallGraph::build(&module);
        assert!(graph.is_recursive("countdown"));
        assert!(!graph.is_recursive("helper"));
        assert_eq!(graph.recursive_cycles().len(), 1);
    }

    #[test]
    fn mutual_recursion_pair_is_detected() {
        let module = module_of(vec![func("ping", &["pong"]), func("pong", &["ping"])]);
        let graph = CallGraph::build(&module);
        assert!(graph.are_mutually_recursive("ping", "pong"));
        assert_eq!(graph.recursive_cycles().len(), 1);
        assert_eq!(graph.recursive_cycles()[0].len(), 2);
    }

    #[test]
    fn calls_to_unknown_names_are_not_edges() {
        let module = module_of(vec![func("foo", &["msg.sender", "unknown_builtin"])]);
        let graph = CallGraph::build(&module);
        assert!(!graph.is_recursive("foo"));
        assert!(graph.callees("foo").unwrap().is_empty());
    }

    #[test]
    fn independent_cycles_are_reported_separately() {
        let module = module_of(vec![
            func("ping", &["pong"]),
            func("pong", &["ping"]),
            func("even", &["odd"]),
            func("odd", &["even"]),
            func("main", &["ping", "even"]),
        ]);
        let graph = CallGraph::build(&module);
        assert!(!graph.is_recursive("main"));
        assert_eq!(graph.recursive_cycles().len(), 2);
    }
}
