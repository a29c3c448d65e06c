//! Semantic analyzer, phase (ii): bidirectional type inference, mutability
//! lattice enforcement, and visibility enforcement over one function body at
//! a time.
//!
//! Grounded on the teacher's `TypeChecker` shape (a struct holding an
//! environment and a current-function marker, walking one function/word body
//! at a time, collecting line-prefixed error strings) generalized from stack
//! effects to expression types, and from a single fail-fast `Result` per word
//! to fail-fast *within* a function body but an append-only `DiagnosticSink`
//! *across* functions, per spec.md §7's cross-function error collection
//! policy.

use std::collections::HashMap;

use num_bigint::BigInt;

use crate::ast::{self, BinOp, Expr, Stmt, TypeAnn, UnOp};
use crate::constfold;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Span};
use crate::resolver::{self, DeclTable, ImportedSignatures};
use crate::symbol::{LocationKind, Scope};
use crate::types::{Mutability, TypeArena, TypeData, TypeId, Visibility};

/// A local binding inside a function body: name, type, and whether `let mut`
/// was used.
#[derive(Debug, Clone)]
struct Local {
    ty: TypeId,
    mutable: bool,
}

/// Per-function checking context. One `FunctionChecker` is built per
/// function and discarded after; nothing here survives across functions,
/// matching spec.md §7's "errors in one function do not prevent analysis of
/// the next."
struct FunctionChecker<'a> {
    arena: &'a mut TypeArena,
    decls: &'a DeclTable,
    imported: &'a ImportedSignatures,
    locals: Vec<HashMap<String, Local>>,
    mutability: Mutability,
    ret: Option<TypeId>,
    /// Loop nesting depth, for `break`/`continue` validity (spec.md §4.4
    /// "a loop-context stack").
    loop_depth: u32,
    /// `true` while inside an `unchecked { ... }` region.
    unchecked: bool,
}

impl<'a> FunctionChecker<'a> {
    fn new(
        arena: &'a mut TypeArena,
        decls: &'a DeclTable,
        imported: &'a ImportedSignatures,
        mutability: Mutability,
        ret: Option<TypeId>,
    ) -> Self {
        FunctionChecker {
            arena,
            decls,
            imported,
            locals: vec![HashMap::new()],
            mutability,
            ret,
            loop_depth: 0,
            unchecked: false,
        }
    }

    fn push_scope(&mut self) {
        self.locals.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare_local(&mut self, name: &str, ty: TypeId, mutable: bool) {
        self.locals.last_mut().unwrap().insert(name.to_string(), Local { ty, mutable });
    }

    fn lookup_local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find_map(|scope| scope.get(name))
    }

    fn resolve_ann(&mut self, ann: &TypeAnn, span: Span) -> Result<TypeId, Diagnostic> {
        resolver::resolve_type_ann(ann, self.arena, self.decls, self.imported, span)
    }

    /// Type-check one function body. Returns the first error, since within a
    /// function we fail fast (matching the teacher's idiom).
    fn check_params_and_body(
        &mut self,
        params: &[(String, TypeAnn)],
        body: &[Stmt],
    ) -> Result<(), Diagnostic> {
        for (name, ann) in params {
            let ty = self.resolve_ann(ann, Span::synthetic())?;
            self.declare_local(name, ty, false);
        }
        for stmt in body {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_block(&mut self, body: &[Stmt]) -> Result<(), Diagnostic> {
        self.push_scope();
        let result = (|| {
            for stmt in body {
                self.check_stmt(stmt)?;
            }
            Ok(())
        })();
        self.pop_scope();
        result
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Let { name, ty, value, span } => {
                let declared = match ty {
                    Some(ann) => {
                        let t = self.resolve_ann(ann, *span)?;
                        let value_ty = self.infer_expr_with(value, Some(t))?;
                        self.expect_assignable(t, value_ty, *span)?;
                        t
                    }
                    None => self.infer_expr(value)?,
                };
                self.declare_local(name, declared, true);
                Ok(())
            }
            Stmt::Assign { target, value, span } => {
                let target_ty = self.infer_expr(target)?;
                self.check_assignable_target(target, *span)?;
                let value_ty = self.infer_expr_with(value, Some(target_ty))?;
                self.expect_assignable(target_ty, value_ty, *span)
            }
            Stmt::Expr { expr, .. } => {
                self.infer_expr(expr)?;
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch, span } => {
                let cond_ty = self.infer_expr(cond)?;
                self.expect_bool(cond_ty, *span)?;
                self.check_block(then_branch)?;
                if let Some(else_b) = else_branch {
                    self.check_block(else_b)?;
                }
                Ok(())
            }
            Stmt::ForRange { var, start, end, body, span } => {
                let start_ty = self.infer_expr(start)?;
                let end_ty = self.infer_expr(end)?;
                self.expect_same(start_ty, end_ty, *span)?;
                self.push_scope();
                self.declare_local(var, start_ty, false);
                self.loop_depth += 1;
                let result = (|| {
                    for s in body {
                        self.check_stmt(s)?;
                    }
                    Ok(())
                })();
                self.loop_depth -= 1;
                self.pop_scope();
                result
            }
            Stmt::Break { span } => {
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error("E0210", *span, "`break` outside of a loop"));
                }
                Ok(())
            }
            Stmt::Continue { span } => {
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error("E0211", *span, "`continue` outside of a loop"));
                }
                Ok(())
            }
            Stmt::Return { value, span } => {
                match (value, self.ret) {
                    (Some(e), Some(ret_ty)) => {
                        let t = self.infer_expr_with(e, Some(ret_ty))?;
                        self.expect_assignable(ret_ty, t, *span)?;
                    }
                    (None, None) => {}
                    (Some(_), None) => {
                        return Err(Diagnostic::error(
                            "E0212",
                            *span,
                            "returning a value from a function with no return type",
                        ));
                    }
                    (None, Some(_)) => {
                        return Err(Diagnostic::error("E0213", *span, "missing return value"));
                    }
                }
                Ok(())
            }
            Stmt::Revert { message, span } => {
                if let Some(e) = message {
                    self.infer_expr(e)?;
                }
                let _ = span;
                Ok(())
            }
            Stmt::Assert { cond, .. } => {
                let t = self.infer_expr(cond)?;
                self.expect_bool(t, cond.span())
            }
            Stmt::Emit { event, args, span } => {
                let Some(decl) = self.decls.events.get(event).cloned() else {
                    return Err(Diagnostic::error(
                        "E0214",
                        *span,
                        format!("undefined event `{}`", event),
                    ));
                };
                if decl.params.len() != args.len() {
                    return Err(Diagnostic::error(
                        "E0215",
                        *span,
                        format!(
                            "event `{}` expects {} arguments, got {}",
                            event,
                            decl.params.len(),
                            args.len()
                        ),
                    ));
                }
                for (param, arg) in decl.params.iter().zip(args) {
                    let want = self.resolve_ann(&param.ty, *span)?;
                    let got = self.infer_expr_with(arg, Some(want))?;
                    self.expect_assignable(want, got, *span)?;
                }
                Ok(())
            }
            Stmt::Unchecked { body, .. } => {
                let prior = self.unchecked;
                self.unchecked = true;
                let result = self.check_block(body);
                self.unchecked = prior;
                result
            }
        }
    }

    fn check_assignable_target(&mut self, target: &Expr, span: Span) -> Result<(), Diagnostic> {
        match target {
            Expr::Ident { name, .. } => {
                if let Some(local) = self.lookup_local(name) {
                    if !local.mutable {
                        return Err(Diagnostic::error(
                            "E0220",
                            span,
                            format!("cannot assign to immutable binding `{}`", name),
                        ));
                    }
                    return Ok(());
                }
                if self.mutability < Mutability::Nonpayable {
                    return Err(Diagnostic::error(
                        "E0221",
                        span,
                        "state cannot be mutated from a `pure` or `view` function",
                    ));
                }
                Ok(())
            }
            Expr::FieldAccess { base, .. } | Expr::Index { base, .. } => {
                self.check_assignable_target(base, span)
            }
            _ => Err(Diagnostic::error("E0222", span, "expression is not assignable")),
        }
    }

    fn expect_bool(&self, ty: TypeId, span: Span) -> Result<(), Diagnostic> {
        if !matches!(self.arena.get(ty), TypeData::Bool) {
            return Err(Diagnostic::error("E0230", span, "expected a `bool` expression"));
        }
        Ok(())
    }

    fn expect_same(&self, a: TypeId, b: TypeId, span: Span) -> Result<(), Diagnostic> {
        if a != b {
            return Err(Diagnostic::error(
                "E0231",
                span,
                format!(
                    "type mismatch: `{}` vs `{}`",
                    self.arena.abi_type_tag(a),
                    self.arena.abi_type_tag(b)
                ),
            ));
        }
        Ok(())
    }

    /// A value of type `from` may be used where `to` is expected. Types must
    /// match exactly; unsuffixed integer literals are steered to `to` by the
    /// caller (via `infer_expr_with(_, Some(to))`) before this check runs,
    /// so this only ever rejects a genuine mismatch between two concrete
    /// types.
    fn expect_assignable(&self, to: TypeId, from: TypeId, span: Span) -> Result<(), Diagnostic> {
        self.expect_same(to, from, span)
    }

    /// Infer `expr`'s type with no expected-type context flowing down from
    /// the caller. Equivalent to `infer_expr_with(expr, None)`; used
    /// wherever the surrounding context doesn't already know the type it
    /// wants (a bare expression statement, the scrutinee of an `if`, …).
    fn infer_expr(&mut self, expr: &Expr) -> Result<TypeId, Diagnostic> {
        self.infer_expr_with(expr, None)
    }

    /// Type an unsuffixed integer literal (spec.md §4.1). When `expected` is
    /// an integer type, the literal is checked against *that* type's range
    /// rather than defaulted — this is what lets `let x: uint128 = 1;` and
    /// `x = x + 1` with `x: uint8` through, and is also where spec.md §7/§8's
    /// "integer literal out of range" diagnostic is raised (reusing
    /// `constfold`'s range check, the same one the constant folder runs
    /// later, so the two can never disagree). With no usable context, the
    /// literal defaults per spec.md §4.1: the smallest unsigned type it
    /// fits, or `uint256` once its value reaches 2^128.
    fn infer_int_literal(
        &mut self,
        digits: &str,
        span: Span,
        expected: Option<TypeId>,
    ) -> Result<TypeId, Diagnostic> {
        let target = match expected.filter(|&ty| matches!(self.arena.get(ty), TypeData::Int { .. }))
        {
            Some(ty) => ty,
            None => {
                let value: BigInt = digits.parse().map_err(|_| {
                    Diagnostic::error("E0300", span, format!("malformed integer literal `{digits}`"))
                })?;
                self.arena.uint(constfold::default_unsigned_width(&value))
            }
        };
        constfold::try_fold(
            &Expr::IntLiteral { digits: digits.to_string(), span },
            self.arena,
            target,
            false,
        )?;
        Ok(target)
    }

    /// Bidirectional type inference (spec.md §4.1): `expected` is the type
    /// flowing down from context (an assignment's left-hand side, a
    /// parameter slot, a return slot, a struct field). An unsuffixed integer
    /// literal adopts `expected` when it is an integer type — range-checking
    /// against `expected` still runs, so a literal that overflows its
    /// contextual type is still rejected, not silently widened. Every other
    /// expression kind infers its type bottom-up exactly as before and
    /// ignores `expected`.
    fn infer_expr_with(&mut self, expr: &Expr, expected: Option<TypeId>) -> Result<TypeId, Diagnostic> {
        match expr {
            Expr::IntLiteral { digits, span } => self.infer_int_literal(digits, *span, expected),
            Expr::DecimalLiteral { .. } => Ok(self.arena.intern(TypeData::Decimal { scale: 18 })),
            Expr::BoolLiteral { .. } => Ok(self.arena.bool_ty()),
            Expr::BytesLiteral { bytes, .. } => {
                if !bytes.is_empty() && bytes.len() <= 32 {
                    Ok(self.arena.intern(TypeData::FixedBytes(bytes.len() as u8)))
                } else {
                    Ok(self.arena.intern(TypeData::Bytes { max_cap: bytes.len() as u32 }))
                }
            }
            Expr::StringLiteral { value, .. } => {
                Ok(self.arena.intern(TypeData::StringTy { max_cap: value.len() as u32 }))
            }
            Expr::Ident { name, span } => {
                if let Some(local) = self.lookup_local(name) {
                    return Ok(local.ty);
                }
                if let Some(sym) = self.decls.state_vars.lookup(name) {
                    if sym.location.is_storage() && self.mutability == Mutability::Pure {
                        return Err(Diagnostic::error(
                            "E0240",
                            *span,
                            format!("`pure` function cannot read state variable `{}`", name),
                        ));
                    }
                    return Ok(sym.ty);
                }
                Err(Diagnostic::error("E0241", *span, format!("undefined name `{}`", name)))
            }
            Expr::EnvQuery { query, span } => {
                crate::builtins::env_query_type(&query.name, self.arena).ok_or_else(|| {
                    Diagnostic::error(
                        "E0242",
                        *span,
                        format!("unknown environment query `{}`", query.name),
                    )
                })
            }
            Expr::FieldAccess { base, field, span } => {
                let base_ty = self.infer_expr(base)?;
                match self.arena.get(base_ty) {
                    TypeData::Struct(sid) => {
                        let def = self.arena.struct_def(*sid);
                        def.fields.iter().find(|f| &f.name == field).map(|f| f.ty).ok_or_else(
                            || {
                                Diagnostic::error(
                                    "E0243",
                                    *span,
                                    format!("struct has no field `{}`", field),
                                )
                            },
                        )
                    }
                    _ => Err(Diagnostic::error(
                        "E0244",
                        *span,
                        "field access on a non-struct type",
                    )),
                }
            }
            Expr::Index { base, index, span } => {
                let base_ty = self.infer_expr(base)?;
                match self.arena.get(base_ty).clone() {
                    TypeData::Mapping { key, value } => {
                        let index_ty = self.infer_expr_with(index, Some(key))?;
                        self.expect_same(key, index_ty, *span)?;
                        Ok(value)
                    }
                    TypeData::Array { elem, .. } | TypeData::DynArray { elem, .. } => {
                        let index_ty = self.infer_expr(index)?;
                        if !matches!(self.arena.get(index_ty), TypeData::Int { signed: false, .. })
                        {
                            return Err(Diagnostic::error(
                                "E0245",
                                *span,
                                "array index must be an unsigned integer",
                            ));
                        }
                        Ok(elem)
                    }
                    _ => {
                        self.infer_expr(index)?;
                        Err(Diagnostic::error("E0246", *span, "type is not indexable"))
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, span } => self.infer_binary(*op, lhs, rhs, *span, expected),
            Expr::Unary { op, operand, span } => self.infer_unary(*op, operand, *span, expected),
            Expr::Call { callee, args, span } => self.infer_call(callee, args, *span),
            Expr::ExternalCall { target, interface, method, args, kind, span } => {
                self.infer_external_call(target, interface, method, args, *kind, *span)
            }
            Expr::StructLiteral { name, fields, span } => {
                let Some(&sid) =
                    self.decls.structs.get(name).or_else(|| self.imported.structs.get(name))
                else {
                    return Err(Diagnostic::error(
                        "E0247",
                        *span,
                        format!("undefined struct `{}`", name),
                    ));
                };
                let def = self.arena.struct_def(sid).clone();
                if def.fields.len() != fields.len() {
                    return Err(Diagnostic::error(
                        "E0248",
                        *span,
                        format!("struct `{}` literal is missing fields", name),
                    ));
                }
                for (def_field, (given_name, given_expr)) in def.fields.iter().zip(fields) {
                    if &def_field.name != given_name {
                        return Err(Diagnostic::error(
                            "E0249",
                            *span,
                            format!(
                                "struct `{}` field order mismatch: expected `{}`",
                                name, def_field.name
                            ),
                        ));
                    }
                    let given_ty = self.infer_expr_with(given_expr, Some(def_field.ty))?;
                    self.expect_assignable(def_field.ty, given_ty, *span)?;
                }
                Ok(self.arena.intern(TypeData::Struct(sid)))
            }
            Expr::Cast { operand, ty, span } => {
                let from = self.infer_expr(operand)?;
                let to = self.resolve_ann(ty, *span)?;
                if !is_castable(self.arena, from, to) {
                    return Err(Diagnostic::error(
                        "E0250",
                        *span,
                        format!(
                            "cannot cast `{}` to `{}`",
                            self.arena.abi_type_tag(from),
                            self.arena.abi_type_tag(to)
                        ),
                    ));
                }
                Ok(to)
            }
        }
    }

    fn infer_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
        expected: Option<TypeId>,
    ) -> Result<TypeId, Diagnostic> {
        match op {
            BinOp::And | BinOp::Or => {
                let lhs_ty = self.infer_expr(lhs)?;
                let rhs_ty = self.infer_expr(rhs)?;
                self.expect_bool(lhs_ty, span)?;
                self.expect_bool(rhs_ty, span)?;
                Ok(self.arena.bool_ty())
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let (lhs_ty, rhs_ty) = self.infer_operand_pair(lhs, rhs, None)?;
                self.expect_same(lhs_ty, rhs_ty, span)?;
                Ok(self.arena.bool_ty())
            }
            BinOp::Add
            | BinOp::Sub
            | BinOp::Mul
            | BinOp::Div
            | BinOp::Mod
            | BinOp::BitAnd
            | BinOp::BitOr
            | BinOp::BitXor
            | BinOp::Shl
            | BinOp::Shr => {
                let (lhs_ty, rhs_ty) = self.infer_operand_pair(lhs, rhs, expected)?;
                self.expect_same(lhs_ty, rhs_ty, span)?;
                if !matches!(
                    self.arena.get(lhs_ty),
                    TypeData::Int { .. } | TypeData::Decimal { .. }
                ) {
                    return Err(Diagnostic::error(
                        "E0251",
                        span,
                        "arithmetic operator requires an integer or decimal operand",
                    ));
                }
                Ok(lhs_ty)
            }
        }
    }

    /// Infer a binary operator's two operand types with the literal-adopts-
    /// the-other-side rule spec.md §4.1 calls for: if exactly one side is a
    /// bare `Expr::IntLiteral`, infer the other side first and use its type
    /// as the literal's expected type, so `x + 1` with `x: uint8` types the
    /// literal `1` as `uint8` instead of forcing `x` to widen. If both sides
    /// are literals (or neither is), `expected` — the type already flowing
    /// down from the enclosing context, if any — is offered to both.
    fn infer_operand_pair(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<TypeId>,
    ) -> Result<(TypeId, TypeId), Diagnostic> {
        let lhs_is_lit = matches!(lhs, Expr::IntLiteral { .. });
        let rhs_is_lit = matches!(rhs, Expr::IntLiteral { .. });
        if lhs_is_lit && !rhs_is_lit {
            let rhs_ty = self.infer_expr(rhs)?;
            let lhs_ty = self.infer_expr_with(lhs, Some(rhs_ty))?;
            Ok((lhs_ty, rhs_ty))
        } else if rhs_is_lit && !lhs_is_lit {
            let lhs_ty = self.infer_expr(lhs)?;
            let rhs_ty = self.infer_expr_with(rhs, Some(lhs_ty))?;
            Ok((lhs_ty, rhs_ty))
        } else {
            let lhs_ty = self.infer_expr_with(lhs, expected)?;
            let rhs_ty = self.infer_expr_with(rhs, expected)?;
            Ok((lhs_ty, rhs_ty))
        }
    }

    fn infer_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        span: Span,
        expected: Option<TypeId>,
    ) -> Result<TypeId, Diagnostic> {
        match op {
            UnOp::Not => {
                let ty = self.infer_expr(operand)?;
                self.expect_bool(ty, span)?;
                Ok(ty)
            }
            UnOp::Neg => {
                let ty = self.infer_expr_with(operand, expected)?;
                if !matches!(
                    self.arena.get(ty),
                    TypeData::Int { signed: true, .. } | TypeData::Decimal { .. }
                ) {
                    return Err(Diagnostic::error(
                        "E0252",
                        span,
                        "unary `-` requires a signed integer or decimal",
                    ));
                }
                Ok(ty)
            }
            UnOp::BitNot => {
                let ty = self.infer_expr_with(operand, expected)?;
                if !matches!(self.arena.get(ty), TypeData::Int { .. }) {
                    return Err(Diagnostic::error("E0253", span, "unary `~` requires an integer"));
                }
                Ok(ty)
            }
        }
    }

    fn infer_call(
        &mut self,
        callee: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<TypeId, Diagnostic> {
        let sig = self.decls.functions.get(callee).cloned().ok_or_else(|| {
            Diagnostic::error("E0260", span, format!("undefined function `{}`", callee))
        })?;
        if !matches!(sig.visibility, Visibility::Internal | Visibility::Both) {
            return Err(Diagnostic::error(
                "E0261",
                span,
                format!("`{}` is not callable internally", callee),
            ));
        }
        if !self.mutability.may_call(sig.mutability) {
            return Err(Diagnostic::error(
                "E0262",
                span,
                format!(
                    "a `{:?}` function cannot call the more-mutating `{}`",
                    self.mutability, callee
                ),
            ));
        }
        if sig.params.len() != args.len() {
            return Err(Diagnostic::error(
                "E0263",
                span,
                format!("`{}` expects {} arguments, got {}", callee, sig.params.len(), args.len()),
            ));
        }
        for (want, arg) in sig.params.iter().zip(args) {
            let got = self.infer_expr_with(arg, Some(*want))?;
            self.expect_assignable(*want, got, span)?;
        }
        sig.ret.ok_or_else(|| {
            Diagnostic::error("E0264", span, format!("`{}` does not return a value", callee))
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn infer_external_call(
        &mut self,
        target: &Expr,
        interface: &str,
        method: &str,
        args: &[Expr],
        kind: ast::CallKind,
        span: Span,
    ) -> Result<TypeId, Diagnostic> {
        if self.mutability == Mutability::Pure {
            return Err(Diagnostic::error(
                "E0270",
                span,
                "a `pure` function cannot make an external call",
            ));
        }
        let target_ty = self.infer_expr(target)?;
        let Some(&iid) =
            self.decls.interfaces.get(interface).or_else(|| self.imported.interfaces.get(interface))
        else {
            return Err(Diagnostic::error(
                "E0271",
                span,
                format!("undefined interface `{}`", interface),
            ));
        };
        if !matches!(self.arena.get(target_ty), TypeData::Interface(_) | TypeData::Account) {
            return Err(Diagnostic::error(
                "E0272",
                span,
                "external call target must be an account or interface-typed value",
            ));
        }
        let def = self.arena.interface_def(iid).clone();
        let sig = def.functions.iter().find(|f| f.name == method).cloned().ok_or_else(|| {
            Diagnostic::error(
                "E0273",
                span,
                format!("interface `{}` has no function `{}`", interface, method),
            )
        })?;
        if kind == ast::CallKind::Static && sig.mutability >= Mutability::Nonpayable {
            return Err(Diagnostic::error(
                "E0274",
                span,
                "static call target must be `pure` or `view`",
            ));
        }
        if sig.params.len() != args.len() {
            return Err(Diagnostic::error(
                "E0275",
                span,
                format!("`{}.{}` expects {} arguments", interface, method, sig.params.len()),
            ));
        }
        for (want, arg) in sig.params.iter().zip(args) {
            let got = self.infer_expr_with(arg, Some(*want))?;
            self.expect_assignable(*want, got, span)?;
        }
        sig.ret.ok_or_else(|| {
            Diagnostic::error(
                "E0276",
                span,
                format!("`{}.{}` does not return a value", interface, method),
            )
        })
    }
}

fn is_castable(arena: &TypeArena, from: TypeId, to: TypeId) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (arena.get(from), arena.get(to)),
        (TypeData::Int { .. }, TypeData::Int { .. })
            | (TypeData::Int { .. }, TypeData::FixedBytes(_))
            | (TypeData::FixedBytes(_), TypeData::Int { .. })
            | (TypeData::Account, TypeData::FixedBytes(20))
            | (TypeData::FixedBytes(20), TypeData::Account)
    )
}

/// Type-check every function and the constructor in `module`, accumulating
/// diagnostics across all of them (spec.md §7).
pub fn check_module(
    module: &ast::Module,
    arena: &mut TypeArena,
    decls: &DeclTable,
    imported: &ImportedSignatures,
    sink: &mut DiagnosticSink,
) {
    resolver::check_interface_impl(module, arena, decls, imported, sink);

    let mut all: Vec<&ast::FunctionDecl> = module.functions.iter().collect();
    if let Some(ctor) = &module.constructor {
        all.push(ctor);
    }
    for f in all {
        let ret = match &f.ret {
            Some(ann) => match resolver::resolve_type_ann(ann, arena, decls, imported, f.span) {
                Ok(t) => Some(t),
                Err(d) => {
                    sink.push(d);
                    continue;
                }
            },
            None => None,
        };
        let mut checker = FunctionChecker::new(arena, decls, imported, f.mutability, ret);
        if let Err(d) = checker.check_params_and_body(&f.params, &f.body) {
            sink.push(d);
        }
    }
    let _ = Scope::Module;
    let _ = LocationKind::Stack;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDecl, Module};
    use crate::resolver::collect_declarations;
    use crate::types::Visibility;

    fn s() -> Span {
        Span::new(0, 0, 1)
    }

    #[test]
    fn pure_function_cannot_assign_state() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.state_vars.push(ast::StateVarDecl {
            name: "total".into(),
            ty: TypeAnn::UInt(256),
            class: ast::StorageClass::Persistent,
            explicit_slot: None,
            packed: false,
            span: s(),
        });
        module.functions.push(FunctionDecl {
            name: "bad".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::External,
            body: vec![Stmt::Assign {
                target: Expr::Ident { name: "total".into(), span: s() },
                value: Expr::IntLiteral { digits: "1".into(), span: s() },
                span: s(),
            }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.has_errors());
    }

    #[test]
    fn identity_function_type_checks() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "id".into(),
            params: vec![("x".into(), TypeAnn::UInt(256))],
            ret: Some(TypeAnn::UInt(256)),
            mutability: Mutability::Pure,
            visibility: Visibility::External,
            body: vec![Stmt::Return {
                value: Some(Expr::Ident { name: "x".into(), span: s() }),
                span: s(),
            }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.is_empty(), "{:?}", sink.as_slice());
    }

    #[test]
    fn narrow_typed_let_accepts_a_fitting_literal() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "f".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![Stmt::Let {
                name: "x".into(),
                ty: Some(TypeAnn::UInt(128)),
                value: Expr::IntLiteral { digits: "1".into(), span: s() },
                span: s(),
            }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.is_empty(), "{:?}", sink.as_slice());
    }

    #[test]
    fn narrow_typed_local_can_be_reassigned_with_a_literal_addition() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "f".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![
                Stmt::Let {
                    name: "x".into(),
                    ty: Some(TypeAnn::UInt(8)),
                    value: Expr::IntLiteral { digits: "1".into(), span: s() },
                    span: s(),
                },
                Stmt::Assign {
                    target: Expr::Ident { name: "x".into(), span: s() },
                    value: Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(Expr::Ident { name: "x".into(), span: s() }),
                        rhs: Box::new(Expr::IntLiteral { digits: "1".into(), span: s() }),
                        span: s(),
                    },
                    span: s(),
                },
            ],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.is_empty(), "{:?}", sink.as_slice());
    }

    #[test]
    fn literal_exceeding_its_constrained_type_is_rejected() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "f".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![Stmt::Let {
                name: "x".into(),
                ty: Some(TypeAnn::UInt(8)),
                value: Expr::IntLiteral { digits: "256".into(), span: s() },
                span: s(),
            }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.has_errors());
        assert!(sink.as_slice().iter().any(|d| d.code == "E0304"));
    }

    #[test]
    fn literal_exactly_at_its_type_max_is_accepted() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "f".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![Stmt::Let {
                name: "x".into(),
                ty: Some(TypeAnn::UInt(8)),
                value: Expr::IntLiteral { digits: "255".into(), span: s() },
                span: s(),
            }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.is_empty(), "{:?}", sink.as_slice());
    }

    #[test]
    fn unconstrained_literal_defaults_to_smallest_fitting_width() {
        let mut arena = TypeArena::new();
        let module = Module::new("m");
        let imported = ImportedSignatures::default();
        let (decls, sink) = collect_declarations(&module, &mut arena, &imported);
        assert!(sink.is_empty());
        let mut checker = FunctionChecker::new(&mut arena, &decls, &imported, Mutability::Pure, None);
        let ty = checker.infer_expr(&Expr::IntLiteral { digits: "1".into(), span: s() }).unwrap();
        assert_eq!(checker.arena.get(ty), &TypeData::Int { signed: false, width: 8 });

        let wide_ty =
            checker.infer_expr(&Expr::IntLiteral { digits: (BigInt::from(1) << 128).to_string(), span: s() }).unwrap();
        assert_eq!(checker.arena.get(wide_ty), &TypeData::Int { signed: false, width: 256 });
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.functions.push(FunctionDecl {
            name: "bad".into(),
            params: vec![],
            ret: None,
            mutability: Mutability::Pure,
            visibility: Visibility::Internal,
            body: vec![Stmt::Break { span: s() }],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, mut sink) = collect_declarations(&module, &mut arena, &imported);
        check_module(&module, &mut arena, &decls, &imported, &mut sink);
        assert!(sink.has_errors());
    }
}
