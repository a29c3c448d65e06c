//! Phase (i): declaration collection and structural interface checking.
//!
//! Filesystem-level import resolution is an external collaborator's concern
//! per spec.md §1; what this module owns is the narrow piece spec.md §5
//! keeps *inside* the core: consuming an already-resolved, read-only cache
//! of imported interface signatures, and the two-pass forward-reference
//! collection of a single module's own declarations (spec.md §3 lifecycle,
//! phase (i)).

use std::collections::HashMap;

use crate::ast::{self, Module, TypeAnn};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Span};
use crate::symbol::{LocationKind, ModuleSymbols, Scope, Symbol};
use crate::types::{
    FunctionSig, InterfaceId, Mutability, StructId, TypeArena, TypeData, TypeId, Visibility,
};

/// Read-only cache of interfaces/structs visible from already-compiled
/// imported modules, handed in by the driver (spec.md §5: "an immutable
/// cache of resolved interface signatures" is the only state crossing module
/// boundaries).
#[derive(Debug, Clone, Default)]
pub struct ImportedSignatures {
    pub interfaces: HashMap<String, InterfaceId>,
    pub structs: HashMap<String, StructId>,
}

/// Everything phase (i) produces for one module: name -> id tables for
/// structs/interfaces, a name -> signature table for functions (used by the
/// type checker and the call graph), and the module's symbol table.
#[derive(Debug, Clone, Default)]
pub struct DeclTable {
    pub structs: HashMap<String, StructId>,
    pub interfaces: HashMap<String, InterfaceId>,
    pub functions: HashMap<String, FunctionSig>,
    pub events: HashMap<String, ast::EventDecl>,
    pub state_vars: ModuleSymbols,
}

/// Resolve a type annotation to an arena `TypeId` against the in-progress
/// declaration tables. Used both during phase (i) (for struct fields and
/// function signatures) and by the type checker (for local annotations).
pub fn resolve_type_ann(
    ann: &TypeAnn,
    arena: &mut TypeArena,
    decls: &DeclTable,
    imported: &ImportedSignatures,
    span: Span,
) -> Result<TypeId, Diagnostic> {
    Ok(match ann {
        TypeAnn::Bool => arena.bool_ty(),
        TypeAnn::UInt(w) => {
            validate_width(*w, span)?;
            arena.uint(*w)
        }
        TypeAnn::Int(w) => {
            validate_width(*w, span)?;
            arena.int(*w)
        }
        TypeAnn::Decimal(scale) => arena.intern(TypeData::Decimal { scale: *scale }),
        TypeAnn::FixedBytes(n) => {
            if *n == 0 || *n > 32 {
                return Err(Diagnostic::error(
                    "E0110",
                    span,
                    format!("fixed byte length must be in 1..=32, got {}", n),
                ));
            }
            arena.intern(TypeData::FixedBytes(*n))
        }
        TypeAnn::Account => arena.account_ty(),
        TypeAnn::Array(elem, len) => {
            let elem_id = resolve_type_ann(elem, arena, decls, imported, span)?;
            arena.intern(TypeData::Array { elem: elem_id, len: *len })
        }
        TypeAnn::DynArray(elem, max_cap) => {
            let elem_id = resolve_type_ann(elem, arena, decls, imported, span)?;
            arena.intern(TypeData::DynArray { elem: elem_id, max_cap: *max_cap })
        }
        TypeAnn::Bytes(cap) => arena.intern(TypeData::Bytes { max_cap: *cap }),
        TypeAnn::StringTy(cap) => arena.intern(TypeData::StringTy { max_cap: *cap }),
        TypeAnn::Mapping(key, value) => {
            let key_id = resolve_type_ann(key, arena, decls, imported, span)?;
            let value_id = resolve_type_ann(value, arena, decls, imported, span)?;
            if !is_hashable(arena, key_id) {
                return Err(Diagnostic::error(
                    "E0111",
                    span,
                    "mapping key type is not hashable",
                ));
            }
            arena.intern(TypeData::Mapping { key: key_id, value: value_id })
        }
        TypeAnn::Named(name) => {
            if let Some(&sid) = decls.structs.get(name).or_else(|| imported.structs.get(name)) {
                arena.intern(TypeData::Struct(sid))
            } else if let Some(&iid) =
                decls.interfaces.get(name).or_else(|| imported.interfaces.get(name))
            {
                arena.intern(TypeData::Interface(iid))
            } else {
                return Err(Diagnostic::error(
                    "E0100",
                    span,
                    format!("undefined type `{}`", name),
                ));
            }
        }
    })
}

fn validate_width(width: u16, span: Span) -> Result<(), Diagnostic> {
    if width == 0 || width > 256 || width % 8 != 0 {
        return Err(Diagnostic::error(
            "E0101",
            span,
            format!("integer bit width must be a multiple of 8 in 8..=256, got {}", width),
        ));
    }
    Ok(())
}

fn is_hashable(arena: &TypeArena, id: TypeId) -> bool {
    matches!(
        arena.get(id),
        TypeData::Bool
            | TypeData::Int { .. }
            | TypeData::FixedBytes(_)
            | TypeData::Account
            | TypeData::Bytes { .. }
            | TypeData::StringTy { .. }
    )
}

/// Phase (i): two passes over `module` to collect top-level declarations.
///
/// Pass 1 predeclares every struct/interface name (so forward and
/// self-references resolve). Pass 2 fills in struct fields, interface
/// function signatures, event/function signatures, and state variable
/// symbols, all of which may now reference any name from pass 1.
pub fn collect_declarations(
    module: &Module,
    arena: &mut TypeArena,
    imported: &ImportedSignatures,
) -> (DeclTable, DiagnosticSink) {
    let mut decls = DeclTable::default();
    let mut sink = DiagnosticSink::new();

    // Pass 1: reserve ids for every struct and interface name so later
    // references (including self-references) resolve.
    for s in &module.structs {
        if decls.structs.contains_key(&s.name) {
            sink.push(Diagnostic::error(
                "E0120",
                s.span,
                format!("duplicate struct definition `{}`", s.name),
            ));
            continue;
        }
        let sid = arena.predeclare_struct(s.name.clone());
        decls.structs.insert(s.name.clone(), sid);
    }
    for i in &module.interfaces {
        if decls.interfaces.contains_key(&i.name) {
            sink.push(Diagnostic::error(
                "E0121",
                i.span,
                format!("duplicate interface definition `{}`", i.name),
            ));
            continue;
        }
        let iid = arena.predeclare_interface(i.name.clone());
        decls.interfaces.insert(i.name.clone(), iid);
    }

    // Pass 2: fill in struct fields.
    for s in &module.structs {
        let Some(&sid) = decls.structs.get(&s.name) else { continue };
        let mut fields = Vec::with_capacity(s.fields.len());
        for (fname, fty) in &s.fields {
            match resolve_type_ann(fty, arena, &decls, imported, s.span) {
                Ok(tid) => fields.push(crate::types::StructField { name: fname.clone(), ty: tid }),
                Err(d) => sink.push(d),
            }
        }
        arena.set_struct_fields(sid, fields);
    }

    // Pass 2: fill in interface function signatures.
    for i in &module.interfaces {
        let Some(&iid) = decls.interfaces.get(&i.name) else { continue };
        let mut funcs = Vec::with_capacity(i.functions.len());
        for f in &i.functions {
            match build_function_sig(
                &f.name,
                &f.params,
                &f.ret,
                f.mutability,
                Visibility::External,
                arena,
                &decls,
                imported,
                i.span,
            ) {
                Ok(sig) => funcs.push(sig),
                Err(d) => sink.push(d),
            }
        }
        arena.set_interface_functions(iid, funcs);
    }

    // Pass 2: state variables.
    for v in &module.state_vars {
        match resolve_type_ann(&v.ty, arena, &decls, imported, v.span) {
            Ok(tid) => {
                let location = match v.class {
                    ast::StorageClass::Persistent => {
                        LocationKind::Storage { slot: 0, bit_offset: 0 }
                    }
                    ast::StorageClass::Transient => {
                        LocationKind::Transient { key: 0, bit_offset: 0 }
                    }
                    ast::StorageClass::Immutable => LocationKind::Immutable { offset: 0 },
                };
                let symbol = Symbol::new(v.name.clone(), tid, Scope::Module, location);
                if let Err(prior) = decls.state_vars.insert_state_var(symbol) {
                    let _ = prior;
                    sink.push(Diagnostic::error(
                        "E0122",
                        v.span,
                        format!("duplicate state variable `{}`", v.name),
                    ));
                }
            }
            Err(d) => sink.push(d),
        }
    }

    // Events.
    for e in &module.events {
        if decls.events.insert(e.name.clone(), e.clone()).is_some() {
            sink.push(Diagnostic::error(
                "E0123",
                e.span,
                format!("duplicate event definition `{}`", e.name),
            ));
        }
    }

    // Function signatures (including the constructor, kept separately).
    let mut all_fns: Vec<&ast::FunctionDecl> = module.functions.iter().collect();
    if let Some(ctor) = &module.constructor {
        all_fns.push(ctor);
    }
    for f in &all_fns {
        match build_function_sig(
            &f.name,
            &f.params,
            &f.ret,
            f.mutability,
            f.visibility,
            arena,
            &decls,
            imported,
            f.span,
        ) {
            Ok(sig) => {
                if decls.functions.insert(f.name.clone(), sig).is_some() {
                    sink.push(Diagnostic::error(
                        "E0124",
                        f.span,
                        format!("duplicate function definition `{}`", f.name),
                    ));
                }
            }
            Err(d) => sink.push(d),
        }
    }

    (decls, sink)
}

#[allow(clippy::too_many_arguments)]
fn build_function_sig(
    name: &str,
    params: &[(String, TypeAnn)],
    ret: &Option<TypeAnn>,
    mutability: Mutability,
    visibility: Visibility,
    arena: &mut TypeArena,
    decls: &DeclTable,
    imported: &ImportedSignatures,
    span: Span,
) -> Result<FunctionSig, Diagnostic> {
    let mut param_tys = Vec::with_capacity(params.len());
    for (_, ty) in params {
        param_tys.push(resolve_type_ann(ty, arena, decls, imported, span)?);
    }
    let ret_ty = match ret {
        Some(t) => Some(resolve_type_ann(t, arena, decls, imported, span)?),
        None => None,
    };
    Ok(FunctionSig {
        name: name.to_string(),
        params: param_tys,
        ret: ret_ty,
        mutability,
        visibility,
    })
}

/// Structural interface check (spec.md §4.1): a module asserting
/// implementation of interface `I` must, for every function in `I`, provide
/// a function with a matching name, parameter types, return type, and a
/// mutability class `<= I`'s declared class.
pub fn check_interface_impl(
    module: &Module,
    arena: &TypeArena,
    decls: &DeclTable,
    imported: &ImportedSignatures,
    sink: &mut DiagnosticSink,
) {
    for iface_name in &module.implements {
        let Some(&iid) =
            decls.interfaces.get(iface_name).or_else(|| imported.interfaces.get(iface_name))
        else {
            sink.push(Diagnostic::error(
                "E0130",
                Span::synthetic(),
                format!("`{}` implements undefined interface `{}`", module.name, iface_name),
            ));
            continue;
        };
        let iface = arena.interface_def(iid);
        for required in &iface.functions {
            match decls.functions.get(&required.name) {
                None => sink.push(Diagnostic::error(
                    "E0131",
                    Span::synthetic(),
                    format!(
                        "`{}` does not implement `{}.{}`",
                        module.name, iface_name, required.name
                    ),
                )),
                Some(actual) => {
                    if actual.params != required.params || actual.ret != required.ret {
                        sink.push(Diagnostic::error(
                            "E0132",
                            Span::synthetic(),
                            format!(
                                "`{}.{}` signature does not match interface `{}`",
                                module.name, required.name, iface_name
                            ),
                        ));
                    } else if !required.mutability.may_call(actual.mutability)
                        && actual.mutability > required.mutability
                    {
                        sink.push(Diagnostic::error(
                            "E0133",
                            Span::synthetic(),
                            format!(
                                "`{}.{}` is more mutating than interface `{}` allows",
                                module.name, required.name, iface_name
                            ),
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{StateVarDecl, StorageClass};

    fn s() -> Span {
        Span::new(0, 0, 1)
    }

    #[test]
    fn self_referential_struct_resolves_via_predeclare() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.structs.push(ast::StructDecl {
            name: "Node".into(),
            fields: vec![
                ("value".into(), TypeAnn::UInt(256)),
                ("next".into(), TypeAnn::Named("Node".into())),
            ],
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, sink) = collect_declarations(&module, &mut arena, &imported);
        assert!(sink.is_empty(), "{:?}", sink.as_slice());
        let sid = decls.structs["Node"];
        let def = arena.struct_def(sid);
        assert_eq!(def.fields.len(), 2);
        assert_eq!(
            arena.get(def.fields[1].ty),
            &crate::types::TypeData::Struct(sid),
            "self-referential field must resolve to the struct's own predeclared id"
        );
    }

    #[test]
    fn duplicate_state_var_is_an_error() {
        let mut arena = TypeArena::new();
        let mut module = Module::new("m");
        module.state_vars.push(StateVarDecl {
            name: "x".into(),
            ty: TypeAnn::UInt(256),
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: false,
            span: s(),
        });
        module.state_vars.push(StateVarDecl {
            name: "x".into(),
            ty: TypeAnn::Bool,
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: false,
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (_decls, sink) = collect_declarations(&module, &mut arena, &imported);
        assert!(sink.has_errors());
    }

    #[test]
    fn mapping_key_must_be_hashable() {
        let mut arena = TypeArena::new();
        let decls = DeclTable::default();
        let imported = ImportedSignatures::default();
        let bad = TypeAnn::Mapping(
            Box::new(TypeAnn::DynArray(Box::new(TypeAnn::UInt(8)), 4)),
            Box::new(TypeAnn::UInt(256)),
        );
        let result = resolve_type_ann(&bad, &mut arena, &decls, &imported, s());
        assert!(result.is_err());
    }
}
