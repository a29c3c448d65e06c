//! Application Binary Interface descriptor: the plain-data artifact spec.md
//! §6 names as one of compilation's four outputs. JSON encoding of this
//! descriptor is an external collaborator's job (spec.md §1); this module
//! owns only the typed in-memory shape.

use serde::Serialize;

use crate::ast;
use crate::resolver::{DeclTable, ImportedSignatures};
use crate::types::{Mutability, TypeArena, TypeData, TypeId, Visibility};

/// The canonical ABI type tag for one parameter or return slot, derived from
/// `types::TypeArena::abi_type_tag` at the point the descriptor is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AbiTypeTag {
    Bool,
    Uint(u16),
    Int(u16),
    FixedBytes(u8),
    Bytes,
    StringTy,
    Account,
    Array { elem: Box<AbiTypeTag>, len: u32 },
    DynArray { elem: Box<AbiTypeTag> },
    Tuple(Vec<AbiTypeTag>),
}

#[derive(Debug, Clone, Serialize)]
pub struct AbiParam {
    pub name: String,
    pub ty: AbiTypeTag,
}

/// One externally callable function entry (spec.md §6: "name, ordered
/// parameter list of (name, type-tag), ordered return list, mutability
/// class").
#[derive(Debug, Clone, Serialize)]
pub struct AbiFunction {
    pub name: String,
    pub selector: [u8; 4],
    pub params: Vec<AbiParam>,
    pub returns: Vec<AbiTypeTag>,
    pub mutability: Mutability,
}

/// One event entry (spec.md §6: "name, ordered parameter list with 'indexed'
/// flags, anonymous flag").
#[derive(Debug, Clone, Serialize)]
pub struct AbiEventParam {
    pub name: String,
    pub ty: AbiTypeTag,
    pub indexed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbiEvent {
    pub name: String,
    pub params: Vec<AbiEventParam>,
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum AbiEntry {
    Function(AbiFunction),
    Event(AbiEvent),
}

/// The full descriptor for one module: an ordered list of entries in
/// declaration order (spec.md §6).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AbiDescriptor {
    pub entries: Vec<AbiEntry>,
}

impl AbiDescriptor {
    pub fn functions(&self) -> impl Iterator<Item = &AbiFunction> {
        self.entries.iter().filter_map(|e| match e {
            AbiEntry::Function(f) => Some(f),
            AbiEntry::Event(_) => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &AbiEvent> {
        self.entries.iter().filter_map(|e| match e {
            AbiEntry::Event(ev) => Some(ev),
            AbiEntry::Function(_) => None,
        })
    }

    /// Look up a function entry by its 4-byte selector, used by the
    /// dispatcher-totality test (spec.md §8: "for every selector matched by
    /// the dispatcher, F appears in the descriptor").
    pub fn function_by_selector(&self, selector: [u8; 4]) -> Option<&AbiFunction> {
        self.functions().find(|f| f.selector == selector)
    }
}

/// Render a resolved `TypeId` as the structured tag this descriptor carries,
/// recursing through composites the same way `TypeArena::abi_type_tag`
/// recurses to build its string form.
pub(crate) fn abi_tag_of(id: TypeId, arena: &TypeArena) -> AbiTypeTag {
    match arena.get(id) {
        TypeData::Bool => AbiTypeTag::Bool,
        TypeData::Int { signed, width } => {
            if *signed {
                AbiTypeTag::Int(*width)
            } else {
                AbiTypeTag::Uint(*width)
            }
        }
        TypeData::Decimal { .. } => AbiTypeTag::Uint(256),
        TypeData::FixedBytes(n) => AbiTypeTag::FixedBytes(*n),
        TypeData::Account => AbiTypeTag::Account,
        TypeData::Array { elem, len } => {
            AbiTypeTag::Array { elem: Box::new(abi_tag_of(*elem, arena)), len: *len }
        }
        TypeData::DynArray { elem, .. } => {
            AbiTypeTag::DynArray { elem: Box::new(abi_tag_of(*elem, arena)) }
        }
        TypeData::Bytes { .. } => AbiTypeTag::Bytes,
        TypeData::StringTy { .. } => AbiTypeTag::StringTy,
        TypeData::Struct(sid) => {
            let def = arena.struct_def(*sid).clone();
            AbiTypeTag::Tuple(def.fields.iter().map(|f| abi_tag_of(f.ty, arena)).collect())
        }
        // A mapping and an interface reference never appear in an externally
        // callable function's parameter/return list or an event's field list
        // (the type checker rejects both before this point), so these two
        // arms exist only to keep the match exhaustive.
        TypeData::Mapping { .. } => AbiTypeTag::Bytes,
        TypeData::Interface(_) => AbiTypeTag::Account,
        TypeData::Function(_) => AbiTypeTag::Account,
    }
}

/// Build the ABI descriptor for one module: one entry per externally
/// reachable function (in source declaration order) and one per declared
/// event (spec.md §6). Functions use their recomputed selector rather than
/// `ir_builder`'s placeholder — callers must pass the same `decls.functions`
/// signatures used to recompute `IrFunction::selector` so the two stay
/// consistent.
pub fn build(
    module: &ast::Module,
    decls: &DeclTable,
    arena: &TypeArena,
    imported: &ImportedSignatures,
) -> AbiDescriptor {
    let mut entries = Vec::new();

    for f in &module.functions {
        let external = matches!(f.visibility, Visibility::External | Visibility::Both);
        if !external {
            continue;
        }
        let Some(sig) = decls.functions.get(&f.name) else { continue };
        let params = sig
            .params
            .iter()
            .zip(&f.params)
            .map(|(ty, (name, _))| AbiParam { name: name.clone(), ty: abi_tag_of(*ty, arena) })
            .collect();
        let returns = sig.ret.map(|ty| vec![abi_tag_of(ty, arena)]).unwrap_or_default();
        let selector = crate::ir_builder::selector_from_sig(&sig.name, &sig.params, arena);
        entries.push(AbiEntry::Function(AbiFunction {
            name: f.name.clone(),
            selector,
            params,
            returns,
            mutability: sig.mutability,
        }));
    }

    for e in &module.events {
        let params = e
            .params
            .iter()
            .filter_map(|p| {
                let tid = decls_event_param_type(decls, arena, imported, p)?;
                Some(AbiEventParam { name: p.name.clone(), ty: abi_tag_of(tid, arena), indexed: p.indexed })
            })
            .collect();
        entries.push(AbiEntry::Event(AbiEvent { name: e.name.clone(), params, anonymous: e.anonymous }));
    }

    AbiDescriptor { entries }
}

/// Event parameter types are stored as raw `ast::TypeAnn` on `EventDecl`
/// (never re-resolved after phase (i)); re-resolve against the frozen decl
/// table here rather than threading a second, already-resolved copy through
/// `DeclTable` just for descriptor rendering.
fn decls_event_param_type(
    decls: &DeclTable,
    arena: &TypeArena,
    imported: &ImportedSignatures,
    p: &ast::EventParam,
) -> Option<TypeId> {
    // The type checker only resolves an event's field types at its `emit`
    // call sites (`Stmt::Emit`), and even there discards the resolved
    // `TypeId`s once the assignability check passes; an event declared but
    // never emitted is never type-checked at all. Re-resolve from scratch
    // here rather than depend on either. A throwaway arena clone avoids
    // needing `&mut TypeArena` here just to re-derive one.
    let mut scratch = arena.clone();
    crate::resolver::resolve_type_ann(&p.ty, &mut scratch, decls, imported, crate::diagnostics::Span::synthetic())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_selector_finds_the_matching_function() {
        let descriptor = AbiDescriptor {
            entries: vec![AbiEntry::Function(AbiFunction {
                name: "identity".into(),
                selector: [0x8e, 0x8d, 0xbf, 0x82],
                params: vec![AbiParam { name: "x".into(), ty: AbiTypeTag::Uint(256) }],
                returns: vec![AbiTypeTag::Uint(256)],
                mutability: Mutability::Pure,
            })],
        };
        let found = descriptor.function_by_selector([0x8e, 0x8d, 0xbf, 0x82]).unwrap();
        assert_eq!(found.name, "identity");
        assert!(descriptor.function_by_selector([0, 0, 0, 0]).is_none());
    }
}
