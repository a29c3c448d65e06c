//! Type system for the contract language.
//!
//! Types live in an arena and are referred to everywhere else by `TypeId`, a
//! `Copy` index. This is the arena-keyed representation spec.md §9 calls for
//! to avoid cyclic ownership when a struct names itself or an interface
//! refers back to a module: a struct field that is itself the struct's type
//! is just a `TypeId` equal to the struct's own id, no `Box`/`Rc` needed.

use std::collections::HashMap;

/// Index into a `TypeArena`. Never constructed except by the arena that owns
/// the corresponding `TypeData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct InterfaceId(pub u32);

/// Function mutability, forming the lattice `pure < view < nonpayable <
/// payable` from spec.md §4.1. `Constructor` is deployment-only and is not
/// part of the ordered lattice (a constructor is never a call *target*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Mutability {
    Pure,
    View,
    Nonpayable,
    Payable,
}

impl Mutability {
    /// A call from a function of mutability `self` may target a function of
    /// mutability `target` only when `target <= self` under this lattice.
    pub fn may_call(self, target: Mutability) -> bool {
        target <= self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    External,
    Internal,
    Both,
}

/// One function signature: ordered parameter types, an optional return type,
/// mutability class, and visibility. Used both for user-declared functions
/// and for the functions named inside an `Interface`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<TypeId>,
    pub ret: Option<TypeId>,
    pub mutability: Mutability,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InterfaceDef {
    pub name: String,
    pub functions: Vec<FunctionSig>,
}

/// One arena-owned type. `TypeData::Struct`/`Interface` hold an id into the
/// arena's side tables (`structs`/`interfaces`) rather than embedding the
/// definition, so two structs can reference each other without a cycle in
/// `TypeData` itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum TypeData {
    Bool,
    /// Signed/unsigned integer, bit width in `{8, 16, ..., 256}`.
    Int { signed: bool, width: u16 },
    /// Fixed-point decimal with a fixed, compile-time-known scale (number of
    /// fractional digits).
    Decimal { scale: u8 },
    /// Fixed-length byte string, `1 <= n <= 32`.
    FixedBytes(u8),
    /// 20-byte account identifier.
    Account,
    /// Fixed-length array of `n` elements of type `elem`.
    Array { elem: TypeId, len: u32 },
    /// Bounded dynamic array: at most `max_cap` elements of type `elem`.
    DynArray { elem: TypeId, max_cap: u32 },
    /// Dynamic byte string with a compile-time maximum length.
    Bytes { max_cap: u32 },
    /// Dynamic UTF-8 string with a compile-time maximum length.
    StringTy { max_cap: u32 },
    Struct(StructId),
    /// Mapping from a hashable key type to a value type.
    Mapping { key: TypeId, value: TypeId },
    Interface(InterfaceId),
    /// A function type: used for internal function-valued symbols (e.g. a
    /// `view` function reference passed to another internal function).
    Function(Box<FunctionSig>),
}

/// Canonical ABI encoding tag, used for external-call and dispatcher argument
/// layout (spec.md §4.6 calling conventions): either the type occupies one
/// fixed 32-byte head slot ("static"), or the head slot holds an offset into
/// a tail region ("dynamic").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AbiTag {
    Static,
    Dynamic,
}

/// Derived layout facts about a type, computed once per `TypeId` and cached
/// by `TypeArena::layout_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TypeLayout {
    /// Size in memory, in bytes, when the value is materialized in a memory
    /// frame (composites are a pointer word; `mem_size` for those is the
    /// size of the pointee region, not of the pointer itself).
    pub mem_size: u32,
    /// Size in 256-bit storage slots when the value is *not* packed with a
    /// neighbor (packing is decided by the layout planner, not by the type
    /// itself).
    pub storage_slots: u32,
    /// Required alignment in bytes within a packed slot.
    pub align: u32,
    /// Whether values of this type are passed by value (copied) or by
    /// reference (a pointer into a memory/storage/calldata region).
    pub by_value: bool,
    /// Whether this type occupies whole storage/memory words rather than a
    /// sub-word bit range (composites and full-word scalars are
    /// word-addressable; packed scalars sharing a slot are not, individually).
    pub word_addressable: bool,
    pub abi_tag: AbiTag,
}

#[derive(Default, Clone)]
pub struct TypeArena {
    types: Vec<TypeData>,
    structs: Vec<StructDef>,
    interfaces: Vec<InterfaceDef>,
    /// Structural interning so that e.g. two requests for `uint256` return
    /// the same `TypeId`.
    intern: HashMap<TypeData, TypeId>,
}

impl std::hash::Hash for TypeData {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypeData::Bool | TypeData::Account => {}
            TypeData::Int { signed, width } => {
                signed.hash(state);
                width.hash(state);
            }
            TypeData::Decimal { scale } => scale.hash(state),
            TypeData::FixedBytes(n) => n.hash(state),
            TypeData::Array { elem, len } => {
                elem.hash(state);
                len.hash(state);
            }
            TypeData::DynArray { elem, max_cap } => {
                elem.hash(state);
                max_cap.hash(state);
            }
            TypeData::Bytes { max_cap } | TypeData::StringTy { max_cap } => max_cap.hash(state),
            TypeData::Struct(id) => id.hash(state),
            TypeData::Mapping { key, value } => {
                key.hash(state);
                value.hash(state);
            }
            TypeData::Interface(id) => id.hash(state),
            TypeData::Function(sig) => {
                sig.name.hash(state);
                sig.params.hash(state);
            }
        }
    }
}

impl TypeArena {
    pub fn new() -> Self {
        TypeArena::default()
    }

    /// Intern a type, returning the existing id if an equal `TypeData` was
    /// already interned. `Function` types (which embed a name) are never
    /// deduplicated against each other since identity matters for them.
    pub fn intern(&mut self, data: TypeData) -> TypeId {
        if let TypeData::Function(_) = &data {
            let id = TypeId(self.types.len() as u32);
            self.types.push(data);
            return id;
        }
        if let Some(&id) = self.intern.get(&data) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.intern.insert(data.clone(), id);
        self.types.push(data);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    pub fn define_struct(&mut self, def: StructDef) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(def);
        id
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    /// Reserve a `StructId` for `name` before its fields are known, so a
    /// struct can reference itself (or a not-yet-processed sibling struct)
    /// by `TypeId` during phase (i)'s two-pass forward-reference resolution.
    pub fn predeclare_struct(&mut self, name: impl Into<String>) -> StructId {
        self.define_struct(StructDef { name: name.into(), fields: Vec::new() })
    }

    pub fn set_struct_fields(&mut self, id: StructId, fields: Vec<StructField>) {
        self.structs[id.0 as usize].fields = fields;
    }

    pub fn define_interface(&mut self, def: InterfaceDef) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len() as u32);
        self.interfaces.push(def);
        id
    }

    pub fn predeclare_interface(&mut self, name: impl Into<String>) -> InterfaceId {
        self.define_interface(InterfaceDef { name: name.into(), functions: Vec::new() })
    }

    pub fn set_interface_functions(&mut self, id: InterfaceId, functions: Vec<FunctionSig>) {
        self.interfaces[id.0 as usize].functions = functions;
    }

    pub fn interface_def(&self, id: InterfaceId) -> &InterfaceDef {
        &self.interfaces[id.0 as usize]
    }

    pub fn bool_ty(&mut self) -> TypeId {
        self.intern(TypeData::Bool)
    }

    pub fn uint(&mut self, width: u16) -> TypeId {
        self.intern(TypeData::Int { signed: false, width })
    }

    pub fn int(&mut self, width: u16) -> TypeId {
        self.intern(TypeData::Int { signed: true, width })
    }

    pub fn account_ty(&mut self) -> TypeId {
        self.intern(TypeData::Account)
    }

    /// One storage slot is 32 bytes (256 bits) — the VM's native word size.
    pub const WORD_BYTES: u32 = 32;

    /// Layout facts for a type. Composite types (arrays, structs, mappings,
    /// dynamic bytes/strings) are represented in memory by a single pointer
    /// word per spec.md §3's invariant that every IR expression node yields
    /// exactly one VM word; `mem_size` below therefore describes the pointee
    /// region's size, used for frame-allocation sizing, not the stack word
    /// width itself.
    pub fn layout_of(&self, id: TypeId) -> TypeLayout {
        match self.get(id) {
            TypeData::Bool => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: 1,
                by_value: true,
                word_addressable: false,
                abi_tag: AbiTag::Static,
            },
            TypeData::Int { width, .. } => {
                let byte_width = (*width as u32) / 8;
                TypeLayout {
                    mem_size: Self::WORD_BYTES,
                    storage_slots: 1,
                    align: byte_width,
                    by_value: true,
                    word_addressable: byte_width == Self::WORD_BYTES,
                    abi_tag: AbiTag::Static,
                }
            }
            TypeData::Decimal { .. } => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: Self::WORD_BYTES,
                by_value: true,
                word_addressable: true,
                abi_tag: AbiTag::Static,
            },
            TypeData::FixedBytes(n) => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: *n as u32,
                by_value: true,
                word_addressable: *n as u32 == Self::WORD_BYTES,
                abi_tag: AbiTag::Static,
            },
            TypeData::Account => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: 20,
                by_value: true,
                word_addressable: false,
                abi_tag: AbiTag::Static,
            },
            TypeData::Array { elem, len } => {
                let elem_layout = self.layout_of(*elem);
                TypeLayout {
                    mem_size: elem_layout.mem_size * len,
                    storage_slots: elem_layout.storage_slots * len,
                    align: Self::WORD_BYTES,
                    by_value: false,
                    word_addressable: true,
                    abi_tag: AbiTag::Static,
                }
            }
            TypeData::DynArray { elem, max_cap } => {
                let elem_layout = self.layout_of(*elem);
                TypeLayout {
                    mem_size: Self::WORD_BYTES + elem_layout.mem_size * max_cap,
                    // length slot + up to max_cap data slots (actual slot
                    // count assigned per-instance by the layout planner).
                    storage_slots: 1 + elem_layout.storage_slots * max_cap,
                    align: Self::WORD_BYTES,
                    by_value: false,
                    word_addressable: true,
                    abi_tag: AbiTag::Dynamic,
                }
            }
            TypeData::Bytes { max_cap } | TypeData::StringTy { max_cap } => TypeLayout {
                mem_size: Self::WORD_BYTES + max_cap.div_ceil(Self::WORD_BYTES) * Self::WORD_BYTES,
                storage_slots: 1 + max_cap.div_ceil(Self::WORD_BYTES),
                align: Self::WORD_BYTES,
                by_value: false,
                word_addressable: true,
                abi_tag: AbiTag::Dynamic,
            },
            TypeData::Struct(sid) => {
                let def = self.struct_def(*sid).clone();
                let mut mem_size = 0u32;
                let mut slots = 0u32;
                for field in &def.fields {
                    let fl = self.layout_of(field.ty);
                    mem_size += fl.mem_size;
                    slots += fl.storage_slots;
                }
                TypeLayout {
                    mem_size,
                    storage_slots: slots.max(1),
                    align: Self::WORD_BYTES,
                    by_value: false,
                    word_addressable: true,
                    abi_tag: AbiTag::Static,
                }
            }
            TypeData::Mapping { .. } => TypeLayout {
                mem_size: 0,
                storage_slots: 1,
                align: Self::WORD_BYTES,
                by_value: false,
                word_addressable: true,
                abi_tag: AbiTag::Static,
            },
            TypeData::Interface(_) => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: Self::WORD_BYTES,
                by_value: true,
                word_addressable: true,
                abi_tag: AbiTag::Static,
            },
            TypeData::Function(_) => TypeLayout {
                mem_size: Self::WORD_BYTES,
                storage_slots: 1,
                align: Self::WORD_BYTES,
                by_value: true,
                word_addressable: true,
                abi_tag: AbiTag::Static,
            },
        }
    }

    /// Whether a type can ever be packed with a scalar neighbor into a
    /// shared storage slot (composites "always start a new slot" per
    /// spec.md §4.3).
    pub fn is_packable_scalar(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            TypeData::Bool | TypeData::Int { .. } | TypeData::FixedBytes(_) | TypeData::Account
        )
    }

    /// Canonical ABI type-tag string, used by `abi.rs` to render the
    /// descriptor's `type-tag` field.
    pub fn abi_type_tag(&self, id: TypeId) -> String {
        match self.get(id) {
            TypeData::Bool => "bool".to_string(),
            TypeData::Int { signed, width } => {
                format!("{}{}", if *signed { "int" } else { "uint" }, width)
            }
            TypeData::Decimal { scale } => format!("decimal{}", scale),
            TypeData::FixedBytes(n) => format!("bytes{}", n),
            TypeData::Account => "address".to_string(),
            TypeData::Array { elem, len } => format!("{}[{}]", self.abi_type_tag(*elem), len),
            TypeData::DynArray { elem, max_cap } => {
                format!("{}[]({}max)", self.abi_type_tag(*elem), max_cap)
            }
            TypeData::Bytes { max_cap } => format!("bytes({}max)", max_cap),
            TypeData::StringTy { max_cap } => format!("string({}max)", max_cap),
            TypeData::Struct(sid) => format!("tuple({})", self.struct_def(*sid).name),
            TypeData::Mapping { .. } => "mapping".to_string(),
            TypeData::Interface(iid) => self.interface_def(*iid).name.clone(),
            TypeData::Function(sig) => format!("function({})", sig.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_equal_scalars() {
        let mut arena = TypeArena::new();
        let a = arena.uint(256);
        let b = arena.uint(256);
        assert_eq!(a, b);
        let c = arena.uint(8);
        assert_ne!(a, c);
    }

    #[test]
    fn struct_is_not_packable_and_starts_new_slot() {
        let mut arena = TypeArena::new();
        let u8_ty = arena.uint(8);
        let sid = arena.define_struct(StructDef {
            name: "Pair".into(),
            fields: vec![
                StructField { name: "a".into(), ty: u8_ty },
                StructField { name: "b".into(), ty: u8_ty },
            ],
        });
        let struct_ty = arena.intern(TypeData::Struct(sid));
        assert!(!arena.is_packable_scalar(struct_ty));
    }

    #[test]
    fn bool_and_uint248_together_fit_one_word() {
        let mut arena = TypeArena::new();
        let bool_ty = arena.bool_ty();
        let u248 = arena.uint(248);
        let bool_layout = arena.layout_of(bool_ty);
        let u248_layout = arena.layout_of(u248);
        assert!(arena.is_packable_scalar(bool_ty));
        assert!(arena.is_packable_scalar(u248));
        assert_eq!(bool_layout.align + u248_layout.align, 32);
    }

    #[test]
    fn mapping_and_dynarray_are_not_word_by_value() {
        let mut arena = TypeArena::new();
        let u256 = arena.uint(256);
        let acct = arena.account_ty();
        let mapping = arena.intern(TypeData::Mapping { key: acct, value: u256 });
        assert!(!arena.layout_of(mapping).by_value);
        let dynarr = arena.intern(TypeData::DynArray { elem: u256, max_cap: 16 });
        assert!(!arena.layout_of(dynarr).by_value);
        assert_eq!(arena.layout_of(dynarr).abi_tag, AbiTag::Dynamic);
    }
}
