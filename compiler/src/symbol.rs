//! Symbols: named bindings produced by the semantic analyzer (spec.md §3).
//!
//! A `Symbol` is a named binding with a type, a scope, a location kind, and
//! mutability flags. Storage-class symbols additionally carry their assigned
//! slot and, for packed composites, their bit offset within the slot — see
//! `layout.rs` for how those fields get filled in during phase (iii).

use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// Where a symbol's binding is rooted. Modules host state variables and
/// function declarations; function/block scopes host locals and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Module,
    Function(FunctionId),
    Block(FunctionId, BlockId),
}

/// Where a symbol lives at runtime. Persistent storage and transient storage
/// are the two disjoint, parallel regions from spec.md §4.3; `Immutable` is
/// the deployment-time-only constant-pool region from spec.md §3's lifecycle
/// invariant ("written exactly once during deployment and never again").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Storage { slot: u64, bit_offset: u16 },
    Transient { key: u64, bit_offset: u16 },
    Immutable { offset: u32 },
    Memory { offset: u32 },
    Calldata { offset: u32 },
    /// A function-local value that will live on the virtual-register/operand
    /// stack once scheduled; not yet assigned a concrete stack depth.
    Stack,
}

impl LocationKind {
    pub fn is_storage(&self) -> bool {
        matches!(self, LocationKind::Storage { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, LocationKind::Transient { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeId,
    pub scope: Scope,
    pub location: LocationKind,
    /// `false` for `let`-bound locals and for all storage symbols other than
    /// during their single constructor-phase write (enforced by the
    /// analyzer, not recorded here).
    pub mutable: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: TypeId, scope: Scope, location: LocationKind) -> Self {
        Symbol { name: name.into(), ty, scope, location, mutable: true }
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }
}

/// The module-level symbol table produced by phase (i) and frozen (read-only)
/// from phase (ii) onward, per spec.md §3's lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ModuleSymbols {
    pub state_vars: Vec<Symbol>,
    pub functions: Vec<FunctionId>,
    names: std::collections::HashMap<String, usize>,
}

impl ModuleSymbols {
    pub fn new() -> Self {
        ModuleSymbols::default()
    }

    /// Insert a module-level (state variable) symbol. Returns `Err` with the
    /// index of the pre-existing symbol of the same name — name collisions
    /// at module scope are a name-resolution error (spec.md §7).
    pub fn insert_state_var(&mut self, symbol: Symbol) -> Result<(), usize> {
        if let Some(&existing) = self.names.get(&symbol.name) {
            return Err(existing);
        }
        self.names.insert(symbol.name.clone(), self.state_vars.len());
        self.state_vars.push(symbol);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.names.get(name).map(|&i| &self.state_vars[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeArena;

    #[test]
    fn duplicate_state_var_name_is_rejected() {
        let mut arena = TypeArena::new();
        let u256 = arena.uint(256);
        let mut table = ModuleSymbols::new();
        let sym = Symbol::new(
            "balance",
            u256,
            Scope::Module,
            LocationKind::Storage { slot: 0, bit_offset: 0 },
        );
        assert!(table.insert_state_var(sym.clone()).is_ok());
        assert_eq!(table.insert_state_var(sym).unwrap_err(), 0);
    }
}
