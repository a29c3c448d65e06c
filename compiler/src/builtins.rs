//! Environment-query builtins: `msg.sender`, `block.timestamp`, and friends.
//!
//! Grounded on the teacher's `builtin_signature`/`builtin_signatures`
//! registry shape (a name -> signature lookup built from a lazily
//! constructed map), generalized from stack-effect signatures to the single
//! `TypeId` each environment query yields, since these are nullary reads
//! rather than stack-transforming words.

use std::collections::HashMap;

use crate::types::{TypeArena, TypeData, TypeId};

/// The canonical name, in the order this module's tests enumerate queries in.
/// `ir_builder::lower_expr` looks each one up via `env_query_opcode` at the
/// point an `EnvQuery` expression is lowered.
pub const ENV_QUERY_NAMES: &[&str] = &[
    "msg.sender",
    "msg.value",
    "msg.data_len",
    "block.timestamp",
    "block.number",
    "tx.origin",
    "gas.left",
    "self.address",
    "chain.id",
];

/// Look up the result type of an environment query by name. Returns `None`
/// for an unknown query, which the caller turns into a diagnostic.
pub fn env_query_type(name: &str, arena: &mut TypeArena) -> Option<TypeId> {
    let signatures = env_query_signatures(arena);
    signatures.get(name).copied()
}

/// Build the full name -> type map. Rebuilt per call (the teacher's
/// `builtin_signatures()` does the same) since `TypeArena` interning makes
/// repeated construction cheap and side-effect free.
pub fn env_query_signatures(arena: &mut TypeArena) -> HashMap<String, TypeId> {
    let mut sigs = HashMap::new();

    let account = arena.account_ty();
    let uint256 = arena.uint(256);
    let uint64 = arena.uint(64);

    // msg.sender: ( -- Account ) the account that invoked the current call.
    sigs.insert("msg.sender".to_string(), account);

    // msg.value: ( -- uint256 ) native value attached to the current call.
    sigs.insert("msg.value".to_string(), uint256);

    // msg.data_len: ( -- uint256 ) byte length of the call's input data.
    sigs.insert("msg.data_len".to_string(), uint256);

    // block.timestamp: ( -- uint64 ) seconds since epoch of the current block.
    sigs.insert("block.timestamp".to_string(), uint64);

    // block.number: ( -- uint64 ) height of the current block.
    sigs.insert("block.number".to_string(), uint64);

    // tx.origin: ( -- Account ) the account that signed the top-level
    // transaction, distinct from `msg.sender` under delegate calls.
    sigs.insert("tx.origin".to_string(), account);

    // gas.left: ( -- uint256 ) remaining gas budget, read for gas-aware
    // control flow (spec.md §5's resource model).
    sigs.insert("gas.left".to_string(), uint256);

    // self.address: ( -- Account ) the currently executing module's own
    // address (differs from `tx.origin`/`msg.sender` under delegate calls).
    sigs.insert("self.address".to_string(), account);

    // chain.id: ( -- uint64 ) the network identifier, used by modules that
    // guard against cross-chain replay.
    sigs.insert("chain.id".to_string(), uint64);

    let _ = TypeData::Bool;
    sigs
}

/// Mapping from an environment query name to the opcode mnemonic the
/// assembler emits for it (spec.md §4.6's calling convention treats these as
/// zero-argument intrinsic reads, not ordinary internal calls).
pub fn env_query_opcode(name: &str) -> Option<&'static str> {
    match name {
        "msg.sender" => Some("ENV_SENDER"),
        "msg.value" => Some("ENV_VALUE"),
        "msg.data_len" => Some("ENV_CALLDATASIZE"),
        "block.timestamp" => Some("ENV_TIMESTAMP"),
        "block.number" => Some("ENV_BLOCKNUM"),
        "tx.origin" => Some("ENV_ORIGIN"),
        "gas.left" => Some("ENV_GASLEFT"),
        "self.address" => Some("ENV_SELF"),
        "chain.id" => Some("ENV_CHAINID"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_query_has_a_type_and_an_opcode() {
        let mut arena = TypeArena::new();
        for name in ENV_QUERY_NAMES {
            assert!(env_query_type(name, &mut arena).is_some(), "missing type for {name}");
            assert!(env_query_opcode(name).is_some(), "missing opcode for {name}");
        }
    }

    #[test]
    fn unknown_query_is_none() {
        let mut arena = TypeArena::new();
        assert!(env_query_type("msg.nonsense", &mut arena).is_none());
        assert!(env_query_opcode("msg.nonsense").is_none());
    }

    #[test]
    fn sender_and_origin_are_accounts() {
        let mut arena = TypeArena::new();
        let sender = env_query_type("msg.sender", &mut arena).unwrap();
        let origin = env_query_type("tx.origin", &mut arena).unwrap();
        assert_eq!(sender, origin);
        assert!(matches!(arena.get(sender), TypeData::Account));
    }
}
