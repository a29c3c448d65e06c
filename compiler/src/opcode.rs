//! The bytecode target's instruction set.
//!
//! Resolves the "string-typed opcode tags" design flag from spec.md §9 into
//! a proper closed enum: every place downstream of the IR builder that used
//! to match on an opcode mnemonic string now matches on `Opcode`, so an
//! unrecognized or misspelled mnemonic is a compile-time error in this crate
//! rather than a runtime lookup failure in the assembler.

use serde::Serialize;

/// One instruction in the target stack machine. Variants with an inline
/// operand (`Push`, `Jump`, `JumpIf`, `Call*`) carry it directly; everything
/// else is a bare stack-effect operation, matching the target VM's
/// fixed-width-prefix-plus-operand encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Opcode {
    // --- Stack manipulation ---
    /// Push a constant word onto the stack (big-endian, zero-padded to 32
    /// bytes in the finalized encoding).
    Push(Vec<u8>),
    Pop,
    Dup(u8),
    Swap(u8),

    // --- Checked arithmetic ---
    AddChecked,
    SubChecked,
    MulChecked,
    DivChecked,
    ModChecked,
    // --- Unchecked (wrapping) arithmetic, emitted inside `unchecked` regions ---
    AddWrap,
    SubWrap,
    MulWrap,
    DivWrap,
    ModWrap,

    // --- Bitwise / comparison ---
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    Eq,
    Lt,
    Gt,
    IsZero,

    // --- Control flow ---
    /// Unconditional jump to a resolved byte offset.
    Jump(u32),
    /// Pop a condition; jump to the offset if it is nonzero.
    JumpIf(u32),
    /// A no-op marker the assembler leaves in place as a valid jump target;
    /// removed by the finalizer's peephole pass if nothing jumps to it.
    JumpDest,
    Return,
    Revert,

    // --- Storage / transient storage ---
    SLoad,
    SStore,
    TLoad,
    TStore,
    /// Load from the deploy-time immutable constant pool at a fixed offset.
    ImmutableLoad(u32),

    // --- Memory ---
    MLoad,
    MStore,
    /// Copy `len` bytes starting at `code_offset` in the currently executing
    /// code into memory at `dest_offset` (stack order, top to bottom: `len`,
    /// `code_offset`, `dest_offset`). Emitted only by the finalizer's deploy
    /// stub, never by function/expression codegen.
    CodeCopy,

    // --- Calldata, read-only ---
    /// Pop a byte offset; push the 32-byte word read from the current call's
    /// input data at that offset (zero-padded past the end), the same way
    /// `MLoad` addresses the memory region. Used by the external dispatcher
    /// to read the selector and decode ABI-encoded arguments.
    CalldataLoad,

    // --- Hashing, used for mapping/dynamic-array slot derivation ---
    Keccak256,

    // --- Calls ---
    /// Internal call to a resolved function entry offset.
    CallInternal(u32),
    /// External call: target's own code runs in its own state.
    CallExternal,
    /// Delegate call: target's code runs in the caller's storage context.
    CallDelegate,
    /// Static call: target must not mutate state.
    CallStatic,

    // --- Environment reads ---
    /// Named environment query, resolved from `builtins::env_query_opcode`.
    Env(&'static str),

    // --- Events ---
    Log { topic_count: u8 },

    // --- Assertions ---
    /// Pop a condition; revert with no data if it is zero.
    Assert,
}

impl Opcode {
    /// Stack words consumed, for the optimizer's side-effect-order and
    /// scheduler's depth-accounting passes. `None` for variable-arity ops
    /// (`Log`, whose arity depends on `topic_count`).
    pub fn stack_delta(&self) -> Option<i32> {
        use Opcode::*;
        Some(match self {
            Push(_) => 1,
            Pop => -1,
            Dup(_) => 1,
            Swap(_) => 0,
            AddChecked | SubChecked | MulChecked | DivChecked | ModChecked | AddWrap | SubWrap
            | MulWrap | DivWrap | ModWrap | BitAnd | BitOr | BitXor | Shl | Shr | Eq | Lt | Gt => {
                -1
            }
            BitNot | IsZero => 0,
            Jump(_) => -1,
            JumpIf(_) => -2,
            JumpDest | Return | Revert => 0,
            SLoad | TLoad | MLoad | CalldataLoad => 0,
            SStore | TStore | MStore => -2,
            CodeCopy => -3,
            ImmutableLoad(_) => 1,
            Keccak256 => -1,
            CallInternal(_) => 0,
            CallExternal | CallDelegate | CallStatic => -3,
            Env(_) => 1,
            Log { .. } => return None,
            Assert => -1,
        })
    }

    /// Whether executing this instruction can have an observable effect
    /// beyond the operand stack (storage write, log, external call, revert).
    /// The optimizer's dead-code-elimination pass must never remove one of
    /// these even if its result is unused (spec.md §4.5 "never reorders or
    /// removes an operation with an observable side effect").
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            Opcode::SStore
                | Opcode::TStore
                | Opcode::MStore
                | Opcode::CodeCopy
                | Opcode::CallExternal
                | Opcode::CallDelegate
                | Opcode::CallStatic
                | Opcode::Log { .. }
                | Opcode::Revert
                | Opcode::Assert
                | Opcode::Return
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_arithmetic_ops_consume_two_produce_one() {
        assert_eq!(Opcode::AddChecked.stack_delta(), Some(-1));
        assert_eq!(Opcode::MulWrap.stack_delta(), Some(-1));
    }

    #[test]
    fn storage_writes_are_side_effecting() {
        assert!(Opcode::SStore.has_side_effect());
        assert!(!Opcode::SLoad.has_side_effect());
    }
}
