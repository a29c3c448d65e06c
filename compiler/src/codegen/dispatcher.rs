//! External dispatcher: the module's entry stub, which reads the 4-byte
//! selector out of calldata and jumps to the matching externally reachable
//! function after decoding its ABI-encoded arguments (spec.md §4.6,
//! generalized from the teacher's word-table dispatch to a selector decision
//! tree since this target has no shared jump-table instruction).
//!
//! Functions are tried in source-declaration order — this pipeline has no
//! call-frequency profile to order by, so spec.md §4.6's "frequency-ordered
//! if available, else source order" always falls to the latter here.
//! Internal-only functions contribute no branch at all (spec.md §8 scenario
//! 6, "dispatcher dead code").

use crate::codegen::emit::{Emitter, LabelId};
use crate::ir::IrFunction;
use crate::opcode::Opcode;

/// The selector occupies the first calldata word, left-aligned the way every
/// other word this target passes around is (high bytes first); ABI-encoded
/// arguments follow, one 32-byte word each, starting at offset 32.
const ARGS_BASE_OFFSET: u32 = 32;
const SELECTOR_SHIFT_BITS: u32 = 224;

/// Emit the dispatcher at the emitter's current position (the module's entry
/// point) and return the label placed at its unmatched-selector fallback, in
/// case a caller wants to also wire a constructor's post-deploy jump past it.
///
/// `labels[i]` must be the entry label already reserved for `functions[i]`.
pub fn emit_dispatcher(functions: &[IrFunction], labels: &[LabelId], emitter: &mut Emitter) {
    emitter.emit(Opcode::Push(vec![0]));
    emitter.emit(Opcode::CalldataLoad);
    emitter.emit(Opcode::Push(vec![(SELECTOR_SHIFT_BITS / 8) as u8]));
    emitter.emit(Opcode::Shr);

    let mut stubs = Vec::new();
    for (index, f) in functions.iter().enumerate() {
        let Some(selector) = f.selector else { continue };
        let stub_label = emitter.new_label();
        emitter.emit(Opcode::Dup(0));
        emitter.emit(Opcode::Push(selector.to_vec()));
        emitter.emit(Opcode::Eq);
        emitter.jump_if(stub_label);
        stubs.push((stub_label, index, f));
    }

    // No selector matched: revert with no data.
    emitter.emit(Opcode::Pop);
    emitter.emit(Opcode::Push(vec![0]));
    emitter.emit(Opcode::Revert);

    for (stub_label, index, f) in stubs {
        emitter.place_label(stub_label);
        // Discard the selector word duplicated for every comparison above;
        // the match itself already consumed only its own `Dup`ed copy.
        emitter.emit(Opcode::Pop);
        for arg in 0..f.param_count {
            emitter.emit(Opcode::Push(vec![
                ((ARGS_BASE_OFFSET + arg * 32) >> 24) as u8,
                ((ARGS_BASE_OFFSET + arg * 32) >> 16) as u8,
                ((ARGS_BASE_OFFSET + arg * 32) >> 8) as u8,
                (ARGS_BASE_OFFSET + arg * 32) as u8,
            ]));
            emitter.emit(Opcode::CalldataLoad);
        }
        emitter.call_internal(labels[index]);
        for _ in 0..f.param_count {
            emitter.emit(Opcode::Swap(1));
            emitter.emit(Opcode::Pop);
        }
        emitter.emit(Opcode::Return);
    }
}
