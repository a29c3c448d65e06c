//! Bytecode finalizer and peephole optimizer (spec.md §4.7): the pipeline's
//! last stage, run once per module on `codegen::generate`'s output.
//!
//! Resolves jump/call targets from opcode-vector indices to byte offsets in
//! the final encoded stream, applies the peephole rules, strips code made
//! unreachable by an unconditional terminator, and assembles the deploy and
//! runtime byte strings. `emit.rs` already resolved label placeholders to
//! indices; this module performs the second, byte-level fix-up its own doc
//! comment defers to here.
//!
//! Unlike the target this pipeline is modeled on, `Jump`/`JumpIf`/
//! `CallInternal`/`ImmutableLoad` carry their resolved address as a fixed
//! `u32` field on the opcode itself rather than via a separate `push`
//! immediately before an implicit jump — so an address's encoded width never
//! depends on its own value, and a single forward pass computes every byte
//! offset. The iterate-to-fixed-point sizing spec.md §4.6 describes for a
//! push-then-jump encoding does not arise here; see DESIGN.md.

use std::collections::HashSet;

use crate::diagnostics::{Diagnostic, Span};
use crate::opcode::Opcode;
use crate::sourcemap::SourceMap;

use super::CodegenOutput;

/// The deploy stub pushes three words (dest offset, length, code offset) onto
/// the stack before `CodeCopy`/`Return`; this is the order `CodeCopy`'s doc
/// comment documents (top to bottom: len, code_offset, dest_offset), so the
/// words are pushed in reverse.
const WORD_PUSH_WIDTH: usize = 4;

pub struct FinalizedOutput {
    pub deploy_bytecode: Vec<u8>,
    pub runtime_bytecode: Vec<u8>,
    pub source_map: SourceMap,
}

/// Run the finalizer over one module's assembled instruction stream.
pub fn finalize(output: CodegenOutput) -> Result<FinalizedOutput, Diagnostic> {
    let CodegenOutput { opcodes, source_map, constructor_start, runtime_start } = output;

    let (opcodes, source_map, constructor_start, runtime_start) =
        run_peephole(opcodes, source_map, constructor_start, runtime_start);

    // The finalizer only ever assembles already-scheduled code; an empty
    // stream or a runtime_start past the end means an earlier stage produced
    // a malformed `CodegenOutput`.
    if runtime_start as usize > opcodes.len() {
        return Err(Diagnostic::ice(
            "ICE0800",
            Span::synthetic(),
            "runtime section start past end of assembled opcode stream",
        ));
    }

    let byte_offsets = compute_byte_offsets(&opcodes);
    let resolved = resolve_addresses(&opcodes, &byte_offsets);

    let runtime_bytecode: Vec<u8> = encode_all(&resolved[runtime_start as usize..]);

    let source_map = remap_source_map_to_bytes(source_map, &byte_offsets, runtime_start);

    let deploy_bytecode = match constructor_start {
        Some(start) => {
            let ctor_end = runtime_start as usize;
            let mut bytes = encode_all(&resolved[start as usize..ctor_end]);
            bytes.extend(deploy_stub(runtime_bytecode.len()));
            bytes.extend_from_slice(&runtime_bytecode);
            bytes
        }
        None => {
            let mut bytes = deploy_stub(runtime_bytecode.len());
            bytes.extend_from_slice(&runtime_bytecode);
            bytes
        }
    };

    Ok(FinalizedOutput { deploy_bytecode, runtime_bytecode, source_map })
}

/// The deploy-time stub: copy the runtime bytecode, appended as trailing
/// data immediately after this stub, into memory and return it, per spec.md
/// §4.7's "push/codecopy/return stub". The stub's own length is constant, so
/// the code offset it copies from (its own end) is a compile-time constant.
///
/// The code-offset push always carries exactly one data byte: a stub this
/// small can never itself grow past 255 bytes, so its own encoded width
/// cannot depend on its own value the way a runtime jump target's would.
fn deploy_stub(runtime_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    // dest_offset = 0
    out.extend(encode(&Opcode::Push(vec![0])));
    // length = runtime_len
    out.extend(encode(&Opcode::Push(be_minimal(runtime_len as u64))));
    // code_offset, filled in once the stub's own encoded length is known.
    let code_offset_patch = out.len();
    out.extend(encode(&Opcode::Push(vec![0])));
    out.extend(encode(&Opcode::CodeCopy));
    out.extend(encode(&Opcode::Push(be_minimal(runtime_len as u64))));
    out.extend(encode(&Opcode::Push(vec![0])));
    out.extend(encode(&Opcode::Return));

    let code_offset = out.len();
    debug_assert!(code_offset <= u8::MAX as usize, "deploy stub grew past one byte of addressing");
    out[code_offset_patch + 2] = code_offset as u8;
    out
}

fn be_minimal(v: u64) -> Vec<u8> {
    if v == 0 {
        return vec![0];
    }
    let bytes = v.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap();
    bytes[first_nonzero..].to_vec()
}

// --- Peephole + dead-code fixpoint -----------------------------------------

fn run_peephole(
    mut opcodes: Vec<Opcode>,
    mut source_map: SourceMap,
    mut constructor_start: Option<u32>,
    mut runtime_start: u32,
) -> (Vec<Opcode>, SourceMap, Option<u32>, u32) {
    loop {
        let mut changed = collapse_jump_chains(&mut opcodes);

        if let Some((new_opcodes, remap)) = coalesce_pass(&opcodes) {
            opcodes = new_opcodes;
            apply_remap_everywhere(&remap, &mut opcodes, &mut source_map, &mut constructor_start, &mut runtime_start);
            changed = true;
        }

        let mut entry_points = vec![runtime_start];
        if let Some(c) = constructor_start {
            entry_points.push(c);
        }
        let targeted = targeted_indices(&opcodes, &entry_points);
        if let Some((new_opcodes, remap)) = remove_unreachable(&opcodes, &targeted) {
            opcodes = new_opcodes;
            apply_remap_everywhere(&remap, &mut opcodes, &mut source_map, &mut constructor_start, &mut runtime_start);
            changed = true;
        }

        if !changed {
            break;
        }
    }
    (opcodes, source_map, constructor_start, runtime_start)
}

fn target_of(op: &Opcode) -> Option<u32> {
    match op {
        Opcode::Jump(t) | Opcode::JumpIf(t) | Opcode::CallInternal(t) => Some(*t),
        _ => None,
    }
}

fn targeted_indices(opcodes: &[Opcode], extra: &[u32]) -> HashSet<u32> {
    let mut set: HashSet<u32> = extra.iter().copied().collect();
    for op in opcodes {
        if let Some(t) = target_of(op) {
            set.insert(t);
        }
    }
    set
}

/// "Jump-to-jump chains are collapsed": if `Jump`/`JumpIf`/`CallInternal`
/// targets a `JumpDest` immediately followed by an unconditional `Jump`,
/// redirect straight to that jump's own target. Pure retargeting — it never
/// changes the opcode vector's length, only its `Jump`/`JumpIf`/
/// `CallInternal` operands, so indices stay valid throughout.
fn collapse_jump_chains(opcodes: &mut [Opcode]) -> bool {
    let mut changed = false;
    for i in 0..opcodes.len() {
        let Some(mut target) = target_of(&opcodes[i]) else { continue };
        let original = target;
        let mut hops = 0;
        // Bound the chase so a cyclic chain (which a well-formed program
        // never emits) can't loop forever.
        while hops < opcodes.len() {
            let next_idx = target as usize + 1;
            match opcodes.get(next_idx) {
                Some(Opcode::Jump(t2)) if matches!(opcodes.get(target as usize), Some(Opcode::JumpDest)) => {
                    target = *t2;
                    hops += 1;
                }
                _ => break,
            }
        }
        if target != original {
            match &mut opcodes[i] {
                Opcode::Jump(t) | Opcode::JumpIf(t) | Opcode::CallInternal(t) => *t = target,
                _ => unreachable!(),
            }
            changed = true;
        }
    }
    changed
}

/// Old-index -> new-index map; `None` for an index whose instruction was
/// removed.
type Remap = Vec<Option<u32>>;

fn coalesce_pass(opcodes: &[Opcode]) -> Option<(Vec<Opcode>, Remap)> {
    let mut out = Vec::with_capacity(opcodes.len());
    let mut remap: Remap = vec![None; opcodes.len()];
    let mut changed = false;
    let mut i = 0;
    while i < opcodes.len() {
        // push X; pop -> (empty)
        if matches!(opcodes[i], Opcode::Push(_)) && matches!(opcodes.get(i + 1), Some(Opcode::Pop)) {
            i += 2;
            changed = true;
            continue;
        }
        // swap1; swap1 -> (empty)
        if matches!(opcodes[i], Opcode::Swap(1)) && matches!(opcodes.get(i + 1), Some(Opcode::Swap(1))) {
            i += 2;
            changed = true;
            continue;
        }
        // dup1; pop -> (empty)
        if matches!(opcodes[i], Opcode::Dup(0)) && matches!(opcodes.get(i + 1), Some(Opcode::Pop)) {
            i += 2;
            changed = true;
            continue;
        }
        // push V; push V; swap1 -> push V; dup1
        if let (Opcode::Push(a), Some(Opcode::Push(b)), Some(Opcode::Swap(1))) =
            (&opcodes[i], opcodes.get(i + 1), opcodes.get(i + 2))
        {
            if a == b {
                remap[i] = Some(out.len() as u32);
                out.push(Opcode::Push(a.clone()));
                out.push(Opcode::Dup(0));
                i += 3;
                changed = true;
                continue;
            }
        }
        remap[i] = Some(out.len() as u32);
        out.push(opcodes[i].clone());
        i += 1;
    }
    if changed {
        Some((out, remap))
    } else {
        None
    }
}

/// "Unreachable code following an unconditional terminator and not reachable
/// by any label is removed": scan forward, and once an unconditional
/// terminator is hit, drop everything up to (not including) the next index
/// present in `targeted`.
fn remove_unreachable(opcodes: &[Opcode], targeted: &HashSet<u32>) -> Option<(Vec<Opcode>, Remap)> {
    let mut out = Vec::with_capacity(opcodes.len());
    let mut remap: Remap = vec![None; opcodes.len()];
    let mut changed = false;
    let mut i = 0;
    while i < opcodes.len() {
        remap[i] = Some(out.len() as u32);
        out.push(opcodes[i].clone());
        if is_unconditional_terminator(&opcodes[i]) {
            let mut j = i + 1;
            while j < opcodes.len() && !targeted.contains(&(j as u32)) {
                changed = true;
                j += 1;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    if changed {
        Some((out, remap))
    } else {
        None
    }
}

fn is_unconditional_terminator(op: &Opcode) -> bool {
    matches!(op, Opcode::Jump(_) | Opcode::Return | Opcode::Revert)
}

fn apply_remap_everywhere(
    remap: &Remap,
    opcodes: &mut [Opcode],
    source_map: &mut SourceMap,
    constructor_start: &mut Option<u32>,
    runtime_start: &mut u32,
) {
    for op in opcodes.iter_mut() {
        match op {
            Opcode::Jump(t) | Opcode::JumpIf(t) | Opcode::CallInternal(t) => {
                if let Some(new) = remap[*t as usize] {
                    *t = new;
                }
            }
            _ => {}
        }
    }
    source_map.entries.retain_mut(|entry| match remap[entry.opcode_index as usize] {
        Some(new) => {
            entry.opcode_index = new;
            true
        }
        None => false,
    });
    if let Some(c) = constructor_start {
        if let Some(new) = remap[*c as usize] {
            *c = new;
        }
    }
    if let Some(new) = remap[*runtime_start as usize] {
        *runtime_start = new;
    }
}

// --- Byte-level encoding -----------------------------------------------------

fn compute_byte_offsets(opcodes: &[Opcode]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(opcodes.len() + 1);
    let mut pos = 0u32;
    for op in opcodes {
        offsets.push(pos);
        pos += encoded_len(op) as u32;
    }
    offsets.push(pos);
    offsets
}

fn encoded_len(op: &Opcode) -> usize {
    match op {
        Opcode::Push(data) => 2 + data.len(),
        Opcode::Dup(_) | Opcode::Swap(_) | Opcode::Log { .. } | Opcode::Env(_) => 2,
        Opcode::Jump(_) | Opcode::JumpIf(_) | Opcode::CallInternal(_) | Opcode::ImmutableLoad(_) => {
            1 + WORD_PUSH_WIDTH
        }
        _ => 1,
    }
}

fn resolve_addresses(opcodes: &[Opcode], byte_offsets: &[u32]) -> Vec<Opcode> {
    opcodes
        .iter()
        .map(|op| match op {
            Opcode::Jump(t) => Opcode::Jump(byte_offsets[*t as usize]),
            Opcode::JumpIf(t) => Opcode::JumpIf(byte_offsets[*t as usize]),
            Opcode::CallInternal(t) => Opcode::CallInternal(byte_offsets[*t as usize]),
            other => other.clone(),
        })
        .collect()
}

fn encode_all(opcodes: &[Opcode]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in opcodes {
        out.extend(encode(op));
    }
    out
}

fn env_opcode_index(name: &str) -> u8 {
    match name {
        "ENV_SENDER" => 0,
        "ENV_VALUE" => 1,
        "ENV_CALLDATASIZE" => 2,
        "ENV_TIMESTAMP" => 3,
        "ENV_BLOCKNUM" => 4,
        "ENV_ORIGIN" => 5,
        "ENV_GASLEFT" => 6,
        "ENV_SELF" => 7,
        "ENV_CHAINID" => 8,
        other => unreachable!("unregistered env query opcode {other}"),
    }
}

/// Opcode tags for the 1-byte instruction header. Stable only within one
/// compilation; this crate does not promise byte-for-byte compatibility
/// across opcode-set versions.
#[repr(u8)]
enum Tag {
    Push = 0x00,
    Pop = 0x01,
    Dup = 0x02,
    Swap = 0x03,
    AddChecked = 0x10,
    SubChecked = 0x11,
    MulChecked = 0x12,
    DivChecked = 0x13,
    ModChecked = 0x14,
    AddWrap = 0x15,
    SubWrap = 0x16,
    MulWrap = 0x17,
    DivWrap = 0x18,
    ModWrap = 0x19,
    BitAnd = 0x20,
    BitOr = 0x21,
    BitXor = 0x22,
    BitNot = 0x23,
    Shl = 0x24,
    Shr = 0x25,
    Eq = 0x26,
    Lt = 0x27,
    Gt = 0x28,
    IsZero = 0x29,
    Jump = 0x30,
    JumpIf = 0x31,
    JumpDest = 0x32,
    Return = 0x33,
    Revert = 0x34,
    SLoad = 0x40,
    SStore = 0x41,
    TLoad = 0x42,
    TStore = 0x43,
    ImmutableLoad = 0x44,
    MLoad = 0x50,
    MStore = 0x51,
    CodeCopy = 0x52,
    CalldataLoad = 0x60,
    Keccak256 = 0x70,
    CallInternal = 0x80,
    CallExternal = 0x81,
    CallDelegate = 0x82,
    CallStatic = 0x83,
    Env = 0x90,
    Log = 0xa0,
    Assert = 0xb0,
}

fn encode(op: &Opcode) -> Vec<u8> {
    match op {
        Opcode::Push(data) => {
            let mut out = vec![Tag::Push as u8, data.len() as u8];
            out.extend_from_slice(data);
            out
        }
        Opcode::Pop => vec![Tag::Pop as u8],
        Opcode::Dup(n) => vec![Tag::Dup as u8, *n],
        Opcode::Swap(n) => vec![Tag::Swap as u8, *n],
        Opcode::AddChecked => vec![Tag::AddChecked as u8],
        Opcode::SubChecked => vec![Tag::SubChecked as u8],
        Opcode::MulChecked => vec![Tag::MulChecked as u8],
        Opcode::DivChecked => vec![Tag::DivChecked as u8],
        Opcode::ModChecked => vec![Tag::ModChecked as u8],
        Opcode::AddWrap => vec![Tag::AddWrap as u8],
        Opcode::SubWrap => vec![Tag::SubWrap as u8],
        Opcode::MulWrap => vec![Tag::MulWrap as u8],
        Opcode::DivWrap => vec![Tag::DivWrap as u8],
        Opcode::ModWrap => vec![Tag::ModWrap as u8],
        Opcode::BitAnd => vec![Tag::BitAnd as u8],
        Opcode::BitOr => vec![Tag::BitOr as u8],
        Opcode::BitXor => vec![Tag::BitXor as u8],
        Opcode::BitNot => vec![Tag::BitNot as u8],
        Opcode::Shl => vec![Tag::Shl as u8],
        Opcode::Shr => vec![Tag::Shr as u8],
        Opcode::Eq => vec![Tag::Eq as u8],
        Opcode::Lt => vec![Tag::Lt as u8],
        Opcode::Gt => vec![Tag::Gt as u8],
        Opcode::IsZero => vec![Tag::IsZero as u8],
        Opcode::Jump(addr) => word_instr(Tag::Jump as u8, *addr),
        Opcode::JumpIf(addr) => word_instr(Tag::JumpIf as u8, *addr),
        Opcode::JumpDest => vec![Tag::JumpDest as u8],
        Opcode::Return => vec![Tag::Return as u8],
        Opcode::Revert => vec![Tag::Revert as u8],
        Opcode::SLoad => vec![Tag::SLoad as u8],
        Opcode::SStore => vec![Tag::SStore as u8],
        Opcode::TLoad => vec![Tag::TLoad as u8],
        Opcode::TStore => vec![Tag::TStore as u8],
        Opcode::ImmutableLoad(offset) => word_instr(Tag::ImmutableLoad as u8, *offset),
        Opcode::MLoad => vec![Tag::MLoad as u8],
        Opcode::MStore => vec![Tag::MStore as u8],
        Opcode::CodeCopy => vec![Tag::CodeCopy as u8],
        Opcode::CalldataLoad => vec![Tag::CalldataLoad as u8],
        Opcode::Keccak256 => vec![Tag::Keccak256 as u8],
        Opcode::CallInternal(addr) => word_instr(Tag::CallInternal as u8, *addr),
        Opcode::CallExternal => vec![Tag::CallExternal as u8],
        Opcode::CallDelegate => vec![Tag::CallDelegate as u8],
        Opcode::CallStatic => vec![Tag::CallStatic as u8],
        Opcode::Env(name) => vec![Tag::Env as u8, env_opcode_index(name)],
        Opcode::Log { topic_count } => vec![Tag::Log as u8, *topic_count],
        Opcode::Assert => vec![Tag::Assert as u8],
    }
}

fn word_instr(tag: u8, addr: u32) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&addr.to_be_bytes());
    out
}

fn remap_source_map_to_bytes(mut source_map: SourceMap, byte_offsets: &[u32], runtime_start: u32) -> SourceMap {
    source_map.entries.retain_mut(|entry| {
        if entry.opcode_index < runtime_start {
            return false;
        }
        let byte_index = byte_offsets[entry.opcode_index as usize] - byte_offsets[runtime_start as usize];
        entry.opcode_index = byte_index;
        true
    });
    source_map.entries.sort_by_key(|e| e.opcode_index);
    source_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::sourcemap::JumpKind;

    fn basic_output(opcodes: Vec<Opcode>, runtime_start: u32) -> CodegenOutput {
        CodegenOutput { opcodes, source_map: SourceMap::default(), constructor_start: None, runtime_start }
    }

    #[test]
    fn push_pop_pair_is_removed() {
        let opcodes =
            vec![Opcode::Push(vec![1]), Opcode::Pop, Opcode::Push(vec![2]), Opcode::Return];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        // push(2) [tag + len + 1 data byte = 3 bytes] + return [1 byte]
        assert_eq!(out.runtime_bytecode.len(), 4);
    }

    #[test]
    fn swap_swap_pair_is_removed() {
        let opcodes = vec![Opcode::Swap(1), Opcode::Swap(1), Opcode::Return];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        assert_eq!(out.runtime_bytecode, vec![Tag::Return as u8]);
    }

    #[test]
    fn dup_pop_pair_is_removed() {
        let opcodes = vec![Opcode::Dup(0), Opcode::Pop, Opcode::Return];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        assert_eq!(out.runtime_bytecode, vec![Tag::Return as u8]);
    }

    #[test]
    fn duplicate_push_swap_becomes_push_dup() {
        let opcodes =
            vec![Opcode::Push(vec![9]), Opcode::Push(vec![9]), Opcode::Swap(1), Opcode::Return];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        assert_eq!(
            out.runtime_bytecode,
            vec![Tag::Push as u8, 1, 9, Tag::Dup as u8, 0, Tag::Return as u8]
        );
    }

    #[test]
    fn unreachable_code_after_unconditional_jump_is_dropped() {
        // jump(2); push(99) [dead]; jumpdest; return
        let opcodes = vec![Opcode::Jump(2), Opcode::Push(vec![99]), Opcode::JumpDest, Opcode::Return];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        assert!(!out.runtime_bytecode.contains(&99));
    }

    #[test]
    fn code_targeted_by_a_label_survives_after_a_terminator() {
        // jumpdest(label A, also runtime_start); jump(label A) -- infinite loop,
        // but the point is the JumpDest right after Jump is kept because it is
        // the jump's own target.
        let opcodes = vec![Opcode::JumpDest, Opcode::Jump(0)];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        assert_eq!(out.runtime_bytecode.len(), 1 + 1 + 4);
    }

    #[test]
    fn jump_to_jump_chain_collapses_to_final_target() {
        // jump(1) -> jumpdest,jump(3) -> jumpdest,return
        let opcodes = vec![
            Opcode::Jump(1),
            Opcode::JumpDest,
            Opcode::Jump(3),
            Opcode::JumpDest,
            Opcode::Return,
        ];
        let out = finalize(basic_output(opcodes, 0)).unwrap();
        // first jump's resolved address must equal the final jumpdest's byte
        // offset, not the intermediate one.
        let addr = u32::from_be_bytes([
            out.runtime_bytecode[1],
            out.runtime_bytecode[2],
            out.runtime_bytecode[3],
            out.runtime_bytecode[4],
        ]);
        let final_dest_offset = out
            .runtime_bytecode
            .iter()
            .position(|b| *b == Tag::Return as u8)
            .unwrap() as u32
            - 1; // the JumpDest byte immediately before Return
        assert_eq!(addr, final_dest_offset);
    }

    #[test]
    fn source_map_entries_are_rebased_to_runtime_start_in_bytes() {
        let mut source_map = SourceMap::default();
        source_map.push(0, Span::new(0, 0, 1), JumpKind::Regular);
        source_map.push(1, Span::new(0, 1, 2), JumpKind::Regular);
        let output = CodegenOutput {
            opcodes: vec![Opcode::Push(vec![1]), Opcode::Return],
            source_map,
            constructor_start: None,
            runtime_start: 0,
        };
        let out = finalize(output).unwrap();
        assert_eq!(out.source_map.entries[0].opcode_index, 0);
        assert_eq!(out.source_map.entries[1].opcode_index, 3); // push(1) encodes to tag+len+1 data byte
    }

    #[test]
    fn deploy_bytecode_embeds_runtime_bytecode_as_trailing_data() {
        let output = CodegenOutput {
            opcodes: vec![Opcode::Push(vec![1]), Opcode::Return],
            source_map: SourceMap::default(),
            constructor_start: None,
            runtime_start: 0,
        };
        let out = finalize(output).unwrap();
        assert!(out.deploy_bytecode.ends_with(&out.runtime_bytecode));
        assert!(out.deploy_bytecode.len() > out.runtime_bytecode.len());
    }

    #[test]
    fn peephole_is_idempotent() {
        let opcodes = vec![
            Opcode::Push(vec![1]),
            Opcode::Pop,
            Opcode::Swap(1),
            Opcode::Swap(1),
            Opcode::Push(vec![3]),
            Opcode::Return,
        ];
        let (once, _, _, _) = run_peephole(opcodes.clone(), SourceMap::default(), None, 0);
        let (twice, _, _, _) = run_peephole(once.clone(), SourceMap::default(), None, 0);
        assert_eq!(once, twice);
    }
}
