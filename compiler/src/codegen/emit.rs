//! Label placeholders and single-pass fix-up, the growable-buffer-plus-fixup
//! model spec.md §4.6 describes: "the emitter emits opcodes into a growable
//! buffer with label references as symbolic placeholders; after all code is
//! emitted, a fix-up pass resolves each label to its program-counter value."
//!
//! At this stage a "program-counter value" is an index into the emitted
//! `Opcode` vector, not yet a byte offset — every `Opcode` occupies exactly
//! one vector slot here regardless of its eventual encoded width, so label
//! resolution is a single linear pass rather than the iterate-to-fixed-point
//! pass spec.md describes. `finalizer.rs` performs that second, byte-level
//! fix-up once push-operand widths (which *do* vary with the resolved
//! address) are known.

use std::collections::HashMap;

use crate::opcode::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(u32);

enum Instr {
    Op(Opcode),
    Jump(LabelId),
    JumpIf(LabelId),
    CallInternal(LabelId),
    Label(LabelId),
}

/// Accumulates one module's worth of instructions across every function's
/// codegen pass, so internal calls and the dispatcher's branches can forward-
/// reference a function body emitted later in the same buffer.
pub struct Emitter {
    instrs: Vec<Instr>,
    next_label: u32,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter { instrs: Vec::new(), next_label: 0 }
    }

    pub fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    pub fn emit(&mut self, op: Opcode) {
        self.instrs.push(Instr::Op(op));
    }

    pub fn jump(&mut self, label: LabelId) {
        self.instrs.push(Instr::Jump(label));
    }

    pub fn jump_if(&mut self, label: LabelId) {
        self.instrs.push(Instr::JumpIf(label));
    }

    pub fn call_internal(&mut self, label: LabelId) {
        self.instrs.push(Instr::CallInternal(label));
    }

    pub fn place_label(&mut self, label: LabelId) {
        self.instrs.push(Instr::Label(label));
    }

    pub fn position(&self) -> u32 {
        self.instrs.len() as u32
    }

    /// Resolve every label placeholder to the opcode-vector index of its
    /// `JumpDest`, turning the placeholder stream into `Opcode`s the
    /// finalizer can serialize directly.
    pub fn finish(self) -> Vec<Opcode> {
        let mut positions: HashMap<u32, u32> = HashMap::new();
        let mut index = 0u32;
        for instr in &self.instrs {
            if let Instr::Label(LabelId(id)) = instr {
                positions.insert(*id, index);
            }
            index += 1;
        }
        self.instrs
            .into_iter()
            .map(|instr| match instr {
                Instr::Op(op) => op,
                Instr::Jump(LabelId(id)) => {
                    Opcode::Jump(*positions.get(&id).expect("unresolved jump label"))
                }
                Instr::JumpIf(LabelId(id)) => {
                    Opcode::JumpIf(*positions.get(&id).expect("unresolved jump-if label"))
                }
                Instr::CallInternal(LabelId(id)) => {
                    Opcode::CallInternal(*positions.get(&id).expect("unresolved call label"))
                }
                Instr::Label(_) => Opcode::JumpDest,
            })
            .collect()
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter::new()
    }
}
