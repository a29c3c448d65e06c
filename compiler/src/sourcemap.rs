//! Source map: the opcode-index -> source-span artifact spec.md §6 requires
//! ("a sequence, one entry per opcode index in the runtime bytecode, of
//! (source-file-id, source-offset, source-length, jump-kind)").

use serde::Serialize;

use crate::diagnostics::Span;

/// Whether an opcode is a jump into a callee, a return out of one, or an
/// ordinary sequential/branch instruction — distinguished so a debugger can
/// render a call stack rather than a flat instruction trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpKind {
    Into,
    OutOf,
    Regular,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceMapEntry {
    pub opcode_index: u32,
    pub span: Span,
    pub jump_kind: JumpKind,
}

/// One module's finished source map: exactly one entry per opcode emitted
/// into the runtime bytecode, in ascending `opcode_index` order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

impl SourceMap {
    pub fn push(&mut self, opcode_index: u32, span: Span, jump_kind: JumpKind) {
        self.entries.push(SourceMapEntry { opcode_index, span, jump_kind });
    }

    /// Look up the span covering a given opcode index, used by a VM trace
    /// decoder to map a reverting program counter back to source.
    pub fn span_at(&self, opcode_index: u32) -> Option<Span> {
        self.entries.iter().find(|e| e.opcode_index == opcode_index).map(|e| e.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_lookup_finds_the_matching_entry() {
        let mut map = SourceMap::default();
        map.push(0, Span::new(0, 0, 4), JumpKind::Regular);
        map.push(1, Span::new(0, 4, 10), JumpKind::Into);
        assert_eq!(map.span_at(1), Some(Span::new(0, 4, 10)));
        assert_eq!(map.span_at(5), None);
    }
}
