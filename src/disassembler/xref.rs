use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    disassembler::{instruction::Instruction, jump_tables::TableScan, Disassembly},
    snes_utils::addr::AddrSnes,
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
    Jump,
    Call,
}

#[derive(Clone, Debug)]
pub struct CrossRef {
    pub target:      AddrSnes,
    pub source:      AddrSnes,
    pub kind:        AccessKind,
    /// Rendered disassembly of the referencing instruction.
    pub source_text: String,
}

/// Target-keyed index of references, each bucket in program order of sources.
#[derive(Default)]
pub struct CrossRefIndex {
    buckets: BTreeMap<AddrSnes, Vec<CrossRef>>,
}

impl CrossRefIndex {
    pub fn references_to(&self, target: AddrSnes) -> &[CrossRef] {
        self.buckets.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn targets(&self) -> impl Iterator<Item = AddrSnes> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddrSnes, &Vec<CrossRef>)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------

pub fn classify_access(insn: &Instruction) -> AccessKind {
    let mnemonic = insn.opcode.mnemonic;
    if mnemonic.is_subroutine_call() {
        AccessKind::Call
    } else if mnemonic.is_branch_or_jump() {
        AccessKind::Jump
    } else if mnemonic.is_memory_read() {
        AccessKind::Read
    } else if mnemonic.is_memory_write() {
        AccessKind::Write
    } else {
        AccessKind::Execute
    }
}

/// Indexes every line whose operand names an address, plus the resolved
/// entries of recognized jump tables. Bucket order follows the line order of
/// the walk, which is CPU address order.
pub fn build_xref_index(disasm: &Disassembly, tables: &TableScan) -> CrossRefIndex {
    let mut index = CrossRefIndex::default();
    for insn in &disasm.lines {
        // Immediates name values, not addresses.
        let target = match insn.static_jump_target() {
            Some(target) => Some(target),
            None => insn.operand_address(),
        };
        let Some(target) = target else { continue };
        index.buckets.entry(target).or_default().push(CrossRef {
            target,
            source: insn.addr,
            kind: classify_access(insn),
            source_text: insn.display().to_string(),
        });
    }
    for table in &tables.jump_tables {
        let Some(source) = disasm.line_at(table.head) else { continue };
        for &target in &table.entries {
            index.buckets.entry(target).or_default().push(CrossRef {
                target,
                source: source.addr,
                kind: AccessKind::Jump,
                source_text: source.display().to_string(),
            });
        }
    }
    index
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cartridge::{CartridgeType, Mapper},
        disassembler::disassemble,
        internal_header::MapMode,
        snes_utils::rom::Rom,
        CancellationToken,
    };

    fn index_of(code: &[u8]) -> CrossRefIndex {
        let mut data = vec![0u8; 0x8000];
        data[..code.len()].copy_from_slice(code);
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        let disasm = disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();
        let tables = crate::disassembler::jump_tables::scan_tables(&disasm, &rom, mapper);
        build_xref_index(&disasm, &tables)
    }

    #[test]
    fn call_and_jump_kinds_are_classified() {
        // JSR $8006 / JMP $8007 ; $8006: RTS ; $8007: RTS
        let index = index_of(&[0x20, 0x06, 0x80, 0x4C, 0x07, 0x80, 0x60, 0x60]);
        let calls = index.references_to(AddrSnes(0x008006));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, AccessKind::Call);
        let jumps = index.references_to(AddrSnes(0x008007));
        assert_eq!(jumps.len(), 1);
        assert_eq!(jumps[0].kind, AccessKind::Jump);
    }

    #[test]
    fn reads_and_writes_are_classified() {
        // LDA $1234 / STA $1234 / RTS
        let index = index_of(&[0xAD, 0x34, 0x12, 0x8D, 0x34, 0x12, 0x60]);
        let refs = index.references_to(AddrSnes(0x001234));
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, AccessKind::Read);
        assert_eq!(refs[1].kind, AccessKind::Write);
        // Program order of sources is preserved.
        assert!(refs[0].source < refs[1].source);
    }

    #[test]
    fn immediates_produce_no_references() {
        let index = index_of(&[0xA9, 0x42, 0x60]);
        assert!(index.references_to(AddrSnes(0x000042)).is_empty());
    }
}
