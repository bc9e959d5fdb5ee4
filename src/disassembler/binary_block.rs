use std::{
    collections::BTreeSet,
    fmt,
};

use crate::{
    disassembler::instruction::Instruction,
    snes_utils::addr::{AddrInner, AddrSnes},
};

// -------------------------------------------------------------------------------------------------

/// Stable block identifier derived from the block's start address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub AddrInner);

impl From<AddrSnes> for BlockId {
    fn from(addr: AddrSnes) -> Self {
        Self(addr.0)
    }
}

impl BlockId {
    pub fn addr(self) -> AddrSnes {
        AddrSnes(self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blk_{:06X}", self.0)
    }
}

/// A maximal straight-line run of instructions. Only the last instruction may
/// transfer control; predecessor/successor sets are kept mutual by the CFG
/// builder.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id:                BlockId,
    pub start:             AddrSnes,
    /// Address of the last byte of the block, inclusive.
    pub end:               AddrSnes,
    pub instructions:      Vec<Instruction>,
    pub predecessors:      BTreeSet<BlockId>,
    pub successors:        BTreeSet<BlockId>,
    pub is_function_entry: bool,
    pub is_function_exit:  bool,
}

impl BasicBlock {
    fn from_run(instructions: Vec<Instruction>) -> Self {
        let start = instructions.first().expect("empty basic block").addr;
        let end = instructions.last().expect("empty basic block").next_addr() - 1u32;
        Self {
            id: start.into(),
            start,
            end,
            instructions,
            predecessors: BTreeSet::new(),
            successors: BTreeSet::new(),
            is_function_entry: false,
            is_function_exit: false,
        }
    }

    pub fn last_instruction(&self) -> &Instruction {
        self.instructions.last().expect("empty basic block")
    }

    pub fn byte_len(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }

    pub fn contains(&self, addr: AddrSnes) -> bool {
        self.start <= addr && addr <= self.end
    }
}

// -------------------------------------------------------------------------------------------------

/// Cuts an address-ordered line list into basic blocks.
///
/// A cut happens at every seed, at every recorded flow target, after every
/// control-flow instruction, and wherever the line list has an address gap.
pub fn build_blocks(lines: &[Instruction], boundaries: &BTreeSet<AddrSnes>) -> Vec<BasicBlock> {
    let mut blocks = Vec::new();
    let mut run: Vec<Instruction> = Vec::new();

    for insn in lines {
        let gap = run.last().map_or(false, |prev: &Instruction| prev.next_addr() != insn.addr);
        if !run.is_empty() && (gap || boundaries.contains(&insn.addr)) {
            blocks.push(BasicBlock::from_run(std::mem::take(&mut run)));
        }
        let terminates = insn.opcode.mnemonic.can_change_program_counter();
        run.push(*insn);
        if terminates {
            blocks.push(BasicBlock::from_run(std::mem::take(&mut run)));
        }
    }
    if !run.is_empty() {
        blocks.push(BasicBlock::from_run(run));
    }
    blocks
}

// -------------------------------------------------------------------------------------------------

/// What a recognized region of the image holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataKind {
    PointerTable,
    JumpTable,
    StringTable,
    GraphicsData,
    MusicData,
    MapData,
    SpriteData,
    TileData,
    LevelData,
    PaletteData,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A recognized data structure, indexed by the pattern matcher.
#[derive(Clone, Debug)]
pub struct DataStructure {
    pub addr:        AddrSnes,
    pub kind:        DataKind,
    pub size:        usize,
    pub entry_count: usize,
    pub description: String,
    pub confidence:  f32,
    pub format:      Option<String>,
}

impl DataStructure {
    pub fn end(&self) -> AddrSnes {
        self.addr + self.size as AddrInner
    }

    pub fn overlaps(&self, other: &DataStructure) -> bool {
        self.addr < other.end() && other.addr < self.end()
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{disassembler::processor::Processor, snes_utils::addr::AddrPc};

    fn decode_all(code: &[u8], base: AddrSnes) -> Vec<Instruction> {
        let mut processor = Processor::new();
        let mut out = Vec::new();
        let mut rest = code;
        let mut addr = base;
        let mut offset = AddrPc(0);
        while !rest.is_empty() {
            let (insn, new_rest) = Instruction::parse(rest, addr, offset, processor.flags).unwrap();
            processor.execute(&insn);
            addr += insn.size() as u32;
            offset += insn.size() as u32;
            rest = new_rest;
            out.push(insn);
        }
        out
    }

    #[test]
    fn terminators_and_targets_cut_blocks() {
        // $8000: LDA #$00 / BEQ $8006 / NOP / NOP / RTS
        let code = [0xA9, 0x00, 0xF0, 0x02, 0xEA, 0xEA, 0x60];
        let lines = decode_all(&code, AddrSnes(0x008000));
        let boundaries: BTreeSet<AddrSnes> = [AddrSnes(0x008000), AddrSnes(0x008006)].into_iter().collect();
        let blocks = build_blocks(&lines, &boundaries);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].start, AddrSnes(0x008000));
        assert_eq!(blocks[0].end, AddrSnes(0x008003));
        assert_eq!(blocks[1].start, AddrSnes(0x008004));
        assert_eq!(blocks[2].start, AddrSnes(0x008006));
        for block in &blocks {
            let total: usize = block.instructions.iter().map(|i| i.size()).sum();
            assert_eq!(total, block.byte_len());
        }
    }

    #[test]
    fn only_last_instruction_transfers_control() {
        let code = [0xA9, 0x00, 0x4C, 0x00, 0x80, 0xEA];
        let lines = decode_all(&code, AddrSnes(0x008000));
        let blocks = build_blocks(&lines, &BTreeSet::new());
        for block in &blocks {
            for insn in &block.instructions[..block.instructions.len() - 1] {
                assert!(!insn.opcode.mnemonic.can_change_program_counter());
            }
        }
    }

    #[test]
    fn address_gaps_cut_blocks() {
        let mut lines = decode_all(&[0xA9, 0x00, 0xEA], AddrSnes(0x008000));
        lines.extend(decode_all(&[0xEA, 0x60], AddrSnes(0x009000)));
        let blocks = build_blocks(&lines, &BTreeSet::new());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].start, AddrSnes(0x009000));
    }
}
