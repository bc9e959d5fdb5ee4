use std::collections::{BTreeMap, BTreeSet};

use crate::{
    disassembler::{
        binary_block::{BasicBlock, BlockId},
        functions::Function,
        jump_tables::TableScan,
        Disassembly,
    },
    snes_utils::addr::AddrSnes,
};

// -------------------------------------------------------------------------------------------------

pub struct ControlFlowGraph {
    pub blocks:       BTreeMap<BlockId, BasicBlock>,
    pub entry_points: BTreeSet<BlockId>,
    /// Keyed by function start address; filled in by the function detector.
    pub functions:    BTreeMap<AddrSnes, Function>,
}

impl ControlFlowGraph {
    pub fn block_at(&self, start: AddrSnes) -> Option<&BasicBlock> {
        self.blocks.get(&BlockId::from(start))
    }

    /// The block whose address range contains `addr`.
    pub fn block_containing(&self, addr: AddrSnes) -> Option<&BasicBlock> {
        self.blocks.range(..=BlockId::from(addr)).next_back().map(|(_, b)| b).filter(|b| b.contains(addr))
    }

    /// The function owning the block that contains `addr`.
    pub fn function_containing(&self, addr: AddrSnes) -> Option<AddrSnes> {
        let block = self.block_containing(addr)?;
        self.functions.values().find(|f| f.blocks.contains(&block.id)).map(|f| f.start)
    }
}

// -------------------------------------------------------------------------------------------------

/// Derives successor edges from each block's last instruction, then computes
/// the mutual predecessor sets in a second pass.
///
/// Subroutine calls contribute no caller-to-callee edge: the callee is marked
/// as a function entry and the call is recorded by the cross-reference pass.
pub fn build_cfg(disasm: &Disassembly, blocks: Vec<BasicBlock>, tables: &TableScan) -> ControlFlowGraph {
    let mut graph: BTreeMap<BlockId, BasicBlock> = blocks.into_iter().map(|b| (b.id, b)).collect();
    let block_starts: BTreeSet<AddrSnes> = graph.values().map(|b| b.start).collect();

    let resolve = |addr: AddrSnes| block_starts.contains(&addr).then(|| BlockId::from(addr));

    let mut call_targets: Vec<AddrSnes> = Vec::new();
    for block in graph.values_mut() {
        let last = *block.last_instruction();
        let mnemonic = last.opcode.mnemonic;
        let mut successors = BTreeSet::new();

        if mnemonic.is_single_path_leap() && !last.is_indirect_jump() {
            if let Some(id) = last.static_jump_target().and_then(resolve) {
                successors.insert(id);
            }
        } else if mnemonic.is_double_path() {
            successors.extend(last.static_jump_target().and_then(resolve));
            successors.extend(resolve(last.next_addr()));
        } else if mnemonic.is_subroutine_call() {
            successors.extend(resolve(last.next_addr()));
            if let Some(target) = last.static_jump_target() {
                call_targets.push(target);
            }
        } else if mnemonic.is_subroutine_return() {
            block.is_function_exit = true;
        } else if last.is_indirect_jump() {
            if let Some(targets) = tables.targets_of(last.addr) {
                successors.extend(targets.iter().copied().filter_map(resolve));
            }
        } else {
            // Interrupt-class terminators and plain boundary cuts fall through.
            successors.extend(resolve(last.next_addr()));
        }

        block.successors = successors;
    }

    for target in call_targets {
        if let Some(block) = graph.get_mut(&BlockId::from(target)) {
            block.is_function_entry = true;
        }
    }

    // Mutual predecessor sets.
    let edges: Vec<(BlockId, BlockId)> =
        graph.values().flat_map(|b| b.successors.iter().map(move |&s| (b.id, s))).collect();
    for (from, to) in edges {
        if let Some(block) = graph.get_mut(&to) {
            block.predecessors.insert(from);
        }
    }

    let entry_points = disasm.seeds.iter().filter_map(|&s| resolve(s)).collect();

    ControlFlowGraph { blocks: graph, entry_points, functions: BTreeMap::new() }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cartridge::{CartridgeType, Mapper},
        disassembler::{binary_block::build_blocks, disassemble, jump_tables::scan_tables},
        internal_header::MapMode,
        snes_utils::rom::Rom,
        CancellationToken,
    };

    fn analyse(code: &[u8]) -> (Disassembly, ControlFlowGraph) {
        let mut data = vec![0u8; 0x8000];
        data[..code.len()].copy_from_slice(code);
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        let disasm = disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();
        let tables = scan_tables(&disasm, &rom, mapper);
        let mut boundaries: BTreeSet<AddrSnes> = disasm.seeds.iter().copied().collect();
        boundaries.extend(disasm.flow_targets.iter().copied());
        let blocks = build_blocks(&disasm.lines, &boundaries);
        let cfg = build_cfg(&disasm, blocks, &tables);
        (disasm, cfg)
    }

    #[test]
    fn conditional_branch_has_two_successors() {
        // $8000: BEQ $8004 / NOP / RTS($8003)... layout: BEQ(2) NOP(1) RTS(1) RTS(1)
        let (_, cfg) = analyse(&[0xF0, 0x02, 0xEA, 0x60, 0x60]);
        let entry = cfg.block_at(AddrSnes(0x008000)).unwrap();
        assert_eq!(entry.successors.len(), 2);
        assert!(entry.successors.contains(&BlockId(0x8002)));
        assert!(entry.successors.contains(&BlockId(0x8004)));
    }

    #[test]
    fn predecessors_mirror_successors() {
        let (_, cfg) = analyse(&[0xF0, 0x02, 0xEA, 0x60, 0x60]);
        for block in cfg.blocks.values() {
            for succ in &block.successors {
                assert!(cfg.blocks[succ].predecessors.contains(&block.id), "{} -> {}", block.id, succ);
            }
            for pred in &block.predecessors {
                assert!(cfg.blocks[pred].successors.contains(&block.id));
            }
        }
    }

    #[test]
    fn calls_mark_function_entries_without_edges() {
        // JSR $8004 / RTS / RTS
        let (_, cfg) = analyse(&[0x20, 0x04, 0x80, 0x60, 0x60]);
        let caller = cfg.block_at(AddrSnes(0x008000)).unwrap();
        assert_eq!(caller.successors.len(), 1);
        assert!(caller.successors.contains(&BlockId(0x8003)));
        let callee = cfg.block_at(AddrSnes(0x008004)).unwrap();
        assert!(callee.is_function_entry);
        assert!(!caller.successors.contains(&callee.id));
    }

    #[test]
    fn returns_mark_function_exits() {
        let (_, cfg) = analyse(&[0x60]);
        let block = cfg.block_at(AddrSnes(0x008000)).unwrap();
        assert!(block.is_function_exit);
        assert!(block.successors.is_empty());
    }
}
