use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use itertools::Itertools;

use crate::{
    disassembler::{
        binary_block::BlockId,
        cfg::ControlFlowGraph,
        jump_tables::{SwitchStatement, TableScan},
        opcodes::Mnemonic,
        Disassembly,
    },
    internal_header::InterruptKind,
    snes_utils::addr::AddrSnes,
};

#[rustfmt::skip]
pub mod confidence {
    pub const VECTOR_TARGET:      f32 = 1.0;
    pub const CALL_TARGET:        f32 = 0.9;
    pub const PROLOGUE:           f32 = 0.7;
    pub const JUMP_TABLE_TARGET:  f32 = 0.7;
    pub const DEAD_CODE_BOUNDARY: f32 = 0.6;
}

// -------------------------------------------------------------------------------------------------

/// A back edge inside one function.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Loop {
    pub head:  BlockId,
    pub latch: BlockId,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub start:             AddrSnes,
    pub end:               Option<AddrSnes>,
    /// Addresses of the calling instructions.
    pub callers:           BTreeSet<AddrSnes>,
    /// Start addresses of called functions.
    pub callees:           BTreeSet<AddrSnes>,
    pub blocks:            BTreeSet<BlockId>,
    pub is_interrupt:      bool,
    pub confidence:        f32,
    pub switch_statements: Vec<SwitchStatement>,
    pub loops:             Vec<Loop>,
}

impl Function {
    fn new(start: AddrSnes) -> Self {
        Self {
            start,
            end: None,
            callers: BTreeSet::new(),
            callees: BTreeSet::new(),
            blocks: BTreeSet::new(),
            is_interrupt: false,
            confidence: 0.0,
            switch_statements: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Evidence accumulates additively and saturates at 1.0, so the final
    /// value doesn't depend on the order it is added in.
    fn add_evidence(&mut self, weight: f32) {
        self.confidence = (self.confidence + weight).min(1.0);
    }
}

// -------------------------------------------------------------------------------------------------

/// Merges the four evidence sources into a confidence-scored function set,
/// assigns every block to at most one function, and records callers, callees,
/// switches and loops. Returns the pairs of functions whose spans overlap.
pub fn detect_functions(
    cfg: &mut ControlFlowGraph, disasm: &Disassembly, vectors: &[(InterruptKind, AddrSnes)], tables: &TableScan,
) -> Vec<(AddrSnes, AddrSnes)> {
    fn evidence(functions: &mut BTreeMap<AddrSnes, Function>, addr: AddrSnes, weight: f32) {
        functions.entry(addr).or_insert_with(|| Function::new(addr)).add_evidence(weight);
    }

    let mut functions: BTreeMap<AddrSnes, Function> = BTreeMap::new();

    // 1. Vector targets.
    for &(kind, addr) in vectors {
        if addr.0 != 0 {
            evidence(&mut functions, addr, confidence::VECTOR_TARGET);
            if kind != InterruptKind::Reset {
                functions.get_mut(&addr).unwrap().is_interrupt = true;
            }
        }
    }

    // 2. Call targets.
    let mut calls: Vec<(AddrSnes, AddrSnes)> = Vec::new();
    for insn in &disasm.lines {
        if insn.opcode.mnemonic.is_subroutine_call() {
            if let Some(target) = insn.static_jump_target() {
                evidence(&mut functions, target, confidence::CALL_TARGET);
                calls.push((insn.addr, target));
            }
        }
    }

    // Jump-table dispatch targets behave like functions as well.
    for table in &tables.jump_tables {
        for &target in &table.entries {
            evidence(&mut functions, target, confidence::JUMP_TABLE_TARGET);
        }
    }

    // 3. Prologue patterns at run starts.
    for addr in prologue_candidates(disasm) {
        evidence(&mut functions, addr, confidence::PROLOGUE);
    }

    // 4. Dead-code boundaries after unconditional transfers.
    for (prev, next) in disasm.lines.iter().tuple_windows() {
        let unconditional = prev.opcode.mnemonic.is_single_path_leap() || prev.opcode.mnemonic.is_subroutine_return();
        if unconditional && prev.next_addr() == next.addr && !disasm.flow_targets.contains(&next.addr) {
            evidence(&mut functions, next.addr, confidence::DEAD_CODE_BOUNDARY);
        }
    }

    // Candidates that don't start a block can't own one.
    functions.retain(|&start, _| cfg.blocks.contains_key(&BlockId::from(start)));

    assign_blocks(cfg, &mut functions);

    for function in functions.values_mut() {
        function.end = function.blocks.iter().filter_map(|id| cfg.blocks.get(id)).map(|b| b.end).max();
        if let Some(block) = cfg.blocks.get_mut(&BlockId::from(function.start)) {
            block.is_function_entry = true;
        }
    }

    record_calls(&mut functions, &calls, cfg);
    attach_switches(&mut functions, &tables.switches, cfg);
    find_loops(&mut functions, cfg);

    let overlaps = span_overlaps(&functions);
    for &(a, b) in &overlaps {
        log::warn!("Function span at {a} overlaps function header at {b}");
    }

    cfg.functions = functions;
    overlaps
}

/// First lines of straight-line runs matching a known prologue shape.
fn prologue_candidates(disasm: &Disassembly) -> Vec<AddrSnes> {
    use Mnemonic::*;
    let mut out = Vec::new();
    for (a, b, c) in disasm.lines.iter().tuple_windows() {
        let mnemonics = [a.opcode.mnemonic, b.opcode.mnemonic, c.opcode.mnemonic];
        let matched = matches!(mnemonics, [PHB, PHK, PLB] | [PHA, PHX, PHY])
            || matches!(&mnemonics[..2], [REP, SEP] | [SEP, REP]);
        if matched {
            out.push(a.addr);
        }
    }
    for insn in &disasm.lines {
        if insn.opcode.mnemonic == PHP {
            out.push(insn.addr);
        }
    }
    out
}

/// Breadth-first block ownership from every function start, stopping at other
/// function starts. A contested block goes to the closest start; ties go to
/// the lowest one.
fn assign_blocks(cfg: &ControlFlowGraph, functions: &mut BTreeMap<AddrSnes, Function>) {
    let starts: BTreeSet<AddrSnes> = functions.keys().copied().collect();
    let mut ownership: HashMap<BlockId, (u32, AddrSnes)> = HashMap::new();

    for &start in &starts {
        let entry = BlockId::from(start);
        let mut dist: HashMap<BlockId, u32> = HashMap::from([(entry, 0)]);
        let mut queue = VecDeque::from([entry]);
        while let Some(id) = queue.pop_front() {
            let d = dist[&id];
            let Some(block) = cfg.blocks.get(&id) else { continue };
            for &succ in &block.successors {
                if starts.contains(&succ.addr()) || dist.contains_key(&succ) {
                    continue;
                }
                dist.insert(succ, d + 1);
                queue.push_back(succ);
            }
        }
        for (id, d) in dist {
            match ownership.get(&id) {
                Some(&(best, owner)) if (best, owner) <= (d, start) => {}
                _ => {
                    ownership.insert(id, (d, start));
                }
            }
        }
    }

    for (id, (_, owner)) in ownership {
        if let Some(function) = functions.get_mut(&owner) {
            function.blocks.insert(id);
        }
    }
}

fn record_calls(
    functions: &mut BTreeMap<AddrSnes, Function>, calls: &[(AddrSnes, AddrSnes)], cfg: &ControlFlowGraph,
) {
    let owner_of: HashMap<BlockId, AddrSnes> =
        functions.iter().flat_map(|(&start, f)| f.blocks.iter().map(move |&b| (b, start))).collect();

    for &(call_site, target) in calls {
        if let Some(function) = functions.get_mut(&target) {
            function.callers.insert(call_site);
        }
        let caller = cfg.block_containing(call_site).and_then(|b| owner_of.get(&b.id)).copied();
        if let Some(caller_start) = caller {
            if let Some(function) = functions.get_mut(&caller_start) {
                function.callees.insert(target);
            }
        }
    }
}

fn attach_switches(
    functions: &mut BTreeMap<AddrSnes, Function>, switches: &[SwitchStatement], cfg: &ControlFlowGraph,
) {
    for &switch in switches {
        let owner = cfg
            .block_containing(switch.addr)
            .and_then(|block| functions.values_mut().find(|f| f.blocks.contains(&block.id)));
        if let Some(function) = owner {
            function.switch_statements.push(switch);
        }
    }
}

fn find_loops(functions: &mut BTreeMap<AddrSnes, Function>, cfg: &ControlFlowGraph) {
    for function in functions.values_mut() {
        let mut loops = Vec::new();
        for &id in &function.blocks {
            let Some(block) = cfg.blocks.get(&id) else { continue };
            for &succ in &block.successors {
                if function.blocks.contains(&succ) && succ.addr() <= block.start {
                    loops.push(Loop { head: succ, latch: id });
                }
            }
        }
        function.loops = loops;
    }
}

fn span_overlaps(functions: &BTreeMap<AddrSnes, Function>) -> Vec<(AddrSnes, AddrSnes)> {
    let mut overlaps = Vec::new();
    for (a, b) in functions.values().tuple_combinations() {
        if let Some(end) = a.end {
            if a.start < b.start && b.start <= end {
                overlaps.push((a.start, b.start));
            }
        }
    }
    overlaps
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cartridge::{CartridgeType, Mapper},
        disassembler::{binary_block::build_blocks, cfg::build_cfg, disassemble, jump_tables::scan_tables},
        internal_header::MapMode,
        snes_utils::rom::Rom,
        CancellationToken,
    };

    fn analyse(code: &[u8], vectors: &[(InterruptKind, AddrSnes)]) -> ControlFlowGraph {
        let mut data = vec![0u8; 0x8000];
        data[..code.len()].copy_from_slice(code);
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        let seeds: Vec<AddrSnes> = vectors.iter().map(|&(_, a)| a).collect();
        let disasm = disassemble(&rom, mapper, &seeds, &CancellationToken::new()).unwrap();
        let tables = scan_tables(&disasm, &rom, mapper);
        let mut boundaries: BTreeSet<AddrSnes> = disasm.seeds.iter().copied().collect();
        boundaries.extend(disasm.flow_targets.iter().copied());
        let blocks = build_blocks(&disasm.lines, &boundaries);
        let mut cfg = build_cfg(&disasm, blocks, &tables);
        detect_functions(&mut cfg, &disasm, vectors, &tables);
        cfg
    }

    #[test]
    fn vector_target_scores_full_confidence() {
        let cfg = analyse(&[0x60], &[(InterruptKind::Reset, AddrSnes(0x008000))]);
        let function = &cfg.functions[&AddrSnes(0x008000)];
        assert!((function.confidence - 1.0).abs() < f32::EPSILON);
        assert!(!function.is_interrupt);
    }

    #[test]
    fn call_target_scores_point_nine() {
        // JSR $8004 / RTS ; $8004: RTS
        let cfg = analyse(&[0x20, 0x04, 0x80, 0x60, 0x60], &[(InterruptKind::Reset, AddrSnes(0x008000))]);
        let callee = &cfg.functions[&AddrSnes(0x008004)];
        assert!((callee.confidence - 0.9).abs() < 1e-6);
        assert_eq!(callee.callers.iter().copied().collect::<Vec<_>>(), vec![AddrSnes(0x008000)]);
        let caller = &cfg.functions[&AddrSnes(0x008000)];
        assert!(caller.callees.contains(&AddrSnes(0x008004)));
    }

    #[test]
    fn confidence_saturates_at_one() {
        let mut function = Function::new(AddrSnes(0x008000));
        function.add_evidence(confidence::VECTOR_TARGET);
        function.add_evidence(confidence::CALL_TARGET);
        function.add_evidence(confidence::PROLOGUE);
        assert!(function.confidence <= 1.0);
    }

    #[test]
    fn interrupt_vectors_flag_handlers() {
        // Reset at $8000 (RTS), NMI handler at $8001 (RTI).
        let cfg = analyse(&[0x60, 0x40], &[
            (InterruptKind::Reset, AddrSnes(0x008000)),
            (InterruptKind::Nmi, AddrSnes(0x008001)),
        ]);
        assert!(cfg.functions[&AddrSnes(0x008001)].is_interrupt);
    }

    #[test]
    fn back_edges_become_loops() {
        // $8000: DEX / BNE $8000 / RTS
        let cfg = analyse(&[0xCA, 0xD0, 0xFD, 0x60], &[(InterruptKind::Reset, AddrSnes(0x008000))]);
        let function = &cfg.functions[&AddrSnes(0x008000)];
        assert_eq!(function.loops.len(), 1);
        assert_eq!(function.loops[0].head, BlockId(0x8000));
    }
}
