use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    disassembler::{
        cfg::ControlFlowGraph,
        opcodes::Mnemonic,
        xref::{AccessKind, CrossRefIndex},
        Disassembly,
    },
    enrichment::Enrichment,
    snes_utils::addr::AddrSnes,
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum BugKind {
    JumpToSelf,
    SelfModifyingWrite,
    StackImbalance,
    UninitializedRamRead,
}

#[derive(Clone, Debug, Serialize)]
pub struct PotentialBug {
    pub kind:        BugKind,
    pub severity:    Severity,
    pub addr:        u32,
    pub description: String,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct FunctionComplexity {
    pub start:      u32,
    pub complexity: u32,
}

/// Counters describing how much the analysis recovered.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QualityMetrics {
    pub total_instructions:         usize,
    pub code_bytes:                 usize,
    pub function_count:             usize,
    pub average_function_size:      f32,
    pub cyclomatic_complexity:      Vec<FunctionComplexity>,
    pub commented_lines:            usize,
    pub labeled_lines:              usize,
    pub hardware_register_accesses: usize,
    pub subroutine_calls:           usize,
    pub indirect_jumps:             usize,
    pub self_modifying_writes:      usize,
    pub interrupt_handlers:         usize,
    pub potential_bugs:             Vec<PotentialBug>,
}

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub enum WarningKind {
    AmbiguousHeader,
    FlagConflict,
    UnmappedFlow,
    DecodeError,
    OverlappingFunctions,
    PatternLowConfidence,
    Cancelled,
}

#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct WarningEntry {
    pub count:          usize,
    pub representative: Option<u32>,
}

/// Category x count x representative location, for renderer summaries.
#[derive(Default, Serialize)]
pub struct AnalysisWarnings {
    categories: BTreeMap<WarningKind, WarningEntry>,
}

impl AnalysisWarnings {
    pub fn add(&mut self, kind: WarningKind, addr: Option<AddrSnes>) {
        let entry = self.categories.entry(kind).or_default();
        entry.count += 1;
        if entry.representative.is_none() {
            entry.representative = addr.map(|a| a.0);
        }
    }

    pub fn add_many(&mut self, kind: WarningKind, addrs: &[AddrSnes]) {
        for &addr in addrs {
            self.add(kind, Some(addr));
        }
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.categories.get(&kind).map_or(0, |e| e.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WarningKind, &WarningEntry)> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------

pub fn collect_metrics(
    disasm: &Disassembly, cfg: &ControlFlowGraph, xrefs: &CrossRefIndex, enrichment: &Enrichment,
) -> QualityMetrics {
    let total_instructions = disasm.lines.len();
    let code_bytes: usize = disasm.lines.iter().map(|l| l.size()).sum();

    let function_count = cfg.functions.len();
    let total_function_bytes: usize = cfg
        .functions
        .values()
        .filter_map(|f| f.end.map(|end| (end.0 - f.start.0) as usize + 1))
        .sum();
    let average_function_size =
        if function_count > 0 { total_function_bytes as f32 / function_count as f32 } else { 0.0 };

    let cyclomatic_complexity = cfg
        .functions
        .values()
        .map(|function| {
            let branches = function
                .blocks
                .iter()
                .filter_map(|id| cfg.blocks.get(id))
                .flat_map(|b| b.instructions.iter())
                .filter(|i| i.opcode.mnemonic.is_double_path())
                .count();
            FunctionComplexity { start: function.start.0, complexity: 1 + branches as u32 }
        })
        .collect();

    let hardware_register_accesses = disasm
        .lines
        .iter()
        .filter(|l| {
            l.operand_address().map_or(false, |a| {
                (a.bank() & 0x7F) < 0x40 && matches!(a.word(), 0x2100..=0x21FF | 0x4200..=0x43FF)
            })
        })
        .count();

    let labeled_lines = disasm.lines.iter().filter(|l| enrichment.labels.contains_key(&l.addr)).count();
    let commented_lines = disasm.lines.iter().filter(|l| enrichment.comments.contains_key(&l.addr)).count();

    QualityMetrics {
        total_instructions,
        code_bytes,
        function_count,
        average_function_size,
        cyclomatic_complexity,
        commented_lines,
        labeled_lines,
        hardware_register_accesses,
        subroutine_calls: disasm.lines.iter().filter(|l| l.opcode.mnemonic.is_subroutine_call()).count(),
        indirect_jumps: disasm.lines.iter().filter(|l| l.is_indirect_jump()).count(),
        self_modifying_writes: self_modifying_writes(disasm).len(),
        interrupt_handlers: cfg.functions.values().filter(|f| f.is_interrupt).count(),
        potential_bugs: find_potential_bugs(disasm, cfg, xrefs),
    }
}

fn self_modifying_writes(disasm: &Disassembly) -> Vec<AddrSnes> {
    disasm
        .lines
        .iter()
        .filter(|l| l.opcode.mnemonic.is_memory_write())
        .filter(|l| l.operand_address().map_or(false, |a| a.word() >= 0x8000))
        .map(|l| l.addr)
        .collect()
}

pub fn find_potential_bugs(disasm: &Disassembly, cfg: &ControlFlowGraph, xrefs: &CrossRefIndex) -> Vec<PotentialBug> {
    let mut bugs = Vec::new();

    // JMP-to-self infinite loops.
    for insn in &disasm.lines {
        let self_jump = matches!(insn.opcode.mnemonic, Mnemonic::JMP | Mnemonic::BRA | Mnemonic::BRL)
            && insn.static_jump_target() == Some(insn.addr);
        if self_jump {
            bugs.push(PotentialBug {
                kind:        BugKind::JumpToSelf,
                severity:    Severity::High,
                addr:        insn.addr.0,
                description: format!("{} jumps to itself", insn.addr),
            });
        }
    }

    // Writes into the executable address range.
    for addr in self_modifying_writes(disasm) {
        bugs.push(PotentialBug {
            kind:        BugKind::SelfModifyingWrite,
            severity:    Severity::Medium,
            addr:        addr.0,
            description: format!("store at {addr} targets the code address range"),
        });
    }

    // Push/pull imbalance inside one function.
    for function in cfg.functions.values() {
        let (mut pushes, mut pulls) = (0i32, 0i32);
        for id in &function.blocks {
            let Some(block) = cfg.blocks.get(id) else { continue };
            for insn in &block.instructions {
                match insn.opcode.mnemonic {
                    Mnemonic::PHA | Mnemonic::PHB | Mnemonic::PHD | Mnemonic::PHK | Mnemonic::PHP
                    | Mnemonic::PHX | Mnemonic::PHY => pushes += 1,
                    Mnemonic::PLA | Mnemonic::PLB | Mnemonic::PLD | Mnemonic::PLP | Mnemonic::PLX
                    | Mnemonic::PLY => pulls += 1,
                    _ => {}
                }
            }
        }
        if pushes != pulls {
            bugs.push(PotentialBug {
                kind:        BugKind::StackImbalance,
                severity:    Severity::Low,
                addr:        function.start.0,
                description: format!(
                    "function {} pushes {pushes} and pulls {pulls}",
                    function.start
                ),
            });
        }
    }

    // RAM reads with no preceding write anywhere in the program.
    for (&target, refs) in xrefs.iter() {
        let is_ram = (0x7E0000..=0x7FFFFF).contains(&target.0)
            || ((target.bank() & 0x7F) < 0x40 && target.word() < 0x2000);
        if !is_ram {
            continue;
        }
        let has_read = refs.iter().any(|r| r.kind == AccessKind::Read);
        let has_write = refs.iter().any(|r| r.kind == AccessKind::Write);
        if has_read && !has_write {
            let source = refs.iter().find(|r| r.kind == AccessKind::Read).map(|r| r.source.0).unwrap_or(target.0);
            bugs.push(PotentialBug {
                kind:        BugKind::UninitializedRamRead,
                severity:    Severity::Low,
                addr:        source,
                description: format!("RAM at {target} is read but never written"),
            });
        }
    }

    bugs
}

// -------------------------------------------------------------------------------------------------
