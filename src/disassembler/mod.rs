pub mod binary_block;
pub mod cfg;
pub mod functions;
pub mod instruction;
pub mod jump_tables;
pub mod opcodes;
pub mod patterns;
pub mod processor;
pub mod serialization;
pub mod status;
pub mod xref;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use thiserror::Error;

use crate::{
    cartridge::Mapper,
    disassembler::{
        instruction::{DecodeError, Instruction},
        opcodes::Mnemonic,
        processor::Processor,
    },
    snes_utils::{addr::AddrSnes, rom::Rom},
    CancellationToken,
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Error)]
pub enum DisassemblyError {
    #[error("Reset vector {0} does not map to ROM")]
    UnmappedReset(AddrSnes),
    #[error("Seed address {0} does not map to ROM")]
    UnmappedSeed(AddrSnes),
}

// -------------------------------------------------------------------------------------------------

/// The ordered output of the frontier walk.
pub struct Disassembly {
    /// Decoded lines sorted by CPU address.
    pub lines:          Vec<Instruction>,
    pub seeds:          Vec<AddrSnes>,
    /// Every statically resolved branch/jump/call target seen during the walk.
    pub flow_targets:   BTreeSet<AddrSnes>,
    /// Addresses where predecessors disagreed on M/X widths.
    pub flag_conflicts: Vec<AddrSnes>,
    /// Bytes that failed to decode and were kept as data.
    pub data_bytes:     Vec<(AddrSnes, u8)>,
    /// Flow destinations that fell outside the ROM mapping.
    pub unmapped_flows: Vec<AddrSnes>,
    pub cancelled:      bool,

    line_index: BTreeMap<AddrSnes, usize>,
}

impl Disassembly {
    pub fn line_at(&self, addr: AddrSnes) -> Option<&Instruction> {
        self.line_index.get(&addr).map(|&i| &self.lines[i])
    }

    pub fn line_position(&self, addr: AddrSnes) -> Option<usize> {
        self.line_index.get(&addr).copied()
    }
}

// -------------------------------------------------------------------------------------------------

#[derive(Clone)]
struct Step {
    pc:        AddrSnes,
    processor: Processor,
}

struct RomWalker<'r> {
    rom:    &'r Rom,
    mapper: Mapper,

    frontier: VecDeque<Step>,
    emitted:  BTreeMap<AddrSnes, Instruction>,

    flow_targets:          BTreeSet<AddrSnes>,
    flag_conflicts:        Vec<AddrSnes>,
    conservative_revisits: HashSet<AddrSnes>,
    data_bytes:            Vec<(AddrSnes, u8)>,
    unmapped_flows:        Vec<AddrSnes>,
    emitted_total:         u64,
}

/// Walks the ROM from the given seeds and returns the ordered line list.
///
/// Every seed must map to ROM; the caller is expected to have validated the
/// reset vector separately so an unmapped reset surfaces as its own error.
pub fn disassemble(
    rom: &Rom, mapper: Mapper, seeds: &[AddrSnes], cancel: &CancellationToken,
) -> Result<Disassembly, DisassemblyError> {
    for &seed in seeds {
        if mapper.cpu_to_file(seed).is_none() {
            return Err(DisassemblyError::UnmappedSeed(seed));
        }
    }

    let mut walker = RomWalker {
        rom,
        mapper,
        frontier: seeds.iter().map(|&pc| Step { pc, processor: Processor::new() }).collect(),
        emitted: BTreeMap::new(),
        flow_targets: BTreeSet::new(),
        flag_conflicts: Vec::new(),
        conservative_revisits: HashSet::with_capacity(64),
        data_bytes: Vec::new(),
        unmapped_flows: Vec::new(),
        emitted_total: 0,
    };

    let mut cancelled = false;
    while let Some(step) = walker.frontier.pop_front() {
        if !walker.walk_run(step, cancel) {
            cancelled = true;
            break;
        }
    }

    log::info!(
        "Disassembled {} lines from {} seeds ({} flag conflicts)",
        walker.emitted.len(),
        seeds.len(),
        walker.flag_conflicts.len()
    );

    let line_index: BTreeMap<AddrSnes, usize> = walker.emitted.keys().enumerate().map(|(i, &a)| (a, i)).collect();
    Ok(Disassembly {
        lines: walker.emitted.into_values().collect(),
        seeds: seeds.to_vec(),
        flow_targets: walker.flow_targets,
        flag_conflicts: walker.flag_conflicts,
        data_bytes: walker.data_bytes,
        unmapped_flows: walker.unmapped_flows,
        cancelled,
        line_index,
    })
}

impl<'r> RomWalker<'r> {
    /// Decodes one straight-line run. Returns false when cancellation was
    /// observed.
    fn walk_run(&mut self, step: Step, cancel: &CancellationToken) -> bool {
        let Step { mut pc, mut processor } = step;

        loop {
            if self.emitted_total % 1024 == 0 && cancel.is_cancelled() {
                return false;
            }

            if let Some(&existing) = self.emitted.get(&pc) {
                let disagree =
                    existing.m_flag != processor.flags.acc_is_8bit() || existing.x_flag != processor.flags.index_is_8bit();
                if !disagree {
                    break;
                }
                self.flag_conflicts.push(pc);
                let existing_is_conservative = existing.m_flag && existing.x_flag;
                if !existing_is_conservative && self.conservative_revisits.insert(pc) {
                    // Two predecessors disagree: re-decode the run under the
                    // conservative M=X=8 assumption.
                    self.remove_run_from(pc);
                    processor = Processor::conservative();
                } else {
                    break;
                }
            }

            let Some(offset) = self.mapper.cpu_to_file(pc) else {
                self.unmapped_flows.push(pc);
                break;
            };

            let bytes = &self.rom.0[offset.as_index()..];
            let insn = match Instruction::parse(bytes, pc, offset, processor.flags) {
                Ok((insn, _)) => insn,
                Err(DecodeError::Truncated(_)) | Err(DecodeError::UnknownOpcode(..)) => {
                    self.data_bytes.push((pc, bytes.first().copied().unwrap_or(0)));
                    break;
                }
            };
            processor.execute(&insn);
            self.emitted.insert(pc, insn);
            self.emitted_total += 1;

            if let Some(target) = insn.static_jump_target() {
                self.flow_targets.insert(target);
            }

            let mnemonic = insn.opcode.mnemonic;
            if mnemonic.is_subroutine_call() || mnemonic.is_double_path() {
                // Both continuations live: walk the fall-through, queue the target.
                if let Some(target) = insn.static_jump_target() {
                    self.frontier.push_back(Step { pc: target, processor });
                }
                pc = insn.next_addr();
            } else if mnemonic.is_single_path_leap() {
                if let Some(target) = insn.static_jump_target() {
                    self.frontier.push_back(Step { pc: target, processor });
                }
                break;
            } else if mnemonic.is_subroutine_return() || mnemonic == Mnemonic::STP {
                break;
            } else {
                // BRK/COP resume after their signature byte, WAI after the
                // interrupt; everything else is straight-line.
                pc = insn.next_addr();
            }
        }
        true
    }

    /// Drops a previously decoded contiguous run starting at `start`.
    fn remove_run_from(&mut self, start: AddrSnes) {
        let mut cursor = start;
        while let Some(insn) = self.emitted.remove(&cursor) {
            cursor = insn.next_addr();
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cartridge::CartridgeType, internal_header::MapMode};

    fn lorom_with_code(code: &[u8]) -> (Rom, Mapper) {
        let mut data = vec![0u8; 0x8000];
        data[..code.len()].copy_from_slice(code);
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        (rom, mapper)
    }

    #[test]
    fn walk_follows_both_branch_arms() {
        // $8000: LDA #$01 / BEQ $8007 / JMP $8008 ; $8007: RTS ; $8008: RTS
        let (rom, mapper) = lorom_with_code(&[0xA9, 0x01, 0xF0, 0x03, 0x4C, 0x08, 0x80, 0x60, 0x60]);
        let disasm =
            disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();
        let addrs: Vec<_> = disasm.lines.iter().map(|l| l.addr.0).collect();
        assert_eq!(addrs, vec![0x8000, 0x8002, 0x8004, 0x8007, 0x8008]);
        assert!(disasm.flow_targets.contains(&AddrSnes(0x008007)));
        assert!(disasm.flow_targets.contains(&AddrSnes(0x008008)));
    }

    #[test]
    fn walk_stops_at_returns() {
        let (rom, mapper) = lorom_with_code(&[0x60, 0xEA]);
        let disasm =
            disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();
        assert_eq!(disasm.lines.len(), 1);
    }

    #[test]
    fn unmapped_seed_is_an_error() {
        let (rom, mapper) = lorom_with_code(&[0x60]);
        assert!(matches!(
            disassemble(&rom, mapper, &[AddrSnes(0x7E0000)], &CancellationToken::new()),
            Err(DisassemblyError::UnmappedSeed(_))
        ));
    }

    #[test]
    fn cancellation_produces_partial_output() {
        let (rom, mapper) = lorom_with_code(&[0xEA; 0x100]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let disasm = disassemble(&rom, mapper, &[AddrSnes(0x008000)], &cancel).unwrap();
        assert!(disasm.cancelled);
        assert!(disasm.lines.is_empty());
    }
}
