use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    cartridge::Mapper,
    disassembler::{
        binary_block::{DataKind, DataStructure},
        instruction::Instruction,
        jump_tables::TableScan,
        opcodes::{AddressingMode, Mnemonic},
        Disassembly,
    },
    snes_utils::addr::{AddrPc, AddrSnes},
    snes_utils::rom::Rom,
};

/// Pattern-derived structures never score above this.
pub const MAX_PATTERN_CONFIDENCE: f32 = 0.8;

/// Structures below this are counted but not published.
pub const PUBLISH_THRESHOLD: f32 = 0.5;

#[rustfmt::skip]
pub mod registers {
    pub const PPU_FIRST: u16 = 0x2100;
    pub const PPU_LAST:  u16 = 0x213F;
    pub const APU_FIRST: u16 = 0x2140;
    pub const APU_LAST:  u16 = 0x2143;
    pub const CPU_FIRST: u16 = 0x4200;
    pub const CPU_LAST:  u16 = 0x43FF;

    pub const VRAM_ADDR_LOW:  u16 = 0x2116;
    pub const VRAM_DATA_LOW:  u16 = 0x2118;
    pub const VRAM_DATA_HIGH: u16 = 0x2119;
    pub const CGRAM_DATA:     u16 = 0x2122;
    pub const HVBJOY:         u16 = 0x4212;
}

// -------------------------------------------------------------------------------------------------

pub struct PatternMatches {
    pub data_structures: Vec<DataStructure>,
    /// Macro/idiom annotations keyed by line address.
    pub comments:        BTreeMap<AddrSnes, String>,
    /// Candidates dropped for scoring below the publish threshold.
    pub dropped_low_confidence: usize,
}

// -------------------------------------------------------------------------------------------------

pub fn match_patterns(disasm: &Disassembly, rom: &Rom, mapper: Mapper, tables: &TableScan) -> PatternMatches {
    let mut candidates = Vec::new();

    for table in &tables.jump_tables {
        candidates.push(DataStructure {
            addr:        table.table,
            kind:        DataKind::JumpTable,
            size:        table.entries.len() * 2,
            entry_count: table.entries.len(),
            description: format!("Jump table used at {}", table.head),
            confidence:  table.confidence,
            format:      Some("16-bit in-bank pointers".into()),
        });
    }
    for table in &tables.pointer_tables {
        candidates.push(DataStructure {
            addr:        table.table,
            kind:        DataKind::PointerTable,
            size:        table.entries.len() * 2,
            entry_count: table.entries.len(),
            description: format!("Pointer table copied at {}", table.head),
            confidence:  table.confidence,
            format:      Some("16-bit in-bank pointers".into()),
        });
    }

    candidates.extend(register_fed_data(disasm, mapper));
    candidates.extend(text_runs(disasm, rom, mapper));

    let (published, dropped) = publish(candidates);

    PatternMatches {
        data_structures: published,
        comments: idiom_comments(disasm),
        dropped_low_confidence: dropped,
    }
}

/// Sorts candidates by confidence and publishes the ones that don't overlap a
/// better-scored region.
fn publish(mut candidates: Vec<DataStructure>) -> (Vec<DataStructure>, usize) {
    let mut dropped = 0;
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.addr.cmp(&b.addr)));
    let mut published: Vec<DataStructure> = Vec::new();
    for candidate in candidates {
        if candidate.confidence < PUBLISH_THRESHOLD {
            dropped += 1;
            continue;
        }
        if published.iter().any(|existing| existing.overlaps(&candidate)) {
            continue;
        }
        published.push(candidate);
    }
    published.sort_by_key(|s| s.addr);
    (published, dropped)
}

/// ROM regions loaded right before a store to a PPU/APU data port.
fn register_fed_data(disasm: &Disassembly, mapper: Mapper) -> Vec<DataStructure> {
    use registers::*;
    let mut out = Vec::new();

    for (load, store) in disasm.lines.iter().tuple_windows() {
        let Some(source) = rom_data_source(load, mapper) else { continue };
        let Some(port) = port_store(store) else { continue };

        let (kind, confidence, what): (DataKind, f32, &str) = match port {
            VRAM_DATA_LOW | VRAM_DATA_HIGH => (DataKind::GraphicsData, 0.6, "VRAM upload source"),
            CGRAM_DATA => (DataKind::PaletteData, 0.6, "CGRAM upload source"),
            APU_FIRST..=APU_LAST => (DataKind::MusicData, 0.55, "APU transfer source"),
            _ => continue,
        };
        out.push(DataStructure {
            addr: source,
            kind,
            size: 0,
            entry_count: 0,
            description: format!("{what} referenced at {}", load.addr),
            confidence: confidence.min(MAX_PATTERN_CONFIDENCE),
            format: None,
        });
    }
    out
}

fn rom_data_source(insn: &Instruction, mapper: Mapper) -> Option<AddrSnes> {
    use AddressingMode::*;
    if insn.opcode.mnemonic != Mnemonic::LDA {
        return None;
    }
    if !matches!(insn.opcode.mode, Address | AddressXIndex | AddressYIndex | Long | LongXIndex) {
        return None;
    }
    insn.operand_address().filter(|&a| mapper.is_rom_mapped(a))
}

fn port_store(insn: &Instruction) -> Option<u16> {
    if !insn.opcode.mnemonic.is_memory_write() {
        return None;
    }
    let addr = insn.operand_address()?;
    let in_system_banks = (addr.bank() & 0x7F) < 0x40;
    in_system_banks.then_some(addr.word())
}

/// Printable runs in bytes the walk never decoded.
fn text_runs(disasm: &Disassembly, rom: &Rom, mapper: Mapper) -> Vec<DataStructure> {
    const MIN_RUN: usize = 16;

    let mut covered = vec![false; rom.0.len()];
    for insn in &disasm.lines {
        for i in 0..insn.size() {
            if let Some(slot) = covered.get_mut(insn.offset.as_index() + i) {
                *slot = true;
            }
        }
    }

    let mut out = Vec::new();
    let mut run_start = None;
    for (i, &byte) in rom.0.iter().enumerate() {
        let printable = !covered[i] && (0x20..=0x7E).contains(&byte);
        match (printable, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if i - start >= MIN_RUN {
                    if let Ok(addr) = mapper.file_to_cpu(AddrPc(start as u32)) {
                        out.push(text_structure(addr, i - start));
                    }
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        if rom.0.len() - start >= MIN_RUN {
            if let Ok(addr) = mapper.file_to_cpu(AddrPc(start as u32)) {
                out.push(text_structure(addr, rom.0.len() - start));
            }
        }
    }
    out
}

fn text_structure(addr: AddrSnes, len: usize) -> DataStructure {
    DataStructure {
        addr,
        kind: DataKind::StringTable,
        size: len,
        entry_count: 0,
        description: format!("{len} bytes of printable text"),
        confidence: (0.5 + len as f32 / 512.0).min(MAX_PATTERN_CONFIDENCE),
        format: Some("ASCII".into()),
    }
}

/// Macro and inline-function idioms, rendered as comments.
fn idiom_comments(disasm: &Disassembly) -> BTreeMap<AddrSnes, String> {
    use registers::*;
    let mut comments = BTreeMap::new();

    for insn in &disasm.lines {
        if let Some(port) = port_store(insn) {
            match port {
                VRAM_ADDR_LOW => {
                    comments.insert(insn.addr, "VRAM address setup".to_string());
                }
                0x4300..=0x437F => {
                    let channel = (port >> 4) & 0x7;
                    comments.entry(insn.addr).or_insert_with(|| format!("DMA channel {channel} setup"));
                }
                _ => {}
            }
        }
    }

    for (a, b) in disasm.lines.iter().tuple_windows() {
        // Wait-for-vblank spin: poll HVBJOY then branch back.
        if a.opcode.mnemonic == Mnemonic::LDA
            && a.operand_address().map(|r| r.word()) == Some(HVBJOY)
            && b.opcode.mnemonic.is_double_path()
        {
            comments.insert(a.addr, "wait for V-blank".to_string());
        }
        // Inline multiply-by-four.
        if a.opcode.mnemonic == Mnemonic::ASL
            && b.opcode.mnemonic == Mnemonic::ASL
            && a.opcode.mode == AddressingMode::Accumulator
            && b.opcode.mode == AddressingMode::Accumulator
        {
            comments.insert(a.addr, "multiply by 4".to_string());
        }
    }

    for (a, b, c, d) in disasm.lines.iter().tuple_windows() {
        // 16-bit compare built from two 8-bit halves.
        let halves = |lo: &Instruction, hi: &Instruction| {
            lo.opcode.mnemonic == Mnemonic::LDA
                && hi.opcode.mnemonic == Mnemonic::LDA
                && match (lo.operand_address(), hi.operand_address()) {
                    (Some(l), Some(h)) => h == l + 1u32,
                    _ => false,
                }
        };
        if halves(a, c) && b.opcode.mnemonic == Mnemonic::CMP && d.opcode.mnemonic == Mnemonic::CMP {
            comments.insert(a.addr, "16-bit compare pair".to_string());
        }
    }

    comments
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cartridge::CartridgeType,
        disassembler::{disassemble, jump_tables::scan_tables},
        internal_header::MapMode,
        CancellationToken,
    };

    fn analyse(data: Vec<u8>) -> PatternMatches {
        let rom = Rom::new(data).unwrap();
        let mapper = Mapper::new(CartridgeType::LoRom, MapMode(0x20), 0x8000);
        let disasm = disassemble(&rom, mapper, &[AddrSnes(0x008000)], &CancellationToken::new()).unwrap();
        let tables = scan_tables(&disasm, &rom, mapper);
        match_patterns(&disasm, &rom, mapper, &tables)
    }

    #[test]
    fn printable_runs_become_string_tables() {
        let mut data = vec![0u8; 0x8000];
        data[0] = 0x60; // RTS at the entry point
        data[0x1000..0x1020].copy_from_slice(b"HELLO WORLD, THIS IS TEXT DATA. ");
        let matches = analyse(data);
        assert!(matches
            .data_structures
            .iter()
            .any(|s| s.kind == DataKind::StringTable && s.addr == AddrSnes(0x009000)));
    }

    #[test]
    fn vram_uploads_mark_graphics_sources() {
        // LDA $C000 / STA $2118 / RTS
        let mut data = vec![0u8; 0x8000];
        data[..7].copy_from_slice(&[0xAD, 0x00, 0xC0, 0x8D, 0x18, 0x21, 0x60]);
        let matches = analyse(data);
        assert!(matches.data_structures.iter().any(|s| s.kind == DataKind::GraphicsData && s.addr == AddrSnes(0x00C000)));
    }

    #[test]
    fn double_shift_gets_a_comment() {
        let mut data = vec![0u8; 0x8000];
        data[..3].copy_from_slice(&[0x0A, 0x0A, 0x60]);
        let matches = analyse(data);
        assert_eq!(matches.comments.get(&AddrSnes(0x008000)).map(String::as_str), Some("multiply by 4"));
    }
}
