use itertools::Itertools;
use nom::number::complete::le_u16;

use crate::{
    cartridge::Mapper,
    disassembler::{
        instruction::Instruction,
        opcodes::{AddressingMode, Mnemonic},
        Disassembly,
    },
    snes_utils::{
        addr::{AddrInner, AddrSnes},
        rom::Rom,
    },
};

/// Heuristic confidence for recognized tables.
pub const TABLE_CONFIDENCE: f32 = 0.7;

/// Tables are never assumed larger than one pointer page.
pub const MAX_TABLE_ENTRIES: usize = 256;

// -------------------------------------------------------------------------------------------------

/// A resolved indirect-jump dispatch table.
#[derive(Clone, Debug)]
pub struct JumpTable {
    /// Address of the `JMP (abs)` / `JMP (abs,X)` line using the table.
    pub head:       AddrSnes,
    /// Table base as the pointer fetch sees it: bank 0 for plain indirect
    /// jumps, the program bank for the indexed form.
    pub table:      AddrSnes,
    pub entries:    Vec<AddrSnes>,
    pub confidence: f32,
}

/// A `LDA t,X / STA p / LDA t+1,X / STA p+1` style pointer table.
#[derive(Clone, Debug)]
pub struct PointerTable {
    /// Address of the first line of the copy idiom.
    pub head:       AddrSnes,
    pub table:      AddrSnes,
    pub entries:    Vec<AddrSnes>,
    pub confidence: f32,
}

/// A `CMP / BCC|BCS / ASL / JMP (abs,X)` dispatch idiom.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SwitchStatement {
    /// Address of the bounds check.
    pub addr:  AddrSnes,
    /// Address of the dispatching indirect jump.
    pub jump:  AddrSnes,
    pub table: AddrSnes,
}

#[derive(Default)]
pub struct TableScan {
    pub jump_tables:    Vec<JumpTable>,
    pub pointer_tables: Vec<PointerTable>,
    pub switches:       Vec<SwitchStatement>,
}

impl TableScan {
    /// Resolved targets for the indirect jump at `head`, if any.
    pub fn targets_of(&self, head: AddrSnes) -> Option<&[AddrSnes]> {
        self.jump_tables.iter().find(|t| t.head == head).map(|t| t.entries.as_slice())
    }
}

// -------------------------------------------------------------------------------------------------

pub fn scan_tables(disasm: &Disassembly, rom: &Rom, mapper: Mapper) -> TableScan {
    let mut scan = TableScan::default();

    // Bounding evidence: every operand address seen anywhere in the walk.
    let operand_addrs: Vec<AddrSnes> = disasm.lines.iter().filter_map(|i| i.operand_address()).collect();

    for insn in &disasm.lines {
        if insn.is_indirect_jump() {
            if let Some(table) = indirect_table_base(insn) {
                let bound = table_size_bound(&operand_addrs, table);
                // Entries dispatch within the program bank of the jump.
                let entries = read_table_entries(rom, mapper, table, insn.addr.bank(), bound);
                if !entries.is_empty() {
                    scan.jump_tables.push(JumpTable {
                        head: insn.addr,
                        table,
                        entries,
                        confidence: TABLE_CONFIDENCE,
                    });
                }
            }
        }
    }

    for (a, b, c, d) in disasm.lines.iter().tuple_windows() {
        if let Some(table) = pointer_copy_idiom(a, b, c, d) {
            let bound = table_size_bound(&operand_addrs, table);
            let entries = read_table_entries(rom, mapper, table, table.bank(), bound);
            if !entries.is_empty() {
                scan.pointer_tables.push(PointerTable {
                    head: a.addr,
                    table,
                    entries,
                    confidence: TABLE_CONFIDENCE,
                });
            }
        }
        if let Some(switch) = switch_idiom(a, b, c, d) {
            scan.switches.push(switch);
        }
    }

    log::info!(
        "Table scan: {} jump tables, {} pointer tables, {} switches",
        scan.jump_tables.len(),
        scan.pointer_tables.len(),
        scan.switches.len()
    );
    scan
}

fn indirect_table_base(insn: &Instruction) -> Option<AddrSnes> {
    // `JMP (abs,X)` reads its table through the program bank, and
    // `operand_address` already carries it for that mode. `JMP (abs)` and
    // `JML [abs]` fetch their pointer from bank 0 regardless of where they
    // execute, which is the bank-0 address `operand_address` returns.
    insn.operand_address()
}

/// Bounds a table by use-count and by the largest small offset from the base
/// observed in any operand. Without offset evidence the unmapped-entry stop in
/// `read_table_entries` is the only terminator.
fn table_size_bound(operand_addrs: &[AddrSnes], table: AddrSnes) -> usize {
    let uses = operand_addrs.iter().filter(|&&a| a == table).count();
    let max_offset = operand_addrs
        .iter()
        .filter(|&&a| a > table && a.0 - table.0 < 0x100)
        .map(|&a| (a.0 - table.0) as usize)
        .max();
    match max_offset {
        Some(offset) => uses.max(offset / 2 + 1).clamp(1, MAX_TABLE_ENTRIES),
        None => MAX_TABLE_ENTRIES,
    }
}

/// Reads 16-bit little-endian targets into `target_bank` until the first
/// entry that doesn't map back into ROM.
fn read_table_entries(rom: &Rom, mapper: Mapper, table: AddrSnes, target_bank: u8, bound: usize) -> Vec<AddrSnes> {
    let mut entries = Vec::new();
    for i in 0..bound {
        let Some(entry_pc) = mapper.cpu_to_file(table + (i * 2) as AddrInner) else { break };
        let Ok(raw) = rom.parse_at(entry_pc, 2, le_u16) else { break };
        let target = AddrSnes(raw as AddrInner).in_bank(target_bank);
        if !mapper.is_rom_mapped(target) {
            break;
        }
        entries.push(target);
    }
    entries
}

fn pointer_copy_idiom(a: &Instruction, b: &Instruction, c: &Instruction, d: &Instruction) -> Option<AddrSnes> {
    use AddressingMode::*;
    use Mnemonic::*;

    let loads_table = |i: &Instruction| (i.opcode.mnemonic == LDA && i.opcode.mode == AddressXIndex).then(|| i.operand_address()).flatten();
    let stores_ptr = |i: &Instruction| {
        (i.opcode.mnemonic == STA && matches!(i.opcode.mode, DirectPage | Address)).then(|| i.operand_address()).flatten()
    };

    let table_lo = loads_table(a)?;
    let ptr_lo = stores_ptr(b)?;
    let table_hi = loads_table(c)?;
    let ptr_hi = stores_ptr(d)?;

    (table_hi == table_lo + 1u32 && ptr_hi == ptr_lo + 1u32).then_some(table_lo)
}

fn switch_idiom(a: &Instruction, b: &Instruction, c: &Instruction, d: &Instruction) -> Option<SwitchStatement> {
    use AddressingMode::*;
    use Mnemonic::*;

    let bounds_check = a.opcode.mnemonic == CMP;
    let guarded = matches!(b.opcode.mnemonic, BCC | BCS);
    let scaled = c.opcode.mnemonic == ASL;
    let dispatch = d.opcode.mnemonic == JMP && d.opcode.mode == AddressXIndexIndirect;

    // The dispatch is always `JMP (abs,X)`, whose operand_address already
    // carries the program bank.
    (bounds_check && guarded && scaled && dispatch).then(|| SwitchStatement {
        addr:  a.addr,
        jump:  d.addr,
        table: d.operand_address().unwrap_or(AddrSnes(0)),
    })
}

// -------------------------------------------------------------------------------------------------
