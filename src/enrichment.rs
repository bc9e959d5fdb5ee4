use std::collections::BTreeMap;

use crate::{
    disassembler::{
        binary_block::DataStructure,
        cfg::ControlFlowGraph,
        instruction::Instruction,
        opcodes::Mnemonic,
        xref::{classify_access, AccessKind},
        Disassembly,
    },
    snes_utils::addr::AddrSnes,
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    Code,
    Data,
    Function,
    Variable,
    Constant,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub addr:        AddrSnes,
    pub name:        String,
    pub kind:        SymbolKind,
    pub size:        Option<usize>,
    pub confidence:  f32,
    pub description: Option<String>,
}

#[derive(Default)]
pub struct SymbolTable {
    map: BTreeMap<AddrSnes, Symbol>,
}

impl SymbolTable {
    pub fn insert(&mut self, symbol: Symbol) {
        self.map.insert(symbol.addr, symbol);
    }

    pub fn get(&self, addr: AddrSnes) -> Option<&Symbol> {
        self.map.get(&addr)
    }

    pub fn name_of(&self, addr: AddrSnes) -> Option<&str> {
        self.map.get(&addr).map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------

pub struct HardwareRegister {
    pub addr:        u16,
    pub name:        &'static str,
    pub description: &'static str,
}

const fn reg(addr: u16, name: &'static str, description: &'static str) -> HardwareRegister {
    HardwareRegister { addr, name, description }
}

/// PPU, APU and CPU/DMA registers the annotator knows by name.
#[rustfmt::skip]
pub static HARDWARE_REGISTERS: &[HardwareRegister] = &[
    reg(0x2100, "INIDISP",  "screen display and brightness"),
    reg(0x2101, "OBSEL",    "object size and base address"),
    reg(0x2102, "OAMADDL",  "OAM address (low)"),
    reg(0x2103, "OAMADDH",  "OAM address (high)"),
    reg(0x2104, "OAMDATA",  "OAM data write"),
    reg(0x2105, "BGMODE",   "background mode and tile size"),
    reg(0x2106, "MOSAIC",   "mosaic size and enable"),
    reg(0x2107, "BG1SC",    "BG1 tilemap address"),
    reg(0x2108, "BG2SC",    "BG2 tilemap address"),
    reg(0x2109, "BG3SC",    "BG3 tilemap address"),
    reg(0x210A, "BG4SC",    "BG4 tilemap address"),
    reg(0x210B, "BG12NBA",  "BG1/BG2 character address"),
    reg(0x210C, "BG34NBA",  "BG3/BG4 character address"),
    reg(0x210D, "BG1HOFS",  "BG1 horizontal scroll"),
    reg(0x210E, "BG1VOFS",  "BG1 vertical scroll"),
    reg(0x210F, "BG2HOFS",  "BG2 horizontal scroll"),
    reg(0x2110, "BG2VOFS",  "BG2 vertical scroll"),
    reg(0x2111, "BG3HOFS",  "BG3 horizontal scroll"),
    reg(0x2112, "BG3VOFS",  "BG3 vertical scroll"),
    reg(0x2113, "BG4HOFS",  "BG4 horizontal scroll"),
    reg(0x2114, "BG4VOFS",  "BG4 vertical scroll"),
    reg(0x2115, "VMAIN",    "VRAM address increment mode"),
    reg(0x2116, "VMADDL",   "VRAM address (low)"),
    reg(0x2117, "VMADDH",   "VRAM address (high)"),
    reg(0x2118, "VMDATAL",  "VRAM data write (low)"),
    reg(0x2119, "VMDATAH",  "VRAM data write (high)"),
    reg(0x211A, "M7SEL",    "mode 7 settings"),
    reg(0x2121, "CGADD",    "CGRAM address"),
    reg(0x2122, "CGDATA",   "CGRAM data write"),
    reg(0x2123, "W12SEL",   "window mask BG1/BG2"),
    reg(0x2124, "W34SEL",   "window mask BG3/BG4"),
    reg(0x2125, "WOBJSEL",  "window mask OBJ/color"),
    reg(0x212C, "TM",       "main screen designation"),
    reg(0x212D, "TS",       "sub screen designation"),
    reg(0x2132, "COLDATA",  "fixed color data"),
    reg(0x2133, "SETINI",   "display control 2"),
    reg(0x2137, "SLHV",     "latch H/V counter"),
    reg(0x213E, "STAT77",   "PPU1 status"),
    reg(0x213F, "STAT78",   "PPU2 status"),
    reg(0x2140, "APUIO0",   "APU communication port 0"),
    reg(0x2141, "APUIO1",   "APU communication port 1"),
    reg(0x2142, "APUIO2",   "APU communication port 2"),
    reg(0x2143, "APUIO3",   "APU communication port 3"),
    reg(0x4200, "NMITIMEN", "interrupt enable and joypad"),
    reg(0x4201, "WRIO",     "programmable I/O port"),
    reg(0x4202, "WRMPYA",   "multiplicand A"),
    reg(0x4203, "WRMPYB",   "multiplicand B"),
    reg(0x4204, "WRDIVL",   "dividend (low)"),
    reg(0x4205, "WRDIVH",   "dividend (high)"),
    reg(0x4206, "WRDIVB",   "divisor"),
    reg(0x4207, "HTIMEL",   "H-count timer (low)"),
    reg(0x4209, "VTIMEL",   "V-count timer (low)"),
    reg(0x420B, "MDMAEN",   "DMA enable"),
    reg(0x420C, "HDMAEN",   "HDMA enable"),
    reg(0x420D, "MEMSEL",   "ROM access speed"),
    reg(0x4210, "RDNMI",    "NMI flag and version"),
    reg(0x4211, "TIMEUP",   "IRQ flag"),
    reg(0x4212, "HVBJOY",   "PPU status and joypad busy"),
    reg(0x4214, "RDDIVL",   "division result (low)"),
    reg(0x4216, "RDMPYL",   "multiplication result (low)"),
    reg(0x4218, "JOY1L",    "joypad 1 (low)"),
    reg(0x4219, "JOY1H",    "joypad 1 (high)"),
];

/// Exact lookup, with the DMA channel registers derived by formula.
pub fn register_info(addr: u16) -> Option<(String, &'static str)> {
    if let Some(entry) = HARDWARE_REGISTERS.iter().find(|r| r.addr == addr) {
        return Some((entry.name.to_string(), entry.description));
    }
    if (0x4300..=0x437F).contains(&addr) {
        let channel = (addr >> 4) & 0x7;
        let (suffix, description) = match addr & 0xF {
            0x0 => ("DMAP", "DMA control"),
            0x1 => ("BBAD", "DMA B-bus address"),
            0x2 => ("A1TL", "DMA A-bus address (low)"),
            0x3 => ("A1TH", "DMA A-bus address (high)"),
            0x4 => ("A1B", "DMA A-bus bank"),
            0x5 => ("DASL", "DMA byte count (low)"),
            0x6 => ("DASH", "DMA byte count (high)"),
            0x7 => ("DASB", "HDMA indirect bank"),
            0x8 => ("A2AL", "HDMA table address (low)"),
            0x9 => ("A2AH", "HDMA table address (high)"),
            0xA => ("NTRL", "HDMA line counter"),
            _ => return None,
        };
        return Some((format!("{suffix}{channel}"), description));
    }
    None
}

// -------------------------------------------------------------------------------------------------

/// Label/comment side maps plus the symbol table; decoded lines stay
/// untouched.
pub struct Enrichment {
    pub labels:   BTreeMap<AddrSnes, String>,
    pub comments: BTreeMap<AddrSnes, String>,
    pub symbols:  SymbolTable,
}

/// Caller-provided naming that overrides anything the pipeline chose.
#[derive(Clone, Debug, Default)]
pub struct Hints {
    pub labels:   BTreeMap<AddrSnes, String>,
    pub comments: BTreeMap<AddrSnes, String>,
    pub symbols:  BTreeMap<AddrSnes, String>,
}

pub fn enrich(
    disasm: &Disassembly, cfg: &ControlFlowGraph, data_structures: &[DataStructure],
    pattern_comments: &BTreeMap<AddrSnes, String>, hints: &Hints,
) -> Enrichment {
    let mut symbols = SymbolTable::default();

    for function in cfg.functions.values() {
        symbols.insert(Symbol {
            addr:        function.start,
            name:        format!("CODE_{:06X}", function.start.0),
            kind:        SymbolKind::Function,
            size:        function.end.map(|end| (end.0 - function.start.0) as usize + 1),
            confidence:  function.confidence,
            description: function.is_interrupt.then(|| "interrupt handler".to_string()),
        });
    }
    for structure in data_structures {
        symbols.insert(Symbol {
            addr:        structure.addr,
            name:        format!("DATA_{:06X}", structure.addr.0),
            kind:        SymbolKind::Data,
            size:        Some(structure.size),
            confidence:  structure.confidence,
            description: Some(structure.description.clone()),
        });
    }

    // Labels for every symbol and every branch target inside the walk.
    let mut labels: BTreeMap<AddrSnes, String> = BTreeMap::new();
    for symbol in symbols.iter() {
        labels.insert(symbol.addr, symbol.name.clone());
    }
    for &target in &disasm.flow_targets {
        labels.entry(target).or_insert_with(|| format!("CODE_{:06X}", target.0));
    }

    let mut comments = pattern_comments.clone();
    for insn in &disasm.lines {
        if let Some(comment) = register_comment(insn) {
            comments.entry(insn.addr).or_insert(comment);
        }
        if let Some(comment) = flag_comment(insn) {
            comments.insert(insn.addr, comment);
        }
        // Operands naming a known symbol get the name echoed.
        if let Some(operand) = insn.operand_address() {
            if let Some(name) = symbols.name_of(operand) {
                comments.entry(insn.addr).or_insert_with(|| format!("-> {name}"));
            }
        }
    }

    // Hints land last and override pipeline choices.
    for (&addr, name) in &hints.labels {
        labels.insert(addr, name.clone());
    }
    for (&addr, comment) in &hints.comments {
        comments.insert(addr, comment.clone());
    }
    for (&addr, name) in &hints.symbols {
        match symbols.map.get_mut(&addr) {
            Some(symbol) => symbol.name = name.clone(),
            None => symbols.insert(Symbol {
                addr,
                name: name.clone(),
                kind: SymbolKind::Variable,
                size: None,
                confidence: 1.0,
                description: None,
            }),
        }
        labels.insert(addr, name.clone());
    }

    Enrichment { labels, comments, symbols }
}

fn register_comment(insn: &Instruction) -> Option<String> {
    let operand = insn.operand_address()?;
    if (operand.bank() & 0x7F) >= 0x40 {
        return None;
    }
    let (name, description) = register_info(operand.word())?;
    let direction = match classify_access(insn) {
        AccessKind::Write => "write",
        AccessKind::Read => "read",
        _ => "access",
    };
    Some(format!("{name} - {description} ({direction})"))
}

/// REP/SEP immediates get the affected flag bits spelled out.
fn flag_comment(insn: &Instruction) -> Option<String> {
    let set = match insn.opcode.mnemonic {
        Mnemonic::SEP => true,
        Mnemonic::REP => false,
        _ => return None,
    };
    let bits = insn.immediate_value()? as u8;
    let mut parts = Vec::new();
    if bits & 0x20 != 0 {
        parts.push(if set { "8-bit A" } else { "16-bit A" });
    }
    if bits & 0x10 != 0 {
        parts.push(if set { "8-bit X/Y" } else { "16-bit X/Y" });
    }
    for (bit, name) in [(0x80, "N"), (0x40, "V"), (0x08, "D"), (0x04, "I"), (0x02, "Z"), (0x01, "C")] {
        if bits & bit != 0 {
            parts.push(name);
        }
    }
    (!parts.is_empty()).then(|| format!("{} {}", if set { "set:" } else { "clear:" }, parts.join(", ")))
}

// -------------------------------------------------------------------------------------------------
