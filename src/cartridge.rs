use std::fmt;

use crate::{
    internal_header::{MapMode, RomHeader},
    snes_utils::addr::{AddrPc, AddrSnes, AddressError, RomLayout},
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CartridgeType {
    LoRom,
    HiRom,
    ExLoRom,
    ExHiRom,
    Sa1,
    SuperFx,
    Bsx,
    Msu1,
    Dsp1,
    Dsp2,
    Dsp3,
    Dsp4,
    Cx4,
    Spc7110,
    Sdd1,
    Srtc,
    St01x,
    Obc1,
    Unknown,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemorySpeed {
    /// 2.68 MHz
    SlowRom,
    /// 3.58 MHz
    FastRom,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
    Rom,
    Ram,
    Sram,
    Io,
    OpenBus,
}

#[derive(Clone, Debug)]
pub struct MemoryRegion {
    pub start:       AddrSnes,
    pub end:         AddrSnes,
    pub kind:        MemoryRegionKind,
    pub readable:    bool,
    pub writable:    bool,
    pub description: &'static str,
}

impl MemoryRegion {
    pub fn size(&self) -> usize {
        (self.end.0 - self.start.0) as usize + 1
    }
}

#[derive(Clone, Debug)]
pub struct CartridgeInfo {
    pub cartridge_type: CartridgeType,
    pub map_mode:       MapMode,
    pub rom_size_kb:    u32,
    pub sram_size_kb:   u32,
    pub speed:          MemorySpeed,
    pub has_battery:    bool,
    pub has_rtc:        bool,
    pub regions:        Vec<MemoryRegion>,
}

// -------------------------------------------------------------------------------------------------

/// Cartridge classification. Expansion-chip bytes take precedence over the
/// map mode nibble; the nibble decides between the plain mapping modes.
pub fn classify(map_mode: MapMode, cart_type: u8) -> CartridgeType {
    use CartridgeType::*;
    match cart_type {
        0x03 => Dsp1,
        0x05 => Dsp2,
        0x06 => Dsp3,
        0x0A => Dsp4,
        0x13 | 0x14 | 0x15 | 0x1A => SuperFx,
        0x23 | 0x25 | 0x26 => Obc1,
        0x34 | 0x35 => Sa1,
        0x43 | 0x45 => Sdd1,
        0x55 => Srtc,
        0xE3 | 0xE5 => Bsx,
        0xF3 => Cx4,
        0xF5 | 0xF6 => St01x,
        0xF9 => Spc7110,
        0xFE => Msu1,
        _ => match map_mode.low_nibble() {
            0x0 | 0x2 | 0x3 => LoRom,
            0x1 | 0xA => HiRom,
            0x4 => ExLoRom,
            0x5 => ExHiRom,
            _ => Unknown,
        },
    }
}

const BATTERY_TYPES: [u8; 12] = [0x02, 0x05, 0x06, 0x09, 0x0A, 0x13, 0x14, 0x15, 0x1A, 0x35, 0x45, 0x55];

impl CartridgeInfo {
    pub fn from_header(header: &RomHeader, rom_len: usize) -> Self {
        let cartridge_type = classify(header.map_mode, header.cart_type);
        let speed = if header.map_mode.is_fast() { MemorySpeed::FastRom } else { MemorySpeed::SlowRom };
        let sram_size_kb = header.sram_size_in_kb();
        Self {
            cartridge_type,
            map_mode: header.map_mode,
            rom_size_kb: (rom_len / 1024) as u32,
            sram_size_kb,
            speed,
            has_battery: BATTERY_TYPES.contains(&header.cart_type),
            has_rtc: matches!(header.cart_type, 0x55 | 0xF9),
            regions: memory_regions(cartridge_type, sram_size_kb),
        }
    }

    pub fn mapper(&self, rom_len: usize) -> Mapper {
        Mapper::new(self.cartridge_type, self.map_mode, rom_len)
    }
}

fn memory_regions(cartridge_type: CartridgeType, sram_size_kb: u32) -> Vec<MemoryRegion> {
    use CartridgeType::*;
    use MemoryRegionKind::*;

    let region = |start, end, kind, readable, writable, description| MemoryRegion {
        start: AddrSnes(start),
        end: AddrSnes(end),
        kind,
        readable,
        writable,
        description,
    };

    let mut regions = vec![
        region(0x7E0000, 0x7FFFFF, Ram, true, true, "Work RAM (128 KiB)"),
        region(0x000000, 0x001FFF, Ram, true, true, "Work RAM mirror (banks 00-3F)"),
        region(0x002100, 0x00213F, Io, true, true, "PPU registers"),
        region(0x002140, 0x002143, Io, true, true, "APU communication ports"),
        region(0x004200, 0x0043FF, Io, true, true, "CPU, DMA and HDMA registers"),
    ];

    match rom_layout(cartridge_type, MapMode(0)) {
        RomLayout::HiRom | RomLayout::ExHiRom => {
            regions.push(region(0x008000, 0x3FFFFF, Rom, true, false, "HiROM program banks (upper halves)"));
            regions.push(region(0x400000, 0x7DFFFF, Rom, true, false, "HiROM program banks (full)"));
            regions.push(region(0xC00000, 0xFFFFFF, Rom, true, false, "HiROM FastROM mirror"));
            if sram_size_kb > 0 {
                regions.push(region(0x206000, 0x3F7FFF, Sram, true, true, "SRAM window (banks 20-3F)"));
            }
        }
        RomLayout::LoRom | RomLayout::ExLoRom => {
            regions.push(region(0x008000, 0x7DFFFF, Rom, true, false, "LoROM program banks (upper halves)"));
            regions.push(region(0x808000, 0xFFFFFF, Rom, true, false, "LoROM FastROM mirror"));
            if sram_size_kb > 0 {
                regions.push(region(0x700000, 0x7DFFFF, Sram, true, true, "SRAM (banks 70-7D)"));
            }
        }
    }

    match cartridge_type {
        Sa1 => {
            regions.push(region(0x003000, 0x0037FF, Ram, true, true, "SA-1 I-RAM"));
            regions.push(region(0x400000, 0x41FFFF, Ram, true, true, "SA-1 BW-RAM"));
            regions.push(region(0x002200, 0x0023FF, Io, true, true, "SA-1 registers"));
        }
        SuperFx => {
            regions.push(region(0x700000, 0x71FFFF, Ram, true, true, "SuperFX work RAM"));
            regions.push(region(0x003000, 0x0032FF, Io, true, true, "SuperFX registers"));
        }
        Bsx => {
            regions.push(region(0x900000, 0x9FFFFF, Rom, true, false, "BS-X flash cartridge window"));
            regions.push(region(0x005000, 0x005FFF, Io, true, true, "BS-X satellite registers"));
        }
        Msu1 => {
            regions.push(region(0x002000, 0x002007, Io, true, true, "MSU-1 ports"));
        }
        _ => {}
    }

    regions.push(region(0x002184, 0x0021FF, OpenBus, false, false, "Open bus"));
    regions
}

// -------------------------------------------------------------------------------------------------

/// The ROM view a cartridge type exposes. Chip carts reuse the LoROM view
/// unless their hardware is wired HiROM.
fn rom_layout(cartridge_type: CartridgeType, map_mode: MapMode) -> RomLayout {
    use CartridgeType::*;
    match cartridge_type {
        HiRom | Spc7110 | Sdd1 => RomLayout::HiRom,
        ExLoRom => RomLayout::ExLoRom,
        ExHiRom => RomLayout::ExHiRom,
        LoRom | Sa1 | SuperFx | Bsx | Msu1 | Dsp1 | Dsp2 | Dsp3 | Dsp4 | Cx4 | Srtc | St01x | Obc1 => RomLayout::LoRom,
        Unknown => match map_mode.low_nibble() {
            0x1 | 0xA => RomLayout::HiRom,
            0x5 => RomLayout::ExHiRom,
            0x4 => RomLayout::ExLoRom,
            _ => RomLayout::LoRom,
        },
    }
}

/// Bidirectional CPU-address / file-offset translation for one cartridge.
#[derive(Copy, Clone, Debug)]
pub struct Mapper {
    layout:  RomLayout,
    rom_len: usize,
}

impl Mapper {
    pub fn new(cartridge_type: CartridgeType, map_mode: MapMode, rom_len: usize) -> Self {
        Self { layout: rom_layout(cartridge_type, map_mode), rom_len }
    }

    /// Translates a CPU address into a file offset. Returns None for addresses
    /// that don't map to ROM (RAM, SRAM, IO, open bus, past end of image).
    pub fn cpu_to_file(&self, addr: AddrSnes) -> Option<AddrPc> {
        let pc = addr.to_file_offset(self.layout).ok()?;
        (pc.as_index() < self.rom_len).then_some(pc)
    }

    /// Translates a file offset into its lowest-bank canonical CPU address.
    pub fn file_to_cpu(&self, offset: AddrPc) -> Result<AddrSnes, AddressError> {
        offset.to_cpu_addr(self.layout)
    }

    pub fn is_rom_mapped(&self, addr: AddrSnes) -> bool {
        self.cpu_to_file(addr).is_some()
    }
}

// -------------------------------------------------------------------------------------------------

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CartridgeType::*;
        write!(f, "{}", match self {
            LoRom => "LoROM",
            HiRom => "HiROM",
            ExLoRom => "ExLoROM",
            ExHiRom => "ExHiROM",
            Sa1 => "SA-1",
            SuperFx => "SuperFX",
            Bsx => "BS-X",
            Msu1 => "MSU-1",
            Dsp1 => "DSP-1",
            Dsp2 => "DSP-2",
            Dsp3 => "DSP-3",
            Dsp4 => "DSP-4",
            Cx4 => "CX4",
            Spc7110 => "SPC7110",
            Sdd1 => "S-DD1",
            Srtc => "S-RTC",
            St01x => "ST010/ST011",
            Obc1 => "OBC-1",
            Unknown => "Unknown",
        })
    }
}

impl fmt::Display for MemorySpeed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SlowRom => write!(f, "SlowROM (2.68 MHz)"),
            Self::FastRom => write!(f, "FastROM (3.58 MHz)"),
        }
    }
}

// -------------------------------------------------------------------------------------------------
