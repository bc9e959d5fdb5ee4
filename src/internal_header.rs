use std::fmt;

use nom::{
    bytes::complete::take,
    number::complete::{le_u16, le_u8},
    sequence::pair,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::snes_utils::{
    addr::{AddrPc, AddrSnes},
    rom::Rom,
};

#[rustfmt::skip]
pub mod offsets {
    pub const MAP_MODE:         usize = 0x15;
    pub const COMPLEMENT_CHECK: usize = 0x1C;
    pub const CHECKSUM:         usize = 0x1E;
    pub const VECTOR_TABLES:    usize = 0x20;
}

#[rustfmt::skip]
pub mod sizes {
    pub const INTERNAL_HEADER:   usize = 32;
    pub const INTERNAL_ROM_NAME: usize = 21;
    pub const VECTOR_TABLES:     usize = 24;
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HeaderParseError {
    #[error("Couldn't find internal ROM header")]
    NotFound,
    #[error("Reading header block at candidate location")]
    ReadHeaderBlock,
    #[error("Reading internal ROM name")]
    ReadRomName,
    #[error("Reading interrupt vector tables")]
    ReadVectorTables,
}

// -------------------------------------------------------------------------------------------------

/// Where in the image the internal header was found.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeaderLocation {
    LoRom,
    HiRom,
}

impl HeaderLocation {
    pub const fn file_offset(self) -> AddrPc {
        match self {
            Self::LoRom => AddrPc(0x7FB0),
            Self::HiRom => AddrPc(0xFFB0),
        }
    }
}

/// Raw map mode byte with bit accessors.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MapMode(pub u8);

#[rustfmt::skip]
impl MapMode {
    pub fn low_nibble(&self) -> u8   { self.0 & 0x0F }
    pub fn is_fast(&self)    -> bool { (self.0 & 0b010000) != 0 }
    pub fn is_slow(&self)    -> bool { !self.is_fast() }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RegionCode {
    Japan        = 0x00,
    NorthAmerica = 0x01,
    Europe       = 0x02,
    Sweden       = 0x03,
    Finland      = 0x04,
    Denmark      = 0x05,
    France       = 0x06,
    Netherlands  = 0x07,
    Spain        = 0x08,
    Germany      = 0x09,
    Italy        = 0x0A,
    China        = 0x0B,
    Indonesia    = 0x0C,
    Korea        = 0x0D,
    Global       = 0x0E,
    Canada       = 0x0F,
    Brazil       = 0x10,
    Australia    = 0x11,
}

/// One six-entry table of 16-bit interrupt vectors.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VectorTable {
    pub cop:   u16,
    pub brk:   u16,
    pub abort: u16,
    pub nmi:   u16,
    pub irq:   u16,
    pub reset: u16,
}

impl VectorTable {
    /// Vectors always point into bank 0 of the CPU address space.
    pub fn entries(&self) -> [(InterruptKind, AddrSnes); 6] {
        use InterruptKind::*;
        [
            (Cop, AddrSnes(self.cop as _)),
            (Brk, AddrSnes(self.brk as _)),
            (Abort, AddrSnes(self.abort as _)),
            (Nmi, AddrSnes(self.nmi as _)),
            (Irq, AddrSnes(self.irq as _)),
            (Reset, AddrSnes(self.reset as _)),
        ]
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InterruptKind {
    Cop,
    Brk,
    Abort,
    Nmi,
    Irq,
    Reset,
}

pub struct RomHeader {
    pub title:             String,
    pub map_mode:          MapMode,
    pub cart_type:         u8,
    pub rom_size:          u8,
    pub ram_size:          u8,
    pub region_code:       u8,
    pub developer_id:      u8,
    pub version_number:    u8,
    pub complement:        u16,
    pub checksum:          u16,
    pub native_vectors:    VectorTable,
    pub emulation_vectors: VectorTable,
    pub location:          HeaderLocation,
    /// Both candidate locations validated; LoROM won unless outscored.
    pub ambiguous:         bool,
}

// -------------------------------------------------------------------------------------------------

impl RomHeader {
    pub fn parse(rom: &Rom) -> Result<Self, HeaderParseError> {
        let (location, ambiguous) = Self::find(rom)?;
        Self::parse_at(rom, location, ambiguous)
    }

    /// Probes both candidate locations. A candidate validates when its checksum and
    /// complement sum to 0xFFFF and at least half of its title bytes are printable.
    fn find(rom: &Rom) -> Result<(HeaderLocation, bool), HeaderParseError> {
        let lo_score = Self::candidate_score(rom, HeaderLocation::LoRom);
        let hi_score = Self::candidate_score(rom, HeaderLocation::HiRom);

        match (lo_score, hi_score) {
            (Some(lo), Some(hi)) => {
                let location = if hi > lo { HeaderLocation::HiRom } else { HeaderLocation::LoRom };
                log::warn!("Both header candidates validate, picked {location:?} (LoROM {lo:.2} vs HiROM {hi:.2})");
                Ok((location, true))
            }
            (Some(_), None) => {
                log::info!("Internal ROM header found at LoROM location");
                Ok((HeaderLocation::LoRom, false))
            }
            (None, Some(_)) => {
                log::info!("Internal ROM header found at HiROM location");
                Ok((HeaderLocation::HiRom, false))
            }
            (None, None) => {
                log::error!("Couldn't find internal ROM header due to invalid checksums");
                Err(HeaderParseError::NotFound)
            }
        }
    }

    /// Printable-character ratio of the candidate's title, or None if it fails validation.
    fn candidate_score(rom: &Rom, location: HeaderLocation) -> Option<f32> {
        let base = location.file_offset();
        let title = rom.read(base, sizes::INTERNAL_ROM_NAME).ok()?;
        let (complement, checksum) =
            rom.parse_at(base + offsets::COMPLEMENT_CHECK as u32, 4, pair(le_u16, le_u16)).ok()?;

        if checksum.wrapping_add(complement) != 0xFFFF {
            return None;
        }
        let printable = title.iter().filter(|b| (0x20..=0x7E).contains(*b)).count();
        let ratio = printable as f32 / sizes::INTERNAL_ROM_NAME as f32;
        (ratio >= 0.5).then_some(ratio)
    }

    fn parse_at(rom: &Rom, location: HeaderLocation, ambiguous: bool) -> Result<Self, HeaderParseError> {
        let base = location.file_offset();

        let title = rom
            .parse_at(base, sizes::INTERNAL_ROM_NAME, take(sizes::INTERNAL_ROM_NAME))
            .map_err(|_| HeaderParseError::ReadRomName)
            .map(|bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned())?;

        let field = |index: usize| {
            rom.parse_at(base + (offsets::MAP_MODE + index) as u32, 1, le_u8)
                .map_err(|_| HeaderParseError::ReadHeaderBlock)
        };

        let (complement, checksum) = rom
            .parse_at(base + offsets::COMPLEMENT_CHECK as u32, 4, pair(le_u16, le_u16))
            .map_err(|_| HeaderParseError::ReadHeaderBlock)?;

        let vectors_base = base + offsets::VECTOR_TABLES as u32;
        let native_vectors = Self::parse_vector_table(rom, vectors_base)?;
        let emulation_vectors = Self::parse_vector_table(rom, vectors_base + (sizes::VECTOR_TABLES / 2) as u32)?;

        Ok(Self {
            title,
            map_mode: MapMode(field(0)?),
            cart_type: field(1)?,
            rom_size: field(2)?,
            ram_size: field(3)?,
            region_code: field(4)?,
            developer_id: field(5)?,
            version_number: field(6)?,
            complement,
            checksum,
            native_vectors,
            emulation_vectors,
            location,
            ambiguous,
        })
    }

    fn parse_vector_table(rom: &Rom, base: AddrPc) -> Result<VectorTable, HeaderParseError> {
        let slot = |index: u32| {
            rom.parse_at(base + index * 2, 2, le_u16).map_err(|_| HeaderParseError::ReadVectorTables)
        };
        Ok(VectorTable {
            cop:   slot(0)?,
            brk:   slot(1)?,
            abort: slot(2)?,
            nmi:   slot(3)?,
            irq:   slot(4)?,
            reset: slot(5)?,
        })
    }

    /// The entry point of the program, read from the emulation table.
    pub fn reset_vector(&self) -> AddrSnes {
        AddrSnes(self.emulation_vectors.reset as _)
    }

    /// Every non-zero vector from both tables, reset first, deduplicated.
    pub fn interrupt_vectors(&self) -> Vec<(InterruptKind, AddrSnes)> {
        let mut seen = std::collections::HashSet::new();
        let mut out = vec![(InterruptKind::Reset, self.reset_vector())];
        seen.insert(self.reset_vector());
        for (kind, addr) in self.emulation_vectors.entries().into_iter().chain(self.native_vectors.entries()) {
            if addr.0 != 0 && seen.insert(addr) {
                out.push((kind, addr));
            }
        }
        out
    }

    pub fn region(&self) -> Option<RegionCode> {
        RegionCode::try_from(self.region_code).ok()
    }

    pub fn rom_size_in_kb(&self) -> u32 {
        2u32.pow(self.rom_size as u32)
    }

    pub fn sram_size_in_kb(&self) -> u32 {
        match self.ram_size as u32 {
            0 => 0,
            exponent => 2u32.pow(exponent),
        }
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RegionCode::*;
        write!(f, "{}", match self {
            Japan => "Japan",
            NorthAmerica => "North America",
            Europe => "Europe",
            Sweden => "Sweden",
            Finland => "Finland",
            Denmark => "Denmark",
            France => "France",
            Netherlands => "Netherlands",
            Spain => "Spain",
            Germany => "Germany",
            Italy => "Italy",
            China => "China",
            Indonesia => "Indonesia",
            Korea => "Korea",
            Global => "Global",
            Canada => "Canada",
            Brazil => "Brazil",
            Australia => "Australia",
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_rom(size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    fn put_header(data: &mut [u8], base: usize, title: &[u8], map_mode: u8, reset: u16) {
        data[base..base + title.len()].copy_from_slice(title);
        for b in &mut data[base + title.len()..base + sizes::INTERNAL_ROM_NAME] {
            *b = b' ';
        }
        data[base + offsets::MAP_MODE] = map_mode;
        let checksum = 0x1234u16;
        let complement = !checksum;
        data[base + offsets::COMPLEMENT_CHECK..base + offsets::COMPLEMENT_CHECK + 2]
            .copy_from_slice(&complement.to_le_bytes());
        data[base + offsets::CHECKSUM..base + offsets::CHECKSUM + 2].copy_from_slice(&checksum.to_le_bytes());
        // Emulation-table reset vector.
        let reset_off = base + offsets::VECTOR_TABLES + sizes::VECTOR_TABLES / 2 + 10;
        data[reset_off..reset_off + 2].copy_from_slice(&reset.to_le_bytes());
    }

    #[test]
    fn lorom_header_is_found() {
        let mut data = blank_rom(0x8000);
        put_header(&mut data, 0x7FB0, b"TEST CART", 0x20, 0x8000);
        let rom = Rom::new(data).unwrap();
        let header = RomHeader::parse(&rom).unwrap();
        assert_eq!(header.location, HeaderLocation::LoRom);
        assert!(!header.ambiguous);
        assert_eq!(header.reset_vector(), AddrSnes(0x8000));
        assert!(header.title.starts_with("TEST CART"));
    }

    #[test]
    fn hirom_header_is_found() {
        let mut data = blank_rom(0x10000);
        put_header(&mut data, 0xFFB0, b"HIGH CART", 0x21, 0x8123);
        let rom = Rom::new(data).unwrap();
        let header = RomHeader::parse(&rom).unwrap();
        assert_eq!(header.location, HeaderLocation::HiRom);
        assert_eq!(header.reset_vector(), AddrSnes(0x8123));
    }

    #[test]
    fn ambiguity_prefers_lorom() {
        let mut data = blank_rom(0x10000);
        put_header(&mut data, 0x7FB0, b"LOW CART", 0x20, 0x8000);
        put_header(&mut data, 0xFFB0, b"HIGH CART", 0x21, 0x8000);
        let rom = Rom::new(data).unwrap();
        let header = RomHeader::parse(&rom).unwrap();
        assert_eq!(header.location, HeaderLocation::LoRom);
        assert!(header.ambiguous);
    }

    #[test]
    fn garbage_image_has_no_header() {
        let rom = Rom::new(blank_rom(0x8000)).unwrap();
        assert!(matches!(RomHeader::parse(&rom), Err(HeaderParseError::NotFound)));
    }

    #[test]
    fn every_non_zero_vector_is_reported() {
        let mut data = blank_rom(0x8000);
        put_header(&mut data, 0x7FB0, b"VECTOR CART", 0x20, 0x8000);
        // Erased-flash filler in the native IRQ slot still counts as a vector.
        let irq_off = 0x7FB0 + offsets::VECTOR_TABLES + 8;
        data[irq_off..irq_off + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let rom = Rom::new(data).unwrap();
        let header = RomHeader::parse(&rom).unwrap();
        assert!(header.interrupt_vectors().iter().any(|&(_, a)| a == AddrSnes(0xFFFF)));
    }
}
