use std::{
    fmt,
    ops::{Add, AddAssign, Sub},
};

use thiserror::Error;

pub type AddrInner = u32;

/// The four cartridge wirings that decide how CPU addresses reach the ROM
/// file. Expansion chips reuse one of these for their ROM view.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RomLayout {
    LoRom,
    HiRom,
    ExLoRom,
    ExHiRom,
}

#[derive(Copy, Clone, Debug, Error)]
pub enum AddressError {
    #[error("CPU address {0} has no {1:?} file mapping")]
    NoFileMapping(AddrSnes, RomLayout),
    #[error("File offset {0} lies outside the {1:?} address space")]
    NoCpuMapping(AddrPc, RomLayout),
}

/// Offset into the ROM file.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AddrPc(pub AddrInner);

/// 24-bit address as the CPU sees it: bank byte over a 16-bit offset.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AddrSnes(pub AddrInner);

// -------------------------------------------------------------------------------------------------

impl AddrPc {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }

    /// Lowest-bank canonical CPU view of this file offset.
    pub fn to_cpu_addr(self, layout: RomLayout) -> Result<AddrSnes, AddressError> {
        let err = AddressError::NoCpuMapping(self, layout);
        match layout {
            RomLayout::LoRom => lorom_cpu_addr(self.0).ok_or(err),
            RomLayout::HiRom => hirom_cpu_addr(self.0).ok_or(err),
            // The extended layouts put the first 4 MiB of the file in banks
            // 80-FF and the remainder in banks 00-7D.
            RomLayout::ExLoRom => {
                if self.0 < 0x40_0000 {
                    lorom_cpu_addr(self.0).map(|a| AddrSnes(a.0 | 0x80_0000)).ok_or(err)
                } else {
                    lorom_cpu_addr(self.0 - 0x40_0000).ok_or(err)
                }
            }
            RomLayout::ExHiRom => {
                if self.0 < 0x40_0000 {
                    if self.0 & 0x8000 != 0 {
                        Ok(AddrSnes(self.0 | 0x80_0000))
                    } else {
                        Ok(AddrSnes(self.0 | 0xC0_0000))
                    }
                } else {
                    hirom_cpu_addr(self.0 - 0x40_0000).ok_or(err)
                }
            }
        }
    }
}

impl AddrSnes {
    pub fn bank(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The 16-bit in-bank part of the address.
    pub fn word(self) -> u16 {
        self.0 as u16
    }

    pub fn low_byte(self) -> u8 {
        self.0 as u8
    }

    /// Same in-bank offset, different bank.
    #[must_use]
    pub fn in_bank(self, bank: u8) -> Self {
        Self(((bank as AddrInner) << 16) | (self.0 & 0xFFFF))
    }

    pub fn to_file_offset(self, layout: RomLayout) -> Result<AddrPc, AddressError> {
        let err = AddressError::NoFileMapping(self, layout);
        match layout {
            RomLayout::LoRom => lorom_file_offset(self.0).ok_or(err),
            RomLayout::HiRom => hirom_file_offset(self.0).ok_or(err),
            RomLayout::ExLoRom => {
                let base = lorom_file_offset(self.0).ok_or(err)?;
                Ok(if self.0 & 0x80_0000 == 0 { AddrPc(base.0 + 0x40_0000) } else { base })
            }
            RomLayout::ExHiRom => {
                let base = hirom_file_offset(self.0).ok_or(err)?;
                Ok(if self.0 & 0x80_0000 == 0 { AddrPc(base.0 + 0x40_0000) } else { base })
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

fn lorom_cpu_addr(pc: AddrInner) -> Option<AddrSnes> {
    // Every 32 KiB file chunk lands in the upper half of one bank.
    (pc < 0x40_0000).then(|| AddrSnes(((pc << 1) & 0x7F_0000) | (pc & 0x7FFF) | 0x8000))
}

fn hirom_cpu_addr(pc: AddrInner) -> Option<AddrSnes> {
    if pc >= 0x40_0000 {
        return None;
    }
    // Banks 00-3F expose the upper halves, banks 40-7F the full 64 KiB.
    Some(if pc & 0x8000 != 0 { AddrSnes(pc) } else { AddrSnes(pc + 0x40_0000) })
}

fn lorom_file_offset(addr: AddrInner) -> Option<AddrPc> {
    reaches_rom(addr, true).then(|| AddrPc(((addr & 0x7F_0000) >> 1) | (addr & 0x7FFF)))
}

fn hirom_file_offset(addr: AddrInner) -> Option<AddrPc> {
    reaches_rom(addr, false).then(|| AddrPc(addr & 0x3F_FFFF))
}

/// WRAM, the lower-half system area and (for LoROM) the SRAM banks never
/// reach cartridge ROM.
fn reaches_rom(addr: AddrInner, lorom_sram_window: bool) -> bool {
    let wram = addr & 0xFE_0000 == 0x7E_0000;
    let system = addr & 0x40_8000 == 0;
    let sram = lorom_sram_window && addr & 0x70_8000 == 0x70_0000;
    !wram && !system && !sram
}

// -------------------------------------------------------------------------------------------------

impl Add<AddrInner> for AddrPc {
    type Output = Self;
    fn add(self, rhs: AddrInner) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub<AddrInner> for AddrPc {
    type Output = Self;
    fn sub(self, rhs: AddrInner) -> Self {
        Self(self.0 - rhs)
    }
}

impl AddAssign<AddrInner> for AddrPc {
    fn add_assign(&mut self, rhs: AddrInner) {
        self.0 += rhs;
    }
}

impl Add<AddrInner> for AddrSnes {
    type Output = Self;
    fn add(self, rhs: AddrInner) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub<AddrInner> for AddrSnes {
    type Output = Self;
    fn sub(self, rhs: AddrInner) -> Self {
        Self(self.0 - rhs)
    }
}

impl AddAssign<AddrInner> for AddrSnes {
    fn add_assign(&mut self, rhs: AddrInner) {
        self.0 += rhs;
    }
}

impl fmt::Display for AddrPc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06x}", self.0)
    }
}

impl fmt::Debug for AddrPc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddrPc({self})")
    }
}

impl fmt::Display for AddrSnes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:06X}", self.0)
    }
}

impl fmt::Debug for AddrSnes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddrSnes({self})")
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lorom_round_trip() {
        for &(snes, pc) in
            [(0x008000u32, 0x000000u32), (0x00FFFF, 0x007FFF), (0x018000, 0x008000), (0x1F8000, 0x0F8000)].iter()
        {
            assert_eq!(AddrSnes(snes).to_file_offset(RomLayout::LoRom).unwrap(), AddrPc(pc));
            assert_eq!(AddrPc(pc).to_cpu_addr(RomLayout::LoRom).unwrap(), AddrSnes(snes));
        }
    }

    #[test]
    fn hirom_lowest_bank_canonical() {
        // Upper halves resolve into banks 00-3F, lower halves into banks 40-7F.
        assert_eq!(AddrPc(0x008000).to_cpu_addr(RomLayout::HiRom).unwrap(), AddrSnes(0x008000));
        assert_eq!(AddrPc(0x001234).to_cpu_addr(RomLayout::HiRom).unwrap(), AddrSnes(0x401234));
        assert_eq!(AddrSnes(0x401234).to_file_offset(RomLayout::HiRom).unwrap(), AddrPc(0x001234));
        assert_eq!(AddrSnes(0xC01234).to_file_offset(RomLayout::HiRom).unwrap(), AddrPc(0x001234));
    }

    #[test]
    fn lorom_rejects_system_area() {
        assert!(AddrSnes(0x7E0000).to_file_offset(RomLayout::LoRom).is_err());
        assert!(AddrSnes(0x002100).to_file_offset(RomLayout::LoRom).is_err());
        assert!(AddrSnes(0x700000).to_file_offset(RomLayout::LoRom).is_err());
    }

    #[test]
    fn exhirom_spills_into_second_half() {
        assert_eq!(AddrSnes(0xC01234).to_file_offset(RomLayout::ExHiRom).unwrap(), AddrPc(0x001234));
        assert_eq!(AddrSnes(0x401234).to_file_offset(RomLayout::ExHiRom).unwrap(), AddrPc(0x401234));
    }

    #[test]
    fn bank_rewrites_keep_the_word() {
        let addr = AddrSnes(0x00C100);
        assert_eq!(addr.in_bank(0x01), AddrSnes(0x01C100));
        assert_eq!(addr.in_bank(0x01).word(), 0xC100);
        assert_eq!(addr.low_byte(), 0x00);
    }
}
