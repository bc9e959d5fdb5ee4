//! Synthetic ROM images for the end-to-end scenarios.

// Not every test binary uses every builder.
#![allow(dead_code)]

use snes_disasm::Rom;

const LOROM_HEADER_BASE: usize = 0x7FB0;
const HIROM_HEADER_BASE: usize = 0xFFB0;

const MAP_MODE_OFFSET: usize = 0x15;
const COMPLEMENT_OFFSET: usize = 0x1C;
const CHECKSUM_OFFSET: usize = 0x1E;
const VECTORS_OFFSET: usize = 0x20;
const TITLE_LEN: usize = 21;

/// Builds a headered image byte-by-byte. Offsets are file offsets.
pub struct RomBuilder {
    data:        Vec<u8>,
    header_base: usize,
}

impl RomBuilder {
    pub fn lorom(size: usize) -> Self {
        let mut builder = Self { data: vec![0u8; size], header_base: LOROM_HEADER_BASE };
        builder.write_header(b"TEST PROGRAM", 0x20, 0x00);
        builder
    }

    pub fn hirom(size: usize) -> Self {
        let mut builder = Self { data: vec![0u8; size], header_base: HIROM_HEADER_BASE };
        builder.write_header(b"TEST PROGRAM", 0x21, 0x00);
        builder
    }

    fn write_header(&mut self, title: &[u8], map_mode: u8, cart_type: u8) {
        let base = self.header_base;
        let n = title.len().min(TITLE_LEN);
        self.data[base..base + n].copy_from_slice(&title[..n]);
        for b in &mut self.data[base + n..base + TITLE_LEN] {
            *b = b' ';
        }
        self.data[base + MAP_MODE_OFFSET] = map_mode;
        self.data[base + MAP_MODE_OFFSET + 1] = cart_type;
        self.data[base + MAP_MODE_OFFSET + 2] = 0x08; // 256 KB nominal
        let checksum = 0x1234u16;
        let complement = !checksum;
        self.data[base + COMPLEMENT_OFFSET..base + COMPLEMENT_OFFSET + 2].copy_from_slice(&complement.to_le_bytes());
        self.data[base + CHECKSUM_OFFSET..base + CHECKSUM_OFFSET + 2].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Entry in both vector tables; slot 5 is RESET.
    pub fn reset_vector(self, addr: u16) -> Self {
        self.vector(5, addr)
    }

    pub fn nmi_vector(self, addr: u16) -> Self {
        self.vector(3, addr)
    }

    fn vector(mut self, slot: usize, addr: u16) -> Self {
        let native = self.header_base + VECTORS_OFFSET + slot * 2;
        let emulation = native + 12;
        self.data[native..native + 2].copy_from_slice(&addr.to_le_bytes());
        self.data[emulation..emulation + 2].copy_from_slice(&addr.to_le_bytes());
        self
    }

    pub fn code(mut self, file_offset: usize, bytes: &[u8]) -> Self {
        self.data[file_offset..file_offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn with_copier_header(self) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data.extend_from_slice(&self.data);
        data
    }

    pub fn build(self) -> Rom {
        Rom::new(self.data).expect("synthetic ROM must be valid")
    }
}
