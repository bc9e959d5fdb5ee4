use std::{fs, path::Path};

use thiserror::Error;

use crate::snes_utils::addr::AddrPc;

pub const SMC_HEADER_SIZE: usize = 0x200;

/// Smallest image the pipeline accepts: one 32 KiB LoROM bank.
pub const MIN_ROM_SIZE: usize = 0x8000;

pub type ParseErr<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RomError {
    #[error("ROM image is empty")]
    Empty,
    #[error("ROM image too small: {0} bytes")]
    TooSmall(usize),
    #[error("Invalid ROM size: {0} ({0:#x})")]
    Size(usize),
    #[error("ROM has no {len} bytes at file offset {offset}")]
    OutOfBounds { offset: AddrPc, len: usize },
    #[error("Failed to parse ROM bytes")]
    Parse,
    #[error("File IO error: {0}")]
    Io(#[from] std::io::Error),
}

// -------------------------------------------------------------------------------------------------

/// An SNES ROM image with any copier header already stripped.
pub struct Rom(pub Vec<u8>);

impl Rom {
    pub fn new(mut data: Vec<u8>) -> Result<Self, RomError> {
        if data.is_empty() {
            return Err(RomError::Empty);
        }
        let modulo_1k = data.len() % 0x400;
        let data = if modulo_1k == 0 {
            data
        } else if modulo_1k == SMC_HEADER_SIZE {
            data.drain(SMC_HEADER_SIZE..).collect()
        } else {
            return Err(RomError::Size(data.len()));
        };
        if data.len() < MIN_ROM_SIZE {
            return Err(RomError::TooSmall(data.len()));
        }
        Ok(Self(data))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        Self::new(fs::read(path)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bounds-checked window into the image.
    pub fn read(&self, offset: AddrPc, len: usize) -> Result<&[u8], RomError> {
        self.0.get(offset.as_index()..offset.as_index() + len).ok_or(RomError::OutOfBounds { offset, len })
    }

    /// Runs a nom parser over `len` bytes at `offset`.
    pub fn parse_at<'s, Ret, Parser>(&'s self, offset: AddrPc, len: usize, mut f: Parser) -> Result<Ret, RomError>
    where
        Parser: nom::Parser<&'s [u8], Ret, nom::error::Error<&'s [u8]>>,
    {
        let bytes = self.read(offset, len)?;
        let (_, ret) = f.parse(bytes).map_err(|_: ParseErr| RomError::Parse)?;
        Ok(ret)
    }
}

// -------------------------------------------------------------------------------------------------
