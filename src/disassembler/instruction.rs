use std::fmt::{Display, Formatter};

use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use crate::{
    disassembler::{
        opcodes::{AddressingMode::*, Opcode, SNES_OPCODES},
        status::StatusFlags,
    },
    snes_utils::addr::{AddrInner, AddrPc, AddrSnes},
};

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Error)]
pub enum DecodeError {
    #[error("Instruction stream truncated at {0}")]
    Truncated(AddrSnes),
    #[error("Unknown opcode {1:#04x} at {0}")]
    UnknownOpcode(AddrSnes, u8),
}

// -------------------------------------------------------------------------------------------------

/// One decoded line. Immutable once parsed; labels and comments live in side
/// maps keyed by `addr`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Instruction {
    /// CPU address of the opcode byte.
    pub addr:        AddrSnes,
    /// File offset the bytes were read from.
    pub offset:      AddrPc,
    pub opcode_byte: u8,
    /// Descriptor with flag-dependent immediate modes already resolved.
    pub opcode:      Opcode,
    pub m_flag:      bool,
    pub x_flag:      bool,

    // Valid length depends on the opcode, up to 3 operand bytes.
    operands: [u8; 4],
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DisplayInstruction(Instruction);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DisplayInstructionWithFlags(Instruction);

// -------------------------------------------------------------------------------------------------

impl Instruction {
    pub fn parse(
        bytes: &[u8], addr: AddrSnes, offset: AddrPc, flags: StatusFlags,
    ) -> Result<(Self, &[u8]), DecodeError> {
        let (&opcode_byte, rest) = bytes.split_first().ok_or(DecodeError::Truncated(addr))?;
        let mut opcode = SNES_OPCODES[opcode_byte as usize];

        if opcode.mode == ImmediateMFlagDependent {
            opcode.mode = if flags.acc_is_8bit() { Immediate8 } else { Immediate16 };
        } else if opcode.mode == ImmediateXFlagDependent {
            opcode.mode = if flags.index_is_8bit() { Immediate8 } else { Immediate16 };
        }

        let operands_size = opcode.mode.operands_size();
        if rest.len() < operands_size {
            return Err(DecodeError::Truncated(addr));
        }
        let (operands_v, rest) = rest.split_at(operands_size);
        let mut operands = [0u8; 4];
        operands[..operands_v.len()].copy_from_slice(operands_v);

        Ok((
            Self {
                addr,
                offset,
                opcode_byte,
                opcode,
                m_flag: flags.acc_is_8bit(),
                x_flag: flags.index_is_8bit(),
                operands,
            },
            rest,
        ))
    }

    pub fn operands(&self) -> &[u8] {
        &self.operands[0..self.opcode.mode.operands_size()]
    }

    /// The bytes this line consumed, opcode byte first.
    pub fn bytes(&self) -> SmallVec<[u8; 4]> {
        let mut bytes: SmallVec<[u8; 4]> = smallvec![self.opcode_byte];
        bytes.extend_from_slice(self.operands());
        bytes
    }

    pub fn size(&self) -> usize {
        self.opcode.instruction_size()
    }

    /// CPU address of the next sequential instruction.
    pub fn next_addr(&self) -> AddrSnes {
        self.addr + self.size() as AddrInner
    }

    /// Immediate operand value, if this line has an immediate operand.
    pub fn immediate_value(&self) -> Option<u16> {
        match self.opcode.mode {
            Constant8 | Immediate8 => Some(self.operands[0] as u16),
            Immediate16 => Some(u16::from_le_bytes([self.operands[0], self.operands[1]])),
            _ => None,
        }
    }

    /// The address named by the operand, resolved as far as static analysis
    /// allows: relative branches become absolute, in-bank operands borrow the
    /// instruction's bank, direct page operands land in bank 0.
    pub fn operand_address(&self) -> Option<AddrSnes> {
        let value = match self.opcode.mode {
            m if (DirectPage..=DirectPageYIndex).contains(&m) => self.operands[0] as AddrInner,
            DirectPageSIndex | DirectPageSIndexIndirectYIndex => self.operands[0] as AddrInner,
            Address | AddressXIndex | AddressYIndex | AddressXIndexIndirect => {
                let bank = self.addr.0 >> 16;
                let operand = u16::from_le_bytes([self.operands[0], self.operands[1]]);
                (bank << 16) | (operand as AddrInner)
            }
            AddressIndirect | AddressLongIndirect => u16::from_le_bytes([self.operands[0], self.operands[1]]) as _,
            Long | LongXIndex => u32::from_le_bytes([self.operands[0], self.operands[1], self.operands[2], 0]),
            Relative8 | Relative16 => {
                let program_counter = self.next_addr().0 as i32;
                let bank = program_counter >> 16;
                let jump_amount = match self.opcode.mode {
                    Relative8 => self.operands[0] as i8 as i32,
                    _ => i16::from_le_bytes([self.operands[0], self.operands[1]]) as i32,
                };
                ((bank << 16) | (program_counter.wrapping_add(jump_amount) & 0xFFFF)) as AddrInner
            }
            _ => return None,
        };
        Some(AddrSnes(value))
    }

    /// Jump or call destination, for the modes where it is statically known.
    pub fn static_jump_target(&self) -> Option<AddrSnes> {
        if self.opcode.mnemonic.is_branch_or_jump() || self.opcode.mnemonic.is_subroutine_call() {
            matches!(self.opcode.mode, Address | Long | Relative8 | Relative16)
                .then(|| self.operand_address())
                .flatten()
        } else {
            None
        }
    }

    /// Statically known continuations of this line, not counting subroutine
    /// returns into the caller.
    pub fn next_instructions(&self) -> SmallVec<[AddrSnes; 2]> {
        use crate::disassembler::opcodes::Mnemonic::*;

        match self.opcode.mnemonic {
            BRA | BRL | JMP | JML | JSR | JSL => match self.static_jump_target() {
                Some(target) => smallvec![target],
                None => smallvec![],
            },
            BCC | BCS | BEQ | BMI | BNE | BPL | BVC | BVS => match self.static_jump_target() {
                Some(target) => smallvec![target, self.next_addr()],
                None => smallvec![self.next_addr()],
            },
            // Interrupt and return destinations come from the vector tables.
            RTS | RTL | RTI | BRK | COP | STP | WAI => smallvec![],
            _ => smallvec![self.next_addr()],
        }
    }

    /// For calls, the address control flow returns to afterwards.
    pub fn return_address(&self) -> Option<AddrSnes> {
        self.opcode.mnemonic.is_subroutine_call().then(|| self.next_addr())
    }

    pub fn is_indirect_jump(&self) -> bool {
        use crate::disassembler::opcodes::Mnemonic::{JML, JMP};
        matches!(self.opcode.mnemonic, JMP | JML)
            && matches!(self.opcode.mode, AddressIndirect | AddressXIndexIndirect | AddressLongIndirect)
    }

    pub fn display(self) -> DisplayInstruction {
        DisplayInstruction(self)
    }

    pub fn display_with_flags(self) -> DisplayInstructionWithFlags {
        DisplayInstructionWithFlags(self)
    }
}

// -------------------------------------------------------------------------------------------------

impl Display for DisplayInstructionWithFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}{}] ", ['m', 'M'][self.0.m_flag as usize], ['x', 'X'][self.0.x_flag as usize])?;
        self.0.display().fmt(f)
    }
}

impl Display for DisplayInstruction {
    fn fmt(&self, outer_fmt: &mut Formatter) -> std::fmt::Result {
        use std::io::Write;
        let mut fmt: SmallVec<[u8; 64]> = Default::default();
        let i = &self.0;

        let (address_long, address_short, address_dp) = match i.operand_address() {
            Some(a) => (a.0, a.word(), a.low_byte()),
            None => (0, 0, 0),
        };

        write!(fmt, "{}", i.opcode.mnemonic).unwrap();
        match i.opcode.mode {
            Implied => {
                // no-op
            }
            Accumulator => {
                write!(fmt, " A").unwrap();
            }
            Constant8 | Immediate8 => {
                write!(fmt, " #${:02X}", i.operands[0]).unwrap();
            }
            Immediate16 => {
                write!(fmt, " #${:04X}", u16::from_le_bytes([i.operands[0], i.operands[1]])).unwrap();
            }
            ImmediateXFlagDependent | ImmediateMFlagDependent => {
                // Replaced during parse; format defensively anyway.
                write!(fmt, " #${:02X}", i.operands[0]).unwrap();
            }
            DirectPage => {
                write!(fmt, " ${address_dp:02X}").unwrap();
            }
            Relative8 | Relative16 => {
                write!(fmt, " ${address_short:04X}").unwrap();
            }
            Address => {
                write!(fmt, " ${address_short:04X}").unwrap();
            }
            Long => {
                write!(fmt, " ${address_long:06X}").unwrap();
            }
            DirectPageXIndex => {
                write!(fmt, " ${address_dp:02X}, X").unwrap();
            }
            AddressXIndex => {
                write!(fmt, " ${address_short:04X}, X").unwrap();
            }
            LongXIndex => {
                write!(fmt, " ${address_long:06X}, X").unwrap();
            }
            DirectPageYIndex => {
                write!(fmt, " ${address_dp:02X}, Y").unwrap();
            }
            AddressYIndex => {
                write!(fmt, " ${address_short:04X}, Y").unwrap();
            }
            DirectPageSIndex => {
                write!(fmt, " ${address_dp:02X}, S").unwrap();
            }
            DirectPageIndirect => {
                write!(fmt, " (${address_dp:02X})").unwrap();
            }
            AddressIndirect => {
                write!(fmt, " (${address_short:04X})").unwrap();
            }
            DirectPageXIndexIndirect => {
                write!(fmt, " (${address_dp:02X}, X)").unwrap();
            }
            AddressXIndexIndirect => {
                write!(fmt, " (${address_short:04X}, X)").unwrap();
            }
            DirectPageIndirectYIndex => {
                write!(fmt, " (${address_dp:02X}), Y").unwrap();
            }
            DirectPageSIndexIndirectYIndex => {
                write!(fmt, " (${address_dp:02X}, S), Y").unwrap();
            }
            DirectPageLongIndirect => {
                write!(fmt, " [${address_dp:02X}]").unwrap();
            }
            AddressLongIndirect => {
                write!(fmt, " [${address_short:04X}]").unwrap();
            }
            DirectPageLongIndirectYIndex => {
                write!(fmt, " [${address_dp:02X}], Y").unwrap();
            }
            BlockMove => {
                write!(fmt, " ${:02X}, ${:02X}", i.operands[0], i.operands[1]).unwrap();
            }
        };
        outer_fmt.pad(std::str::from_utf8(&fmt).unwrap())
    }
}

// -------------------------------------------------------------------------------------------------
