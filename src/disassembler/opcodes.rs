use std::fmt;

use AddressingMode::*;
use Mnemonic::*;

// -------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AddressingMode {
    Accumulator,
    Address,
    AddressIndirect,
    AddressLongIndirect,
    AddressXIndex,
    AddressYIndex,
    AddressXIndexIndirect,
    BlockMove,
    Constant8,
    DirectPage,
    DirectPageIndirect,
    DirectPageIndirectYIndex,
    DirectPageLongIndirect,
    DirectPageLongIndirectYIndex,
    DirectPageXIndex,
    DirectPageXIndexIndirect,
    DirectPageYIndex,
    DirectPageSIndex,
    DirectPageSIndexIndirectYIndex,
    Implied,
    Immediate8,
    Immediate16,
    ImmediateXFlagDependent,
    ImmediateMFlagDependent,
    Long,
    LongXIndex,
    Relative8,
    Relative16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mnemonic {
    /// Add with carry
    ADC,
    /// AND Accumulator
    AND,
    /// Left-shift Accumulator
    ASL,
    /// Branch if carry clear
    BCC,
    /// Branch if carry set
    BCS,
    /// Branch if equal
    BEQ,
    /// Bit test
    BIT,
    /// Branch if minus
    BMI,
    /// Branch if not equal
    BNE,
    /// Branch if plus
    BPL,
    /// Branch always
    BRA,
    /// Break to instruction
    BRK,
    /// Branch relative long
    BRL,
    /// Branch if overflow clear
    BVC,
    /// Branch if overflow set
    BVS,
    /// Clear carry flag
    CLC,
    /// Clear decimal flag
    CLD,
    /// Clear interrupt flag
    CLI,
    /// Clear overflow flag
    CLV,
    /// Compare Accumulator with memory
    CMP,
    /// Compare X with memory
    CPX,
    /// Compare Y with memory
    CPY,
    /// Coprocessor Empowerment
    COP,
    /// Decrement Accumulator
    DEC,
    /// Decrement X
    DEX,
    /// Decrement Y
    DEY,
    /// Exclusive-OR Accumulator
    EOR,
    /// Increment Accumulator
    INC,
    /// Increment X
    INX,
    /// Increment Y
    INY,
    /// Jump to location
    JMP,
    /// Jump long
    JML,
    /// Jump subroutine
    JSR,
    /// Jump subroutine long
    JSL,
    /// Load Accumulator with memory
    LDA,
    /// Load X with memory
    LDX,
    /// Load Y with memory
    LDY,
    /// Right-shift Accumulator or memory
    LSR,
    /// Block move negative
    MVN,
    /// Block move positive
    MVP,
    /// No operation
    NOP,
    /// OR Accumulator with memory
    ORA,
    /// Push effective address
    PEA,
    /// Push effective indirect address
    PEI,
    /// Push program counter relative
    PER,
    /// Push Accumulator
    PHA,
    /// Push Data Bank Register
    PHB,
    /// Push Direct Page Register
    PHD,
    /// Push Program Bank
    PHK,
    /// Push Processor Status
    PHP,
    /// Push X
    PHX,
    /// Push Y
    PHY,
    /// Pull Accumulator
    PLA,
    /// Pull Data Bank Register
    PLB,
    /// Pull Direct Page Register
    PLD,
    /// Pull flags
    PLP,
    /// Pull X
    PLX,
    /// Pull Y
    PLY,
    /// Reset flag
    REP,
    /// Rotate bit left
    ROL,
    /// Rotate bit right
    ROR,
    /// Return from interrupt
    RTI,
    /// Return from subroutine
    RTS,
    /// Return from subroutine long
    RTL,
    /// Subtract with carry
    SBC,
    /// Set carry flag
    SEC,
    /// Set decimal flag
    SED,
    /// Set interrupt flag
    SEI,
    /// Set flag
    SEP,
    /// Store Accumulator to memory
    STA,
    /// Store X to memory
    STX,
    /// Store Y to memory
    STY,
    /// Stop the clock
    STP,
    /// Store zero to memory
    STZ,
    /// Transfer Accumulator to X
    TAX,
    /// Transfer Accumulator to Y
    TAY,
    /// Transfer Accumulator to Direct Page
    TCD,
    /// Transfer Accumulator to Stack
    TCS,
    /// Transfer Direct Page to Accumulator
    TDC,
    /// Transfer Stack to Accumulator
    TSC,
    /// Transfer Stack to X
    TSX,
    /// Transfer X to Accumulator
    TXA,
    /// Transfer X to Stack
    TXS,
    /// Transfer X to Y
    TXY,
    /// Transfer Y to Accumulator
    TYA,
    /// Transfer Y to X
    TYX,
    /// Test and reset bit
    TRB,
    /// Test and set bit
    TSB,
    /// Wait for interrupt
    WAI,
    /// (Reserved for future expansion)
    WDM,
    /// Exchange B with A (bytes in Accumulator)
    XBA,
    /// Exchange Carry with Emulation
    XCE,
}

/// Conditions under which an instruction takes extra cycles.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CycleMods(pub u8);

#[rustfmt::skip]
impl CycleMods {
    pub const NONE:                Self = Self(0);
    /// +1 cycle with a 16-bit accumulator
    pub const M16:                 Self = Self(1 << 0);
    /// +1 cycle with 16-bit index registers
    pub const X16:                 Self = Self(1 << 1);
    /// +1 cycle when indexing crosses a page boundary
    pub const PAGE:                Self = Self(1 << 2);
    /// +1 cycle when the branch is taken
    pub const BRANCH_TAKEN:        Self = Self(1 << 3);
    /// +1 cycle when a taken branch crosses a page in emulation mode
    pub const BRANCH_PAGE_CROSSED: Self = Self(1 << 4);

    pub fn contains(self, other: Self) -> bool { (self.0 & other.0) == other.0 }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode:     AddressingMode,
    pub cycles:   u8,
    pub mods:     CycleMods,
}

// -------------------------------------------------------------------------------------------------

#[rustfmt::skip]
impl Mnemonic {
    pub fn can_change_program_counter(self) -> bool {
        self.is_branch_or_jump() || self.is_subroutine_call() || self.is_subroutine_return()
            || matches!(self, BRK | COP | STP | WAI)
    }

    /// Unconditional control transfers with exactly one continuation.
    pub fn is_single_path_leap(self) -> bool {
        matches!(self, BRA | BRL | JMP | JML)
    }

    /// Conditional branches: both the target and the fall-through continue.
    pub fn is_double_path(self) -> bool {
        matches!(self, BCC | BCS | BEQ | BMI | BNE | BPL | BVC | BVS)
    }

    pub fn is_branch_or_jump(self) -> bool {
        self.is_single_path_leap() || self.is_double_path()
    }

    pub fn is_subroutine_call(self) -> bool {
        matches!(self, JSR | JSL)
    }

    pub fn is_subroutine_return(self) -> bool {
        matches!(self, RTS | RTL | RTI)
    }

    /// Immediate operand width follows the M flag.
    pub fn is_m_flag_sensitive(self) -> bool {
        matches!(self, LDA | STA | CMP | ADC | SBC | AND | ORA | EOR | BIT)
    }

    /// Immediate operand width follows the X flag.
    pub fn is_x_flag_sensitive(self) -> bool {
        matches!(self, LDX | LDY | CPX | CPY)
    }

    pub fn is_memory_read(self) -> bool {
        matches!(self, LDA | LDX | LDY | CMP | CPX | CPY | BIT | ADC | SBC | AND | ORA | EOR)
    }

    pub fn is_memory_write(self) -> bool {
        matches!(self, STA | STX | STY | STZ)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl AddressingMode {
    #[inline]
    pub fn operands_size(self) -> usize {
        match self {
            Accumulator | Implied => 0,
            Long | LongXIndex => 3,
            Immediate16 | Relative16 | BlockMove => 2,
            m if (Address..=AddressXIndexIndirect).contains(&m) => 2,
            ImmediateXFlagDependent | ImmediateMFlagDependent => {
                // These two modes must be replaced with Immediate8 or Immediate16,
                // depending on the X and M flags.
                unreachable!()
            }
            _ => 1,
        }
    }
}

impl Opcode {
    pub const fn new(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8, mods: CycleMods) -> Self {
        Self { mnemonic, mode, cycles, mods }
    }

    #[inline]
    pub fn instruction_size(self) -> usize {
        1 + self.mode.operands_size()
    }
}

// -------------------------------------------------------------------------------------------------

const N: CycleMods = CycleMods::NONE;
const M: CycleMods = CycleMods::M16;
const X: CycleMods = CycleMods::X16;
const MP: CycleMods = CycleMods(CycleMods::M16.0 | CycleMods::PAGE.0);
const XP: CycleMods = CycleMods(CycleMods::X16.0 | CycleMods::PAGE.0);
const B: CycleMods = CycleMods(CycleMods::BRANCH_TAKEN.0 | CycleMods::BRANCH_PAGE_CROSSED.0);

/// Ordered by hex values of opcodes
#[rustfmt::skip]
pub static SNES_OPCODES: [Opcode; 0x100] = [
    /* 00 */ Opcode::new(BRK, Constant8, 7, N),
    /* 01 */ Opcode::new(ORA, DirectPageXIndexIndirect, 6, M),
    /* 02 */ Opcode::new(COP, Constant8, 7, N),
    /* 03 */ Opcode::new(ORA, DirectPageSIndex, 4, M),
    /* 04 */ Opcode::new(TSB, DirectPage, 5, M),
    /* 05 */ Opcode::new(ORA, DirectPage, 3, M),
    /* 06 */ Opcode::new(ASL, DirectPage, 5, M),
    /* 07 */ Opcode::new(ORA, DirectPageLongIndirect, 6, M),
    /* 08 */ Opcode::new(PHP, Implied, 3, N),
    /* 09 */ Opcode::new(ORA, ImmediateMFlagDependent, 2, M),
    /* 0A */ Opcode::new(ASL, Accumulator, 2, N),
    /* 0B */ Opcode::new(PHD, Implied, 4, N),
    /* 0C */ Opcode::new(TSB, Address, 6, M),
    /* 0D */ Opcode::new(ORA, Address, 4, M),
    /* 0E */ Opcode::new(ASL, Address, 6, M),
    /* 0F */ Opcode::new(ORA, Long, 5, M),
    /* 10 */ Opcode::new(BPL, Relative8, 2, B),
    /* 11 */ Opcode::new(ORA, DirectPageIndirectYIndex, 5, MP),
    /* 12 */ Opcode::new(ORA, DirectPageIndirect, 5, M),
    /* 13 */ Opcode::new(ORA, DirectPageSIndexIndirectYIndex, 7, M),
    /* 14 */ Opcode::new(TRB, DirectPage, 5, M),
    /* 15 */ Opcode::new(ORA, DirectPageXIndex, 4, M),
    /* 16 */ Opcode::new(ASL, DirectPageXIndex, 6, M),
    /* 17 */ Opcode::new(ORA, DirectPageLongIndirectYIndex, 6, M),
    /* 18 */ Opcode::new(CLC, Implied, 2, N),
    /* 19 */ Opcode::new(ORA, AddressYIndex, 4, MP),
    /* 1A */ Opcode::new(INC, Accumulator, 2, N),
    /* 1B */ Opcode::new(TCS, Implied, 2, N),
    /* 1C */ Opcode::new(TRB, Address, 6, M),
    /* 1D */ Opcode::new(ORA, AddressXIndex, 4, MP),
    /* 1E */ Opcode::new(ASL, AddressXIndex, 7, M),
    /* 1F */ Opcode::new(ORA, LongXIndex, 5, M),
    /* 20 */ Opcode::new(JSR, Address, 6, N),
    /* 21 */ Opcode::new(AND, DirectPageXIndexIndirect, 6, M),
    /* 22 */ Opcode::new(JSL, Long, 8, N),
    /* 23 */ Opcode::new(AND, DirectPageSIndex, 4, M),
    /* 24 */ Opcode::new(BIT, DirectPage, 3, M),
    /* 25 */ Opcode::new(AND, DirectPage, 3, M),
    /* 26 */ Opcode::new(ROL, DirectPage, 5, M),
    /* 27 */ Opcode::new(AND, DirectPageLongIndirect, 6, M),
    /* 28 */ Opcode::new(PLP, Implied, 4, N),
    /* 29 */ Opcode::new(AND, ImmediateMFlagDependent, 2, M),
    /* 2A */ Opcode::new(ROL, Accumulator, 2, N),
    /* 2B */ Opcode::new(PLD, Implied, 5, N),
    /* 2C */ Opcode::new(BIT, Address, 4, M),
    /* 2D */ Opcode::new(AND, Address, 4, M),
    /* 2E */ Opcode::new(ROL, Address, 6, M),
    /* 2F */ Opcode::new(AND, Long, 5, M),
    /* 30 */ Opcode::new(BMI, Relative8, 2, B),
    /* 31 */ Opcode::new(AND, DirectPageIndirectYIndex, 5, MP),
    /* 32 */ Opcode::new(AND, DirectPageIndirect, 5, M),
    /* 33 */ Opcode::new(AND, DirectPageSIndexIndirectYIndex, 7, M),
    /* 34 */ Opcode::new(BIT, DirectPageXIndex, 4, M),
    /* 35 */ Opcode::new(AND, DirectPageXIndex, 4, M),
    /* 36 */ Opcode::new(ROL, DirectPageXIndex, 6, M),
    /* 37 */ Opcode::new(AND, DirectPageLongIndirectYIndex, 6, M),
    /* 38 */ Opcode::new(SEC, Implied, 2, N),
    /* 39 */ Opcode::new(AND, AddressYIndex, 4, MP),
    /* 3A */ Opcode::new(DEC, Accumulator, 2, N),
    /* 3B */ Opcode::new(TSC, Implied, 2, N),
    /* 3C */ Opcode::new(BIT, AddressXIndex, 4, MP),
    /* 3D */ Opcode::new(AND, AddressXIndex, 4, MP),
    /* 3E */ Opcode::new(ROL, AddressXIndex, 7, M),
    /* 3F */ Opcode::new(AND, LongXIndex, 5, M),
    /* 40 */ Opcode::new(RTI, Implied, 7, N),
    /* 41 */ Opcode::new(EOR, DirectPageXIndexIndirect, 6, M),
    /* 42 */ Opcode::new(WDM, Constant8, 2, N),
    /* 43 */ Opcode::new(EOR, DirectPageSIndex, 4, M),
    /* 44 */ Opcode::new(MVP, BlockMove, 7, N),
    /* 45 */ Opcode::new(EOR, DirectPage, 3, M),
    /* 46 */ Opcode::new(LSR, DirectPage, 5, M),
    /* 47 */ Opcode::new(EOR, DirectPageLongIndirect, 6, M),
    /* 48 */ Opcode::new(PHA, Implied, 3, M),
    /* 49 */ Opcode::new(EOR, ImmediateMFlagDependent, 2, M),
    /* 4A */ Opcode::new(LSR, Accumulator, 2, N),
    /* 4B */ Opcode::new(PHK, Implied, 3, N),
    /* 4C */ Opcode::new(JMP, Address, 3, N),
    /* 4D */ Opcode::new(EOR, Address, 4, M),
    /* 4E */ Opcode::new(LSR, Address, 6, M),
    /* 4F */ Opcode::new(EOR, Long, 5, M),
    /* 50 */ Opcode::new(BVC, Relative8, 2, B),
    /* 51 */ Opcode::new(EOR, DirectPageIndirectYIndex, 5, MP),
    /* 52 */ Opcode::new(EOR, DirectPageIndirect, 5, M),
    /* 53 */ Opcode::new(EOR, DirectPageSIndexIndirectYIndex, 7, M),
    /* 54 */ Opcode::new(MVN, BlockMove, 7, N),
    /* 55 */ Opcode::new(EOR, DirectPageXIndex, 4, M),
    /* 56 */ Opcode::new(LSR, DirectPageXIndex, 6, M),
    /* 57 */ Opcode::new(EOR, DirectPageLongIndirectYIndex, 6, M),
    /* 58 */ Opcode::new(CLI, Implied, 2, N),
    /* 59 */ Opcode::new(EOR, AddressYIndex, 4, MP),
    /* 5A */ Opcode::new(PHY, Implied, 3, X),
    /* 5B */ Opcode::new(TCD, Implied, 2, N),
    /* 5C */ Opcode::new(JML, Long, 4, N),
    /* 5D */ Opcode::new(EOR, AddressXIndex, 4, MP),
    /* 5E */ Opcode::new(LSR, AddressXIndex, 7, M),
    /* 5F */ Opcode::new(EOR, LongXIndex, 5, M),
    /* 60 */ Opcode::new(RTS, Implied, 6, N),
    /* 61 */ Opcode::new(ADC, DirectPageXIndexIndirect, 6, M),
    /* 62 */ Opcode::new(PER, Relative16, 6, N),
    /* 63 */ Opcode::new(ADC, DirectPageSIndex, 4, M),
    /* 64 */ Opcode::new(STZ, DirectPage, 3, M),
    /* 65 */ Opcode::new(ADC, DirectPage, 3, M),
    /* 66 */ Opcode::new(ROR, DirectPage, 5, M),
    /* 67 */ Opcode::new(ADC, DirectPageLongIndirect, 6, M),
    /* 68 */ Opcode::new(PLA, Implied, 4, M),
    /* 69 */ Opcode::new(ADC, ImmediateMFlagDependent, 2, M),
    /* 6A */ Opcode::new(ROR, Accumulator, 2, N),
    /* 6B */ Opcode::new(RTL, Implied, 6, N),
    /* 6C */ Opcode::new(JMP, AddressIndirect, 5, N),
    /* 6D */ Opcode::new(ADC, Address, 4, M),
    /* 6E */ Opcode::new(ROR, Address, 6, M),
    /* 6F */ Opcode::new(ADC, Long, 5, M),
    /* 70 */ Opcode::new(BVS, Relative8, 2, B),
    /* 71 */ Opcode::new(ADC, DirectPageIndirectYIndex, 5, MP),
    /* 72 */ Opcode::new(ADC, DirectPageIndirect, 5, M),
    /* 73 */ Opcode::new(ADC, DirectPageSIndexIndirectYIndex, 7, M),
    /* 74 */ Opcode::new(STZ, DirectPageXIndex, 4, M),
    /* 75 */ Opcode::new(ADC, DirectPageXIndex, 4, M),
    /* 76 */ Opcode::new(ROR, DirectPageXIndex, 6, M),
    /* 77 */ Opcode::new(ADC, DirectPageLongIndirectYIndex, 6, M),
    /* 78 */ Opcode::new(SEI, Implied, 2, N),
    /* 79 */ Opcode::new(ADC, AddressYIndex, 4, MP),
    /* 7A */ Opcode::new(PLY, Implied, 4, X),
    /* 7B */ Opcode::new(TDC, Implied, 2, N),
    /* 7C */ Opcode::new(JMP, AddressXIndexIndirect, 6, N),
    /* 7D */ Opcode::new(ADC, AddressXIndex, 4, MP),
    /* 7E */ Opcode::new(ROR, AddressXIndex, 7, M),
    /* 7F */ Opcode::new(ADC, LongXIndex, 5, M),
    /* 80 */ Opcode::new(BRA, Relative8, 3, B),
    /* 81 */ Opcode::new(STA, DirectPageXIndexIndirect, 6, M),
    /* 82 */ Opcode::new(BRL, Relative16, 4, N),
    /* 83 */ Opcode::new(STA, DirectPageSIndex, 4, M),
    /* 84 */ Opcode::new(STY, DirectPage, 3, X),
    /* 85 */ Opcode::new(STA, DirectPage, 3, M),
    /* 86 */ Opcode::new(STX, DirectPage, 3, X),
    /* 87 */ Opcode::new(STA, DirectPageLongIndirect, 6, M),
    /* 88 */ Opcode::new(DEY, Implied, 2, N),
    /* 89 */ Opcode::new(BIT, ImmediateMFlagDependent, 2, M),
    /* 8A */ Opcode::new(TXA, Implied, 2, N),
    /* 8B */ Opcode::new(PHB, Implied, 3, N),
    /* 8C */ Opcode::new(STY, Address, 4, X),
    /* 8D */ Opcode::new(STA, Address, 4, M),
    /* 8E */ Opcode::new(STX, Address, 4, X),
    /* 8F */ Opcode::new(STA, Long, 5, M),
    /* 90 */ Opcode::new(BCC, Relative8, 2, B),
    /* 91 */ Opcode::new(STA, DirectPageIndirectYIndex, 6, M),
    /* 92 */ Opcode::new(STA, DirectPageIndirect, 5, M),
    /* 93 */ Opcode::new(STA, DirectPageSIndexIndirectYIndex, 7, M),
    /* 94 */ Opcode::new(STY, DirectPageXIndex, 4, X),
    /* 95 */ Opcode::new(STA, DirectPageXIndex, 4, M),
    /* 96 */ Opcode::new(STX, DirectPageYIndex, 4, X),
    /* 97 */ Opcode::new(STA, DirectPageLongIndirectYIndex, 6, M),
    /* 98 */ Opcode::new(TYA, Implied, 2, N),
    /* 99 */ Opcode::new(STA, AddressYIndex, 5, M),
    /* 9A */ Opcode::new(TXS, Implied, 2, N),
    /* 9B */ Opcode::new(TXY, Implied, 2, N),
    /* 9C */ Opcode::new(STZ, Address, 4, M),
    /* 9D */ Opcode::new(STA, AddressXIndex, 5, M),
    /* 9E */ Opcode::new(STZ, AddressXIndex, 5, M),
    /* 9F */ Opcode::new(STA, LongXIndex, 5, M),
    /* A0 */ Opcode::new(LDY, ImmediateXFlagDependent, 2, X),
    /* A1 */ Opcode::new(LDA, DirectPageXIndexIndirect, 6, M),
    /* A2 */ Opcode::new(LDX, ImmediateXFlagDependent, 2, X),
    /* A3 */ Opcode::new(LDA, DirectPageSIndex, 4, M),
    /* A4 */ Opcode::new(LDY, DirectPage, 3, X),
    /* A5 */ Opcode::new(LDA, DirectPage, 3, M),
    /* A6 */ Opcode::new(LDX, DirectPage, 3, X),
    /* A7 */ Opcode::new(LDA, DirectPageLongIndirect, 6, M),
    /* A8 */ Opcode::new(TAY, Implied, 2, N),
    /* A9 */ Opcode::new(LDA, ImmediateMFlagDependent, 2, M),
    /* AA */ Opcode::new(TAX, Implied, 2, N),
    /* AB */ Opcode::new(PLB, Implied, 4, N),
    /* AC */ Opcode::new(LDY, Address, 4, X),
    /* AD */ Opcode::new(LDA, Address, 4, M),
    /* AE */ Opcode::new(LDX, Address, 4, X),
    /* AF */ Opcode::new(LDA, Long, 5, M),
    /* B0 */ Opcode::new(BCS, Relative8, 2, B),
    /* B1 */ Opcode::new(LDA, DirectPageIndirectYIndex, 5, MP),
    /* B2 */ Opcode::new(LDA, DirectPageIndirect, 5, M),
    /* B3 */ Opcode::new(LDA, DirectPageSIndexIndirectYIndex, 7, M),
    /* B4 */ Opcode::new(LDY, DirectPageXIndex, 4, X),
    /* B5 */ Opcode::new(LDA, DirectPageXIndex, 4, M),
    /* B6 */ Opcode::new(LDX, DirectPageYIndex, 4, X),
    /* B7 */ Opcode::new(LDA, DirectPageLongIndirectYIndex, 6, M),
    /* B8 */ Opcode::new(CLV, Implied, 2, N),
    /* B9 */ Opcode::new(LDA, AddressYIndex, 4, MP),
    /* BA */ Opcode::new(TSX, Implied, 2, N),
    /* BB */ Opcode::new(TYX, Implied, 2, N),
    /* BC */ Opcode::new(LDY, AddressXIndex, 4, XP),
    /* BD */ Opcode::new(LDA, AddressXIndex, 4, MP),
    /* BE */ Opcode::new(LDX, AddressYIndex, 4, XP),
    /* BF */ Opcode::new(LDA, LongXIndex, 5, M),
    /* C0 */ Opcode::new(CPY, ImmediateXFlagDependent, 2, X),
    /* C1 */ Opcode::new(CMP, DirectPageXIndexIndirect, 6, M),
    /* C2 */ Opcode::new(REP, Constant8, 3, N),
    /* C3 */ Opcode::new(CMP, DirectPageSIndex, 4, M),
    /* C4 */ Opcode::new(CPY, DirectPage, 3, X),
    /* C5 */ Opcode::new(CMP, DirectPage, 3, M),
    /* C6 */ Opcode::new(DEC, DirectPage, 5, M),
    /* C7 */ Opcode::new(CMP, DirectPageLongIndirect, 6, M),
    /* C8 */ Opcode::new(INY, Implied, 2, N),
    /* C9 */ Opcode::new(CMP, ImmediateMFlagDependent, 2, M),
    /* CA */ Opcode::new(DEX, Implied, 2, N),
    /* CB */ Opcode::new(WAI, Implied, 3, N),
    /* CC */ Opcode::new(CPY, Address, 4, X),
    /* CD */ Opcode::new(CMP, Address, 4, M),
    /* CE */ Opcode::new(DEC, Address, 6, M),
    /* CF */ Opcode::new(CMP, Long, 5, M),
    /* D0 */ Opcode::new(BNE, Relative8, 2, B),
    /* D1 */ Opcode::new(CMP, DirectPageIndirectYIndex, 5, MP),
    /* D2 */ Opcode::new(CMP, DirectPageIndirect, 5, M),
    /* D3 */ Opcode::new(CMP, DirectPageSIndexIndirectYIndex, 7, M),
    /* D4 */ Opcode::new(PEI, DirectPageIndirect, 6, N),
    /* D5 */ Opcode::new(CMP, DirectPageXIndex, 4, M),
    /* D6 */ Opcode::new(DEC, DirectPageXIndex, 6, M),
    /* D7 */ Opcode::new(CMP, DirectPageLongIndirectYIndex, 6, M),
    /* D8 */ Opcode::new(CLD, Implied, 2, N),
    /* D9 */ Opcode::new(CMP, AddressYIndex, 4, MP),
    /* DA */ Opcode::new(PHX, Implied, 3, X),
    /* DB */ Opcode::new(STP, Implied, 3, N),
    /* DC */ Opcode::new(JML, AddressLongIndirect, 6, N),
    /* DD */ Opcode::new(CMP, AddressXIndex, 4, MP),
    /* DE */ Opcode::new(DEC, AddressXIndex, 7, M),
    /* DF */ Opcode::new(CMP, LongXIndex, 5, M),
    /* E0 */ Opcode::new(CPX, ImmediateXFlagDependent, 2, X),
    /* E1 */ Opcode::new(SBC, DirectPageXIndexIndirect, 6, M),
    /* E2 */ Opcode::new(SEP, Constant8, 3, N),
    /* E3 */ Opcode::new(SBC, DirectPageSIndex, 4, M),
    /* E4 */ Opcode::new(CPX, DirectPage, 3, X),
    /* E5 */ Opcode::new(SBC, DirectPage, 3, M),
    /* E6 */ Opcode::new(INC, DirectPage, 5, M),
    /* E7 */ Opcode::new(SBC, DirectPageLongIndirect, 6, M),
    /* E8 */ Opcode::new(INX, Implied, 2, N),
    /* E9 */ Opcode::new(SBC, ImmediateMFlagDependent, 2, M),
    /* EA */ Opcode::new(NOP, Implied, 2, N),
    /* EB */ Opcode::new(XBA, Implied, 3, N),
    /* EC */ Opcode::new(CPX, Address, 4, X),
    /* ED */ Opcode::new(SBC, Address, 4, M),
    /* EE */ Opcode::new(INC, Address, 6, M),
    /* EF */ Opcode::new(SBC, Long, 5, M),
    /* F0 */ Opcode::new(BEQ, Relative8, 2, B),
    /* F1 */ Opcode::new(SBC, DirectPageIndirectYIndex, 5, MP),
    /* F2 */ Opcode::new(SBC, DirectPageIndirect, 5, M),
    /* F3 */ Opcode::new(SBC, DirectPageSIndexIndirectYIndex, 7, M),
    /* F4 */ Opcode::new(PEA, Address, 5, N),
    /* F5 */ Opcode::new(SBC, DirectPageXIndex, 4, M),
    /* F6 */ Opcode::new(INC, DirectPageXIndex, 6, M),
    /* F7 */ Opcode::new(SBC, DirectPageLongIndirectYIndex, 6, M),
    /* F8 */ Opcode::new(SED, Implied, 2, N),
    /* F9 */ Opcode::new(SBC, AddressYIndex, 4, MP),
    /* FA */ Opcode::new(PLX, Implied, 4, X),
    /* FB */ Opcode::new(XCE, Implied, 2, N),
    /* FC */ Opcode::new(JSR, AddressXIndexIndirect, 8, N),
    /* FD */ Opcode::new(SBC, AddressXIndex, 4, MP),
    /* FE */ Opcode::new(INC, AddressXIndex, 7, M),
    /* FF */ Opcode::new(SBC, LongXIndex, 5, M),
];

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_has_a_descriptor() {
        // Flag-dependent immediates are substituted at decode time; everything
        // else must report a fixed size between 1 and 4 bytes.
        for (byte, opcode) in SNES_OPCODES.iter().enumerate() {
            if matches!(opcode.mode, ImmediateMFlagDependent | ImmediateXFlagDependent) {
                assert!(
                    opcode.mnemonic.is_m_flag_sensitive() || opcode.mnemonic.is_x_flag_sensitive(),
                    "opcode {byte:#04x}"
                );
            } else {
                let size = opcode.instruction_size();
                assert!((1..=4).contains(&size), "opcode {byte:#04x} has size {size}");
            }
            assert!(opcode.cycles >= 2 || matches!(opcode.mnemonic, BRK | COP), "opcode {byte:#04x}");
        }
    }

    #[test]
    fn control_flow_classes_are_disjoint() {
        for opcode in SNES_OPCODES.iter() {
            let m = opcode.mnemonic;
            assert!(!(m.is_single_path_leap() && m.is_double_path()));
            assert!(!(m.is_subroutine_call() && m.is_subroutine_return()));
            if m.is_branch_or_jump() || m.is_subroutine_call() {
                assert!(m.can_change_program_counter());
            }
        }
    }

    #[test]
    fn branch_descriptors_carry_branch_mods() {
        for (byte, opcode) in SNES_OPCODES.iter().enumerate() {
            if opcode.mnemonic.is_double_path() {
                assert!(opcode.mods.contains(CycleMods::BRANCH_TAKEN), "opcode {byte:#04x}");
            }
        }
    }
}
