use crate::disassembler::{instruction::Instruction, opcodes::Mnemonic, status::StatusFlags};

/// M/X width state carried along a disassembly walk. Both registers start
/// one byte wide, the post-reset configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Processor {
    pub flags: StatusFlags,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    pub fn new() -> Self {
        Self { flags: StatusFlags::narrow() }
    }

    /// The assumption taken at a join whose predecessors disagree.
    pub fn conservative() -> Self {
        Self::new()
    }

    pub fn is_conservative(&self) -> bool {
        self.flags.acc_is_8bit() && self.flags.index_is_8bit()
    }

    /// Applies the width effects of one decoded line. Static analysis can
    /// follow exactly three opcodes here: SEP and REP move the width bits by
    /// their immediate mask, and XCE pessimistically lands in emulation mode,
    /// which forces both registers narrow.
    pub fn execute(&mut self, instr: &Instruction) {
        if instr.opcode.mnemonic == Mnemonic::XCE {
            self.flags.set(StatusFlags::ACC_8BIT | StatusFlags::INDEX_8BIT);
            return;
        }
        let Some(&mask) = instr.operands().first() else { return };
        if instr.opcode.mnemonic == Mnemonic::SEP {
            self.flags.set(mask);
        } else if instr.opcode.mnemonic == Mnemonic::REP {
            self.flags.clear(mask);
        }
    }

    /// True when two predecessor states would decode flag-dependent
    /// immediates differently.
    pub fn widths_disagree(&self, other: &Processor) -> bool {
        self.flags.widths_differ(other.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snes_utils::addr::{AddrPc, AddrSnes};

    fn step(processor: &mut Processor, bytes: &[u8]) {
        let (insn, _) = Instruction::parse(bytes, AddrSnes(0x008000), AddrPc(0), processor.flags).unwrap();
        processor.execute(&insn);
    }

    #[test]
    fn rep_and_sep_move_the_width_bits() {
        let mut processor = Processor::new();
        step(&mut processor, &[0xC2, 0x30]); // REP #$30
        assert!(!processor.flags.acc_is_8bit());
        assert!(!processor.flags.index_is_8bit());
        step(&mut processor, &[0xE2, 0x20]); // SEP #$20
        assert!(processor.flags.acc_is_8bit());
        assert!(!processor.flags.index_is_8bit());
    }

    #[test]
    fn xce_forces_both_registers_narrow() {
        let mut processor = Processor::new();
        step(&mut processor, &[0xC2, 0x30]);
        step(&mut processor, &[0xFB]); // XCE
        assert!(processor.is_conservative());
    }

    #[test]
    fn unrelated_instructions_leave_the_state_alone() {
        let mut processor = Processor::new();
        step(&mut processor, &[0xA9, 0x12]); // LDA #$12
        step(&mut processor, &[0x18]); // CLC
        assert_eq!(processor, Processor::new());
    }
}
