//! Processor status bits. Decoding only acts on the two width bits; the
//! rest are tracked so REP/SEP annotations can name what they touch.

/// One snapshot of the P register.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StatusFlags(pub u8);

#[rustfmt::skip]
impl StatusFlags {
    pub const CARRY:      u8 = 0x01;
    pub const ZERO:       u8 = 0x02;
    pub const IRQ_MASK:   u8 = 0x04;
    pub const DECIMAL:    u8 = 0x08;
    /// X/Y operate on single bytes while set.
    pub const INDEX_8BIT: u8 = 0x10;
    /// A and memory moves operate on single bytes while set.
    pub const ACC_8BIT:   u8 = 0x20;
    pub const OVERFLOW:   u8 = 0x40;
    pub const NEGATIVE:   u8 = 0x80;

    const WIDTH_BITS: u8 = Self::ACC_8BIT | Self::INDEX_8BIT;
}

impl StatusFlags {
    /// The width configuration right out of reset, equivalent to having run
    /// `SEP #$30`.
    pub const fn narrow() -> Self {
        Self(Self::WIDTH_BITS)
    }

    pub fn has(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    pub fn acc_is_8bit(self) -> bool {
        self.has(Self::ACC_8BIT)
    }

    pub fn index_is_8bit(self) -> bool {
        self.has(Self::INDEX_8BIT)
    }

    pub fn set(&mut self, mask: u8) {
        self.0 |= mask;
    }

    pub fn clear(&mut self, mask: u8) {
        self.0 &= !mask;
    }

    /// True when the two states would size flag-dependent immediates
    /// differently.
    pub fn widths_differ(self, other: Self) -> bool {
        (self.0 ^ other.0) & Self::WIDTH_BITS != 0
    }
}
