//! CPU status register (P) flags.
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! ```
//!
//! The B and U bits only exist on the stack: U reads back as 1 from every
//! push, B distinguishes BRK/PHP pushes (1) from interrupt pushes (0).

use bitflags::bitflags;

bitflags! {
    /// CPU status register flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        /// Carry.
        const C = 1 << 0;
        /// Zero.
        const Z = 1 << 1;
        /// Interrupt disable. Masks IRQ; NMI is unaffected.
        const I = 1 << 2;
        /// Decimal mode. Latches but has no effect on the 2A03.
        const D = 1 << 3;
        /// Break. Only meaningful in stack copies of P.
        const B = 1 << 4;
        /// Unused; reads as 1 when P is pushed.
        const U = 1 << 5;
        /// Signed overflow.
        const V = 1 << 6;
        /// Negative (bit 7 of the result).
        const N = 1 << 7;
    }
}

impl Status {
    /// Power-on value: I set, bit 5 set ($24).
    pub const POWER_ON: Self = Self::I.union(Self::U);

    /// Sets or clears Z and N from an 8-bit result.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Self::Z, value == 0);
        self.set(Self::N, value & 0x80 != 0);
    }

    /// P as pushed to the stack. Bit 5 is always set; B is set for
    /// BRK/PHP pushes and clear for NMI/IRQ pushes.
    #[inline]
    #[must_use]
    pub const fn to_stack_byte(self, brk: bool) -> u8 {
        let mut value = self.bits() | Self::U.bits();
        if brk {
            value |= Self::B.bits();
        }
        value
    }

    /// P as popped from the stack: B cleared, bit 5 forced on.
    #[inline]
    #[must_use]
    pub const fn from_stack_byte(value: u8) -> Self {
        Self::from_bits_retain((value & !Self::B.bits()) | Self::U.bits())
    }
}
