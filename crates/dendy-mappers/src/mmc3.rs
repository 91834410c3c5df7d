//! Mapper 4: MMC3.
//!
//! Eight bank registers addressed through a bank-select latch drive
//! 8 KiB PRG slots (with a fix-top or fix-bottom mode) and a 2 KiB/1 KiB
//! split of CHR. A scanline counter, clocked at dot 260 of every
//! rendered line, reloads on zero and raises the CPU IRQ when enabled.

use crate::mirroring::Mirroring;

/// MMC3 register file, bank offsets and IRQ counter.
#[derive(Debug, Default)]
pub struct Mmc3 {
    reg_index: u8,
    regs: [u8; 8],
    prg_mode: u8,
    chr_mode: u8,

    /// Byte offsets into flat PRG space for the four 8 KiB slots.
    pub(crate) prg_offsets: [usize; 4],
    /// Byte offsets into flat CHR space for the eight 1 KiB slots.
    pub(crate) chr_offsets: [usize; 8],

    reload: u8,
    counter: u8,
    irq_enabled: bool,
    pub(crate) irq_pending: bool,
}

impl Mmc3 {
    /// Power-on state: slots 0/1 on banks 0/1, top two fixed.
    pub(crate) fn new(prg_banks: usize) -> Self {
        let mut m = Self::default();
        m.prg_offsets[0] = Self::prg_offset(prg_banks, 0);
        m.prg_offsets[1] = Self::prg_offset(prg_banks, 1);
        m.prg_offsets[2] = Self::prg_offset(prg_banks, -2);
        m.prg_offsets[3] = Self::prg_offset(prg_banks, -1);
        m
    }

    /// Byte offset of a signed 8 KiB PRG bank index (`-1` = last).
    fn prg_offset(prg_banks: usize, index: i32) -> usize {
        let mut index = index;
        if index >= 0x80 {
            index -= 0x100;
        }
        index %= (prg_banks * 2) as i32;
        let mut offset = index * 0x2000;
        if offset < 0 {
            offset += (prg_banks * 0x4000) as i32;
        }
        offset as usize
    }

    /// Byte offset of a signed 1 KiB CHR bank index.
    fn chr_offset(chr_banks: usize, index: i32) -> usize {
        let mut index = index;
        if index >= 0x80 {
            index -= 0x100;
        }
        index %= (chr_banks * 8) as i32;
        let mut offset = index * 0x0400;
        if offset < 0 {
            offset += (chr_banks * 0x2000) as i32;
        }
        offset as usize
    }

    /// Recompute all slot offsets from the bank registers and modes.
    fn update_offsets(&mut self, prg_banks: usize, chr_banks: usize) {
        match self.prg_mode {
            0 => {
                self.prg_offsets[0] = Self::prg_offset(prg_banks, i32::from(self.regs[6]));
                self.prg_offsets[1] = Self::prg_offset(prg_banks, i32::from(self.regs[7]));
                self.prg_offsets[2] = Self::prg_offset(prg_banks, -2);
                self.prg_offsets[3] = Self::prg_offset(prg_banks, -1);
            }
            _ => {
                self.prg_offsets[2] = Self::prg_offset(prg_banks, i32::from(self.regs[6]));
                self.prg_offsets[1] = Self::prg_offset(prg_banks, i32::from(self.regs[7]));
                self.prg_offsets[0] = Self::prg_offset(prg_banks, -2);
                self.prg_offsets[3] = Self::prg_offset(prg_banks, -1);
            }
        }

        let pairs = [
            i32::from(self.regs[0] & 0xFE),
            i32::from(self.regs[0] | 0x01),
            i32::from(self.regs[1] & 0xFE),
            i32::from(self.regs[1] | 0x01),
        ];
        let singles = [
            i32::from(self.regs[2]),
            i32::from(self.regs[3]),
            i32::from(self.regs[4]),
            i32::from(self.regs[5]),
        ];
        let (pair_base, single_base) = if self.chr_mode == 0 { (0, 4) } else { (4, 0) };
        for (i, &bank) in pairs.iter().enumerate() {
            self.chr_offsets[pair_base + i] = Self::chr_offset(chr_banks, bank);
        }
        for (i, &bank) in singles.iter().enumerate() {
            self.chr_offsets[single_base + i] = Self::chr_offset(chr_banks, bank);
        }
    }

    /// Handle a $8000-$FFFF write. Returns the new mirroring when the
    /// mirror register was written.
    pub(crate) fn write_register(
        &mut self,
        addr: u16,
        val: u8,
        prg_banks: usize,
        chr_banks: usize,
    ) -> Option<Mirroring> {
        let odd = addr & 0x01 != 0;
        match addr {
            0x8000..=0x9FFF => {
                if odd {
                    self.regs[usize::from(self.reg_index)] = val;
                } else {
                    self.prg_mode = (val >> 6) & 0x01;
                    self.chr_mode = (val >> 7) & 0x01;
                    self.reg_index = val & 0x07;
                }
                self.update_offsets(prg_banks, chr_banks);
            }
            0xA000..=0xBFFF => {
                if !odd {
                    return Some(if val & 0x01 != 0 {
                        Mirroring::Horizontal
                    } else {
                        Mirroring::Vertical
                    });
                }
                // Odd writes are the PRG-RAM protect register, ignored.
            }
            0xC000..=0xDFFF => {
                if odd {
                    self.counter = 0;
                } else {
                    self.reload = val;
                }
            }
            _ => {
                if odd {
                    self.irq_enabled = true;
                } else {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                }
            }
        }
        None
    }

    /// One scanline clock: reload on zero, otherwise count down and
    /// raise the IRQ when the counter lands on zero while enabled.
    pub(crate) fn clock_scanline(&mut self) {
        if self.counter == 0 {
            self.counter = self.reload;
        } else {
            self.counter -= 1;
            if self.counter == 0 && self.irq_enabled {
                self.irq_pending = true;
            }
        }
    }

    /// PPU-synchronized tick: the scanline counter is clocked at dot 260
    /// of visible and pre-render lines while rendering is on.
    pub(crate) fn tick(&mut self, cycle: u16, scanline: u16, rendering: bool) {
        if cycle != 260 {
            return;
        }
        if (240..261).contains(&scanline) {
            return;
        }
        if !rendering {
            return;
        }
        self.clock_scanline();
    }
}
