//! The mapper sum type and the cartridge-side address decode.
//!
//! Every supported board is one variant holding its register state;
//! dispatch is a `match`, and construction is a compile-time `match` on
//! the iNES id. The CPU sees the cartridge at $6000-$FFFF, the PPU at
//! $0000-$1FFF; everything else is the console's business.

use crate::cnrom::Cnrom;
use crate::mmc1::Mmc1;
use crate::mmc3::Mmc3;
use crate::nrom::Nrom;
use crate::rom::{Cartridge, RomError};
use crate::unrom::Unrom;

/// Cartridge banking hardware, one variant per supported board.
#[derive(Debug)]
pub enum Mapper {
    /// Mapper 0: fixed banks.
    Nrom(Nrom),
    /// Mapper 1: serial shift register banking.
    Mmc1(Mmc1),
    /// Mapper 2: PRG-only discrete banking.
    Unrom(Unrom),
    /// Mapper 3: CHR-only discrete banking.
    Cnrom(Cnrom),
    /// Mapper 4: fine-grained banking plus scanline IRQ.
    Mmc3(Mmc3),
}

impl Mapper {
    /// Build the mapper for an iNES id.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::UnsupportedMapper`] for ids outside the
    /// supported set.
    pub fn new(id: u8, prg_banks: usize) -> Result<Self, RomError> {
        match id {
            0 => Ok(Self::Nrom(Nrom)),
            1 => Ok(Self::Mmc1(Mmc1::default())),
            2 => Ok(Self::Unrom(Unrom::default())),
            3 => Ok(Self::Cnrom(Cnrom::default())),
            4 => Ok(Self::Mmc3(Mmc3::new(prg_banks))),
            n => Err(RomError::UnsupportedMapper(n)),
        }
    }

    /// Conventional board name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nrom(_) => "NROM",
            Self::Mmc1(_) => "MMC1",
            Self::Unrom(_) => "UNROM",
            Self::Cnrom(_) => "CNROM",
            Self::Mmc3(_) => "MMC3",
        }
    }
}

impl Cartridge {
    /// CPU read in cartridge space ($6000-$FFFF; lower addresses return
    /// open-bus zero).
    pub fn prg_read(&self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                let enabled = match &self.mapper {
                    Mapper::Cnrom(_) => false,
                    Mapper::Mmc1(m) => m.prg_ram_enabled,
                    _ => true,
                };
                if enabled {
                    self.prg_ram[usize::from(addr - 0x6000)]
                } else {
                    0
                }
            }
            0x8000..=0xFFFF => {
                let offset = usize::from(addr & 0x3FFF);
                match &self.mapper {
                    Mapper::Nrom(_) => self.prg[Nrom::prg_bank(addr, self.prg.len())][offset],
                    Mapper::Mmc1(m) => self.prg[m.prg_bank(addr, self.prg.len())][offset],
                    Mapper::Unrom(m) => self.prg[m.prg_bank(addr, self.prg.len())][offset],
                    Mapper::Cnrom(_) => self.prg[Nrom::prg_bank(addr, self.prg.len())][offset],
                    Mapper::Mmc3(m) => {
                        let slot = usize::from((addr - 0x8000) / 0x2000);
                        let flat = m.prg_offsets[slot] + usize::from(addr & 0x1FFF);
                        self.prg[flat / 0x4000][flat % 0x4000]
                    }
                }
            }
            _ => 0,
        }
    }

    /// CPU write in cartridge space: PRG-RAM at $6000-$7FFF, mapper
    /// registers at $8000-$FFFF.
    pub fn prg_write(&mut self, addr: u16, val: u8) {
        match addr {
            0x6000..=0x7FFF => {
                let enabled = match &self.mapper {
                    Mapper::Cnrom(_) => false,
                    Mapper::Mmc1(m) => m.prg_ram_enabled,
                    _ => true,
                };
                if enabled {
                    self.prg_ram[usize::from(addr - 0x6000)] = val;
                }
            }
            0x8000..=0xFFFF => {
                let prg_banks = self.prg.len();
                let chr_banks = self.chr.len();
                match &mut self.mapper {
                    Mapper::Nrom(_) => {}
                    Mapper::Mmc1(m) => {
                        if let Some(mirroring) = m.write_register(addr, val) {
                            self.mirroring = mirroring;
                        }
                    }
                    Mapper::Unrom(m) => m.prg_bank = val,
                    Mapper::Cnrom(m) => m.write(val),
                    Mapper::Mmc3(m) => {
                        if let Some(mirroring) = m.write_register(addr, val, prg_banks, chr_banks) {
                            self.mirroring = mirroring;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// PPU read in pattern-table space ($0000-$1FFF).
    pub fn chr_read(&self, addr: u16) -> u8 {
        let addr = addr & 0x1FFF;
        match &self.mapper {
            Mapper::Nrom(_) | Mapper::Unrom(_) => self.chr[0][usize::from(addr)],
            Mapper::Cnrom(m) => {
                let bank = usize::from(m.chr_bank);
                if bank < self.chr.len() {
                    self.chr[bank][usize::from(addr)]
                } else {
                    0
                }
            }
            Mapper::Mmc1(m) => {
                if self.chr_ram {
                    self.chr[0][usize::from(addr)]
                } else {
                    let bank = m.chr_bank(addr) % (self.chr.len() * 2);
                    self.chr[bank / 2][(bank % 2) * 0x1000 + usize::from(addr & 0x0FFF)]
                }
            }
            Mapper::Mmc3(m) => {
                let slot = usize::from(addr / 0x0400);
                let flat = m.chr_offsets[slot] + usize::from(addr % 0x0400);
                self.chr[flat / 0x2000][flat % 0x2000]
            }
        }
    }

    /// PPU write in pattern-table space; only lands on CHR-RAM boards.
    pub fn chr_write(&mut self, addr: u16, val: u8) {
        let addr = addr & 0x1FFF;
        match &self.mapper {
            Mapper::Mmc3(m) => {
                if self.chr_ram {
                    let slot = usize::from(addr / 0x0400);
                    let flat = m.chr_offsets[slot] + usize::from(addr % 0x0400);
                    self.chr[flat / 0x2000][flat % 0x2000] = val;
                }
            }
            Mapper::Cnrom(m) => {
                let bank = usize::from(m.chr_bank);
                if self.chr_ram && bank < self.chr.len() {
                    self.chr[bank][usize::from(addr)] = val;
                }
            }
            _ => {
                if self.chr_ram {
                    self.chr[0][usize::from(addr)] = val;
                }
            }
        }
    }

    /// Mapper tick, run after every PPU dot. Only MMC3 cares; it clocks
    /// its scanline counter from the PPU position.
    pub fn tick(&mut self, ppu_cycle: u16, ppu_scanline: u16, rendering: bool) {
        if let Mapper::Mmc3(m) = &mut self.mapper {
            m.tick(ppu_cycle, ppu_scanline, rendering);
        }
    }

    /// Consume the pending mapper IRQ event, if any.
    pub fn take_irq(&mut self) -> bool {
        if let Mapper::Mmc3(m) = &mut self.mapper {
            std::mem::take(&mut m.irq_pending)
        } else {
            false
        }
    }
}
