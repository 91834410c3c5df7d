//! iNES cartridge loading and mapper emulation for the dendy NES core.
//!
//! [`Cartridge::load`] parses an iNES image into banked PRG/CHR storage
//! plus the matching [`Mapper`] variant; all CPU traffic at $6000-$FFFF
//! and PPU traffic at $0000-$1FFF then routes through the cartridge's
//! `prg_read`/`prg_write`/`chr_read`/`chr_write`, and MMC3's scanline
//! counter is driven through [`Cartridge::tick`].
//!
//! # Supported mappers
//!
//! | Id | Name  | Banking |
//! |----|-------|---------|
//! | 0  | NROM  | none |
//! | 1  | MMC1  | serial-register PRG/CHR modes, mirroring control |
//! | 2  | UNROM | switchable low PRG bank |
//! | 3  | CNROM | switchable 8 KiB CHR bank |
//! | 4  | MMC3  | 8 KiB PRG / 1 KiB CHR slots, scanline IRQ |

mod cnrom;
mod mapper;
mod mirroring;
mod mmc1;
mod mmc3;
mod nrom;
mod rom;
mod unrom;

pub use cnrom::Cnrom;
pub use mapper::Mapper;
pub use mirroring::Mirroring;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use rom::{Cartridge, RomError, CHR_BANK_SIZE, PRG_BANK_SIZE, PRG_RAM_SIZE};
pub use unrom::Unrom;
