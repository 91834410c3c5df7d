//! Cycle-timed Ricoh 2C02 PPU for the dendy NES core.
//!
//! The PPU owns its OAM, palette RAM and both 256x240 ARGB frame
//! buffers; pattern tables and nametables are reached through the
//! [`VideoBus`] trait so cartridge CHR banking and mirroring stay on the
//! system side. [`Ppu::tick`] advances one dot and reports when the
//! delayed vblank NMI should reach the CPU; the back buffer swaps to the
//! front at scanline 241, dot 1 and raises the frame-ready flag.

mod palette;
mod ppu;
mod registers;

pub use palette::{resolve_color, NES_PALETTE};
pub use ppu::{Ppu, VideoBus, HEIGHT, WIDTH};
pub use registers::{Ctrl, Mask, StatusFlags};
