//! The three CPU-visible PPU control registers.

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000, write-only).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ctrl: u8 {
        /// Low bit of the base nametable selector.
        const NAMETABLE_LO = 1 << 0;
        /// High bit of the base nametable selector.
        const NAMETABLE_HI = 1 << 1;
        /// VRAM address increment: 32 when set, 1 otherwise.
        const ADDR_INCREMENT = 1 << 2;
        /// Sprite pattern table selector (8x8 sprites only).
        const SPRITE_TABLE = 1 << 3;
        /// Background pattern table selector.
        const BG_TABLE = 1 << 4;
        /// Sprite size: 8x16 when set.
        const SPRITE_SIZE = 1 << 5;
        /// Master/slave select (unused on a stock console).
        const MASTER = 1 << 6;
        /// Generate NMI at the start of vblank.
        const NMI_ENABLE = 1 << 7;
    }
}

impl Ctrl {
    /// VRAM address step for $2007 accesses.
    pub fn vram_increment(self) -> u16 {
        if self.contains(Self::ADDR_INCREMENT) { 32 } else { 1 }
    }

    /// Sprite height in pixels (8 or 16).
    pub fn sprite_height(self) -> u16 {
        if self.contains(Self::SPRITE_SIZE) { 16 } else { 8 }
    }
}

bitflags! {
    /// PPUMASK ($2001, write-only).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mask: u8 {
        /// Grayscale palette.
        const GRAYSCALE = 1 << 0;
        /// Show background in the leftmost 8 pixels.
        const SHOW_LEFT_BG = 1 << 1;
        /// Show sprites in the leftmost 8 pixels.
        const SHOW_LEFT_SPRITES = 1 << 2;
        /// Background rendering enable.
        const SHOW_BG = 1 << 3;
        /// Sprite rendering enable.
        const SHOW_SPRITES = 1 << 4;
        /// Red emphasis.
        const EMPHASIZE_RED = 1 << 5;
        /// Green emphasis.
        const EMPHASIZE_GREEN = 1 << 6;
        /// Blue emphasis.
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

impl Mask {
    /// True when either background or sprite rendering is on.
    pub fn rendering(self) -> bool {
        self.intersects(Self::SHOW_BG.union(Self::SHOW_SPRITES))
    }
}

bitflags! {
    /// The sticky bits of PPUSTATUS ($2002). The vblank bit is tracked
    /// separately because reading the register drops it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        /// More than 8 sprites landed on one scanline.
        const SPRITE_OVERFLOW = 1 << 5;
        /// An opaque sprite-0 pixel overlapped an opaque background pixel.
        const SPRITE0_HIT = 1 << 6;
    }
}
