//! Property tests for palette RAM aliasing and color resolution,
//! driven through the CPU-visible register bus.

use dendy_ppu::{resolve_color, Mask, Ppu, VideoBus, NES_PALETTE};
use proptest::prelude::*;

struct FlatVideo([u8; 0x3000]);

impl VideoBus for FlatVideo {
    fn read(&mut self, addr: u16) -> u8 {
        self.0[usize::from(addr) % 0x3000]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.0[usize::from(addr) % 0x3000] = val;
    }
}

/// Point v at $3F00 + `low` through the $2006 pair and write a byte.
fn write_palette(ppu: &mut Ppu, bus: &mut FlatVideo, low: u8, val: u8) {
    ppu.write_register(6, 0x3F, bus);
    ppu.write_register(6, low, bus);
    ppu.write_register(7, val, bus);
}

/// Point v at $3F00 + `low` and read; palette reads bypass the buffer.
fn read_palette(ppu: &mut Ppu, bus: &mut FlatVideo, low: u8) -> u8 {
    ppu.write_register(6, 0x3F, bus);
    ppu.write_register(6, low, bus);
    ppu.read_register(7, bus)
}

/// The backdrop-mirror rule: $10/$14/$18/$1C fold onto $00/$04/$08/$0C.
fn fold(index: u8) -> u8 {
    if index >= 0x10 && index % 4 == 0 {
        index - 0x10
    } else {
        index
    }
}

proptest! {
    #[test]
    fn palette_aliasing_is_bidirectional_for_every_index(
        index in 0u8..0x20,
        val in any::<u8>(),
    ) {
        let mut ppu = Ppu::new();
        let mut bus = FlatVideo([0; 0x3000]);
        let alias = fold(index);

        write_palette(&mut ppu, &mut bus, index, val);
        prop_assert_eq!(read_palette(&mut ppu, &mut bus, alias), val);

        write_palette(&mut ppu, &mut bus, alias, !val);
        prop_assert_eq!(read_palette(&mut ppu, &mut bus, index), !val);
    }

    #[test]
    fn palette_space_mirrors_every_32_bytes(offset in any::<u8>(), val in any::<u8>()) {
        let mut ppu = Ppu::new();
        let mut bus = FlatVideo([0; 0x3000]);

        write_palette(&mut ppu, &mut bus, offset, val);
        prop_assert_eq!(read_palette(&mut ppu, &mut bus, fold(offset & 0x1F)), val);
    }

    #[test]
    fn resolved_colors_are_always_opaque(index in any::<u8>(), mask_bits in any::<u8>()) {
        let color = resolve_color(index, Mask::from_bits_retain(mask_bits));
        prop_assert_eq!(color >> 24, 0xFF);
    }

    #[test]
    fn grayscale_collapses_to_the_gray_column(index in any::<u8>()) {
        let gray = resolve_color(index, Mask::GRAYSCALE);
        prop_assert_eq!(gray, NES_PALETTE[usize::from(index & 0x30)]);
    }
}
