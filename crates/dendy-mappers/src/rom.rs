//! iNES image parsing and the `Cartridge` container.
//!
//! The 16-byte header carries the magic `NES\x1A`, the 16 KiB PRG and
//! 8 KiB CHR bank counts, and two flag bytes holding the mirroring bits
//! and the split mapper id. The payload is PRG banks followed by CHR
//! banks. A zero CHR count means the board carries 8 KiB of CHR-RAM
//! instead.

use crate::mapper::Mapper;
use crate::mirroring::Mirroring;

/// 16 KiB PRG bank size.
pub const PRG_BANK_SIZE: usize = 0x4000;
/// 8 KiB CHR bank size.
pub const CHR_BANK_SIZE: usize = 0x2000;
/// PRG-RAM size at $6000-$7FFF.
pub const PRG_RAM_SIZE: usize = 0x2000;

const MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Cartridge loading errors.
#[derive(Debug, thiserror::Error)]
pub enum RomError {
    /// The image does not start with the iNES magic.
    #[error("not an iNES image: bad magic {0:02X?}")]
    BadMagic([u8; 4]),

    /// The image is shorter than its header promises.
    #[error("iNES image truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected minimum size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// The mapper id is not in the supported set.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),

    /// The ROM file could not be read.
    #[error("failed to read ROM file")]
    Io(#[from] std::io::Error),
}

/// A loaded cartridge: banked PRG/CHR storage, PRG-RAM, the mirroring
/// mode and the mapper state controlling all of it.
pub struct Cartridge {
    /// 16 KiB PRG-ROM banks.
    pub(crate) prg: Vec<Vec<u8>>,
    /// 8 KiB CHR banks (ROM, or a single RAM bank).
    pub(crate) chr: Vec<Vec<u8>>,
    /// CHR is writable RAM supplied by the loader.
    pub(crate) chr_ram: bool,
    /// 8 KiB PRG-RAM at $6000-$7FFF.
    pub(crate) prg_ram: Vec<u8>,
    /// Current nametable mirroring (mappers may rewrite it).
    pub(crate) mirroring: Mirroring,
    /// Mapper registers and banking state.
    pub(crate) mapper: Mapper,
}

impl Cartridge {
    /// Parse an iNES image.
    ///
    /// # Errors
    ///
    /// Returns [`RomError`] when the magic is wrong, the payload is
    /// shorter than the header promises, or the mapper id (after the
    /// legacy-trailer mask) is unsupported.
    pub fn load(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < 16 {
            return Err(RomError::Truncated { expected: 16, actual: data.len() });
        }
        let magic = [data[0], data[1], data[2], data[3]];
        if magic != MAGIC {
            return Err(RomError::BadMagic(magic));
        }

        let prg_count = usize::from(data[4]);
        let chr_count = usize::from(data[5]);
        let flag6 = data[6];
        let flag7 = data[7];

        if flag7 & 0x0C == 0x08 {
            log::warn!("NES 2.0 header detected; reading it as plain iNES");
        }

        let mut mapper_id = (flag7 & 0xF0) | (flag6 >> 4);
        if mapper_id > 0x40 {
            // Legacy images with garbage trailers in flag 7.
            log::warn!("implausible mapper {mapper_id}, masking to low nibble");
            mapper_id &= 0x0F;
        }

        let expected = 16 + prg_count * PRG_BANK_SIZE + chr_count * CHR_BANK_SIZE;
        if data.len() < expected {
            return Err(RomError::Truncated { expected, actual: data.len() });
        }
        if prg_count == 0 {
            return Err(RomError::Truncated { expected: 16 + PRG_BANK_SIZE, actual: data.len() });
        }

        let mut offset = 16;
        let mut prg = Vec::with_capacity(prg_count);
        for _ in 0..prg_count {
            prg.push(data[offset..offset + PRG_BANK_SIZE].to_vec());
            offset += PRG_BANK_SIZE;
        }

        let chr_ram = chr_count == 0;
        let mut chr = Vec::with_capacity(chr_count.max(1));
        if chr_ram {
            chr.push(vec![0; CHR_BANK_SIZE]);
        } else {
            for _ in 0..chr_count {
                chr.push(data[offset..offset + CHR_BANK_SIZE].to_vec());
                offset += CHR_BANK_SIZE;
            }
        }

        let mirroring = if flag6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flag6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper = Mapper::new(mapper_id, prg.len())?;

        log::info!(
            "{} x 16KB PRG, {} x 8KB CHR-{}, mapper {} ({}), {:?} mirroring",
            prg.len(),
            chr.len(),
            if chr_ram { "RAM" } else { "ROM" },
            mapper_id,
            mapper.name(),
            mirroring,
        );

        Ok(Self {
            prg,
            chr,
            chr_ram,
            prg_ram: vec![0; PRG_RAM_SIZE],
            mirroring,
            mapper,
        })
    }

    /// Read an iNES image from a file.
    ///
    /// # Errors
    ///
    /// Returns [`RomError::Io`] on read failure, otherwise as
    /// [`Cartridge::load`].
    pub fn open(path: &std::path::Path) -> Result<Self, RomError> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    /// Current nametable mirroring.
    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    /// Whether CHR is writable RAM.
    pub fn has_chr_ram(&self) -> bool {
        self.chr_ram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_image(prg_count: u8, chr_count: u8, mapper: u8, flag6_low: u8) -> Vec<u8> {
        let mut data = vec![
            0x4E,
            0x45,
            0x53,
            0x1A,
            prg_count,
            chr_count,
            (mapper << 4) | flag6_low,
            mapper & 0xF0,
        ];
        data.extend_from_slice(&[0; 8]);
        for bank in 0..prg_count {
            data.extend(std::iter::repeat(bank).take(PRG_BANK_SIZE));
        }
        for bank in 0..chr_count {
            data.extend(std::iter::repeat(0x80 | bank).take(CHR_BANK_SIZE));
        }
        data
    }

    #[test]
    fn loads_plain_nrom() {
        let cart = Cartridge::load(&build_image(2, 1, 0, 0)).unwrap();
        assert_eq!(cart.prg.len(), 2);
        assert_eq!(cart.chr.len(), 1);
        assert!(!cart.has_chr_ram());
        assert_eq!(cart.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = build_image(1, 1, 0, 0);
        data[0] = 0x4D;
        assert!(matches!(Cartridge::load(&data), Err(RomError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut data = build_image(2, 1, 0, 0);
        data.truncate(data.len() - 100);
        assert!(matches!(
            Cartridge::load(&data),
            Err(RomError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_mapper() {
        let data = build_image(1, 1, 7, 0);
        assert!(matches!(
            Cartridge::load(&data),
            Err(RomError::UnsupportedMapper(7))
        ));
    }

    #[test]
    fn masks_quirky_mapper_ids_to_low_nibble() {
        // Mapper byte $41 would be mapper 65; the legacy mask folds it to 1.
        let mut data = build_image(2, 1, 1, 0);
        data[7] = 0x40;
        let cart = Cartridge::load(&data).unwrap();
        assert_eq!(cart.mapper.name(), "MMC1");
    }

    #[test]
    fn zero_chr_count_allocates_chr_ram() {
        let cart = Cartridge::load(&build_image(1, 0, 0, 0)).unwrap();
        assert!(cart.has_chr_ram());
        assert_eq!(cart.chr.len(), 1);
        assert_eq!(cart.chr[0].len(), CHR_BANK_SIZE);
    }

    #[test]
    fn mirroring_bits_decode() {
        let vertical = Cartridge::load(&build_image(1, 1, 0, 0x01)).unwrap();
        assert_eq!(vertical.mirroring(), Mirroring::Vertical);
        let four = Cartridge::load(&build_image(1, 1, 0, 0x09)).unwrap();
        assert_eq!(four.mirroring(), Mirroring::FourScreen);
    }
}
