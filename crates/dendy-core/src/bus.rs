//! The system bus: the universal CPU memory map and the PPU's video
//! memory fan-out.
//!
//! CPU map: 2 KiB RAM mirrored through $1FFF, PPU registers mirrored
//! every 8 bytes through $3FFF, the APU/IO block at $4000-$401F, and
//! cartridge space above. PPU map: pattern tables through the cartridge,
//! nametables in the console's 4 KiB VRAM behind the cartridge's
//! mirroring function.

use dendy_apu::Apu;
use dendy_cpu::Bus as CpuBus;
use dendy_mappers::Cartridge;
use dendy_ppu::{Ppu, VideoBus};

use crate::input::Controllers;

/// PPU-side memory fan-out: CHR via the mapper, nametables in VRAM.
struct VideoMemory<'a> {
    cartridge: &'a mut Cartridge,
    vram: &'a mut [u8; 0x1000],
}

impl VideoBus for VideoMemory<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.cartridge.chr_read(addr),
            _ => self.vram[self.cartridge.mirroring().translate(addr)],
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.cartridge.chr_write(addr, val),
            _ => self.vram[self.cartridge.mirroring().translate(addr)] = val,
        }
    }
}

/// Everything the CPU can see, plus the devices hanging off it.
pub struct NesBus {
    /// 2 KiB internal RAM, mirrored across $0000-$1FFF.
    pub ram: [u8; 0x800],
    /// 4 KiB nametable VRAM (two screens plus four-screen room).
    pub vram: [u8; 0x1000],
    /// Picture processing unit.
    pub ppu: Ppu,
    /// Audio processing unit.
    pub apu: Apu,
    /// Controller ports.
    pub controllers: Controllers,
    /// The loaded cartridge.
    pub cartridge: Cartridge,
    /// Page latched by a $4014 write, consumed by the scheduler.
    oam_dma_page: Option<u8>,
}

impl NesBus {
    /// Build a bus around a loaded cartridge. RAM gets the power-on
    /// pattern ($FF where bit 2 of the address is set).
    pub fn new(cartridge: Cartridge) -> Self {
        let mut ram = [0u8; 0x800];
        for (i, byte) in ram.iter_mut().enumerate() {
            *byte = if i & 0x04 != 0 { 0xFF } else { 0x00 };
        }
        Self {
            ram,
            vram: [0; 0x1000],
            ppu: Ppu::new(),
            apu: Apu::new(),
            controllers: Controllers::new(),
            cartridge,
            oam_dma_page: None,
        }
    }

    /// Take the page latched by a $4014 write, if any.
    pub fn take_oam_dma(&mut self) -> Option<u8> {
        self.oam_dma_page.take()
    }

    /// One PPU dot followed by the mapper tick. Returns `true` when the
    /// PPU wants the CPU NMI raised.
    pub fn tick_ppu(&mut self) -> bool {
        let Self {
            ppu,
            cartridge,
            vram,
            ..
        } = self;
        let mut video = VideoMemory { cartridge, vram };
        let nmi = ppu.tick(&mut video);
        cartridge.tick(ppu.cycle, ppu.scanline, ppu.rendering());
        nmi
    }

    /// One APU CPU-cycle tick, servicing a DMC fetch if one is due.
    /// Returns the stall cycles the fetch cost.
    pub fn tick_apu(&mut self) -> u64 {
        self.apu.tick();
        if let Some(addr) = self.apu.take_dmc_request() {
            let byte = CpuBus::read(self, addr);
            self.apu.load_dmc_sample(byte);
            return 4;
        }
        0
    }
}

impl CpuBus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)],
            0x2000..=0x3FFF => {
                let Self {
                    ppu,
                    cartridge,
                    vram,
                    ..
                } = self;
                let mut video = VideoMemory { cartridge, vram };
                ppu.read_register(addr & 0x07, &mut video)
            }
            0x4015 => self.apu.read_status(),
            0x4016 => self.controllers.read(0),
            0x4017 => self.controllers.read(1),
            0x4000..=0x401F => 0,
            0x4020..=0x5FFF => 0,
            _ => self.cartridge.prg_read(addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr & 0x07FF)] = val,
            0x2000..=0x3FFF => {
                let Self {
                    ppu,
                    cartridge,
                    vram,
                    ..
                } = self;
                let mut video = VideoMemory { cartridge, vram };
                ppu.write_register(addr & 0x07, val, &mut video);
            }
            0x4014 => self.oam_dma_page = Some(val),
            0x4016 => self.controllers.write_strobe(val),
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, val),
            0x4018..=0x401F => {}
            0x4020..=0x5FFF => {}
            _ => self.cartridge.prg_write(addr, val),
        }
    }
}
