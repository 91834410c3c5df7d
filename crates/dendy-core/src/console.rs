//! The console: CPU plus bus, co-stepped on the NTSC cycle grid.
//!
//! One [`Console::step`] executes a single CPU instruction (or burns a
//! stall cycle), then runs 3 PPU dots with a mapper tick each and one
//! APU tick per CPU cycle spent. Interrupts gathered while ticking are
//! delivered before the next instruction. [`Console::step_until_frame`]
//! drives this until the PPU finishes a frame.

use dendy_cpu::{Bus as CpuBus, Cpu, VEC_IRQ, VEC_NMI, VEC_RESET};
use dendy_mappers::{Cartridge, RomError};

use crate::bus::NesBus;

/// Log the interrupt vectors of a freshly mapped cartridge.
fn log_vectors(bus: &mut NesBus) {
    log::info!(
        "vectors: NMI ${:04X}, RESET ${:04X}, IRQ ${:04X}",
        bus.read_u16(VEC_NMI),
        bus.read_u16(VEC_RESET),
        bus.read_u16(VEC_IRQ),
    );
}

/// Console-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The cartridge image failed to load.
    #[error(transparent)]
    Rom(#[from] RomError),

    /// The requested target frame is not in the future.
    #[error("target frame {target} is not ahead of frame {current}")]
    InvalidFrameTarget {
        /// Requested frame number.
        target: u64,
        /// Current frame number.
        current: u64,
    },
}

/// The emulated console.
///
/// Owns all subsystem state; dropping it releases the cartridge and
/// every buffer. Loading a new ROM replaces the whole machine state.
pub struct Console {
    cpu: Cpu,
    bus: NesBus,
    target_frame: Option<u64>,
}

impl Console {
    /// Boot a console around an iNES image.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Rom`] when the image does not parse or
    /// its mapper is unsupported.
    pub fn new(rom: &[u8]) -> Result<Self, ConsoleError> {
        let cartridge = Cartridge::load(rom)?;
        let mut bus = NesBus::new(cartridge);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        log_vectors(&mut bus);
        Ok(Self {
            cpu,
            bus,
            target_frame: None,
        })
    }

    /// Boot a console from a ROM file on disk.
    ///
    /// # Errors
    ///
    /// As [`Console::new`], plus [`RomError::Io`] on read failure.
    pub fn open(path: &std::path::Path) -> Result<Self, ConsoleError> {
        let cartridge = Cartridge::open(path)?;
        let mut bus = NesBus::new(cartridge);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        log_vectors(&mut bus);
        Ok(Self {
            cpu,
            bus,
            target_frame: None,
        })
    }

    /// Swap in a different cartridge, resetting the whole machine.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Rom`] when the image does not parse; the
    /// running cartridge stays loaded in that case.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), ConsoleError> {
        let cartridge = Cartridge::load(rom)?;
        self.bus = NesBus::new(cartridge);
        self.cpu = Cpu::new();
        self.cpu.reset(&mut self.bus);
        log_vectors(&mut self.bus);
        self.target_frame = None;
        Ok(())
    }

    /// Press the reset button: CPU reset sequence plus PPU reset.
    pub fn reset(&mut self) {
        self.bus.ppu.reset();
        self.cpu.reset(&mut self.bus);
    }

    /// Execute one CPU instruction and co-step the PPU, mapper and APU.
    /// Returns the CPU cycles consumed.
    pub fn step(&mut self) -> u32 {
        // A $4014 write from the previous instruction: copy a page into
        // OAM and stall the CPU.
        if let Some(page) = self.bus.take_oam_dma() {
            let base = u16::from(page) << 8;
            for i in 0..256 {
                let byte = CpuBus::read(&mut self.bus, base + i);
                self.bus.ppu.oam_dma_write(byte);
            }
            self.cpu.stall += 513 + (self.cpu.cycles & 0x01);
        }

        let cycles = self.cpu.step(&mut self.bus);

        for _ in 0..cycles {
            for _ in 0..3 {
                if self.bus.tick_ppu() {
                    self.cpu.trigger_nmi();
                }
            }
            self.cpu.stall += self.bus.tick_apu();
        }

        if self.bus.apu.take_irq() || self.bus.cartridge.take_irq() {
            self.cpu.trigger_irq();
        }

        cycles
    }

    /// Run until the PPU finishes a frame. Returns `true` with the
    /// frame ready in [`Console::frame`], or `false` when the target
    /// frame was reached instead.
    pub fn step_until_frame(&mut self) -> bool {
        loop {
            self.step();
            if self.bus.ppu.take_frame_ready() {
                return self
                    .target_frame
                    .map_or(true, |target| self.bus.ppu.frame < target);
            }
        }
    }

    /// Ask [`Console::step_until_frame`] to stop once the frame counter
    /// reaches `target`. `None` clears the knob.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::InvalidFrameTarget`] when `target` is not
    /// ahead of the current frame.
    pub fn set_target_frame(&mut self, target: Option<u64>) -> Result<(), ConsoleError> {
        if let Some(target) = target {
            let current = self.bus.ppu.frame;
            if target <= current {
                return Err(ConsoleError::InvalidFrameTarget { target, current });
            }
        }
        self.target_frame = target;
        Ok(())
    }

    /// The finished 256x240 ARGB frame.
    pub fn frame(&self) -> &[u32] {
        self.bus.ppu.frame_buffer()
    }

    /// Number of completed frames.
    pub fn frame_count(&self) -> u64 {
        self.bus.ppu.frame
    }

    /// Drain the pending 48 kHz unsigned 8-bit sample window.
    pub fn take_audio(&mut self) -> Vec<u8> {
        self.bus.apu.take_samples()
    }

    /// Update a player's (0 or 1) live button mask.
    pub fn set_buttons(&mut self, player: usize, mask: u8) {
        self.bus.controllers.set_buttons(player, mask);
    }

    /// Total CPU cycles executed.
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// CPU view for tests and debugging.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Bus view for tests and debugging.
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    /// Mutable bus access for tests and debugging.
    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }
}
