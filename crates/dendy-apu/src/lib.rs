//! NES 2A03 APU for the dendy NES core.
//!
//! Five channels (two pulses, triangle, noise, DMC) mixed through the
//! non-linear lookup tables into an unsigned 8-bit 48 kHz stream. The
//! APU is ticked once per CPU cycle; DMC memory fetches are a
//! request/serve handshake so the crate never touches the system bus —
//! the scheduler answers [`Apu::take_dmc_request`] with a CPU-space read,
//! [`Apu::load_dmc_sample`] and 4 stall cycles.

mod apu;
mod dmc;
mod noise;
mod pulse;
mod triangle;

pub use apu::{Apu, CPU_CLOCK, SAMPLE_BUF_SIZE, SAMPLE_RATE};
pub use dmc::Dmc;
pub use noise::Noise;
pub use pulse::{Pulse, PulseChannel};
pub use triangle::Triangle;
