//! dendy: a cycle-timed NES emulation core.
//!
//! Glues the CPU, PPU, APU and mapper crates into a [`Console`] with the
//! NTSC 3:1 PPU:CPU co-stepping ratio. The host drives it one frame at a
//! time:
//!
//! ```no_run
//! use dendy_core::Console;
//!
//! let rom = std::fs::read("game.nes").unwrap();
//! let mut console = Console::new(&rom).unwrap();
//! loop {
//!     console.set_buttons(0, 0);
//!     if !console.step_until_frame() {
//!         break; // target frame reached
//!     }
//!     let frame: &[u32] = console.frame(); // 256x240 ARGB
//!     let audio: Vec<u8> = console.take_audio(); // 48 kHz u8 PCM
//!     // hand frame and audio to the host surface...
//!     # let _ = (frame, audio);
//! }
//! ```
//!
//! The core takes no locks and spawns no threads; a host that wants the
//! emulation off the UI thread owns the whole [`Console`] there and
//! passes frames across a channel.

mod bus;
mod console;
mod input;

pub use bus::NesBus;
pub use console::{Console, ConsoleError};
pub use input::{buttons, Controllers};
