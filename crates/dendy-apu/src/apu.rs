//! APU register fan-out, frame sequencer, mixer and sample ring.
//!
//! The APU is ticked once per CPU cycle. Pulse, noise and DMC timers run
//! on every other tick; the triangle timer runs on every tick. The frame
//! sequencer and the 48 kHz sample clock both derive from the CPU cycle
//! counter by watching for quotient changes against their rates.

use crate::dmc::Dmc;
use crate::noise::Noise;
use crate::pulse::{Pulse, PulseChannel};
use crate::triangle::Triangle;

/// Length counter values indexed by the 5-bit load field.
pub(crate) const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14,
    12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

/// CPU clock rate (NTSC).
pub const CPU_CLOCK: f64 = 1_789_773.0;
/// Output sample rate.
pub const SAMPLE_RATE: u32 = 48_000;
/// Sample ring capacity; further samples are dropped until drained.
pub const SAMPLE_BUF_SIZE: usize = 4096;

/// CPU cycles per frame-sequencer step (240 Hz).
const FRAME_COUNTER_PERIOD: f64 = CPU_CLOCK / 240.0;
/// CPU cycles per output sample.
const SAMPLE_PERIOD: f64 = CPU_CLOCK / SAMPLE_RATE as f64;

/// Pulse mixer lookup: `95.52 / (8128 / n + 100)` for n = s1 + s2.
const PULSE_TABLE: [f32; 31] = {
    let mut table = [0.0f32; 31];
    let mut i = 1;
    while i < 31 {
        table[i] = 95.52 / (8128.0 / (i as f32) + 100.0);
        i += 1;
    }
    table
};

/// Triangle/noise/DMC mixer lookup: `163.67 / (24329 / n + 100)` for
/// n = 3*tri + 2*noi + dmc.
const TND_TABLE: [f32; 203] = {
    let mut table = [0.0f32; 203];
    let mut i = 1;
    while i < 203 {
        table[i] = 163.67 / (24329.0 / (i as f32) + 100.0);
        i += 1;
    }
    table
};

/// The 2A03 APU.
pub struct Apu {
    cycle: u64,

    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,

    /// Frame sequencer mode: 4 or 5 steps.
    frame_period: u8,
    frame_value: u8,
    /// Frame IRQ enabled ($4017 bit 6 clear).
    frame_irq: bool,
    /// One-shot IRQ event for the scheduler.
    irq_pending: bool,

    samples: Vec<u8>,
}

impl Apu {
    /// Create an APU with all channels silent.
    pub fn new() -> Self {
        Self {
            cycle: 0,
            pulse1: Pulse::new(PulseChannel::One),
            pulse2: Pulse::new(PulseChannel::Two),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            frame_period: 4,
            frame_value: 0,
            frame_irq: false,
            irq_pending: false,
            samples: Vec::with_capacity(SAMPLE_BUF_SIZE),
        }
    }

    /// Write an APU register ($4000-$4013, $4015, $4017).
    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x4000 => self.pulse1.write_ctrl(val),
            0x4001 => self.pulse1.write_sweep(val),
            0x4002 => self.pulse1.write_timer_lo(val),
            0x4003 => self.pulse1.write_timer_hi(val),

            0x4004 => self.pulse2.write_ctrl(val),
            0x4005 => self.pulse2.write_sweep(val),
            0x4006 => self.pulse2.write_timer_lo(val),
            0x4007 => self.pulse2.write_timer_hi(val),

            0x4008 => self.triangle.write_ctrl(val),
            0x4009 | 0x400A => self.triangle.write_timer_lo(val),
            0x400B => self.triangle.write_timer_hi(val),

            0x400C => self.noise.write_ctrl(val),
            0x400E => self.noise.write_period(val),
            0x400F => self.noise.write_length(val),

            0x4010 => self.dmc.write_ctrl(val),
            0x4011 => self.dmc.write_value(val),
            0x4012 => self.dmc.write_address(val),
            0x4013 => self.dmc.write_length(val),

            0x4015 => self.write_control(val),
            0x4017 => self.write_frame_counter(val),

            _ => {}
        }
    }

    /// $4015 read: length-nonzero bits for the five channels.
    pub fn read_status(&self) -> u8 {
        let mut status = 0;
        if self.pulse1.active() {
            status |= 0x01;
        }
        if self.pulse2.active() {
            status |= 0x02;
        }
        if self.triangle.active() {
            status |= 0x04;
        }
        if self.noise.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        status
    }

    /// $4015 write: channel enables; disabling a channel clears its
    /// length counter, enabling the DMC restarts a drained sample.
    fn write_control(&mut self, val: u8) {
        self.pulse1.set_enabled(val & 0x01 != 0);
        self.pulse2.set_enabled(val & 0x02 != 0);
        self.triangle.set_enabled(val & 0x04 != 0);
        self.noise.set_enabled(val & 0x08 != 0);
        self.dmc.set_enabled(val & 0x10 != 0);
    }

    /// $4017 write: sequencer mode and frame IRQ gate. Entering 5-step
    /// mode clocks the sequencer immediately.
    fn write_frame_counter(&mut self, val: u8) {
        self.frame_period = 4 + ((val >> 7) & 0x01);
        if self.frame_period == 5 {
            self.step_frame_counter();
        }
        self.frame_irq = (val >> 6) & 0x01 == 0;
    }

    /// Run one CPU cycle worth of APU time.
    pub fn tick(&mut self) {
        let cycle1 = self.cycle;
        self.cycle += 1;
        let cycle2 = self.cycle;

        self.step_timers();

        let f1 = (cycle1 as f64 / FRAME_COUNTER_PERIOD) as u64;
        let f2 = (cycle2 as f64 / FRAME_COUNTER_PERIOD) as u64;
        if f1 != f2 {
            self.step_frame_counter();
        }

        let s1 = (cycle1 as f64 / SAMPLE_PERIOD) as u64;
        let s2 = (cycle2 as f64 / SAMPLE_PERIOD) as u64;
        if s1 != s2 {
            self.push_sample();
        }
    }

    fn step_timers(&mut self) {
        if self.cycle % 2 == 0 {
            self.pulse1.step_timer();
            self.pulse2.step_timer();
            self.noise.step_timer();
            self.dmc.step_timer();
        }
        self.triangle.step_timer();
    }

    /// One 240 Hz sequencer step. Envelopes run every step; lengths and
    /// sweeps on the half-frame steps; the 4-step mode fires the frame
    /// IRQ on its third step.
    fn step_frame_counter(&mut self) {
        self.frame_value += 1;

        let half_frame = match self.frame_period {
            4 => {
                if self.frame_value == 3 && self.frame_irq {
                    self.irq_pending = true;
                }
                self.frame_value == 1 || self.frame_value == 3
            }
            _ => self.frame_value == 1 || self.frame_value == 4,
        };

        if half_frame {
            self.pulse1.step_length();
            self.pulse2.step_length();
            self.triangle.step_length();
            self.noise.step_length();
            self.pulse1.step_sweep();
            self.pulse2.step_sweep();
        }

        self.pulse1.step_envelope();
        self.pulse2.step_envelope();
        self.triangle.step_counter();
        self.noise.step_envelope();

        if self.frame_value >= self.frame_period {
            self.frame_value = 0;
        }
    }

    /// Mixed output for the current tick as an unsigned 8-bit sample.
    pub fn output(&self) -> u8 {
        let s1 = self.pulse1.output();
        let s2 = self.pulse2.output();
        let tri = self.triangle.output();
        let noi = self.noise.output();
        let dmc = self.dmc.output();

        let sqs = PULSE_TABLE[usize::from(s1 + s2)];
        let tnd = TND_TABLE[usize::from(3 * u16::from(tri) + 2 * u16::from(noi) + u16::from(dmc))];

        let res = 128.0 * (sqs + tnd);
        res.clamp(0.0, 255.0) as u8
    }

    fn push_sample(&mut self) {
        if self.samples.len() < SAMPLE_BUF_SIZE {
            let sample = self.output();
            self.samples.push(sample);
        }
    }

    /// Drain the accumulated 48 kHz sample window.
    pub fn take_samples(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.samples)
    }

    /// Number of samples waiting to be drained.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Consume the pending frame IRQ event, if any.
    pub fn take_irq(&mut self) -> bool {
        std::mem::take(&mut self.irq_pending)
    }

    /// Address of the byte the DMC reader wants fetched, if any.
    pub fn take_dmc_request(&mut self) -> Option<u16> {
        self.dmc.take_sample_request()
    }

    /// Deliver a fetched DMC sample byte.
    pub fn load_dmc_sample(&mut self, byte: u8) {
        self.dmc.load_sample(byte);
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
