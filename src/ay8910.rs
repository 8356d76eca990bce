//! AY-3-8910 programmable sound generator
//!
//! The reference channel generator: three square-wave voices gated by a
//! shared LFSR noise source, a 16-shape hardware envelope, and the
//! fixed-point output conditioning chain. Emulation state advances only
//! inside [`ChannelGenerator::generate`], which the mixer calls from a
//! sync-guarded cycle; register writes flush pending samples through
//! [`Mixer::sync`] before they take effect, so parameter changes land
//! exactly between samples.
//!
//! The chip registers itself with the mixer and binds its two bus ports
//! at construction; [`Ay8910::detach`] undoes both.

use crate::dc_filter::{DcBlocker, SmoothingFilter};
use crate::generator::{ChannelGenerator, GeneratorOutput};
use crate::io_port::{IoPortBus, PortHandler, PortProps};
use crate::mixer::{ChannelHandle, Mixer};
use crate::tables::{tone_phase_step, LevelTables, PsgVariant, BASE_PHASE_STEP};
use crate::{AudioType, MixCore, Result};
use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// Number of tone voices
const NUM_VOICES: usize = 3;

/// Valid-bit mask per register; undefined bits read and store as zero
const REG_MASK: [u8; 16] = [
    0xff, 0x0f, 0xff, 0x0f, 0xff, 0x0f, 0x1f, 0x3f, 0x1f, 0x1f, 0x1f, 0xff, 0xff, 0x0f, 0xff,
    0xff,
];

bitflags! {
    /// Layout of the mixer-control register (R7)
    ///
    /// Bits are active-low in hardware: a set bit disables the source.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MixerControl: u8 {
        /// Tone off, voice A
        const TONE_A_OFF = 0x01;
        /// Tone off, voice B
        const TONE_B_OFF = 0x02;
        /// Tone off, voice C
        const TONE_C_OFF = 0x04;
        /// Noise off, voice A
        const NOISE_A_OFF = 0x08;
        /// Noise off, voice B
        const NOISE_B_OFF = 0x10;
        /// Noise off, voice C
        const NOISE_C_OFF = 0x20;
    }
}

/// Bus wiring variant: which two ports the chip decodes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusConnector {
    /// MSX wiring: address latch at 0xa0, data at 0xa1
    Msx,
    /// SVI-3x8 wiring: address latch at 0x88, data at 0x8c
    Svi,
}

impl BusConnector {
    /// (address latch port, data port)
    fn ports(self) -> (u8, u8) {
        match self {
            BusConnector::Msx => (0xa0, 0xa1),
            BusConnector::Svi => (0x88, 0x8c),
        }
    }
}

/// External endpoint for the chip's two general-purpose IO registers
///
/// Registers 14 and 15 latch through these callbacks (keyboard matrix,
/// joystick scan lines, cassette sense). All methods default to the
/// hardware idle pattern: reads float high, writes vanish.
pub trait PsgPortIo: Send + Sync {
    /// Read IO register `port` (0 or 1)
    fn read(&self, _port: u8) -> u8 {
        0xff
    }

    /// Non-destructive poll of IO register `port`
    fn poll(&self, port: u8) -> u8 {
        self.read(port)
    }

    /// Write `value` to IO register `port`
    fn write(&self, _port: u8, _value: u8) {}
}

/// Generator-local state; owned by whichever thread holds the lock
/// inside a sync-guarded window
struct PsgState {
    handle: Option<ChannelHandle>,

    address: u8,
    regs: [u8; 16],

    tone_phase: [u32; NUM_VOICES],
    tone_step: [u32; NUM_VOICES],

    noise_phase: u32,
    noise_step: u32,
    noise_lfsr: u32,
    noise_bit: u32,

    env_shape: u8,
    env_step: u32,
    env_phase: u32,

    enable: u8,
    amp: [u8; NUM_VOICES],

    dc: DcBlocker,
    smooth: SmoothingFilter,

    tables: LevelTables,
}

/// The PSG chip
pub struct Ay8910 {
    mixer: Weak<Mixer>,
    bus: Weak<IoPortBus>,
    address_port: u8,
    data_port: u8,
    state: Mutex<PsgState>,
    port_io: RwLock<Option<Arc<dyn PsgPortIo>>>,
}

impl Ay8910 {
    /// Create a chip, register it with the mixer and bind its bus ports
    ///
    /// The chip is registered as a mono PSG channel on [`MixCore::Core0`]
    /// and all registers are swept to zero through the normal write
    /// protocol, exactly as the hardware reset line does.
    pub fn new(
        mixer: &Arc<Mixer>,
        bus: &Arc<IoPortBus>,
        connector: BusConnector,
        variant: PsgVariant,
    ) -> Result<Arc<Self>> {
        let (address_port, data_port) = connector.ports();
        let chip = Arc::new(Self {
            mixer: Arc::downgrade(mixer),
            bus: Arc::downgrade(bus),
            address_port,
            data_port,
            state: Mutex::new(PsgState {
                handle: None,
                address: 0,
                regs: [0; 16],
                tone_phase: [0; NUM_VOICES],
                tone_step: [0; NUM_VOICES],
                noise_phase: 0,
                noise_step: 0,
                noise_lfsr: 1,
                noise_bit: 1,
                env_shape: 0,
                env_step: 0,
                env_phase: 0,
                enable: 0,
                amp: [0; NUM_VOICES],
                dc: DcBlocker::new(),
                smooth: SmoothingFilter::new(),
                tables: LevelTables::new(variant),
            }),
            port_io: RwLock::new(None),
        });

        let handle = mixer.register_channel(
            MixCore::Core0,
            AudioType::Psg,
            None,
            false,
            chip.clone(),
        )?;
        chip.state.lock().handle = Some(handle);

        let generator: Arc<dyn PortHandler> = chip.clone();
        if let Err(e) = bus.register(address_port, PortProps::WRITE, generator.clone()) {
            mixer.unregister_channel(handle);
            return Err(e);
        }
        if let Err(e) = bus.register(data_port, PortProps::WRITE, generator) {
            bus.unregister(address_port);
            mixer.unregister_channel(handle);
            return Err(e);
        }

        chip.reset();
        Ok(chip)
    }

    /// Bind the external endpoint for IO registers 14/15
    pub fn set_port_io(&self, io: Arc<dyn PsgPortIo>) {
        *self.port_io.write() = Some(io);
    }

    /// Mixer handle of the chip's channel
    pub fn handle(&self) -> Option<ChannelHandle> {
        self.state.lock().handle
    }

    /// Sweep all registers to zero through the write protocol
    pub fn reset(&self) {
        for reg in 0..16 {
            self.write_address(reg);
            self.write_data(0);
        }
        self.write_address(0);
    }

    /// Unbind from the bus and remove the mixer channel
    pub fn detach(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unregister(self.address_port);
            bus.unregister(self.data_port);
        }
        // Take the handle in its own statement so the state lock is not
        // held across the mixer call
        let handle = self.state.lock().handle.take();
        if let Some(handle) = handle {
            if let Some(mixer) = self.mixer.upgrade() {
                mixer.unregister_channel(handle);
            }
        }
    }

    /// Latch the register address (low four bits)
    pub fn write_address(&self, address: u8) {
        self.state.lock().address = address & 0x0f;
    }

    /// Write to the currently addressed register
    pub fn write_data(&self, data: u8) {
        let reg = self.state.lock().address;
        self.write_register(reg, data);
    }

    /// Write a register directly
    ///
    /// Audible registers (0-13) force a mixer sync first, flushing every
    /// sample due at the old parameter values. The value is then masked
    /// to the register's valid bits and applied; no bit pattern is ever
    /// rejected.
    pub fn write_register(&self, reg: u8, data: u8) {
        let reg = (reg & 0x0f) as usize;
        if reg < 14 {
            if let Some(mixer) = self.mixer.upgrade() {
                mixer.sync();
            }
        }

        let io_write = {
            let mut st = self.state.lock();
            st.apply_register(reg, data)
        };
        if let Some((port, value)) = io_write {
            if let Some(io) = self.port_io.read().clone() {
                io.write(port, value);
            }
        }
    }

    /// Read the currently addressed register
    ///
    /// IO registers (14/15) go through the bound [`PsgPortIo`] endpoint;
    /// unbound, they return the latched value.
    pub fn read_data(&self) -> u8 {
        let (address, latched) = {
            let st = self.state.lock();
            (st.address, st.regs[st.address as usize])
        };
        if address >= 14 {
            if let Some(io) = self.port_io.read().clone() {
                return io.read(address - 14);
            }
        }
        latched
    }

    /// Non-destructive peek of the currently addressed register
    pub fn peek_data(&self) -> u8 {
        let (address, latched) = {
            let st = self.state.lock();
            (st.address, st.regs[st.address as usize])
        };
        if address >= 14 {
            if let Some(io) = self.port_io.read().clone() {
                return io.poll(address - 14);
            }
        }
        latched
    }

    /// Read a register directly
    pub fn read_register(&self, reg: u8) -> u8 {
        self.state.lock().regs[(reg & 0x0f) as usize]
    }

    /// Current mixer-control flags (decoded R7)
    pub fn mixer_control(&self) -> MixerControl {
        MixerControl::from_bits_truncate(self.state.lock().enable)
    }
}

impl PsgState {
    /// Mask, store and decode one register write
    ///
    /// Returns the deferred IO-port write, if any, so the caller can run
    /// the external callback outside this state lock.
    fn apply_register(&mut self, reg: usize, data: u8) -> Option<(u8, u8)> {
        let data = data & REG_MASK[reg];
        self.regs[reg] = data;

        match reg {
            0..=5 => {
                let voice = reg >> 1;
                let period =
                    self.regs[reg & 6] as u32 | ((self.regs[reg | 1] as u32) << 8);
                self.tone_step[voice] = tone_phase_step(period);
            }
            6 => {
                self.noise_step = tone_phase_step(data.max(1) as u32);
            }
            7 => {
                self.enable = data;
            }
            8..=10 => {
                self.amp[reg - 8] = data;
            }
            11 | 12 => {
                let period = 16 * (self.regs[11] as u32 | ((self.regs[12] as u32) << 8));
                self.env_step = BASE_PHASE_STEP / if period > 0 { period } else { 8 };
            }
            13 => {
                // Shapes 0-3 collapse to the one-shot decay, 4-7 to the
                // rising hold; 8-15 follow their bits literally
                let shape = if data < 4 {
                    0x09
                } else if data < 8 {
                    0x0f
                } else {
                    data
                };
                self.env_shape = shape;
                self.env_phase = 0;
            }
            14 | 15 => {
                return Some(((reg - 14) as u8, data));
            }
            _ => unreachable!(),
        }
        None
    }

    /// Produce one output sample
    ///
    /// Runs the noise and envelope state machines once, gates each voice
    /// with 16x oversampling into a duty count, applies the logarithmic
    /// amplitude and the output conditioning chain.
    #[inline]
    fn next_sample(&mut self) -> i32 {
        // Noise LFSR advances on every phase overflow
        self.noise_phase = self.noise_phase.wrapping_add(self.noise_step);
        while self.noise_phase >> 28 != 0 {
            self.noise_phase -= 0x1000_0000;
            self.noise_bit ^= ((self.noise_lfsr + 1) >> 1) & 1;
            self.noise_lfsr = (self.noise_lfsr ^ (0x28000 * (self.noise_lfsr & 1))) >> 1;
        }

        // Envelope free-runs; odd shapes hold at the top of the ramp
        self.env_phase = self.env_phase.wrapping_add(self.env_step);
        if self.env_shape & 1 != 0 && self.env_phase >> 28 != 0 {
            self.env_phase = 0x1000_0000;
        }

        // Decode the 5-bit envelope level from the raw ramp and the
        // shape's attack/alternate bits
        let shape = self.env_shape as u32;
        let mut env_level = (self.env_phase >> 23) & 0x1f;
        if (((self.env_phase >> 27) & (shape + 1)) ^ ((!shape >> 1) & 2)) != 0 {
            env_level ^= 0x1f;
        }

        let mut sample = 0i32;
        for voice in 0..NUM_VOICES {
            let enable = (self.enable as u32) >> voice;
            let noise_gate = ((enable >> 3) | self.noise_bit) & 1;
            let phase_step = (!enable & 1) * self.tone_step[voice];
            let mut phase = self.tone_phase[voice];

            // 16x oversampled square-wave gate, accumulated as a duty
            // count to soften aliasing
            let mut duty = 0u32;
            for _ in 0..16 {
                phase = phase.wrapping_add(phase_step);
                duty += (enable | (phase >> 31)) & noise_gate;
            }
            self.tone_phase[voice] = phase;

            let amp = self.amp[voice];
            let level = if amp & 0x10 != 0 {
                self.tables.env[env_level as usize]
            } else {
                self.tables.amp[(amp & 0x0f) as usize]
            };
            sample += duty as i32 * level as i32 / 16;
        }

        let filtered = self.dc.process(sample);
        9 * self.smooth.process(filtered)
    }
}

impl ChannelGenerator for Ay8910 {
    fn generate(&self, buffer: &mut [i32], count: usize) -> GeneratorOutput {
        let mut st = self.state.lock();
        for slot in buffer[..count].iter_mut() {
            *slot = st.next_sample();
        }
        GeneratorOutput::Generated
    }
}

impl PortHandler for Ay8910 {
    fn write(&self, port: u8, value: u8) {
        if port == self.address_port {
            self.write_address(value);
        } else {
            self.write_data(value);
        }
    }
}
