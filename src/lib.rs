//! Real-time multi-channel sound-chip mixing engine
//!
//! Software reconstruction of a vintage computer's sound subsystem: any
//! number of emulated sound chips register themselves as channel
//! generators, and the mixer pulls samples from all of them on a fixed
//! clock, blends them with per-channel/per-type volume and pan, and
//! down-mixes to an interleaved 16-bit stereo stream for an output sink.
//!
//! # Features
//! - Pull-clocked mixing: each cycle produces exactly the samples that
//!   elapsed wall-clock time demands, no more, no fewer
//! - Dual-core generation: registered channels are split across two
//!   worker threads synchronized with the mix driver per cycle
//! - Sample-accurate parameter changes via the [`Mixer::sync`] protocol
//! - Bounded-buffer backpressure toward the output sink, with residue
//!   retry and repack
//! - Peak-hold level metering per channel type and for the master bus
//! - AY-3-8910/YM2149 programmable sound generator as the reference
//!   channel generator, driven through port-mapped I/O
//!
//! # Quick start
//! ```no_run
//! use msx_audio::{
//!     Ay8910, BusConnector, IoPortBus, Mixer, PsgVariant, SampleClock, SyncDriver,
//! };
//! use std::time::Duration;
//!
//! let mixer = Mixer::new(Box::new(SampleClock::new(44_100)));
//! let bus = IoPortBus::new();
//! let psg = Ay8910::new(&mixer, &bus, BusConnector::Msx, PsgVariant::Ay8910).unwrap();
//!
//! // mixer.set_write_sink(Box::new(my_sink), 128);
//! mixer.set_enable(true);
//! let driver = SyncDriver::spawn(mixer.clone(), Duration::from_millis(1));
//!
//! // Register writes arrive from the bus; the chip flushes pending
//! // samples before each one takes effect
//! bus.write(0xa0, 8);
//! bus.write(0xa1, 0x0f);
//!
//! drop(driver);
//! mixer.set_enable(false);
//! psg.detach();
//! ```

#![warn(missing_docs)]

pub mod ay8910;
pub mod clock;
pub mod dc_filter;
pub mod generator;
pub mod io_port;
pub mod mixer;
pub mod tables;

/// Error type for engine operations
///
/// Only genuinely reportable conditions appear here; hardware-faithful
/// behavior (out-of-range register bytes, partial sink writes) is
/// handled in place and never surfaces as an error.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The channel registry cannot take another entry
    #[error("channel registry is full ({max} channels)")]
    RegistryFull {
        /// Registry capacity
        max: usize,
    },

    /// The IO port is already bound to another handler
    #[error("io port {port:#04x} is already bound")]
    PortInUse {
        /// Port address that was requested
        port: u8,
    },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

// Public API exports
pub use ay8910::{Ay8910, BusConnector, MixerControl, PsgPortIo};
pub use clock::{SampleClock, SampleSource, SyncDriver};
pub use dc_filter::{DcBlocker, SmoothingFilter};
pub use generator::{AudioType, ChannelGenerator, GeneratorOutput, GeneratorRef, MixCore};
pub use io_port::{IoPortBus, PortHandler, PortObserver, PortProps};
pub use mixer::{AudioSink, ChannelHandle, Mixer, StereoSide, TypeSettings, MAX_CHANNELS};
pub use tables::{LevelTables, PsgVariant};
