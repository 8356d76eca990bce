//! Pull-count sources and the periodic sync driver
//!
//! The mixer never free-runs: each [`crate::Mixer::sync`] call asks a
//! [`SampleSource`] how many samples are due and produces exactly that
//! many. [`SampleClock`] derives the count from elapsed wall-clock time;
//! emulation hosts that step virtual time provide their own source.

use crate::Mixer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Source of "how many samples are due now"
///
/// Implementations must be monotonic non-decreasing in elapsed time and
/// saturate rather than wrap. The mixer additionally caps the returned
/// value at its own buffer capacity, so a source may over-report after a
/// stall without breaking the engine.
pub trait SampleSource: Send {
    /// Samples elapsed since the previous call
    fn pending_samples(&mut self) -> u32;
}

/// Wall-clock sample source
///
/// Converts elapsed time since the last query into a sample count at a
/// fixed rate. The conversion carries the sub-sample remainder forward,
/// so the long-run total never drifts from real time.
pub struct SampleClock {
    sample_rate: u32,
    anchor: Instant,
    consumed: u64,
}

impl SampleClock {
    /// Create a clock producing `sample_rate` samples per second
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            anchor: Instant::now(),
            consumed: 0,
        }
    }

    /// Re-anchor the clock to "now", discarding any accumulated backlog
    pub fn reset(&mut self) {
        self.anchor = Instant::now();
        self.consumed = 0;
    }

    /// The configured sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SampleSource for SampleClock {
    fn pending_samples(&mut self) -> u32 {
        let elapsed = self.anchor.elapsed();
        let total = (elapsed.as_nanos() * self.sample_rate as u128 / 1_000_000_000) as u64;
        let due = total.saturating_sub(self.consumed);
        self.consumed = total;
        due.min(u32::MAX as u64) as u32
    }
}

/// Background thread that drives [`Mixer::sync`] at a fixed period
///
/// Hosts with their own periodic callback (an audio interrupt, an
/// emulation frame loop) call `sync` themselves; this driver covers the
/// common case of a plain thread. Dropping the driver stops the thread.
pub struct SyncDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncDriver {
    /// Spawn the driver thread
    pub fn spawn(mixer: Arc<Mixer>, period: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("mix-driver".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    mixer.sync();
                    std::thread::sleep(period);
                }
            })
            .expect("failed to spawn mix driver thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the driver and wait for its final cycle to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
