//! Peak-hold level metering
//!
//! The mixer keeps cheap running level estimates for UI display: rectified
//! sample magnitudes accumulate during mixing and fold into a 0-100 level
//! roughly every 10 ms of audio. Levels rise instantly and decay linearly
//! with wall-clock time between queries, giving the classic peak-hold
//! meter ballistics without any per-query DSP.

use std::time::Instant;

/// Samples between level folds (~10 ms at 44.1 kHz)
pub(crate) const METER_FOLD_INTERVAL: u32 = 441;

/// Decay tick rate in Hz; the level loses one point per tick
const METER_TICK_HZ: u128 = 50;

/// Divisor mapping the folded master magnitude sum onto 0-100
const MASTER_METER_DIV: i64 = 164;

/// Divisor mapping folded per-channel magnitude sums onto 0-100
pub(crate) const CHANNEL_METER_DIV: f64 = 328.0;

/// Master output meter
pub(crate) struct MasterMeter {
    cnt: [i64; 2],
    sample_count: u32,
    level: [i32; 2],
    anchor: Instant,
    last_tick: u64,
}

impl MasterMeter {
    pub(crate) fn new() -> Self {
        Self {
            cnt: [0; 2],
            sample_count: 0,
            level: [0; 2],
            anchor: Instant::now(),
            last_tick: 0,
        }
    }

    /// Accumulate one output sample's magnitude (post headroom divide,
    /// pre clip)
    #[inline]
    pub(crate) fn accumulate(&mut self, left: i64, right: i64) {
        self.cnt[0] += left.abs();
        self.cnt[1] += right.abs();
        self.sample_count += 1;
    }

    /// True once enough samples have accumulated to fold
    #[inline]
    pub(crate) fn fold_due(&self) -> bool {
        self.sample_count >= METER_FOLD_INTERVAL
    }

    /// Fold the accumulated magnitudes into the peak-hold levels
    ///
    /// Returns the number of samples the fold covered, so per-channel
    /// levels can fold over the same window.
    pub(crate) fn fold(&mut self) -> u32 {
        let samples = self.sample_count;
        if samples == 0 {
            return 0;
        }
        for side in 0..2 {
            let new_level = (self.cnt[side] / samples as i64 / MASTER_METER_DIV) as i32;
            let new_level = new_level.min(100);
            if new_level > self.level[side] {
                self.level[side] = new_level;
            }
            self.cnt[side] = 0;
        }
        self.sample_count = 0;
        samples
    }

    /// Apply wall-clock decay; returns the elapsed tick count so callers
    /// can decay per-channel levels by the same amount
    pub(crate) fn decay(&mut self) -> u64 {
        let now = (self.anchor.elapsed().as_millis() * METER_TICK_HZ / 1000) as u64;
        let diff = now.saturating_sub(self.last_tick);
        if diff > 0 {
            let step = diff.min(i32::MAX as u64) as i32;
            for level in &mut self.level {
                *level = (*level - step).max(0);
            }
            self.last_tick = now;
        }
        diff
    }

    /// Current peak-hold level for one side, 0-100
    #[inline]
    pub(crate) fn level(&self, side: usize) -> i32 {
        self.level[side]
    }
}
