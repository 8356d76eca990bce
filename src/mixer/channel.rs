//! Channel records and gain derivation
//!
//! A registered channel carries its user-facing settings (enable,
//! volume, pan; seeded from its type's defaults) and the derived
//! left/right gains the workers apply while accumulating. The gains are
//! recomputed in exactly one place, [`Channel::recompute_gain`];
//! everything else treats them as opaque fixed-point factors.

use crate::generator::{GeneratorRef, NUM_MIX_CORES};
use crate::tables;
use crate::AudioType;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// Fixed-point unit of the derived channel gains (Q10)
pub(crate) const GAIN_UNIT: f64 = 1024.0;

/// Divisor shift applied to per-channel meter contributions
pub(crate) const CHANNEL_METER_SHIFT: u32 = 11;

/// Opaque identifier of a registered channel
///
/// Handles are non-zero and assigned from a monotonic counter, so a
/// handle is never reused while any channel is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub(crate) u32);

impl ChannelHandle {
    /// Raw handle value, for display and host-side bookkeeping
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Left or right side of the stereo stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StereoSide {
    /// Left output
    Left,
    /// Right output
    Right,
}

impl StereoSide {
    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            StereoSide::Left => 0,
            StereoSide::Right => 1,
        }
    }
}

/// Per-type default settings, applied to channels at registration and
/// propagated on every change
#[derive(Clone, Copy, Debug)]
pub struct TypeSettings {
    /// Default volume, 0-100
    pub volume: i32,
    /// Default pan, 0-100 with 50 = center
    pub pan: i32,
    /// Default enable flag
    pub enabled: bool,
}

impl Default for TypeSettings {
    fn default() -> Self {
        Self {
            volume: 100,
            pan: 50,
            enabled: true,
        }
    }
}

/// Stereo-pair linkage of a channel
///
/// A generator that emits two logical voices per invocation registers a
/// primary entry (owning the generator slot) and a secondary entry that
/// only contributes its gains and metering; the two are removed
/// together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PairRole {
    /// Independent channel
    Solo,
    /// Owns the generator; the partner handle scales the second voice
    Primary(ChannelHandle),
    /// Gain/metering carrier for a primary's second voice
    Secondary(ChannelHandle),
}

/// One registry entry
pub(crate) struct Channel {
    pub handle: ChannelHandle,
    pub audio_type: AudioType,
    pub role: PairRole,
    pub stereo: bool,

    // User config, seeded from the type defaults
    pub enabled: bool,
    pub volume: i32,
    pub pan: i32,

    // Derived gains, Q10 fixed point
    pub gain_left: i32,
    pub gain_right: i32,

    // Running metering state: contribution counts bumped by the workers,
    // folded peak-hold levels maintained by the mix driver
    pub meter_cnt: [AtomicI64; 2],
    pub meter_level: [AtomicI32; 2],

    /// Generator slot per mix core; an empty slot means this channel is
    /// not processed by that core's worker
    pub generators: [Option<GeneratorRef>; NUM_MIX_CORES],
}

impl Channel {
    pub(crate) fn new(
        handle: ChannelHandle,
        audio_type: AudioType,
        stereo: bool,
        role: PairRole,
        defaults: &TypeSettings,
    ) -> Self {
        Self {
            handle,
            audio_type,
            role,
            stereo,
            enabled: defaults.enabled,
            volume: defaults.volume,
            pan: defaults.pan,
            gain_left: 0,
            gain_right: 0,
            meter_cnt: [AtomicI64::new(0), AtomicI64::new(0)],
            meter_level: [AtomicI32::new(0), AtomicI32::new(0)],
            generators: [None, None],
        }
    }

    /// Derive the left/right gains from the current settings
    ///
    /// The gain is the product of the enable flags, the master volume,
    /// the channel volume and the pan attenuation, expressed in Q10. A
    /// disabled channel (or disabled master) has gain zero on both
    /// sides.
    pub(crate) fn recompute_gain(&mut self, master_factor: f64, master_enabled: bool) {
        if !self.enabled || !master_enabled {
            self.gain_left = 0;
            self.gain_right = 0;
            return;
        }
        let volume = tables::volume_factor(self.volume);
        self.gain_left =
            (GAIN_UNIT * master_factor * volume * tables::pan_factor_left(self.pan)) as i32;
        self.gain_right =
            (GAIN_UNIT * master_factor * volume * tables::pan_factor_right(self.pan)) as i32;
    }

    /// Add one worker-side meter contribution
    #[inline]
    pub(crate) fn bump_meter(&self, left: i64, right: i64) {
        self.meter_cnt[0].fetch_add(left, Ordering::Relaxed);
        self.meter_cnt[1].fetch_add(right, Ordering::Relaxed);
    }

    /// Decay the peak-hold levels by `ticks` 50 Hz units
    pub(crate) fn decay_level(&self, ticks: u64) {
        let step = ticks.min(i32::MAX as u64) as i32;
        for level in &self.meter_level {
            let _ = level.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v - step).max(0))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::volume_factor;

    fn test_channel() -> Channel {
        Channel::new(
            ChannelHandle(1),
            AudioType::Psg,
            false,
            PairRole::Solo,
            &TypeSettings::default(),
        )
    }

    #[test]
    fn test_disabled_channel_has_zero_gain() {
        let mut channel = test_channel();
        channel.enabled = false;
        channel.recompute_gain(volume_factor(100), true);
        assert_eq!(channel.gain_left, 0);
        assert_eq!(channel.gain_right, 0);
    }

    #[test]
    fn test_master_disable_zeroes_gain() {
        let mut channel = test_channel();
        channel.recompute_gain(volume_factor(100), false);
        assert_eq!(channel.gain_left, 0);
        assert_eq!(channel.gain_right, 0);
    }

    #[test]
    fn test_centered_pan_is_symmetric() {
        let mut channel = test_channel();
        channel.pan = 50;
        channel.recompute_gain(volume_factor(100), true);
        assert_eq!(channel.gain_left, channel.gain_right);
        assert!(channel.gain_left > 0);
    }

    #[test]
    fn test_hard_pan_silences_one_side() {
        let mut channel = test_channel();
        channel.pan = 0;
        channel.recompute_gain(volume_factor(100), true);
        assert!(channel.gain_left > 0);
        assert_eq!(channel.gain_right, 0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut channel = test_channel();
        channel.volume = 73;
        channel.pan = 31;
        channel.recompute_gain(volume_factor(100), true);
        let (l, r) = (channel.gain_left, channel.gain_right);
        channel.recompute_gain(volume_factor(100), true);
        assert_eq!((l, r), (channel.gain_left, channel.gain_right));
    }

    #[test]
    fn test_volume_zero_is_silent() {
        let mut channel = test_channel();
        channel.volume = 0;
        channel.recompute_gain(volume_factor(100), true);
        assert_eq!(channel.gain_left, 0);
        assert_eq!(channel.gain_right, 0);
    }

    #[test]
    fn test_decay_level_floors_at_zero() {
        let channel = test_channel();
        channel.meter_level[0].store(5, Ordering::Relaxed);
        channel.decay_level(3);
        assert_eq!(channel.meter_level[0].load(Ordering::Relaxed), 2);
        channel.decay_level(100);
        assert_eq!(channel.meter_level[0].load(Ordering::Relaxed), 0);
    }
}
