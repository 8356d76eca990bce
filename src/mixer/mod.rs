//! Real-time multi-channel mixer
//!
//! The mixer owns the channel registry, per-type default settings, the
//! pull clock binding, the dual-core generation pipeline, output
//! fragmentation and level metering. Sound chips register themselves as
//! [`crate::ChannelGenerator`]s and call [`Mixer::sync`] before any
//! parameter change so the stream is flushed at the old values first.
//!
//! One `sync` call is one mix cycle: query how many samples are due,
//! generate them across both worker cores, down-mix to interleaved
//! 16-bit stereo and hand fragment-sized chunks to the output sink.

mod channel;
mod metering;
mod output;
mod workers;

pub use channel::{ChannelHandle, StereoSide, TypeSettings};
pub use output::AudioSink;

use channel::{Channel, PairRole};
use metering::{MasterMeter, CHANNEL_METER_DIV};
use output::{FragmentBuffer, MONO_BUFFER_CAPACITY};
use workers::{MixShared, WorkerPool};

use crate::clock::SampleSource;
use crate::generator::GeneratorRef;
use crate::tables;
use crate::{AudioType, EngineError, MixCore, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Maximum number of registered channels
pub const MAX_CHANNELS: usize = 16;

/// Headroom divisor applied when draining the accumulator to 16 bits
const HEADROOM: i64 = 4096;

/// State mutated only under the sync guard
struct SyncState {
    source: Box<dyn SampleSource>,
    sink: Option<Box<dyn AudioSink>>,
    ring: FragmentBuffer,
    master_volume: i32,
    master_factor: f64,
    master_enabled: bool,
    types: [TypeSettings; AudioType::COUNT],
    meter: MasterMeter,
    next_handle: u32,
    workers: Option<WorkerPool>,
}

impl SyncState {
    /// Silence fast path: advance the cursor and keep fragments flowing
    /// to the sink without running the generators
    fn write_silence(&mut self, due: usize) {
        for _ in 0..due {
            self.ring.push(0, 0);
            if self.ring.flush_ready() {
                self.ring.flush(&mut self.sink);
            }
        }
    }
}

/// The mixing engine
///
/// All methods take `&self`; the mixer is shared behind an [`Arc`]
/// between the driver thread, the generation workers and any number of
/// bus threads performing register writes.
pub struct Mixer {
    state: Mutex<SyncState>,
    shared: Arc<MixShared>,
}

impl Mixer {
    /// Create a mixer pulling its sample counts from `source`
    ///
    /// The engine starts disabled; call [`Mixer::set_enable`] to spin up
    /// the generation workers.
    pub fn new(source: Box<dyn SampleSource>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SyncState {
                source,
                sink: None,
                ring: FragmentBuffer::new(),
                master_volume: 100,
                master_factor: tables::volume_factor(100),
                master_enabled: true,
                types: [TypeSettings::default(); AudioType::COUNT],
                meter: MasterMeter::new(),
                next_handle: 0,
                workers: None,
            }),
            shared: MixShared::new(),
        })
    }

    /// Attach the output sink and set the flush granularity
    ///
    /// `fragment_size` is in interleaved words; zero selects the default
    /// of 512. The sink can be swapped at runtime; buffered residue is
    /// carried over to the new sink.
    pub fn set_write_sink(&self, sink: Box<dyn AudioSink>, fragment_size: usize) {
        let mut st = self.state.lock();
        st.ring.set_fragment_size(fragment_size);
        st.sink = Some(sink);
        debug!(
            "output sink attached, fragment {} words",
            st.ring.fragment_size()
        );
    }

    /// Register a channel processed on `core`
    ///
    /// With `connected_type` set, the generator emits two interleaved
    /// logical voices per invocation; a second registry entry of the
    /// connected type carries the gains and metering of the second
    /// voice. Both entries share the returned handle's lifecycle.
    ///
    /// Fails with [`EngineError::RegistryFull`] when the registry cannot
    /// take the new entries; the registry is left unchanged.
    pub fn register_channel(
        &self,
        core: MixCore,
        audio_type: AudioType,
        connected_type: Option<AudioType>,
        stereo: bool,
        generator: GeneratorRef,
    ) -> Result<ChannelHandle> {
        let mut st = self.state.lock();
        let mut registry = self.shared.registry.write();

        let needed = if connected_type.is_some() { 2 } else { 1 };
        if registry.len() + needed > MAX_CHANNELS {
            warn!("channel registry full ({MAX_CHANNELS}), registration refused");
            return Err(EngineError::RegistryFull { max: MAX_CHANNELS });
        }

        st.next_handle += 1;
        let primary = ChannelHandle(st.next_handle);
        let role = match connected_type {
            Some(_) => {
                st.next_handle += 1;
                PairRole::Primary(ChannelHandle(st.next_handle))
            }
            None => PairRole::Solo,
        };

        let mut entry = Channel::new(
            primary,
            audio_type,
            stereo,
            role,
            &st.types[audio_type.index()],
        );
        entry.generators[core.index()] = Some(generator);
        entry.recompute_gain(st.master_factor, st.master_enabled);
        registry.push(entry);

        if let (Some(connected), PairRole::Primary(secondary)) = (connected_type, role) {
            let mut entry = Channel::new(
                secondary,
                connected,
                false,
                PairRole::Secondary(primary),
                &st.types[connected.index()],
            );
            entry.recompute_gain(st.master_factor, st.master_enabled);
            registry.push(entry);
        }

        debug!(
            "registered channel {} ({audio_type:?}, core {}, stereo {stereo})",
            primary.get(),
            core.index()
        );
        Ok(primary)
    }

    /// Remove a channel (and its connected partner); no-op if the handle
    /// is not registered
    pub fn unregister_channel(&self, handle: ChannelHandle) {
        let _guard = self.state.lock();
        let mut registry = self.shared.registry.write();

        let Some(pos) = registry.iter().position(|c| c.handle == handle) else {
            return;
        };
        let partner = match registry[pos].role {
            PairRole::Primary(h) | PairRole::Secondary(h) => Some(h),
            PairRole::Solo => None,
        };
        registry.remove(pos);
        if let Some(partner) = partner {
            if let Some(pos) = registry.iter().position(|c| c.handle == partner) {
                registry.remove(pos);
            }
        }
        debug!("unregistered channel {}", handle.get());
    }

    /// Number of registry entries currently held
    pub fn channel_count(&self) -> usize {
        self.shared.registry.read().len()
    }

    /// Set the master volume (0-100) and recompute every channel gain
    pub fn set_master_volume(&self, volume: i32) {
        let mut st = self.state.lock();
        st.master_volume = volume.clamp(0, 100);
        st.master_factor = tables::volume_factor(st.master_volume);
        self.recompute_all_gains(&st);
    }

    /// Current master volume setting
    pub fn master_volume(&self) -> i32 {
        self.state.lock().master_volume
    }

    /// Enable or disable the master gain stage
    pub fn set_master_enable(&self, enable: bool) {
        let mut st = self.state.lock();
        st.master_enabled = enable;
        self.recompute_all_gains(&st);
    }

    /// Set the default volume for `audio_type` and apply it to every
    /// channel of that type
    pub fn set_type_volume(&self, audio_type: AudioType, volume: i32) {
        let mut st = self.state.lock();
        st.types[audio_type.index()].volume = volume.clamp(0, 100);
        self.apply_type_settings(&st, audio_type);
    }

    /// Set the default pan for `audio_type` (0-100, 50 = center)
    pub fn set_type_pan(&self, audio_type: AudioType, pan: i32) {
        let mut st = self.state.lock();
        st.types[audio_type.index()].pan = pan.clamp(0, 100);
        self.apply_type_settings(&st, audio_type);
    }

    /// Enable or disable every channel of `audio_type`
    pub fn set_type_enable(&self, audio_type: AudioType, enable: bool) {
        let mut st = self.state.lock();
        st.types[audio_type.index()].enabled = enable;
        self.apply_type_settings(&st, audio_type);
    }

    /// Override one channel's volume away from its type default
    pub fn set_channel_volume(&self, handle: ChannelHandle, volume: i32) {
        let st = self.state.lock();
        self.update_channel(&st, handle, |c| c.volume = volume.clamp(0, 100));
    }

    /// Override one channel's pan away from its type default
    pub fn set_channel_pan(&self, handle: ChannelHandle, pan: i32) {
        let st = self.state.lock();
        self.update_channel(&st, handle, |c| c.pan = pan.clamp(0, 100));
    }

    /// Override one channel's enable flag away from its type default
    pub fn set_channel_enable(&self, handle: ChannelHandle, enable: bool) {
        let st = self.state.lock();
        self.update_channel(&st, handle, |c| c.enabled = enable);
    }

    /// Spin up or tear down the generation workers
    ///
    /// Enabling is idempotent. Disabling is synchronous: when it
    /// returns, both workers have exited and no generator or accumulator
    /// state will be touched until re-enabled. A disabled mixer still
    /// produces silence from `sync`, keeping downstream timing alive.
    pub fn set_enable(&self, enable: bool) {
        let mut st = self.state.lock();
        if enable {
            if st.workers.is_none() {
                st.workers = Some(WorkerPool::spawn(Arc::clone(&self.shared)));
            }
        } else if let Some(mut pool) = st.workers.take() {
            pool.shutdown();
        }
    }

    /// True while the generation workers are running
    pub fn is_enabled(&self) -> bool {
        self.state.lock().workers.is_some()
    }

    /// Rewind the output cursor, discarding buffered output
    pub fn reset(&self) {
        self.state.lock().ring.reset();
    }

    /// Produce every sample that is due right now
    ///
    /// This is the engine's synchronization primitive: generators call
    /// it before a parameter change so all samples produced at the old
    /// parameters are flushed first. Only one `sync` runs at a time;
    /// concurrent callers queue on the guard.
    pub fn sync(&self) {
        let mut st = self.state.lock();

        let due = (st.source.pending_samples() as usize).min(MONO_BUFFER_CAPACITY);
        if due == 0 {
            return;
        }
        if due * 2 > st.ring.spare_words() {
            warn!(
                "mix cycle overrun: {due} samples due, room for {} ({} words undelivered)",
                st.ring.spare_words() / 2,
                st.ring.pending_words()
            );
            return;
        }

        if st.workers.is_none() {
            st.write_silence(due);
            return;
        }

        {
            let mut acc = self.shared.accumulator.lock();
            acc[..due * 2].fill(0);
        }
        if let Some(pool) = st.workers.as_ref() {
            pool.run_cycle(due);
        }

        self.drain(&mut st, due);
    }

    /// Decayed master peak-hold level (0-100) for one side
    pub fn master_level(&self, side: StereoSide) -> i32 {
        let mut st = self.state.lock();
        self.decay_levels(&mut st);
        st.meter.level(side.index())
    }

    /// Decayed peak-hold level (0-100) of the loudest channel of a type
    pub fn type_level(&self, audio_type: AudioType, side: StereoSide) -> i32 {
        let mut st = self.state.lock();
        self.decay_levels(&mut st);
        self.shared
            .registry
            .read()
            .iter()
            .filter(|c| c.audio_type == audio_type)
            .map(|c| c.meter_level[side.index()].load(std::sync::atomic::Ordering::Relaxed))
            .max()
            .unwrap_or(0)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Recompute the gains of every registered channel
    fn recompute_all_gains(&self, st: &SyncState) {
        for channel in self.shared.registry.write().iter_mut() {
            channel.recompute_gain(st.master_factor, st.master_enabled);
        }
    }

    /// Push a type's settings down to its channels and recompute gains
    fn apply_type_settings(&self, st: &SyncState, audio_type: AudioType) {
        let settings = st.types[audio_type.index()];
        for channel in self.shared.registry.write().iter_mut() {
            if channel.audio_type == audio_type {
                channel.enabled = settings.enabled;
                channel.volume = settings.volume;
                channel.pan = settings.pan;
                channel.recompute_gain(st.master_factor, st.master_enabled);
            }
        }
    }

    /// Apply a per-channel override and recompute that channel's gains
    fn update_channel<F: FnOnce(&mut Channel)>(
        &self,
        st: &SyncState,
        handle: ChannelHandle,
        apply: F,
    ) {
        let mut registry = self.shared.registry.write();
        if let Some(channel) = registry.iter_mut().find(|c| c.handle == handle) {
            apply(channel);
            channel.recompute_gain(st.master_factor, st.master_enabled);
        }
    }

    /// Down-mix the accumulator into the fragment ring
    fn drain(&self, st: &mut SyncState, due: usize) {
        let acc = self.shared.accumulator.lock();
        for s in 0..due {
            let left = acc[2 * s] / HEADROOM;
            let right = acc[2 * s + 1] / HEADROOM;

            st.meter.accumulate(left, right);

            let left = left.clamp(-32767, 32767) as i16;
            let right = right.clamp(-32767, 32767) as i16;
            st.ring.push(left, right);
            if st.ring.flush_ready() {
                let state = &mut *st;
                state.ring.flush(&mut state.sink);
            }
        }
        drop(acc);

        if st.meter.fold_due() {
            self.fold_meters(st);
        }
    }

    /// Fold accumulated magnitudes into the peak-hold levels
    fn fold_meters(&self, st: &mut SyncState) {
        let samples = st.meter.fold();
        if samples == 0 || st.master_factor <= 0.0 {
            return;
        }
        use std::sync::atomic::Ordering;
        for channel in self.shared.registry.read().iter() {
            for side in 0..2 {
                let cnt = channel.meter_cnt[side].swap(0, Ordering::Relaxed);
                let level = (cnt as f64 / st.master_factor / samples as f64 / CHANNEL_METER_DIV)
                    as i32;
                channel.meter_level[side].fetch_max(level.min(100), Ordering::Relaxed);
            }
        }
    }

    /// Apply wall-clock decay to the master and per-channel levels
    fn decay_levels(&self, st: &mut SyncState) {
        let ticks = st.meter.decay();
        if ticks > 0 {
            for channel in self.shared.registry.read().iter() {
                channel.decay_level(ticks);
            }
        }
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        if let Some(mut pool) = self.state.lock().workers.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ChannelGenerator, GeneratorOutput};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Pull source that hands out scripted counts, then zero
    struct ScriptedSource {
        counts: Arc<Mutex<Vec<u32>>>,
    }

    impl SampleSource for ScriptedSource {
        fn pending_samples(&mut self) -> u32 {
            let mut counts = self.counts.lock();
            if counts.is_empty() {
                0
            } else {
                counts.remove(0)
            }
        }
    }

    fn scripted_mixer(counts: Vec<u32>) -> (Arc<Mixer>, Arc<Mutex<Vec<u32>>>) {
        let counts = Arc::new(Mutex::new(counts));
        let mixer = Mixer::new(Box::new(ScriptedSource {
            counts: Arc::clone(&counts),
        }));
        (mixer, counts)
    }

    struct ConstGenerator {
        value: i32,
    }

    impl ChannelGenerator for ConstGenerator {
        fn generate(&self, buffer: &mut [i32], count: usize) -> GeneratorOutput {
            for v in buffer[..count].iter_mut() {
                *v = self.value;
            }
            GeneratorOutput::Generated
        }
    }

    fn const_generator(value: i32) -> GeneratorRef {
        Arc::new(ConstGenerator { value })
    }

    #[test]
    fn test_register_unregister_round_trip() {
        let (mixer, _) = scripted_mixer(vec![]);

        assert_eq!(mixer.channel_count(), 0);
        let handle = mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();
        assert_eq!(mixer.channel_count(), 1);

        mixer.unregister_channel(handle);
        assert_eq!(mixer.channel_count(), 0);
    }

    #[test]
    fn test_handles_are_unique_and_nonzero() {
        let (mixer, _) = scripted_mixer(vec![]);

        let a = mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();
        let b = mixer
            .register_channel(MixCore::Core0, AudioType::Fm, None, false, const_generator(0))
            .unwrap();

        assert_ne!(a.get(), 0);
        assert_ne!(b.get(), 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_registry_capacity_boundary() {
        let (mixer, _) = scripted_mixer(vec![]);

        let mut handles = Vec::new();
        for _ in 0..MAX_CHANNELS {
            handles.push(
                mixer
                    .register_channel(
                        MixCore::Core0,
                        AudioType::Psg,
                        None,
                        false,
                        const_generator(0),
                    )
                    .unwrap(),
            );
        }

        let err = mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap_err();
        assert!(matches!(err, EngineError::RegistryFull { .. }));
        assert_eq!(mixer.channel_count(), MAX_CHANNELS);

        // Uniqueness survives the failed registration
        let mut seen = std::collections::HashSet::new();
        assert!(handles.iter().all(|h| seen.insert(h.get())));
    }

    #[test]
    fn test_connected_pair_registers_and_unregisters_together() {
        let (mixer, _) = scripted_mixer(vec![]);

        let handle = mixer
            .register_channel(
                MixCore::Core1,
                AudioType::Fm,
                Some(AudioType::WavetablePcm),
                false,
                const_generator(0),
            )
            .unwrap();
        assert_eq!(mixer.channel_count(), 2);

        mixer.unregister_channel(handle);
        assert_eq!(mixer.channel_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_handle_is_noop() {
        let (mixer, _) = scripted_mixer(vec![]);
        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();

        mixer.unregister_channel(ChannelHandle(999));
        assert_eq!(mixer.channel_count(), 1);
    }

    #[test]
    fn test_zero_due_count_leaves_everything_untouched() {
        struct CountingGenerator {
            calls: AtomicU32,
        }
        impl ChannelGenerator for CountingGenerator {
            fn generate(&self, _buffer: &mut [i32], _count: usize) -> GeneratorOutput {
                self.calls.fetch_add(1, Ordering::SeqCst);
                GeneratorOutput::Silent
            }
        }

        let (mixer, _) = scripted_mixer(vec![0, 0]);
        let generator = Arc::new(CountingGenerator {
            calls: AtomicU32::new(0),
        });
        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, generator.clone())
            .unwrap();
        mixer.set_enable(true);

        mixer.sync();
        mixer.sync();

        mixer.set_enable(false);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_type_volume_is_idempotent() {
        let (mixer, _) = scripted_mixer(vec![]);
        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();

        mixer.set_type_volume(AudioType::Psg, 60);
        let once: Vec<(i32, i32)> = {
            let registry = mixer.shared.registry.read();
            registry.iter().map(|c| (c.gain_left, c.gain_right)).collect()
        };
        mixer.set_type_volume(AudioType::Psg, 60);
        let twice: Vec<(i32, i32)> = {
            let registry = mixer.shared.registry.read();
            registry.iter().map(|c| (c.gain_left, c.gain_right)).collect()
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn test_type_settings_propagate_to_future_registrations() {
        let (mixer, _) = scripted_mixer(vec![]);
        mixer.set_type_volume(AudioType::Psg, 0);

        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();
        let registry = mixer.shared.registry.read();
        assert_eq!(registry[0].volume, 0);
        assert_eq!(registry[0].gain_left, 0);
    }

    #[test]
    fn test_centered_pan_sums_symmetrically() {
        let (mixer, _) = scripted_mixer(vec![]);
        for _ in 0..2 {
            mixer
                .register_channel(
                    MixCore::Core0,
                    AudioType::Psg,
                    None,
                    false,
                    const_generator(0),
                )
                .unwrap();
        }
        mixer.set_master_volume(100);
        mixer.set_type_volume(AudioType::Psg, 100);
        mixer.set_type_pan(AudioType::Psg, 50);

        let registry = mixer.shared.registry.read();
        let sum_left: i64 = registry.iter().map(|c| c.gain_left as i64).sum();
        let sum_right: i64 = registry.iter().map(|c| c.gain_right as i64).sum();
        assert_eq!(sum_left, sum_right);
        assert!(sum_left > 0);
    }

    #[test]
    fn test_master_disable_zeroes_all_gains() {
        let (mixer, _) = scripted_mixer(vec![]);
        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, const_generator(0))
            .unwrap();

        mixer.set_master_enable(false);
        {
            let registry = mixer.shared.registry.read();
            assert!(registry.iter().all(|c| c.gain_left == 0 && c.gain_right == 0));
        }

        mixer.set_master_enable(true);
        let registry = mixer.shared.registry.read();
        assert!(registry.iter().all(|c| c.gain_left > 0));
    }

    #[test]
    fn test_enable_is_idempotent_and_disable_synchronous() {
        let (mixer, _) = scripted_mixer(vec![]);
        mixer.set_enable(true);
        mixer.set_enable(true);
        assert!(mixer.is_enabled());

        mixer.set_enable(false);
        assert!(!mixer.is_enabled());
        mixer.set_enable(false);
    }

    #[test]
    fn test_disabled_mixer_streams_silence() {
        struct Recorder {
            written: Arc<Mutex<Vec<i16>>>,
        }
        impl AudioSink for Recorder {
            fn write(&mut self, samples: &[i16]) -> usize {
                self.written.lock().extend_from_slice(samples);
                samples.len()
            }
        }

        let (mixer, _) = scripted_mixer(vec![16, 16]);
        let written = Arc::new(Mutex::new(Vec::new()));
        mixer.set_write_sink(
            Box::new(Recorder {
                written: Arc::clone(&written),
            }),
            8,
        );

        mixer.sync();
        mixer.sync();

        let written = written.lock();
        assert_eq!(written.len(), 64);
        assert!(written.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mixed_output_reaches_sink() {
        struct Recorder {
            written: Arc<Mutex<Vec<i16>>>,
        }
        impl AudioSink for Recorder {
            fn write(&mut self, samples: &[i16]) -> usize {
                self.written.lock().extend_from_slice(samples);
                samples.len()
            }
        }

        let (mixer, _) = scripted_mixer(vec![32]);
        let written = Arc::new(Mutex::new(Vec::new()));
        mixer.set_write_sink(
            Box::new(Recorder {
                written: Arc::clone(&written),
            }),
            16,
        );
        mixer
            .register_channel(
                MixCore::Core0,
                AudioType::Psg,
                None,
                false,
                const_generator(5000),
            )
            .unwrap();
        mixer.set_enable(true);
        mixer.sync();
        mixer.set_enable(false);

        let written = written.lock();
        assert_eq!(written.len(), 64);
        // Constant positive input mixes to one constant positive level
        assert!(written[0] > 0);
        assert!(written.iter().all(|&s| s == written[0]));
    }

    #[test]
    fn test_oversized_due_count_skips_cycle() {
        struct StarvingSink;
        impl AudioSink for StarvingSink {
            fn write(&mut self, _samples: &[i16]) -> usize {
                0
            }
        }
        struct CountingGenerator {
            calls: AtomicU32,
        }
        impl ChannelGenerator for CountingGenerator {
            fn generate(&self, buffer: &mut [i32], count: usize) -> GeneratorOutput {
                self.calls.fetch_add(1, Ordering::SeqCst);
                buffer[..count].fill(0);
                GeneratorOutput::Generated
            }
        }

        // First cycle fills the whole ring (sink accepts nothing), the
        // second finds no spare room and must skip without mixing
        let cap = MONO_BUFFER_CAPACITY as u32;
        let (mixer, _) = scripted_mixer(vec![cap, cap]);
        mixer.set_write_sink(Box::new(StarvingSink), 512);
        let generator = Arc::new(CountingGenerator {
            calls: AtomicU32::new(0),
        });
        mixer
            .register_channel(MixCore::Core0, AudioType::Psg, None, false, generator.clone())
            .unwrap();
        mixer.set_enable(true);

        mixer.sync();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        mixer.sync();
        assert_eq!(
            generator.calls.load(Ordering::SeqCst),
            1,
            "overrun cycle must not run the generators"
        );
        mixer.set_enable(false);
    }
}
