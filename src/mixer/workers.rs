//! Dual-core generation workers
//!
//! Each mix cycle is split across two worker threads, one per mix core.
//! The driver publishes the due sample count and wakes both workers; each
//! walks the registry, runs the generators bound to its core into a
//! thread-local scratch buffer, and folds the gain-scaled result into the
//! shared accumulator under a short critical section. The driver blocks
//! until both workers report done, so generator and accumulator state is
//! never touched outside a sync-guarded cycle.

use super::channel::{Channel, PairRole, CHANNEL_METER_SHIFT};
use super::output::STEREO_BUFFER_CAPACITY;
use crate::generator::{GeneratorOutput, NUM_MIX_CORES};
use log::debug;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Registry and accumulator shared between the driver and the workers
pub(crate) struct MixShared {
    /// Registered channels; writers hold the sync guard, workers read
    pub registry: RwLock<Vec<Channel>>,
    /// Interleaved left/right accumulation buffer for the current cycle
    pub accumulator: Mutex<Box<[i64]>>,
}

impl MixShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(Vec::new()),
            accumulator: Mutex::new(vec![0i64; STEREO_BUFFER_CAPACITY].into_boxed_slice()),
        })
    }
}

/// Worker lifecycle state observed between cycles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Running,
    StopRequested,
    Stopped,
}

struct CycleCtl {
    run_state: RunState,
    due: usize,
    pending: [bool; NUM_MIX_CORES],
    remaining: usize,
}

struct WorkerShared {
    mix: Arc<MixShared>,
    ctl: Mutex<CycleCtl>,
    start: Condvar,
    done: Condvar,
}

/// The two generation workers and their rendezvous state
pub(crate) struct WorkerPool {
    shared: Arc<WorkerShared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn one worker per mix core
    pub(crate) fn spawn(mix: Arc<MixShared>) -> Self {
        let shared = Arc::new(WorkerShared {
            mix,
            ctl: Mutex::new(CycleCtl {
                run_state: RunState::Running,
                due: 0,
                pending: [false; NUM_MIX_CORES],
                remaining: 0,
            }),
            start: Condvar::new(),
            done: Condvar::new(),
        });

        let handles = (0..NUM_MIX_CORES)
            .map(|core| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("mix-worker-{core}"))
                    .spawn(move || worker_main(shared, core))
                    .expect("failed to spawn mix worker thread")
            })
            .collect();

        debug!("mix workers started");
        Self { shared, handles }
    }

    /// Run one generation cycle and wait for both workers to finish
    pub(crate) fn run_cycle(&self, due: usize) {
        debug_assert!(due > 0, "mix cycle started with zero due samples");
        if due == 0 {
            return;
        }

        let mut ctl = self.shared.ctl.lock();
        ctl.due = due;
        ctl.pending = [true; NUM_MIX_CORES];
        ctl.remaining = NUM_MIX_CORES;
        self.shared.start.notify_all();

        while ctl.remaining > 0 {
            self.shared.done.wait(&mut ctl);
        }
    }

    /// Request stop and join both workers
    ///
    /// On return no worker will touch generator or accumulator state
    /// again.
    pub(crate) fn shutdown(&mut self) {
        {
            let mut ctl = self.shared.ctl.lock();
            ctl.run_state = RunState::StopRequested;
            self.shared.start.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.shared.ctl.lock().run_state = RunState::Stopped;
        debug!("mix workers stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

fn worker_main(shared: Arc<WorkerShared>, core: usize) {
    let mut scratch = vec![0i32; STEREO_BUFFER_CAPACITY];

    loop {
        let due = {
            let mut ctl = shared.ctl.lock();
            loop {
                if ctl.run_state != RunState::Running {
                    return;
                }
                if ctl.pending[core] {
                    ctl.pending[core] = false;
                    break ctl.due;
                }
                shared.start.wait(&mut ctl);
            }
        };

        debug_assert!(due > 0, "worker woken with zero due samples");
        process_core(&shared.mix, core, due, &mut scratch);

        let mut ctl = shared.ctl.lock();
        ctl.remaining -= 1;
        if ctl.remaining == 0 {
            shared.done.notify_one();
        }
    }
}

/// Generate and accumulate every channel bound to `core`
fn process_core(mix: &MixShared, core: usize, due: usize, scratch: &mut [i32]) {
    let registry = mix.registry.read();

    for channel in registry.iter() {
        let Some(generator) = channel.generators[core].as_ref() else {
            continue;
        };

        let partner = match channel.role {
            PairRole::Primary(handle) => registry.iter().find(|c| c.handle == handle),
            _ => None,
        };
        let wide = channel.stereo || partner.is_some();
        let words = if wide { due * 2 } else { due };

        if generator.generate(&mut scratch[..words], due) == GeneratorOutput::Silent {
            continue;
        }

        accumulate(mix, channel, partner, &scratch[..words], due);
    }
}

/// Fold one channel's generated samples into the shared accumulator
///
/// The whole contribution is added under the accumulator lock so it is
/// atomic with respect to the other core's channels.
fn accumulate(
    mix: &MixShared,
    channel: &Channel,
    partner: Option<&Channel>,
    samples: &[i32],
    due: usize,
) {
    let gain_l = channel.gain_left as i64;
    let gain_r = channel.gain_right as i64;
    let mut cnt_l = 0i64;
    let mut cnt_r = 0i64;
    let mut partner_cnt_l = 0i64;
    let mut partner_cnt_r = 0i64;

    let mut acc = mix.accumulator.lock();
    for s in 0..due {
        if let Some(partner) = partner {
            // Paired generator: two interleaved logical voices, each
            // scaled by its own channel's gains
            let voice_a = samples[2 * s] as i64;
            let voice_b = samples[2 * s + 1] as i64;
            let l = gain_l * voice_a;
            let r = gain_r * voice_a;
            let pl = partner.gain_left as i64 * voice_b;
            let pr = partner.gain_right as i64 * voice_b;
            acc[2 * s] += l + pl;
            acc[2 * s + 1] += r + pr;
            cnt_l += l.abs() >> CHANNEL_METER_SHIFT;
            cnt_r += r.abs() >> CHANNEL_METER_SHIFT;
            partner_cnt_l += pl.abs() >> CHANNEL_METER_SHIFT;
            partner_cnt_r += pr.abs() >> CHANNEL_METER_SHIFT;
        } else if channel.stereo {
            let l = gain_l * samples[2 * s] as i64;
            let r = gain_r * samples[2 * s + 1] as i64;
            acc[2 * s] += l;
            acc[2 * s + 1] += r;
            cnt_l += l.abs() >> CHANNEL_METER_SHIFT;
            cnt_r += r.abs() >> CHANNEL_METER_SHIFT;
        } else {
            let v = samples[s] as i64;
            let l = gain_l * v;
            let r = gain_r * v;
            acc[2 * s] += l;
            acc[2 * s + 1] += r;
            cnt_l += l.abs() >> CHANNEL_METER_SHIFT;
            cnt_r += r.abs() >> CHANNEL_METER_SHIFT;
        }
    }
    drop(acc);

    channel.bump_meter(cnt_l, cnt_r);
    if let Some(partner) = partner {
        partner.bump_meter(partner_cnt_l, partner_cnt_r);
    }
}
