//! Output sink contract and the fragment ring
//!
//! Mixed 16-bit stereo samples accumulate in a fixed-capacity
//! interleaved buffer and are handed to the sink one fragment at a
//! time. The sink may accept fewer words than offered; the unwritten
//! residue stays in the buffer and is retried at the next fragment
//! boundary. When the residue would leave no room for the next
//! fragment at the buffer tail, it is repacked to the head.

use log::warn;

/// Capacity of the interleaved stereo buffer, in i16 words
pub(crate) const STEREO_BUFFER_CAPACITY: usize = 8192;

/// Capacity in samples (stereo frames)
pub(crate) const MONO_BUFFER_CAPACITY: usize = STEREO_BUFFER_CAPACITY / 2;

/// Fragment size used when the host passes zero
pub(crate) const DEFAULT_FRAGMENT_SIZE: usize = 512;

/// Consumer of the mixed stereo stream
///
/// `samples` is interleaved left/right 16-bit PCM. The sink returns how
/// many words it accepted, which may be less than offered; it must not
/// block. The engine retries the remainder later.
pub trait AudioSink: Send {
    /// Accept up to `samples.len()` words; returns the count consumed
    fn write(&mut self, samples: &[i16]) -> usize;
}

/// Fixed-capacity interleaved output buffer with fragment flushing
///
/// `begin..index` holds words not yet accepted by the sink. `index`
/// never exceeds the capacity: the mix cycle checks [`spare_words`]
/// before generating, and the repack policy keeps the tail free.
///
/// [`spare_words`]: FragmentBuffer::spare_words
pub(crate) struct FragmentBuffer {
    buf: Box<[i16]>,
    begin: usize,
    index: usize,
    fragment: usize,
}

impl FragmentBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0i16; STEREO_BUFFER_CAPACITY].into_boxed_slice(),
            begin: 0,
            index: 0,
            fragment: DEFAULT_FRAGMENT_SIZE,
        }
    }

    /// Set the flush granularity in words; zero selects the default,
    /// odd values are rounded up to keep frames intact
    pub(crate) fn set_fragment_size(&mut self, words: usize) {
        let words = if words == 0 { DEFAULT_FRAGMENT_SIZE } else { words };
        self.fragment = (words + (words & 1)).min(STEREO_BUFFER_CAPACITY / 2);
    }

    #[inline]
    pub(crate) fn fragment_size(&self) -> usize {
        self.fragment
    }

    /// Words that can still be pushed before the buffer is full
    #[inline]
    pub(crate) fn spare_words(&self) -> usize {
        STEREO_BUFFER_CAPACITY - self.index
    }

    /// Words awaiting delivery
    #[inline]
    pub(crate) fn pending_words(&self) -> usize {
        self.index - self.begin
    }

    /// Append one stereo frame
    #[inline]
    pub(crate) fn push(&mut self, left: i16, right: i16) {
        debug_assert!(self.index + 2 <= STEREO_BUFFER_CAPACITY, "fragment ring overflow");
        self.buf[self.index] = left;
        self.buf[self.index + 1] = right;
        self.index += 2;
    }

    /// True once a full fragment has accumulated
    #[inline]
    pub(crate) fn flush_ready(&self) -> bool {
        self.index - self.begin >= self.fragment
    }

    /// Deliver one fragment to the sink, handling partial acceptance
    ///
    /// With no sink attached the buffered words are discarded at the
    /// fragment boundary so the cursor cannot creep toward capacity.
    pub(crate) fn flush(&mut self, sink: &mut Option<Box<dyn AudioSink>>) {
        let Some(sink) = sink.as_deref_mut() else {
            self.begin = 0;
            self.index = 0;
            return;
        };

        let end = self.begin + self.fragment;
        let written = sink.write(&self.buf[self.begin..end]).min(self.fragment);
        self.begin += written;

        if self.begin == self.index {
            self.begin = 0;
            self.index = 0;
        } else if self.index + self.fragment > STEREO_BUFFER_CAPACITY {
            // The residue would collide with the buffer tail before the
            // next flush; repack it to the head
            warn!(
                "output sink starving, repacking {} residual words",
                self.index - self.begin
            );
            self.buf.copy_within(self.begin..self.index, 0);
            self.index -= self.begin;
            self.begin = 0;
        }
    }

    /// Discard all buffered output and rewind the cursors
    pub(crate) fn reset(&mut self) {
        self.begin = 0;
        self.index = 0;
    }
}
