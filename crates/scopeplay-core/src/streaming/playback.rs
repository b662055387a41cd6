//! Playback consumer driven by the device clock
//!
//! The audio callback asks for a device-chosen number of frames and must get
//! exactly that many back before its deadline. The consumer never blocks past a
//! bounded wait: missing samples become silence and bump an underrun counter.
//! Nothing on this path allocates or logs.

use super::ring_buffer::SlotRing;
use super::MAX_CALLBACK_FRAMES;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lock-free counters written from the audio callback
#[derive(Debug, Default)]
pub struct PlaybackCounters {
    samples_played: AtomicU64,
    underrun_count: AtomicU64,
    silence_samples: AtomicU64,
    finished: AtomicBool,
}

impl PlaybackCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot, pairing the counters with the ring fill level
    pub fn snapshot(&self, ring: &SlotRing) -> PlaybackStats {
        PlaybackStats {
            samples_played: self.samples_played.load(Ordering::Relaxed),
            underrun_count: self.underrun_count.load(Ordering::Relaxed),
            silence_samples: self.silence_samples.load(Ordering::Relaxed),
            fill_percentage: ring.fill_ratio(),
            finished: self.finished.load(Ordering::Acquire),
        }
    }

    /// The stream ended and every sample has been handed to the device
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Playback statistics for monitoring underruns and buffer health
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStats {
    /// Number of real samples handed to the device
    pub samples_played: u64,
    /// Number of callbacks that had to insert silence mid-stream
    pub underrun_count: u64,
    /// Number of silent samples inserted because of underruns
    pub silence_samples: u64,
    /// Current ring fill (0.0 to 1.0)
    pub fill_percentage: f32,
    /// End of stream reached and fully played
    pub finished: bool,
}

/// Drains the ring on behalf of the audio device
pub struct PlaybackConsumer {
    ring: Arc<SlotRing>,
    counters: Arc<PlaybackCounters>,
    max_wait: Duration,
    /// Mono staging buffer for multi-channel devices, sized once up front
    scratch: Box<[f32]>,
}

impl PlaybackConsumer {
    /// Create a consumer that waits at most `max_wait` per callback for data
    pub fn new(ring: Arc<SlotRing>, counters: Arc<PlaybackCounters>, max_wait: Duration) -> Self {
        PlaybackConsumer {
            ring,
            counters,
            max_wait,
            scratch: vec![0.0; MAX_CALLBACK_FRAMES].into_boxed_slice(),
        }
    }

    /// Shared counters updated by this consumer
    pub fn counters(&self) -> Arc<PlaybackCounters> {
        Arc::clone(&self.counters)
    }

    /// Fill `out` with exactly `out.len()` mono samples
    ///
    /// Returns the number of real samples; the rest is silence.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        render_mono(&self.ring, &self.counters, self.max_wait, out)
    }

    /// Fill an interleaved device buffer, copying the mono signal to every channel
    ///
    /// `convert` maps an f32 sample into the device sample type. Requests larger
    /// than the scratch buffer are handled in several passes.
    pub fn fill_interleaved<T, F>(&mut self, data: &mut [T], channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(f32) -> T,
    {
        let channels = channels.max(1);
        for block in data.chunks_mut(self.scratch.len() * channels) {
            let frames = block.len() / channels;
            let mono = &mut self.scratch[..frames];
            render_mono(&self.ring, &self.counters, self.max_wait, mono);

            for (frame, &sample) in block.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(convert(sample));
            }
            // Trailing partial frame, if the device ever hands one over
            let tail = frames * channels;
            block[tail..].fill(convert(0.0));
        }
    }
}

fn render_mono(
    ring: &SlotRing,
    counters: &PlaybackCounters,
    max_wait: Duration,
    out: &mut [f32],
) -> usize {
    let consumed = ring.consume_for(out, max_wait);
    counters
        .samples_played
        .fetch_add(consumed.samples as u64, Ordering::Relaxed);

    if consumed.drained {
        counters.finished.store(true, Ordering::Release);
    } else if consumed.samples < out.len() {
        counters.underrun_count.fetch_add(1, Ordering::Relaxed);
        counters
            .silence_samples
            .fetch_add((out.len() - consumed.samples) as u64, Ordering::Relaxed);
    }

    consumed.samples
}
