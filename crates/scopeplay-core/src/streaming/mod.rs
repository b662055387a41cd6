//! Streaming playback through a slot ring buffer
//!
//! The decoder thread writes slots, the device callback drains them and the
//! visualization takes read-only snapshots. Memory usage is fixed at
//! `slot_count * slot_capacity` samples regardless of track length.

#[cfg(feature = "streaming")]
pub mod audio_device;
pub mod playback;
pub mod ring_buffer;

#[cfg(feature = "streaming")]
pub use audio_device::{AudioDevice, AudioOutput};
pub use playback::{PlaybackConsumer, PlaybackCounters, PlaybackStats};
pub use ring_buffer::{Consumed, Produced, RingBufferError, SlotRing};

use serde::{Deserialize, Serialize};

/// Default sample rate (44.1 kHz), used when the source gives no better hint
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of slots in the ring
pub const DEFAULT_SLOT_COUNT: usize = 8;

/// Default slot capacity in samples
pub const DEFAULT_SLOT_CAPACITY: usize = 8192;

/// Largest device callback handled in one pass; bigger requests are chunked
pub const MAX_CALLBACK_FRAMES: usize = 8192;

/// Geometry of the slot ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of slots in the ring
    pub slot_count: usize,

    /// Capacity of one slot in mono samples
    /// Larger slots = fewer lock round trips but coarser visualization updates
    pub slot_capacity: usize,
}

impl StreamConfig {
    /// Small ring for low latency
    /// 4 × 2048 samples ≈ 186ms @ 44.1kHz
    pub fn low_latency() -> Self {
        StreamConfig {
            slot_count: 4,
            slot_capacity: 2048,
        }
    }

    /// Default ring, tolerant of slow decodes
    /// 8 × 8192 samples ≈ 1.49s @ 44.1kHz
    pub fn stable() -> Self {
        StreamConfig {
            slot_count: DEFAULT_SLOT_COUNT,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }

    /// Total samples the ring can hold
    pub fn total_samples(&self) -> usize {
        self.slot_count * self.slot_capacity
    }

    /// Worst-case buffered latency in milliseconds
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        ((self.total_samples() as f32) / (sample_rate as f32)) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable()
    }
}
