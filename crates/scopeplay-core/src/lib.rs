//! Decode-to-speaker streaming with a live visualization tap
//!
//! `scopeplay` streams a compressed audio file to the system output while a UI
//! samples the same PCM for an oscilloscope or bar display. Three actors share a
//! single slot ring buffer:
//!
//! - the decoder producer (background thread, paced by backpressure),
//! - the playback consumer (device callback, hard real-time deadline),
//! - the visualization sampler (UI timer, read-only snapshots).
//!
//! # Crate feature flags
//! - `streaming` (opt-in): real-time output through cpal (`streaming::AudioDevice`)
//!
//! # Quick start
//! ```no_run
//! use std::sync::Arc;
//! use scopeplay::{DecoderProducer, MonoResampler, SlotRing, StreamConfig, SymphoniaSource};
//! use scopeplay::decode::FrameSource;
//!
//! let source = SymphoniaSource::open("input.mp3").unwrap();
//! let cfg = StreamConfig::default();
//! let ring = Arc::new(SlotRing::new(cfg.slot_count, cfg.slot_capacity).unwrap());
//! let resampler = MonoResampler::new(source.sample_rate(), source.channels(), 44_100).unwrap();
//! let handle = DecoderProducer::new(source, resampler, Arc::clone(&ring)).spawn().unwrap();
//!
//! let mut out = vec![0.0f32; 512];
//! while !ring.consume(&mut out).drained {}
//! handle.join().unwrap();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod decode;
pub mod streaming;
pub mod visualization;

use std::path::PathBuf;

pub use streaming::ring_buffer::RingBufferError;

/// Error types for pipeline operations
#[derive(thiserror::Error, Debug)]
pub enum ScopeError {
    /// The input could not be opened
    #[error("Failed to open {path}: {source}")]
    Open {
        /// Path that was requested
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The container or codec is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container has no audio-bearing track
    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    /// A single compressed unit failed to decode
    #[error("Decode error: {0}")]
    Decode(String),

    /// Sample rate conversion failed
    #[error("Resample error: {0}")]
    Resample(String),

    /// Ring buffer construction or termination
    #[error("Ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The decoder thread panicked before finishing
    #[error("Decoder thread panicked")]
    ThreadPanicked,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ScopeError {
    /// Converts a String into `ScopeError::Other`.
    ///
    /// Prefer the specific variants where the failure has a known category.
    fn from(msg: String) -> Self {
        ScopeError::Other(msg)
    }
}

impl From<&str> for ScopeError {
    fn from(msg: &str) -> Self {
        ScopeError::Other(msg.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, ScopeError>;

// Public API exports
pub use config::{AppConfig, PlaybackConfig, VisualConfig};
pub use decode::producer::{DecoderProducer, ProducerHandle, ProducerReport};
pub use decode::resample::MonoResampler;
pub use decode::symphonia_source::SymphoniaSource;
pub use decode::{FrameSource, RawFrame};
pub use streaming::playback::{PlaybackConsumer, PlaybackCounters, PlaybackStats};
pub use streaming::ring_buffer::{Consumed, Produced, SlotRing};
pub use streaming::StreamConfig;
#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, AudioOutput};
pub use visualization::sampler::{BarRect, Scene, VisualizationSampler};
pub use visualization::{Theme, VisualMode};
