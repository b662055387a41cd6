//! Container demux and codec decode via Symphonia

use super::{FrameSource, RawFrame};
use crate::{Result, ScopeError};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Compressed file opened for sequential decoding
pub struct SymphoniaSource {
    path: PathBuf,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    /// Reused conversion buffer, regrown when a packet is larger
    buffer: Option<SampleBuffer<f32>>,
    ended: bool,
}

impl SymphoniaSource {
    /// Open `path` and select its first audio track
    ///
    /// All failures here are fatal to playback: the file is missing, the
    /// container or codec is unknown, or there is no audio track.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScopeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ScopeError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
        let reader = probed.format;

        let track = select_track(reader.tracks())
            .ok_or_else(|| ScopeError::NoAudioTrack(path.to_path_buf()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| ScopeError::NoAudioTrack(path.to_path_buf()))?;
        let channels = params.channels.map(|c| c.count()).unwrap_or(1);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| ScopeError::UnsupportedFormat(format!("Codec init failed: {}", e)))?;

        log::debug!(
            "Opened {}: track {}, {} Hz, {} channel(s)",
            path.display(),
            track_id,
            sample_rate,
            channels
        );

        Ok(SymphoniaSource {
            path: path.to_path_buf(),
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            buffer: None,
            ended: false,
        })
    }

    /// Path the source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// First track with a real codec and a known sample rate
fn select_track(tracks: &[Track]) -> Option<&Track> {
    tracks
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
}

/// Whether a conversion buffer of `capacity` interleaved samples can hold
/// `frames` frames of `channels` channels
fn fits(capacity: usize, frames: u64, channels: usize) -> bool {
    capacity as u64 >= frames * channels as u64
}

impl FrameSource for SymphoniaSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.ended {
            return Ok(None);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.ended = true;
                    return Ok(None);
                }
                Err(e) => {
                    log::warn!("Stopping at unreadable packet in {}: {}", self.path.display(), e);
                    self.ended = true;
                    return Ok(None);
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| ScopeError::Decode(e.to_string()))?;

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() as u64;
            let channels = spec.channels.count();
            if self
                .buffer
                .as_ref()
                .is_some_and(|buf| !fits(buf.capacity(), needed, channels))
            {
                self.buffer = None;
            }
            let buffer = self
                .buffer
                .get_or_insert_with(|| SampleBuffer::new(needed, spec));
            buffer.copy_interleaved_ref(decoded);

            return Ok(Some(RawFrame {
                channels: spec.channels.count(),
                sample_rate: spec.rate,
                samples: buffer.samples().to_vec(),
            }));
        }
    }
}
