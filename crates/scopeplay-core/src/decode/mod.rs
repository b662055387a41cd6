//! Decode side of the pipeline
//!
//! A [`FrameSource`] yields raw interleaved frames at the container rate, the
//! [`resample::MonoResampler`] turns them into mono f32 at the output rate and
//! the [`producer::DecoderProducer`] pushes the result into the ring.

pub mod producer;
pub mod resample;
pub mod symphonia_source;

use crate::Result;

/// A block of decoded, interleaved samples at the source rate
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Interleaved channel count
    pub channels: usize,
    /// Rate the samples were decoded at
    pub sample_rate: u32,
    /// Interleaved samples, `frames() * channels` long
    pub samples: Vec<f32>,
}

impl RawFrame {
    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Average all channels of each frame into `dest`
    pub fn downmix_into(&self, dest: &mut Vec<f32>) {
        downmix(&self.samples, self.channels, dest);
    }
}

/// Source of decoded frames
///
/// `next_frame` returns `Ok(None)` at end of stream. An `Err` is a failure of a
/// single compressed unit; the caller skips it and keeps reading.
pub trait FrameSource: Send {
    /// Native sample rate of the stream
    fn sample_rate(&self) -> u32;

    /// Native channel count of the stream
    fn channels(&self) -> usize;

    /// Decode the next unit
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> usize {
        (**self).channels()
    }

    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        (**self).next_frame()
    }
}

/// Append the per-frame channel average of `interleaved` to `dest`
pub fn downmix(interleaved: &[f32], channels: usize, dest: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => dest.extend_from_slice(interleaved),
        n => {
            let scale = 1.0 / n as f32;
            dest.extend(
                interleaved
                    .chunks_exact(n)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }
    }
}
