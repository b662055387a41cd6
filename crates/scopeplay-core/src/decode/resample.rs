//! Downmix and sample rate conversion to mono f32 at the output rate

use super::RawFrame;
use crate::{Result, ScopeError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input chunk size fed to the sinc resampler
const CHUNK_FRAMES: usize = 1024;

/// Upper bound on empty flush passes needed to drain the filter delay
const MAX_FLUSH_PASSES: usize = 16;

/// Converts raw interleaved frames into mono samples at a fixed target rate
///
/// Channels are averaged first, then the mono signal goes through a sinc
/// resampler. When source and target rates match the samples pass through
/// untouched. The filter delay is trimmed from the start and [`flush`](Self::flush)
/// pads out the tail, so the total output length tracks the rate ratio.
pub struct MonoResampler {
    source_rate: u32,
    target_rate: u32,
    channels: usize,
    inner: Option<SincFixedIn<f32>>,
    mono: Vec<f32>,
    pending: Vec<f32>,
    delay_remaining: usize,
    input_total: u64,
    output_total: u64,
}

impl MonoResampler {
    /// Create a resampler for a `channels`-wide stream at `source_rate`
    pub fn new(source_rate: u32, channels: usize, target_rate: u32) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(ScopeError::Resample(format!(
                "Invalid rates {} -> {}",
                source_rate, target_rate
            )));
        }
        if channels == 0 {
            return Err(ScopeError::Resample("Stream has no channels".to_string()));
        }

        let inner = if source_rate == target_rate {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = target_rate as f64 / source_rate as f64;
            let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)
                .map_err(|e| ScopeError::Resample(e.to_string()))?;
            log::debug!("Resampling {} Hz -> {} Hz", source_rate, target_rate);
            Some(resampler)
        };

        let delay_remaining = inner.as_ref().map(|r| r.output_delay()).unwrap_or(0);

        Ok(MonoResampler {
            source_rate,
            target_rate,
            channels,
            inner,
            mono: Vec::with_capacity(CHUNK_FRAMES),
            pending: Vec::with_capacity(CHUNK_FRAMES * 2),
            delay_remaining,
            input_total: 0,
            output_total: 0,
        })
    }

    /// Rate of the samples this resampler emits
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Rate of the samples this resampler accepts
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Channel count of the source stream
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Whether samples are copied without rate conversion
    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Convert one raw frame, appending mono output to `out`
    ///
    /// A failing chunk is dropped and reported as an error; samples converted
    /// before it are already in `out`.
    pub fn process(&mut self, frame: &RawFrame, out: &mut Vec<f32>) -> Result<()> {
        self.mono.clear();
        frame.downmix_into(&mut self.mono);

        let Some(resampler) = self.inner.as_mut() else {
            out.extend_from_slice(&self.mono);
            return Ok(());
        };

        self.pending.extend_from_slice(&self.mono);
        self.input_total += self.mono.len() as u64;

        let chunk_len = resampler.input_frames_next();
        let delay_remaining = &mut self.delay_remaining;
        let output_total = &mut self.output_total;
        let (dropped, failure) = convert_chunks(&mut self.pending, chunk_len, |chunk| {
            let converted = resampler
                .process(&[chunk], None)
                .map_err(|e| ScopeError::Resample(e.to_string()))?;
            if let Some(samples) = converted.first() {
                emit(samples, delay_remaining, output_total, out);
            }
            Ok(())
        });
        // Dropped input must not count towards the flushed tail length
        self.input_total -= dropped;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drain buffered input and the filter tail at end of stream
    pub fn flush(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(());
        };

        let expected = (self.input_total as f64 * self.target_rate as f64
            / self.source_rate as f64)
            .round() as u64;
        let start = out.len();

        if !self.pending.is_empty() {
            let chunk = resampler
                .process_partial(Some(&[&self.pending[..]]), None)
                .map_err(|e| ScopeError::Resample(e.to_string()))?;
            self.pending.clear();
            if let Some(samples) = chunk.first() {
                emit(samples, &mut self.delay_remaining, &mut self.output_total, out);
            }
        }

        let mut passes = 0;
        while self.output_total < expected && passes < MAX_FLUSH_PASSES {
            let chunk = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| ScopeError::Resample(e.to_string()))?;
            if let Some(samples) = chunk.first() {
                emit(samples, &mut self.delay_remaining, &mut self.output_total, out);
            }
            passes += 1;
        }

        if self.output_total > expected {
            let excess = (self.output_total - expected) as usize;
            let keep = out.len().saturating_sub(excess).max(start);
            self.output_total -= (out.len() - keep) as u64;
            out.truncate(keep);
        }
        Ok(())
    }
}

/// Feed every whole `chunk_len` chunk of `pending` to `convert`, then remove them
///
/// Returns the number of input samples in chunks that failed, and the last failure.
fn convert_chunks<F>(pending: &mut Vec<f32>, chunk_len: usize, mut convert: F) -> (u64, Option<ScopeError>)
where
    F: FnMut(&[f32]) -> Result<()>,
{
    if chunk_len == 0 {
        return (0, None);
    }

    let mut consumed = 0;
    let mut dropped = 0;
    let mut failure = None;
    while pending.len() - consumed >= chunk_len {
        if let Err(e) = convert(&pending[consumed..consumed + chunk_len]) {
            dropped += chunk_len as u64;
            failure = Some(e);
        }
        consumed += chunk_len;
    }
    pending.drain(..consumed);
    (dropped, failure)
}

fn emit(samples: &[f32], delay_remaining: &mut usize, output_total: &mut u64, out: &mut Vec<f32>) {
    let skip = (*delay_remaining).min(samples.len());
    *delay_remaining -= skip;
    let kept = &samples[skip..];
    out.extend_from_slice(kept);
    *output_total += kept.len() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn sine(rate: u32, freq: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn frame(channels: usize, rate: u32, samples: Vec<f32>) -> RawFrame {
        RawFrame {
            channels,
            sample_rate: rate,
            samples,
        }
    }

    #[test]
    fn test_passthrough_is_exact() {
        let mut resampler = MonoResampler::new(44100, 1, 44100).unwrap();
        assert!(resampler.is_passthrough());

        let input = sine(44100, 440.0, 1000);
        let mut out = Vec::new();
        resampler.process(&frame(1, 44100, input.clone()), &mut out).unwrap();
        resampler.flush(&mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_stereo_downmix_averages_channels() {
        let mut resampler = MonoResampler::new(48000, 2, 48000).unwrap();
        let mut out = Vec::new();
        resampler
            .process(&frame(2, 48000, vec![1.0, 0.0, 0.2, 0.4]), &mut out)
            .unwrap();
        assert_abs_diff_eq!(out[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_48k_to_44k_length_tracks_ratio() {
        let mut resampler = MonoResampler::new(48000, 1, 44100).unwrap();
        let input = sine(48000, 440.0, 48000);

        let mut out = Vec::new();
        for block in input.chunks(1152) {
            resampler
                .process(&frame(1, 48000, block.to_vec()), &mut out)
                .unwrap();
        }
        resampler.flush(&mut out).unwrap();

        let diff = (out.len() as i64 - 44100).abs();
        assert!(diff <= 441, "got {} samples", out.len());
    }

    #[test]
    fn test_resampled_signal_keeps_amplitude() {
        let mut resampler = MonoResampler::new(22050, 1, 44100).unwrap();
        let input = sine(22050, 220.0, 22050);

        let mut out = Vec::new();
        resampler.process(&frame(1, 22050, input), &mut out).unwrap();
        resampler.flush(&mut out).unwrap();

        let middle = &out[out.len() / 4..out.len() * 3 / 4];
        let peak = middle.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert_abs_diff_eq!(peak, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(MonoResampler::new(0, 2, 44100).is_err());
        assert!(MonoResampler::new(44100, 0, 44100).is_err());
    }

    #[test]
    fn test_failed_chunk_is_not_counted_as_input() {
        let mut pending: Vec<f32> = (0..2500).map(|i| i as f32).collect();
        let mut seen = Vec::new();
        let mut calls = 0;

        let (dropped, failure) = convert_chunks(&mut pending, 1000, |chunk| {
            calls += 1;
            seen.push(chunk[0]);
            if calls == 2 {
                Err(ScopeError::Resample("bad chunk".to_string()))
            } else {
                Ok(())
            }
        });

        assert_eq!(dropped, 1000);
        assert!(matches!(failure, Some(ScopeError::Resample(_))));
        assert_eq!(seen, vec![0.0, 1000.0]);
        assert_eq!(pending.len(), 500);
        assert_eq!(pending[0], 2000.0);
    }
}
