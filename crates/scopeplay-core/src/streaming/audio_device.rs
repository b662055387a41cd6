//! Audio device integration using cpal
//!
//! Opens an output device, negotiates a stream configuration close to the
//! decoded rate and drives a [`PlaybackConsumer`] from the device callback.

use super::playback::PlaybackConsumer;
use crate::config::PlaybackConfig;
use crate::{Result, ScopeError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream};

/// An output device with a negotiated configuration, not yet playing
pub struct AudioDevice {
    device: cpal::Device,
    name: String,
    config: cpal::StreamConfig,
    sample_format: SampleFormat,
}

impl AudioDevice {
    /// Open the configured output device
    ///
    /// Uses `config.device` when set (matched by name) and the host default
    /// otherwise. The stream rate is `config.sample_rate` or `preferred_rate`
    /// when the device supports it; if not, the device default rate is used
    /// and the caller is expected to resample to [`AudioDevice::sample_rate`].
    pub fn open(config: &PlaybackConfig, preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = match &config.device {
            Some(wanted) => host
                .output_devices()
                .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| {
                    ScopeError::AudioDeviceError(format!("Output device '{}' not found", wanted))
                })?,
            None => host.default_output_device().ok_or_else(|| {
                ScopeError::AudioDeviceError("No default output device available".to_string())
            })?,
        };
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let target_rate = config.sample_rate.unwrap_or(preferred_rate);
        let (config, sample_format) = negotiate(&device, target_rate)?;

        log::info!(
            "Opened '{}': {} Hz, {} channel(s), {:?}",
            name,
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        Ok(AudioDevice {
            device,
            name,
            config,
            sample_format,
        })
    }

    /// Names of all output devices on the default host
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Negotiated output rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Number of device channels; the mono signal is copied to each
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Build the output stream and start playback
    pub fn start(self, consumer: PlaybackConsumer) -> Result<AudioOutput> {
        let stream = match self.sample_format {
            SampleFormat::F32 => build_stream::<f32>(&self.device, &self.config, consumer)?,
            SampleFormat::I16 => build_stream::<i16>(&self.device, &self.config, consumer)?,
            SampleFormat::U16 => build_stream::<u16>(&self.device, &self.config, consumer)?,
            other => {
                return Err(ScopeError::AudioDeviceError(format!(
                    "Unsupported sample format {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))?;

        Ok(AudioOutput {
            _stream: stream,
            sample_rate: self.config.sample_rate.0,
        })
    }
}

/// A playing output stream; dropping it stops the device callbacks
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
}

impl AudioOutput {
    /// Rate the device is consuming samples at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn is_handled(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
    )
}

/// Pick a stream configuration for `target_rate`
///
/// Order of preference: f32 at the target rate, any handled format at the
/// target rate, the device default configuration.
fn negotiate(device: &cpal::Device, target_rate: u32) -> Result<(cpal::StreamConfig, SampleFormat)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))?
        .collect();

    let covers = |c: &&cpal::SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .filter(covers)
        .find(|c| c.sample_format() == SampleFormat::F32)
        .or_else(|| {
            supported
                .iter()
                .filter(covers)
                .find(|c| is_handled(c.sample_format()))
        });

    if let Some(range) = best {
        let chosen = range.clone().with_sample_rate(cpal::SampleRate(target_rate));
        return Ok((chosen.config(), chosen.sample_format()));
    }

    let fallback = device
        .default_output_config()
        .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))?;
    log::warn!(
        "Audio device doesn't support {}Hz, falling back to {}Hz (audio will be resampled)",
        target_rate,
        fallback.sample_rate().0
    );
    Ok((fallback.config(), fallback.sample_format()))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: PlaybackConsumer,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                consumer.fill_interleaved(data, channels, |s: f32| T::from_sample(s));
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| ScopeError::AudioDeviceError(e.to_string()))
}
