//! Player configuration
//!
//! Stored as JSON. Every section and field falls back to its default, so a
//! config file only needs the values it changes:
//!
//! ```json
//! { "visual": { "mode": "waveform", "theme": "orange" } }
//! ```

use crate::streaming::StreamConfig;
use crate::visualization::{Theme, VisualMode, NUM_BARS, SMOOTHING};
use crate::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ring geometry
    pub stream: StreamConfig,
    /// Output device settings
    pub playback: PlaybackConfig,
    /// Display settings
    pub visual: VisualConfig,
}

/// Output device section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device name; `None` uses the system default
    pub device: Option<String>,
    /// Requested output rate; `None` asks for the source rate
    pub sample_rate: Option<u32>,
    /// Longest the audio callback may wait for data before inserting silence
    pub max_wait_ms: u64,
    /// How long to wait for the first slot before starting the device
    pub prebuffer_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: None,
            max_wait_ms: 0,
            prebuffer_ms: 500,
        }
    }
}

impl PlaybackConfig {
    /// Callback wait bound
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Pre-buffer timeout
    pub fn prebuffer(&self) -> Duration {
        Duration::from_millis(self.prebuffer_ms)
    }
}

/// Display section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Bars drawn in bar mode
    pub bar_count: usize,
    /// Redraw period in milliseconds (16 ≈ 60 Hz)
    pub refresh_ms: u64,
    /// Weight of the previous bar value, in `[0, 1)`
    pub smoothing: f32,
    /// Mode shown at startup
    pub mode: VisualMode,
    /// Theme shown at startup
    pub theme: Theme,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            bar_count: NUM_BARS,
            refresh_ms: 16,
            smoothing: SMOOTHING,
            mode: VisualMode::default(),
            theme: Theme::default(),
        }
    }
}

impl VisualConfig {
    /// Redraw period
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}

impl AppConfig {
    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ScopeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        log::info!(
            "Loaded config from {}: {} x {} slots, {} bars",
            path.display(),
            config.stream.slot_count,
            config.stream.slot_capacity,
            config.visual.bar_count
        );
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.stream.slot_count == 0 {
            return Err(ScopeError::ConfigError("stream.slot_count must be at least 1".into()));
        }
        if self.stream.slot_capacity == 0 {
            return Err(ScopeError::ConfigError(
                "stream.slot_capacity must be at least 1".into(),
            ));
        }
        if self.visual.bar_count == 0 {
            return Err(ScopeError::ConfigError("visual.bar_count must be at least 1".into()));
        }
        if self.visual.refresh_ms == 0 {
            return Err(ScopeError::ConfigError("visual.refresh_ms must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.visual.smoothing) {
            return Err(ScopeError::ConfigError(format!(
                "visual.smoothing must be in [0, 1), got {}",
                self.visual.smoothing
            )));
        }
        if self.playback.sample_rate == Some(0) {
            return Err(ScopeError::ConfigError("playback.sample_rate must be non-zero".into()));
        }
        Ok(())
    }
}
