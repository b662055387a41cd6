//! Command-line arguments for the scopeplay player.

use clap::Parser;
use scopeplay::{AppConfig, Theme, VisualMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scopeplay")]
#[command(version, about = "Play an audio file with a live waveform or bar display")]
pub struct CliArgs {
    /// Audio file to play (mp3, flac, wav, ogg)
    #[arg(default_value = "input.mp3")]
    pub input: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output device name (see --list-devices)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Visualization mode at startup
    #[arg(short, long, value_parser = parse_mode)]
    pub mode: Option<VisualMode>,

    /// Color theme at startup
    #[arg(short, long, value_parser = parse_theme)]
    pub theme: Option<Theme>,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

fn parse_mode(value: &str) -> Result<VisualMode, String> {
    value.parse()
}

fn parse_theme(value: &str) -> Result<Theme, String> {
    value.parse()
}

impl CliArgs {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn resolve_config(&self) -> scopeplay::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if let Some(device) = &self.device {
            config.playback.device = Some(device.clone());
        }
        if let Some(mode) = self.mode {
            config.visual.mode = mode;
        }
        if let Some(theme) = self.theme {
            config.visual.theme = theme;
        }

        config.validate()?;
        Ok(config)
    }
}
