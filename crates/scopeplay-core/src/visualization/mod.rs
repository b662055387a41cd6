//! Visualization modes, themes and the ring sampler

pub mod sampler;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bars in bar mode
pub const NUM_BARS: usize = 48;

/// Upper bound on the decimated frame length
pub const MAX_DISPLAY_WIDTH: usize = 2048;

/// Weight of the previous bar value in the moving average
pub const SMOOTHING: f32 = 0.8;

/// What the display draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualMode {
    /// Connected oscilloscope line
    Waveform,
    /// Smoothed magnitude bars
    #[default]
    Bars,
}

impl VisualMode {
    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            VisualMode::Waveform => "waveform",
            VisualMode::Bars => "bars",
        }
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waveform" | "wave" => Ok(VisualMode::Waveform),
            "bars" | "bar" => Ok(VisualMode::Bars),
            other => Err(format!("unknown mode '{}' (expected waveform or bars)", other)),
        }
    }
}

/// Drawing color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// `#00FFFF`
    #[default]
    Cyan,
    /// `#FF00FF`
    Magenta,
    /// `#00FF00`
    Green,
    /// `#FF6600`
    Orange,
}

impl Theme {
    /// All themes in cycling order
    pub const ALL: [Theme; 4] = [Theme::Cyan, Theme::Magenta, Theme::Green, Theme::Orange];

    /// The theme after this one, wrapping around
    pub fn next(self) -> Theme {
        match self {
            Theme::Cyan => Theme::Magenta,
            Theme::Magenta => Theme::Green,
            Theme::Green => Theme::Orange,
            Theme::Orange => Theme::Cyan,
        }
    }

    /// Color as `(r, g, b)`
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Theme::Cyan => (0x00, 0xFF, 0xFF),
            Theme::Magenta => (0xFF, 0x00, 0xFF),
            Theme::Green => (0x00, 0xFF, 0x00),
            Theme::Orange => (0xFF, 0x66, 0x00),
        }
    }

    /// Color as `#RRGGBB`
    pub fn hex(self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Theme::Cyan => "cyan",
            Theme::Magenta => "magenta",
            Theme::Green => "green",
            Theme::Orange => "orange",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown theme '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_cycle_wraps() {
        let mut theme = Theme::default();
        for expected in [Theme::Magenta, Theme::Green, Theme::Orange, Theme::Cyan] {
            theme = theme.next();
            assert_eq!(theme, expected);
        }
    }

    #[test]
    fn test_theme_hex() {
        assert_eq!(Theme::Cyan.hex(), "#00FFFF");
        assert_eq!(Theme::Orange.hex(), "#FF6600");
    }

    #[test]
    fn test_parse_mode_and_theme() {
        assert_eq!("Waveform".parse::<VisualMode>(), Ok(VisualMode::Waveform));
        assert_eq!("bars".parse::<VisualMode>(), Ok(VisualMode::Bars));
        assert!("spectrum".parse::<VisualMode>().is_err());
        assert_eq!("MAGENTA".parse::<Theme>(), Ok(Theme::Magenta));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(VisualMode::default(), VisualMode::Bars);
        assert_eq!(Theme::default(), Theme::Cyan);
    }
}
