//! Read-only ring sampler for the display
//!
//! Runs on the UI timer. It only ever peeks at the slot the playback consumer
//! is about to drain, so it never moves indices or waits on a condition.

use super::{VisualMode, MAX_DISPLAY_WIDTH};
use crate::streaming::ring_buffer::SlotRing;
use std::sync::Arc;

/// Take every `step`-th sample of `src`, at most `width` of them, into `dest`
///
/// `step = max(1, src.len() / width)`; the result has `min(width, src.len())`
/// samples.
pub fn decimate(src: &[f32], width: usize, dest: &mut Vec<f32>) {
    dest.clear();
    if width == 0 || src.is_empty() {
        return;
    }
    let step = (src.len() / width).max(1);
    dest.extend(src.iter().step_by(step).take(width));
}

/// One bar, y axis pointing down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height, growing up from the bottom of the canvas
    pub height: f64,
}

/// Geometry for one frame, in canvas units with the origin at the top left
#[derive(Debug, Clone, PartialEq)]
pub enum Scene {
    /// Polyline starting at the vertical center of the left edge
    Waveform(Vec<(f64, f64)>),
    /// Bottom-anchored bars
    Bars(Vec<BarRect>),
}

/// Holds the last decimated frame and the smoothed bar magnitudes
pub struct VisualizationSampler {
    ring: Arc<SlotRing>,
    snapshot: Vec<f32>,
    decimated: Vec<f32>,
    smoothed: Vec<f32>,
    smoothing: f32,
}

impl VisualizationSampler {
    /// Create a sampler with `bar_count` bars and EMA weight `smoothing`
    pub fn new(ring: Arc<SlotRing>, bar_count: usize, smoothing: f32) -> Self {
        let capacity = ring.slot_capacity();
        VisualizationSampler {
            ring,
            snapshot: Vec::with_capacity(capacity),
            decimated: Vec::with_capacity(MAX_DISPLAY_WIDTH),
            smoothed: vec![0.0; bar_count.max(1)],
            smoothing: smoothing.clamp(0.0, 1.0),
        }
    }

    /// Refresh the decimated frame for a display `width` samples wide
    ///
    /// Returns `false` when the ring had nothing to show; the previous frame
    /// is kept (and re-decimated to the new width).
    pub fn sample(&mut self, width: usize) -> bool {
        let width = width.min(MAX_DISPLAY_WIDTH);
        let fresh = self.ring.peek_latest_into(&mut self.snapshot);
        decimate(&self.snapshot, width, &mut self.decimated);
        fresh
    }

    /// Advance the bar moving average using the current decimated frame
    pub fn update_bars(&mut self) -> &[f32] {
        let bars = self.smoothed.len();
        let len = self.decimated.len();
        let per_bar = (len / bars).max(1);
        let keep = self.smoothing;

        for (i, bar) in self.smoothed.iter_mut().enumerate() {
            let start = (i * per_bar).min(len);
            let end = ((i + 1) * per_bar).min(len);
            let sum: f32 = self.decimated[start..end].iter().map(|s| s.abs()).sum();
            let avg = sum / per_bar as f32;
            *bar = keep * *bar + (1.0 - keep) * avg;
        }
        &self.smoothed
    }

    /// Smoothed bar magnitudes
    pub fn smoothed(&self) -> &[f32] {
        &self.smoothed
    }

    /// Last decimated frame
    pub fn decimated(&self) -> &[f32] {
        &self.decimated
    }

    /// Sample the ring and build the scene for a `width` x `height` canvas
    ///
    /// Bar smoothing only advances in bar mode, and is kept across mode switches.
    pub fn tick(&mut self, mode: VisualMode, width: usize, height: usize) -> Scene {
        self.sample(width);
        match mode {
            VisualMode::Waveform => Scene::Waveform(self.waveform_path(height)),
            VisualMode::Bars => {
                self.update_bars();
                Scene::Bars(self.bar_rects(width, height))
            }
        }
    }

    fn waveform_path(&self, height: usize) -> Vec<(f64, f64)> {
        let mid = height as f64 / 2.0;
        let mut path = Vec::with_capacity(self.decimated.len() + 1);
        path.push((0.0, mid));
        path.extend(
            self.decimated
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, mid - v as f64 * mid)),
        );
        path
    }

    fn bar_rects(&self, width: usize, height: usize) -> Vec<BarRect> {
        let bars = self.smoothed.len();
        let bar_width = (width / bars).saturating_sub(2).max(2) as f64;
        let h = height as f64;

        self.smoothed
            .iter()
            .enumerate()
            .map(|(i, &level)| {
                let bar_height = level as f64 * h;
                BarRect {
                    x: (i * width / bars) as f64,
                    y: h - bar_height,
                    width: bar_width,
                    height: bar_height,
                }
            })
            .collect()
    }
}
