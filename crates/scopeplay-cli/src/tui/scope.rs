//! Scope canvas: draws the sampler scene with braille markers.

use super::{theme_color, App};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders,
    },
};
use scopeplay::Scene;

/// Draw the current scene, flipping the scene's downward y axis for the canvas
pub fn draw_scope(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.mode.name()));

    let (width, height) = app.canvas;
    let w = width.max(1) as f64;
    let h = height.max(1) as f64;
    let color = theme_color(app.theme);

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, w])
        .y_bounds([0.0, h])
        .paint(|ctx| match &app.scene {
            Scene::Waveform(path) => {
                for pair in path.windows(2) {
                    let (x1, y1) = pair[0];
                    let (x2, y2) = pair[1];
                    ctx.draw(&CanvasLine {
                        x1,
                        y1: h - y1,
                        x2,
                        y2: h - y2,
                        color,
                    });
                }
            }
            Scene::Bars(bars) => {
                for bar in bars {
                    if bar.height <= 0.0 {
                        continue;
                    }
                    // Fill each bar with one vertical line per dot column
                    let columns = bar.width.max(1.0) as usize;
                    for dx in 0..columns {
                        let x = bar.x + dx as f64;
                        ctx.draw(&CanvasLine {
                            x1: x,
                            y1: h - bar.y,
                            x2: x,
                            y2: h - (bar.y + bar.height),
                            color,
                        });
                    }
                }
            }
        });

    f.render_widget(canvas, area);
}
