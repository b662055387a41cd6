//! Ratatui-based terminal display for scopeplay.
//!
//! One canvas shows the waveform or the bars in the current theme color; a
//! status line below it shows buffer health and playback counters.

mod scope;

use crate::streaming::StreamingContext;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use scopeplay::{PlaybackStats, Scene, Theme, VisualConfig, VisualMode, VisualizationSampler};
use std::io::{self, stdout};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// What a key press asks the app to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CycleTheme,
    SetMode(VisualMode),
    Quit,
}

/// Map a key to an action; unknown keys do nothing.
pub fn action_for(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::CycleTheme),
        KeyCode::Char('1') => Some(Action::SetMode(VisualMode::Waveform)),
        KeyCode::Char('2') => Some(Action::SetMode(VisualMode::Bars)),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// TUI application state
pub struct App {
    pub title: String,
    pub mode: VisualMode,
    pub theme: Theme,
    pub sample_rate: u32,
    pub stats: Option<PlaybackStats>,
    pub scene: Scene,
    /// Canvas size in braille dots used for the current scene
    pub canvas: (usize, usize),
    sampler: VisualizationSampler,
}

impl App {
    pub fn new(title: String, sampler: VisualizationSampler, visual: &VisualConfig, sample_rate: u32) -> Self {
        Self {
            title,
            mode: visual.mode,
            theme: visual.theme,
            sample_rate,
            stats: None,
            scene: Scene::Bars(Vec::new()),
            canvas: (0, 0),
            sampler,
        }
    }

    /// Apply an action; returns `false` when the app should exit.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::CycleTheme => self.theme = self.theme.next(),
            Action::SetMode(mode) => self.mode = mode,
            Action::Quit => return false,
        }
        true
    }

    /// Sample the ring for a canvas of `area` cells.
    pub fn tick(&mut self, area: Rect, stats: PlaybackStats) {
        // Braille markers give 2 x 4 dots per cell
        let width = area.width.saturating_sub(2) as usize * 2;
        let height = area.height.saturating_sub(2) as usize * 4;
        self.canvas = (width, height);
        self.scene = self.sampler.tick(self.mode, width, height);
        self.stats = Some(stats);
    }
}

/// Restore terminal to normal state.
///
/// Safe to call more than once.
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Run `session` with a panic hook that restores the terminal first, then
/// put the previous hook back.
fn with_terminal_panic_hook<R>(session: impl FnOnce() -> R) -> R {
    let original_hook = Arc::new(std::panic::take_hook());
    let chained = Arc::clone(&original_hook);
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        (*chained)(panic_info);
    }));

    let result = session();

    // Dropping our hook leaves `original_hook` as the only handle
    drop(std::panic::take_hook());
    if let Ok(hook) = Arc::try_unwrap(original_hook) {
        std::panic::set_hook(hook);
    }
    result
}

/// Run the display until the user quits.
pub fn run_tui_loop(
    context: &StreamingContext,
    input: &Path,
    visual: &VisualConfig,
) -> io::Result<()> {
    let title = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let sampler = VisualizationSampler::new(context.ring.clone(), visual.bar_count, visual.smoothing);
    let mut app = App::new(title, sampler, visual, context.sample_rate);
    let frame_duration = visual.refresh();

    enable_raw_mode()?;
    let result = with_terminal_panic_hook(|| -> io::Result<()> {
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        loop {
            let frame_start = Instant::now();

            let size = terminal.size()?;
            let areas = layout(Rect::new(0, 0, size.width, size.height));
            app.tick(areas[1], context.stats());
            terminal.draw(|f| draw_ui(f, &app))?;

            // Wait out the rest of the frame while listening for keys
            let mut keep_running = true;
            while keep_running {
                let remaining = frame_duration.saturating_sub(frame_start.elapsed());
                if remaining.is_zero() || !event::poll(remaining)? {
                    break;
                }
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Some(action) = action_for(key.code) {
                            keep_running = app.apply(action);
                        }
                    }
                }
            }
            if !keep_running {
                return Ok(());
            }
        }
    });

    restore_terminal();
    result
}

fn layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Scope
            Constraint::Length(3), // Status
        ])
        .split(area)
        .to_vec()
}

fn draw_ui(f: &mut Frame, app: &App) {
    let chunks = layout(f.area());
    draw_header(f, chunks[0], app);
    scope::draw_scope(f, chunks[1], app);
    draw_status(f, chunks[2], app);
}

fn theme_color(theme: Theme) -> Color {
    let (r, g, b) = theme.rgb();
    Color::Rgb(r, g, b)
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let header = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(&app.title, Style::default().fg(theme_color(app.theme)).bold()),
        Span::raw("  "),
        Span::styled(format!("{} Hz mono", app.sample_rate), Style::default().fg(Color::Yellow)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" scopeplay "));
    f.render_widget(header, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(app.mode.name(), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(app.theme.name(), Style::default().fg(theme_color(app.theme))),
    ];

    if let Some(stats) = app.stats {
        let seconds = stats.samples_played as f64 / app.sample_rate.max(1) as f64;
        spans.push(Span::raw(format!(
            "  buffer {:>3.0}%  underruns {}  played {:.1}s",
            stats.fill_percentage * 100.0,
            stats.underrun_count,
            seconds
        )));
        if stats.finished {
            spans.push(Span::styled("  finished", Style::default().fg(Color::Green).bold()));
        }
    }

    spans.push(Span::styled(
        "   [1] wave [2] bars [c] theme [q] quit",
        Style::default().fg(Color::DarkGray),
    ));

    let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeplay::SlotRing;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn app() -> App {
        let ring = Arc::new(SlotRing::new(2, 256).unwrap());
        ring.produce(&[0.5; 256]).unwrap();
        let visual = VisualConfig::default();
        let sampler = VisualizationSampler::new(ring, visual.bar_count, visual.smoothing);
        App::new("test".to_string(), sampler, &visual, 44100)
    }

    fn stats() -> PlaybackStats {
        PlaybackStats {
            samples_played: 0,
            underrun_count: 0,
            silence_samples: 0,
            fill_percentage: 0.5,
            finished: false,
        }
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(action_for(KeyCode::Char('C')), Some(Action::CycleTheme));
        assert_eq!(action_for(KeyCode::Char('1')), Some(Action::SetMode(VisualMode::Waveform)));
        assert_eq!(action_for(KeyCode::Char('2')), Some(Action::SetMode(VisualMode::Bars)));
        assert_eq!(action_for(KeyCode::Esc), Some(Action::Quit));
        assert_eq!(action_for(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_apply_actions() {
        let mut app = app();
        assert_eq!(app.theme, Theme::Cyan);
        assert!(app.apply(Action::CycleTheme));
        assert_eq!(app.theme, Theme::Magenta);
        assert!(app.apply(Action::SetMode(VisualMode::Waveform)));
        assert_eq!(app.mode, VisualMode::Waveform);
        assert!(!app.apply(Action::Quit));
    }

    #[test]
    fn test_terminal_hook_restores_previous_hook() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(with_terminal_panic_hook(|| 7), 7);
        let caught = std::panic::catch_unwind(|| panic!("after the session"));

        std::panic::set_hook(previous);
        assert!(caught.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tick_uses_braille_resolution() {
        let mut app = app();
        app.tick(Rect::new(0, 0, 82, 22), stats());
        assert_eq!(app.canvas, (160, 80));
        match &app.scene {
            Scene::Bars(bars) => assert_eq!(bars.len(), 48),
            other => panic!("unexpected scene {:?}", other),
        }

        app.apply(Action::SetMode(VisualMode::Waveform));
        app.tick(Rect::new(0, 0, 82, 22), stats());
        match &app.scene {
            Scene::Waveform(path) => assert_eq!(path.len(), 161),
            other => panic!("unexpected scene {:?}", other),
        }
    }
}
