//! scopeplay: stream an audio file to the speakers with a live scope
//!
//! Decodes in a background thread, plays through the system output device and
//! draws a waveform or bar display in the terminal from the same samples.

mod args;
mod streaming;
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use scopeplay::{AudioDevice, SymphoniaSource};
use std::fs::File;
use std::path::Path;

use args::CliArgs;
use streaming::StreamingContext;

/// Log to `log_file` when given; otherwise stderr, which the UI shares, so
/// the default filter stays at `warn`.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    builder.format_timestamp_millis();

    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Cannot create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_file.as_deref())?;

    if args.list_devices {
        for name in AudioDevice::list_devices().context("Cannot enumerate output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = args.resolve_config().context("Invalid configuration")?;

    // Fatal input errors stop here, before any thread or device exists
    let source = SymphoniaSource::open(&args.input)
        .with_context(|| format!("Cannot play {}", args.input.display()))?;
    log::info!("Playing {}", source.path().display());

    let context = StreamingContext::start(source, &config)?;
    let ui_result = tui::run_tui_loop(&context, &args.input, &config.visual);
    let sample_rate = context.sample_rate;
    let (stats, report) = context.shutdown()?;
    ui_result.context("Terminal UI failed")?;

    println!(
        "Played {:.1}s ({} samples), {} underrun(s), {} silent samples inserted",
        stats.samples_played as f64 / sample_rate as f64,
        stats.samples_played,
        stats.underrun_count,
        stats.silence_samples
    );
    println!(
        "Decoded {} unit(s), skipped {}, produced {} samples{}",
        report.units_decoded,
        report.units_skipped,
        report.samples_produced,
        if report.interrupted { " (stopped early)" } else { "" }
    );
    Ok(())
}
