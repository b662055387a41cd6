//! Pipeline wiring: device, ring, decoder thread and output stream.
//!
//! Startup brings the pieces up in dependency order and unwinds whatever was
//! started if a later step fails. Shutdown stops the device first, then
//! releases and joins the decoder, and only then drops the ring.

use anyhow::{Context, Result};
use scopeplay::{
    AppConfig, AudioDevice, AudioOutput, DecoderProducer, FrameSource, MonoResampler,
    PlaybackConsumer, PlaybackCounters, PlaybackStats, ProducerHandle, ProducerReport, SlotRing,
    SymphoniaSource,
};
use std::sync::Arc;

/// Running pipeline.
pub struct StreamingContext {
    /// Playing output stream (dropped first on shutdown)
    output: Option<AudioOutput>,
    /// Decoder thread
    producer: Option<ProducerHandle>,
    /// Shared slot ring
    pub ring: Arc<SlotRing>,
    /// Counters written by the device callback
    pub counters: Arc<PlaybackCounters>,
    /// Output rate in Hz
    pub sample_rate: u32,
}

impl StreamingContext {
    /// Open the device, start the decoder and begin playback.
    ///
    /// `source` has already been opened, so missing or unreadable input never
    /// gets this far.
    pub fn start(source: SymphoniaSource, config: &AppConfig) -> Result<Self> {
        let device = AudioDevice::open(&config.playback, source.sample_rate())
            .context("Failed to open audio device")?;
        let sample_rate = device.sample_rate();

        let ring = Arc::new(
            SlotRing::new(config.stream.slot_count, config.stream.slot_capacity)
                .context("Failed to allocate ring buffer")?,
        );
        log::info!(
            "Ring: {} x {} samples ({:.0} ms at {} Hz)",
            config.stream.slot_count,
            config.stream.slot_capacity,
            config.stream.latency_ms(sample_rate),
            sample_rate
        );

        let resampler = MonoResampler::new(source.sample_rate(), source.channels(), sample_rate)
            .context("Failed to create resampler")?;
        let producer = DecoderProducer::new(source, resampler, Arc::clone(&ring))
            .spawn()
            .context("Failed to start decoder thread")?;

        if !ring.wait_for_data(config.playback.prebuffer()) {
            log::warn!(
                "No audio decoded within {} ms, starting anyway",
                config.playback.prebuffer_ms
            );
        }

        let counters = Arc::new(PlaybackCounters::new());
        let consumer = PlaybackConsumer::new(
            Arc::clone(&ring),
            Arc::clone(&counters),
            config.playback.max_wait(),
        );

        let output = match device.start(consumer) {
            Ok(output) => output,
            Err(e) => {
                ring.shutdown();
                if let Err(join_err) = producer.join() {
                    log::error!("{}", join_err);
                }
                return Err(e).context("Failed to start output stream");
            }
        };

        Ok(StreamingContext {
            output: Some(output),
            producer: Some(producer),
            ring,
            counters,
            sample_rate,
        })
    }

    /// Current playback statistics.
    pub fn stats(&self) -> PlaybackStats {
        self.counters.snapshot(&self.ring)
    }

    /// Stop playback, release and join the decoder.
    pub fn shutdown(mut self) -> Result<(PlaybackStats, ProducerReport)> {
        drop(self.output.take());
        self.ring.shutdown();

        let report = match self.producer.take() {
            Some(handle) => handle.join().context("Decoder thread failed")?,
            None => ProducerReport::default(),
        };
        Ok((self.stats(), report))
    }
}

impl Drop for StreamingContext {
    fn drop(&mut self) {
        drop(self.output.take());
        if let Some(handle) = self.producer.take() {
            self.ring.shutdown();
            let _ = handle.join();
        }
    }
}
