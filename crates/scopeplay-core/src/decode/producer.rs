//! Decoder producer thread
//!
//! Pulls frames from a [`FrameSource`], converts them to mono at the output
//! rate and blocks on the ring when it is full. Pacing comes from backpressure
//! alone; the loop never sleeps.

use super::resample::MonoResampler;
use super::FrameSource;
use crate::streaming::ring_buffer::{RingBufferError, SlotRing};
use crate::{Result, ScopeError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Outcome of a producer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Compressed units decoded successfully
    pub units_decoded: u64,
    /// Units (or resampled chunks) dropped after a transient error
    pub units_skipped: u64,
    /// Mono samples handed to the ring
    pub samples_produced: u64,
    /// The ring was shut down before the stream ended
    pub interrupted: bool,
}

/// Drives one source to completion into a shared ring
pub struct DecoderProducer<S> {
    source: S,
    resampler: MonoResampler,
    ring: Arc<SlotRing>,
}

impl<S: FrameSource> DecoderProducer<S> {
    /// Wire a source and resampler to the ring
    pub fn new(source: S, resampler: MonoResampler, ring: Arc<SlotRing>) -> Self {
        DecoderProducer {
            source,
            resampler,
            ring,
        }
    }

    /// Decode until end of stream or ring shutdown
    ///
    /// Always leaves the ring finished, so consumers see the end of stream even
    /// when the run was cut short.
    pub fn run(mut self) -> ProducerReport {
        let mut report = ProducerReport::default();
        let mut mono = Vec::with_capacity(self.ring.slot_capacity());

        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Skipping undecodable unit: {}", e);
                    report.units_skipped += 1;
                    continue;
                }
            };
            report.units_decoded += 1;

            mono.clear();
            if let Err(e) = self.resampler.process(&frame, &mut mono) {
                log::warn!("Skipping resampled chunk: {}", e);
                report.units_skipped += 1;
            }
            if !self.push(&mono, &mut report) {
                break;
            }
        }

        if !report.interrupted {
            mono.clear();
            if let Err(e) = self.resampler.flush(&mut mono) {
                log::warn!("Dropping resampler tail: {}", e);
            }
            self.push(&mono, &mut report);
        }

        self.ring.finish();
        log::debug!(
            "Decoder done: {} units, {} skipped, {} samples{}",
            report.units_decoded,
            report.units_skipped,
            report.samples_produced,
            if report.interrupted { " (interrupted)" } else { "" }
        );
        report
    }

    fn push(&self, samples: &[f32], report: &mut ProducerReport) -> bool {
        if samples.is_empty() {
            return true;
        }
        let produced = self.ring.produce_partial(samples);
        report.samples_produced += produced.written as u64;
        match produced.error {
            None => true,
            Some(RingBufferError::Shutdown) | Some(RingBufferError::Finished) => {
                report.interrupted = true;
                false
            }
            Some(e) => {
                log::warn!("Ring rejected samples: {}", e);
                report.interrupted = true;
                false
            }
        }
    }
}

impl<S: FrameSource + 'static> DecoderProducer<S> {
    /// Run on a dedicated `decoder` thread
    pub fn spawn(self) -> Result<ProducerHandle> {
        let handle = thread::Builder::new()
            .name("decoder".to_string())
            .spawn(move || self.run())?;
        Ok(ProducerHandle { handle })
    }
}

/// Join handle for a spawned producer
pub struct ProducerHandle {
    handle: JoinHandle<ProducerReport>,
}

impl ProducerHandle {
    /// Wait for the producer to return its report
    pub fn join(self) -> Result<ProducerReport> {
        self.handle.join().map_err(|_| ScopeError::ThreadPanicked)
    }
}
