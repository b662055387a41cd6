//! Slot ring buffer connecting the decoder, the playback callback and the visualizer
//!
//! The ring is a fixed sequence of fixed-capacity slots:
//! - Producer thread: fills the slot at `write_index`, waiting while it is still full
//! - Consumer (device callback): drains the slot at `read_index` across slot boundaries
//! - Visualizer: copies the slot at `read_index` without touching indices or flags
//!
//! All state lives behind one `parking_lot::Mutex` with two condition variables
//! ("slot became non-full" and "slot became non-empty"). The `full` flag of each
//! slot disambiguates empty from full when `read_index == write_index`.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Largest ring we agree to allocate (512 MB worth of f32 samples)
const MAX_TOTAL_SAMPLES: usize = 512 * 1024 * 1024 / std::mem::size_of::<f32>();

/// Error type for ring buffer operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingBufferError {
    /// Slot count was zero
    #[error("Ring buffer needs at least one slot")]
    ZeroSlots,

    /// Slot capacity was zero
    #[error("Slot capacity must be greater than 0")]
    ZeroCapacity,

    /// Requested geometry would allocate too much
    #[error("Ring buffer size {requested} samples exceeds maximum safe size {max}")]
    TooLarge {
        /// Requested total samples
        requested: usize,
        /// Allowed total samples
        max: usize,
    },

    /// The ring was shut down while the producer was waiting
    #[error("Ring buffer has been shut down")]
    Shutdown,

    /// The producer already signalled end of stream
    #[error("Ring buffer already received end of stream")]
    Finished,
}

/// Outcome of a consume call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumed {
    /// Samples copied from the ring; the rest of the output was zero-filled
    pub samples: usize,
    /// End of stream was signalled and every slot has been drained
    pub drained: bool,
}

/// Outcome of [`SlotRing::produce_partial`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    /// Samples accepted into the ring
    pub written: usize,
    /// Why the write stopped early, if it did
    pub error: Option<RingBufferError>,
}

impl Produced {
    fn stopped(written: usize, error: RingBufferError) -> Self {
        Produced {
            written,
            error: Some(error),
        }
    }
}

struct Slot {
    data: Box<[f32]>,
    size: usize,
    read_cursor: usize,
    full: bool,
}

impl Slot {
    fn new(capacity: usize) -> Self {
        Slot {
            data: vec![0.0; capacity].into_boxed_slice(),
            size: 0,
            read_cursor: 0,
            full: false,
        }
    }
}

struct RingState {
    slots: Vec<Slot>,
    write_index: usize,
    read_index: usize,
    finished: bool,
    shutdown: bool,
    produced_total: u64,
    consumed_total: u64,
}

impl RingState {
    // Full slots always form a contiguous run starting at read_index.
    fn has_data(&self) -> bool {
        self.slots[self.read_index].full
    }

    fn is_drained(&self) -> bool {
        self.finished && !self.has_data()
    }
}

#[derive(Clone, Copy)]
enum Wait {
    Forever,
    Until(Instant),
    Never,
}

/// Slot ring buffer for streaming mono PCM
///
/// # Thread Safety
/// - One producer thread (decoder)
/// - One draining consumer (audio callback)
/// - Any number of snapshot readers (visualization)
pub struct SlotRing {
    state: Mutex<RingState>,
    /// Signalled by the consumer when a slot is drained
    not_full: Condvar,
    /// Signalled by the producer when a slot is filled
    not_empty: Condvar,
    slot_count: usize,
    slot_capacity: usize,
}

impl SlotRing {
    /// Create a new ring with `slot_count` slots of `slot_capacity` samples each
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is 0 or the total allocation would
    /// exceed 512 MB.
    pub fn new(slot_count: usize, slot_capacity: usize) -> Result<Self, RingBufferError> {
        if slot_count == 0 {
            return Err(RingBufferError::ZeroSlots);
        }
        if slot_capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        let requested = slot_count.saturating_mul(slot_capacity);
        if requested > MAX_TOTAL_SAMPLES {
            return Err(RingBufferError::TooLarge {
                requested,
                max: MAX_TOTAL_SAMPLES,
            });
        }

        let slots = (0..slot_count).map(|_| Slot::new(slot_capacity)).collect();

        Ok(SlotRing {
            state: Mutex::new(RingState {
                slots,
                write_index: 0,
                read_index: 0,
                finished: false,
                shutdown: false,
                produced_total: 0,
                consumed_total: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            slot_count,
            slot_capacity,
        })
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Capacity of one slot in samples
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Write samples into the ring (producer)
    ///
    /// The chunk is split into pieces of at most one slot. Each piece waits until
    /// the slot at `write_index` is free, so this call blocks while the ring is
    /// full. Returns the number of samples written, which is always
    /// `samples.len()` on success.
    ///
    /// # Errors
    ///
    /// [`RingBufferError::Shutdown`] if the ring is shut down while waiting,
    /// [`RingBufferError::Finished`] if end of stream was already signalled.
    /// Pieces accepted before the error stay in the ring; use
    /// [`produce_partial`](Self::produce_partial) to learn how many.
    pub fn produce(&self, samples: &[f32]) -> Result<usize, RingBufferError> {
        let produced = self.produce_partial(samples);
        match produced.error {
            None => Ok(produced.written),
            Some(e) => Err(e),
        }
    }

    /// Like [`produce`](Self::produce), but reports the samples already
    /// accepted when an error stops the write part way through
    pub fn produce_partial(&self, samples: &[f32]) -> Produced {
        let mut written = 0;

        for piece in samples.chunks(self.slot_capacity) {
            let mut state = self.state.lock();
            loop {
                if state.shutdown {
                    return Produced::stopped(written, RingBufferError::Shutdown);
                }
                if state.finished {
                    return Produced::stopped(written, RingBufferError::Finished);
                }
                let index = state.write_index;
                if !state.slots[index].full {
                    break;
                }
                self.not_full.wait(&mut state);
            }

            let index = state.write_index;
            {
                let slot = &mut state.slots[index];
                slot.data[..piece.len()].copy_from_slice(piece);
                slot.size = piece.len();
                slot.read_cursor = 0;
                slot.full = true;
            }
            state.write_index = (index + 1) % self.slot_count;
            state.produced_total += piece.len() as u64;
            drop(state);

            self.not_empty.notify_one();
            written += piece.len();
        }

        Produced {
            written,
            error: None,
        }
    }

    /// Fill `out` completely from the ring, blocking while it is empty
    ///
    /// Returns short (remainder zero-filled) only once the stream is finished and
    /// drained, or after [`shutdown`](Self::shutdown). Not for use on a real-time
    /// thread; see [`consume_for`](Self::consume_for).
    pub fn consume(&self, out: &mut [f32]) -> Consumed {
        self.consume_inner(out, Wait::Forever)
    }

    /// Fill `out` from the ring, waiting at most `max_wait` in total for data
    ///
    /// With a zero `max_wait` this never suspends. Whatever could not be filled
    /// in time is zero-filled; `Consumed::samples` reports the real samples.
    pub fn consume_for(&self, out: &mut [f32], max_wait: Duration) -> Consumed {
        let wait = if max_wait.is_zero() {
            Wait::Never
        } else {
            Wait::Until(Instant::now() + max_wait)
        };
        self.consume_inner(out, wait)
    }

    fn consume_inner(&self, out: &mut [f32], wait: Wait) -> Consumed {
        let mut copied = 0;
        let mut state = self.state.lock();

        while copied < out.len() {
            if !state.has_data() {
                if state.finished || state.shutdown {
                    break;
                }
                match wait {
                    Wait::Never => break,
                    Wait::Forever => {
                        self.not_empty.wait(&mut state);
                        continue;
                    }
                    Wait::Until(deadline) => {
                        if Instant::now() >= deadline {
                            break;
                        }
                        let _ = self.not_empty.wait_until(&mut state, deadline);
                        continue;
                    }
                }
            }

            let index = state.read_index;
            let slot_drained = {
                let slot = &mut state.slots[index];
                let available = slot.size - slot.read_cursor;
                let chunk = (out.len() - copied).min(available);
                out[copied..copied + chunk]
                    .copy_from_slice(&slot.data[slot.read_cursor..slot.read_cursor + chunk]);
                slot.read_cursor += chunk;
                copied += chunk;

                if slot.read_cursor >= slot.size {
                    slot.full = false;
                    true
                } else {
                    false
                }
            };

            if slot_drained {
                state.read_index = (index + 1) % self.slot_count;
                self.not_full.notify_one();
            }
        }

        state.consumed_total += copied as u64;
        let drained = state.is_drained();
        drop(state);

        out[copied..].fill(0.0);
        Consumed {
            samples: copied,
            drained,
        }
    }

    /// Copy the slot at `read_index` into `dest` (visualizer)
    ///
    /// Never waits for data and never changes indices, cursors or flags. Returns
    /// `false` and leaves `dest` untouched when no slot is full.
    pub fn peek_latest_into(&self, dest: &mut Vec<f32>) -> bool {
        let state = self.state.lock();
        let slot = &state.slots[state.read_index];
        if !slot.full {
            return false;
        }
        dest.clear();
        dest.extend_from_slice(&slot.data[..slot.size]);
        true
    }

    /// Allocating variant of [`peek_latest_into`](Self::peek_latest_into)
    pub fn peek_latest(&self) -> Option<Vec<f32>> {
        let mut dest = Vec::with_capacity(self.slot_capacity);
        self.peek_latest_into(&mut dest).then_some(dest)
    }

    /// Wait until at least one slot is full or the stream has ended
    ///
    /// Returns `true` if data is available (or the stream finished) before the
    /// timeout. Used to pre-buffer before starting the output stream.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.has_data() && !state.finished && !state.shutdown {
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.has_data() || state.finished
    }

    /// Signal end of stream (producer)
    ///
    /// Waiting consumers wake up; once the remaining slots are drained the ring
    /// reports [`is_drained`](Self::is_drained).
    pub fn finish(&self) {
        self.state.lock().finished = true;
        self.not_empty.notify_all();
    }

    /// Wake every waiter and refuse further production
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// End of stream was signalled and every slot has been drained
    pub fn is_drained(&self) -> bool {
        self.state.lock().is_drained()
    }

    /// End of stream was signalled
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Number of slots currently marked full
    pub fn full_slots(&self) -> usize {
        self.state.lock().slots.iter().filter(|s| s.full).count()
    }

    /// Unread samples as a fraction of total capacity (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        let state = self.state.lock();
        let pending: usize = state
            .slots
            .iter()
            .filter(|s| s.full)
            .map(|s| s.size - s.read_cursor)
            .sum();
        pending as f32 / (self.slot_count * self.slot_capacity) as f32
    }

    /// Samples accepted by `produce` so far
    pub fn produced_total(&self) -> u64 {
        self.state.lock().produced_total
    }

    /// Samples handed out by `consume`/`consume_for` so far
    pub fn consumed_total(&self) -> u64 {
        self.state.lock().consumed_total
    }
}

impl std::fmt::Debug for SlotRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotRing")
            .field("slot_count", &self.slot_count)
            .field("slot_capacity", &self.slot_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_ring_buffer_creation() {
        let ring = SlotRing::new(8, 1024).unwrap();
        assert_eq!(ring.slot_count(), 8);
        assert_eq!(ring.slot_capacity(), 1024);
        assert_eq!(ring.full_slots(), 0);
        assert_eq!(ring.fill_ratio(), 0.0);
        assert!(ring.peek_latest().is_none());
    }

    #[test]
    fn test_zero_dimensions_error() {
        assert_eq!(SlotRing::new(0, 16).unwrap_err(), RingBufferError::ZeroSlots);
        assert_eq!(
            SlotRing::new(4, 0).unwrap_err(),
            RingBufferError::ZeroCapacity
        );
        let msg = SlotRing::new(0, 16).unwrap_err().to_string();
        assert!(msg.contains("at least one slot"));
    }

    #[test]
    fn test_max_capacity_exceeded() {
        let result = SlotRing::new(2, MAX_TOTAL_SAMPLES);
        assert!(matches!(result, Err(RingBufferError::TooLarge { .. })));
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_produce_splits_into_slots() {
        let ring = SlotRing::new(4, 16).unwrap();
        let written = ring.produce(&ramp(40)).unwrap();
        assert_eq!(written, 40);
        // 16 + 16 + 8
        assert_eq!(ring.full_slots(), 3);
        assert_eq!(ring.produced_total(), 40);
    }

    #[test]
    fn test_consume_crosses_slot_boundaries_in_order() {
        let ring = SlotRing::new(4, 16).unwrap();
        let samples = ramp(40);
        ring.produce(&samples).unwrap();

        let mut out = vec![0.0; 25];
        let consumed = ring.consume(&mut out);
        assert_eq!(consumed.samples, 25);
        assert!(!consumed.drained);
        assert_eq!(&out[..], &samples[..25]);

        let mut out = vec![0.0; 15];
        ring.consume(&mut out);
        assert_eq!(&out[..], &samples[25..]);
        assert_eq!(ring.full_slots(), 0);
        assert_eq!(ring.consumed_total(), 40);
    }

    #[test]
    fn test_partial_drain_keeps_slot_full() {
        let ring = SlotRing::new(2, 8).unwrap();
        ring.produce(&ramp(8)).unwrap();

        let mut out = vec![0.0; 5];
        ring.consume(&mut out);
        // read_cursor < size: the slot must not be released yet
        assert_eq!(ring.full_slots(), 1);

        let mut out = vec![0.0; 3];
        ring.consume(&mut out);
        assert_eq!(out, vec![5.0, 6.0, 7.0]);
        assert_eq!(ring.full_slots(), 0);
    }

    #[test]
    fn test_consume_for_without_data_returns_silence() {
        let ring = SlotRing::new(2, 8).unwrap();
        let mut out = vec![1.0; 16];
        let consumed = ring.consume_for(&mut out, Duration::ZERO);
        assert_eq!(consumed.samples, 0);
        assert!(!consumed.drained);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_consume_for_partial_fill_zeroes_tail() {
        let ring = SlotRing::new(2, 8).unwrap();
        ring.produce(&[0.5; 6]).unwrap();

        let mut out = vec![1.0; 10];
        let consumed = ring.consume_for(&mut out, Duration::from_millis(1));
        assert_eq!(consumed.samples, 6);
        assert_eq!(&out[..6], &[0.5; 6]);
        assert_eq!(&out[6..], &[0.0; 4]);
    }

    #[test]
    fn test_finish_reports_drained() {
        let ring = SlotRing::new(2, 8).unwrap();
        ring.produce(&ramp(4)).unwrap();
        ring.finish();
        assert!(ring.is_finished());
        assert!(!ring.is_drained());

        let mut out = vec![9.0; 8];
        let consumed = ring.consume(&mut out);
        assert_eq!(consumed.samples, 4);
        assert!(consumed.drained);
        assert_eq!(&out[4..], &[0.0; 4]);
        assert!(ring.is_drained());
    }

    #[test]
    fn test_produce_after_finish_is_rejected() {
        let ring = SlotRing::new(2, 8).unwrap();
        ring.finish();
        assert_eq!(ring.produce(&[1.0]), Err(RingBufferError::Finished));
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let ring = SlotRing::new(2, 8).unwrap();
        ring.produce(&ramp(8)).unwrap();

        let mut out = vec![0.0; 3];
        ring.consume(&mut out);

        let snapshot = ring.peek_latest().unwrap();
        // The whole slot is visible, regardless of the read cursor
        assert_eq!(snapshot, ramp(8));
        assert_eq!(ring.full_slots(), 1);

        let mut out = vec![0.0; 5];
        ring.consume(&mut out);
        assert_eq!(out, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_peek_into_keeps_previous_contents_when_empty() {
        let ring = SlotRing::new(2, 8).unwrap();
        let mut dest = vec![0.25; 4];
        assert!(!ring.peek_latest_into(&mut dest));
        assert_eq!(dest, vec![0.25; 4]);
    }

    #[test]
    fn test_full_slots_bounded() {
        let ring = Arc::new(SlotRing::new(3, 4).unwrap());
        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || {
            let written = producer_ring.produce(&ramp(40));
            producer_ring.finish();
            written
        });

        let mut seen = Vec::new();
        let mut out = [0.0; 3];
        while seen.len() < 40 {
            assert!(ring.full_slots() <= ring.slot_count());
            let consumed = ring.consume(&mut out);
            seen.extend_from_slice(&out[..consumed.samples]);
        }

        assert_eq!(producer.join().unwrap(), Ok(40));
        assert_eq!(seen, ramp(40));
    }

    #[test]
    fn test_shutdown_unblocks_waiting_producer() {
        let ring = Arc::new(SlotRing::new(1, 4).unwrap());
        ring.produce(&[1.0; 4]).unwrap();

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || producer_ring.produce(&[2.0; 4]));

        thread::sleep(Duration::from_millis(20));
        ring.shutdown();
        assert_eq!(producer.join().unwrap(), Err(RingBufferError::Shutdown));
    }

    #[test]
    fn test_partial_write_reports_accepted_samples() {
        let ring = Arc::new(SlotRing::new(2, 4).unwrap());

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || producer_ring.produce_partial(&[3.0; 20]));

        while ring.full_slots() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        ring.shutdown();

        let produced = producer.join().unwrap();
        assert_eq!(produced.written, 8);
        assert_eq!(produced.error, Some(RingBufferError::Shutdown));
        assert_eq!(ring.produced_total(), 8);
    }

    #[test]
    fn test_shutdown_unblocks_waiting_consumer() {
        let ring = Arc::new(SlotRing::new(2, 4).unwrap());
        let consumer_ring = Arc::clone(&ring);
        let consumer = thread::spawn(move || {
            let mut out = [1.0; 8];
            consumer_ring.consume(&mut out)
        });

        thread::sleep(Duration::from_millis(20));
        ring.shutdown();
        let consumed = consumer.join().unwrap();
        assert_eq!(consumed.samples, 0);
    }

    #[test]
    fn test_wait_for_data() {
        let ring = Arc::new(SlotRing::new(2, 4).unwrap());
        assert!(!ring.wait_for_data(Duration::from_millis(5)));

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer_ring.produce(&[0.1; 4])
        });
        assert!(ring.wait_for_data(Duration::from_secs(5)));
        producer.join().unwrap().unwrap();
    }

    #[test]
    fn test_fill_ratio() {
        let ring = SlotRing::new(4, 16).unwrap();
        ring.produce(&[1.0; 32]).unwrap();
        let fill = ring.fill_ratio();
        assert!(fill > 0.45 && fill < 0.55, "Fill ratio {fill}");

        let mut out = [0.0; 8];
        ring.consume(&mut out);
        let fill = ring.fill_ratio();
        assert!(fill > 0.35 && fill < 0.40, "Fill ratio {fill}");
    }
}
