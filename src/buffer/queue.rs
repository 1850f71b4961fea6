use super::batch::{Batch, FlushTrigger};
use crate::domain::Record;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Buffer lifecycle state.
///
/// The buffer spends its whole life `Frozen`: records accumulate and leave
/// only through a drain. `Open` exists inside the drain cycle: a drain
/// unfreezes, swaps the queue out, and refreezes under one lock hold, so the
/// state observed from outside is always `Frozen` again by the time the
/// drained batch is returned. This is the cork the original write path keeps
/// applied between flushes so nothing is written through mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Open,
    Frozen,
}

/// High-water thresholds for requesting an early flush.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Queued record count that requests an immediate flush.
    pub high_water_records: usize,
    /// Estimated queued byte size that requests an immediate flush.
    pub high_water_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            high_water_records: 1000,
            high_water_bytes: 1024 * 1024, // 1MiB
        }
    }
}

/// What an `append` observed after enqueueing its record.
#[derive(Debug, Clone, Copy)]
pub struct AppendOutcome {
    /// Queue length including the appended record.
    pub len: usize,
    /// Estimated queued bytes including the appended record.
    pub estimated_bytes: usize,
    /// True iff this append crossed the high-water mark and a flush should
    /// be requested now instead of waiting for the timer.
    pub flush_needed: bool,
}

/// Counter snapshot for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub len: usize,
    pub estimated_bytes: usize,
    pub appended: u64,
    pub drained: u64,
    pub high_water_trips: u64,
    pub peak_len: usize,
}

struct Inner {
    records: Vec<Record>,
    estimated_bytes: usize,
    state: BufferState,
    // Latched once the mark is crossed, cleared by the next drain, so a
    // burst past the mark requests one flush rather than one per append.
    flush_requested: bool,
}

/// The append-only record queue between producers and the flush cycle.
///
/// `append` is synchronous and non-blocking: one short mutex hold to push.
/// `drain` atomically swaps the whole queue out and refreezes, so an append
/// racing a drain lands wholly in the returned batch or wholly in the next
/// one, never lost and never split across both.
pub struct BatchBuffer {
    inner: Mutex<Inner>,
    config: BufferConfig,
    appended: AtomicU64,
    drained: AtomicU64,
    high_water_trips: AtomicU64,
    peak_len: AtomicUsize,
}

impl BatchBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                estimated_bytes: 0,
                state: BufferState::Frozen,
                flush_requested: false,
            }),
            config,
            appended: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            high_water_trips: AtomicU64::new(0),
            peak_len: AtomicUsize::new(0),
        }
    }

    /// Enqueues one record. Always succeeds, never blocks beyond the push
    /// itself. The high-water side effect is reported to the caller rather
    /// than acted on here; the buffer has no reference to the dispatcher.
    pub fn append(&self, record: Record) -> AppendOutcome {
        let record_bytes = record.estimated_size();

        let outcome = {
            let mut inner = self.inner.lock();
            inner.records.push(record);
            inner.estimated_bytes += record_bytes;

            let len = inner.records.len();
            let estimated_bytes = inner.estimated_bytes;
            let over_mark = len >= self.config.high_water_records
                || estimated_bytes >= self.config.high_water_bytes;
            let flush_needed = over_mark && !inner.flush_requested;
            if flush_needed {
                inner.flush_requested = true;
            }

            AppendOutcome {
                len,
                estimated_bytes,
                flush_needed,
            }
        };

        self.appended.fetch_add(1, Ordering::Relaxed);
        if outcome.flush_needed {
            self.high_water_trips.fetch_add(1, Ordering::Relaxed);
        }
        self.update_peak_len(outcome.len);

        outcome
    }

    /// Atomically extracts everything queued as one ordered batch and leaves
    /// the buffer empty, refrozen, with the high-water latch cleared.
    ///
    /// Draining an empty buffer is a legal no-op; callers check
    /// `Batch::is_empty` before doing network work.
    pub fn drain(&self, trigger: FlushTrigger) -> Batch {
        let records = {
            let mut inner = self.inner.lock();
            inner.state = BufferState::Open;
            let records = std::mem::take(&mut inner.records);
            inner.estimated_bytes = 0;
            inner.flush_requested = false;
            inner.state = BufferState::Frozen;
            records
        };

        self.drained.fetch_add(records.len() as u64, Ordering::Relaxed);
        Batch::new(records, trigger)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn estimated_bytes(&self) -> usize {
        self.inner.lock().estimated_bytes
    }

    pub fn state(&self) -> BufferState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> BufferStats {
        let (len, estimated_bytes) = {
            let inner = self.inner.lock();
            (inner.records.len(), inner.estimated_bytes)
        };

        BufferStats {
            len,
            estimated_bytes,
            appended: self.appended.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            high_water_trips: self.high_water_trips.load(Ordering::Relaxed),
            peak_len: self.peak_len.load(Ordering::Relaxed),
        }
    }

    fn update_peak_len(&self, current: usize) {
        let mut peak = self.peak_len.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_len.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }
}

impl std::fmt::Debug for BatchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuffer")
            .field("len", &self.len())
            .field("appended", &self.appended.load(Ordering::Relaxed))
            .field("drained", &self.drained.load(Ordering::Relaxed))
            .field(
                "high_water_trips",
                &self.high_water_trips.load(Ordering::Relaxed),
            )
            .field("peak_len", &self.peak_len.load(Ordering::Relaxed))
            .finish()
    }
}
