// Lock-free shipping statistics using atomic operations
//
// Counters are updated from detached send tasks and read from any thread,
// so everything here is plain atomics with relaxed ordering.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lock-free counters shared between the transport facade and its send tasks.
#[derive(Debug, Default)]
pub struct AtomicTransportStats {
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    records_shipped: AtomicU64,
    records_discarded: AtomicU64,
    records_dropped_after_close: AtomicU64,
    empty_flushes: AtomicU64,
    bytes_sent: AtomicU64,
    serialization_failures: AtomicU64,
    last_send_time: AtomicU64,
}

impl AtomicTransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch accepted by the endpoint.
    pub fn record_success(&self, records: usize, bytes: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.records_shipped
            .fetch_add(records as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch_last_send();
    }

    /// Record a batch lost to a network or HTTP failure.
    pub fn record_transmission_failure(&self, records: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.records_discarded
            .fetch_add(records as u64, Ordering::Relaxed);
        self.touch_last_send();
    }

    /// Record a batch dropped because its payload could not be encoded.
    pub fn record_serialization_failure(&self, records: usize) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
        self.records_discarded
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Record a flush cycle that found the buffer empty and skipped the
    /// network entirely.
    pub fn record_empty_flush(&self) {
        self.empty_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a write that arrived after the transport was closed.
    pub fn record_dropped_after_close(&self) {
        self.records_dropped_after_close
            .fetch_add(1, Ordering::Relaxed);
    }

    fn touch_last_send(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_send_time.store(now, Ordering::Relaxed);
    }

    /// Get an immutable snapshot of the current counters (lock-free).
    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_shipped: self.records_shipped.load(Ordering::Relaxed),
            records_discarded: self.records_discarded.load(Ordering::Relaxed),
            records_dropped_after_close: self
                .records_dropped_after_close
                .load(Ordering::Relaxed),
            empty_flushes: self.empty_flushes.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            last_send_time: self.last_send_time.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters (mainly for testing).
    pub fn reset(&self) {
        self.batches_sent.store(0, Ordering::Relaxed);
        self.batches_failed.store(0, Ordering::Relaxed);
        self.records_shipped.store(0, Ordering::Relaxed);
        self.records_discarded.store(0, Ordering::Relaxed);
        self.records_dropped_after_close.store(0, Ordering::Relaxed);
        self.empty_flushes.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.serialization_failures.store(0, Ordering::Relaxed);
        self.last_send_time.store(0, Ordering::Relaxed);
    }
}

/// Immutable snapshot of shipping statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_shipped: u64,
    pub records_discarded: u64,
    pub records_dropped_after_close: u64,
    pub empty_flushes: u64,
    pub bytes_sent: u64,
    pub serialization_failures: u64,
    /// Unix seconds of the last completed send attempt, zero if none yet.
    pub last_send_time: u64,
}

impl TransportStats {
    /// Fraction of attempted batches the endpoint accepted, 1.0 when none
    /// have been attempted yet.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.batches_sent + self.batches_failed;
        if attempted == 0 {
            return 1.0;
        }
        self.batches_sent as f64 / attempted as f64
    }
}
