use crate::domain::Record;
use std::time::Instant;
use uuid::Uuid;

/// Why a batch was drained out of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The periodic flush timer fired.
    Interval,
    /// The buffer crossed its high-water mark before the timer fired.
    HighWater,
    /// The caller invoked an explicit flush.
    Manual,
    /// Final drain while closing the transport.
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::HighWater => "high_water",
            Self::Manual => "manual",
            Self::Shutdown => "shutdown",
        }
    }
}

/// An ordered set of records drained from the buffer in one flush cycle.
///
/// Batches are ephemeral: one is created per drain, handed to the sender,
/// and dropped once the request has been issued, successful or not.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    records: Vec<Record>,
    trigger: FlushTrigger,
    created_at: Instant,
    estimated_bytes: usize,
}

impl Batch {
    pub fn new(records: Vec<Record>, trigger: FlushTrigger) -> Self {
        let estimated_bytes = records.iter().map(Record::estimated_size).sum();

        Self {
            id: Uuid::new_v4().to_string(),
            records,
            trigger,
            created_at: Instant::now(),
            estimated_bytes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }
}
