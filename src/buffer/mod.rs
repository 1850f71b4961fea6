//! In-memory batching between producers and the flush cycle.

pub mod batch;
pub mod queue;

pub use batch::{Batch, FlushTrigger};
pub use queue::{AppendOutcome, BatchBuffer, BufferConfig, BufferState, BufferStats};
