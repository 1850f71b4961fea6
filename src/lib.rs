#![deny(warnings, rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Safe within realistic value bounds (durations, sizes)
    clippy::cast_precision_loss,      // Acceptable for stats/display
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. TransportConfig next to transport module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

//! Buffered batch transport for shipping log records to an HTTP ingestion
//! endpoint.
//!
//! Records written to a [`BatchTransport`] accumulate in an in-memory buffer
//! and leave as one JSON-array POST per flush cycle, triggered by a periodic
//! timer, a high-water mark, a manual flush, or shutdown. Delivery is
//! best-effort by design: `write` never blocks and never fails, and a batch
//! that cannot be delivered is logged and dropped, never retried and never
//! surfaced to the producer.
//!
//! ```no_run
//! use logship::{BatchTransport, Record, TransportConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = BatchTransport::new(TransportConfig::new("my-api-key"))?;
//! transport.write(Record::from_message("service started"));
//! // ... timer flushes run in the background ...
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod buffer;
pub mod config;
pub mod domain;
pub mod sender;
pub mod transport;

pub use adapter::ShipLayer;
pub use buffer::{Batch, BatchBuffer, FlushTrigger};
pub use config::{ConfigError, TransportConfig};
pub use domain::Record;
pub use sender::{HttpSender, PoolOptions, TransmissionError, TransportStats};
pub use transport::{BatchTransport, TransportError, TransportHandle};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
