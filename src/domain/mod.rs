//! Domain layer for logship.
//!
//! Contains the canonical types shared across all modules:
//! - `Record`: the unit of shipment, an opaque string-keyed field map

pub mod record;

pub use record::Record;
