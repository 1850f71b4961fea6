//! Adapters that feed records into the transport from logging frameworks.

pub mod layer;

pub use layer::ShipLayer;
