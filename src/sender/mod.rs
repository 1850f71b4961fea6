//! Batch transmission: payload encoding, the HTTP capability seam, and the
//! shipping orchestrator that feeds the diagnostic channel.

pub mod http;
pub mod serialization;
pub mod stats;

pub use http::{
    HttpSender, PoolOptions, ReqwestSender, TransmissionError, USER_AGENT, build_pooled_client,
};
pub use serialization::{SerializationError, encode_batch};
pub use stats::{AtomicTransportStats, TransportStats};

use crate::buffer::Batch;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ShipError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] SerializationError),
    #[error("transmission failed: {0}")]
    Transmission(#[from] TransmissionError),
}

/// What a completed send looked like, for callers that want to observe it.
#[derive(Debug, Clone)]
pub struct SendReport {
    pub batch_id: String,
    pub records: usize,
    pub bytes_sent: usize,
    pub status: u16,
    pub latency: Duration,
}

/// Ships drained batches through the injected HTTP capability.
///
/// Every outcome terminates here: successes and failures are counted and
/// logged, and the batch is dropped either way. Nothing ever propagates back
/// to producers; the returned report exists for tests and the final
/// shutdown flush, both of which await a send inline.
#[derive(Clone)]
pub struct BatchSender {
    http: Arc<dyn HttpSender>,
    stats: Arc<AtomicTransportStats>,
}

impl BatchSender {
    pub fn new(http: Arc<dyn HttpSender>, stats: Arc<AtomicTransportStats>) -> Self {
        Self { http, stats }
    }

    pub fn stats(&self) -> &Arc<AtomicTransportStats> {
        &self.stats
    }

    /// Encodes and transmits one non-empty batch.
    pub async fn ship(&self, batch: Batch) -> Result<SendReport, ShipError> {
        let batch_id = batch.id().to_string();
        let records = batch.len();
        let trigger = batch.trigger();

        let payload = match encode_batch(&batch) {
            Ok(payload) => payload,
            Err(err) => {
                self.stats.record_serialization_failure(records);
                warn!(
                    batch_id = %batch_id,
                    records,
                    error = %err,
                    "dropping batch: payload could not be encoded"
                );
                return Err(ShipError::Serialization(err));
            }
        };
        let bytes_sent = payload.len();

        debug!(
            batch_id = %batch_id,
            records,
            bytes = bytes_sent,
            trigger = trigger.as_str(),
            "sending batch"
        );

        let start = Instant::now();
        match self.http.send(payload).await {
            Ok(status) => {
                let latency = start.elapsed();
                self.stats.record_success(records, bytes_sent);
                debug!(
                    batch_id = %batch_id,
                    records,
                    bytes = bytes_sent,
                    status,
                    latency_ms = latency.as_millis() as u64,
                    "batch accepted"
                );
                Ok(SendReport {
                    batch_id,
                    records,
                    bytes_sent,
                    status,
                    latency,
                })
            }
            Err(err) => {
                self.stats.record_transmission_failure(records);
                warn!(
                    batch_id = %batch_id,
                    records,
                    error = %err,
                    "dropping batch: transmission failed"
                );
                Err(ShipError::Transmission(err))
            }
        }
    }
}
