use crate::buffer::Batch;
use bytes::Bytes;
use thiserror::Error;

// Cap pre-allocation in case a batch's byte estimate is ever wildly off.
const MAX_PREALLOC_BYTES: usize = 16 * 1024 * 1024; // 16MB

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a drained batch as the wire payload: a single JSON array whose
/// elements are the batch's records in append order.
pub fn encode_batch(batch: &Batch) -> Result<Bytes, SerializationError> {
    let capacity = batch
        .estimated_bytes()
        .saturating_add(2 + batch.len())
        .min(MAX_PREALLOC_BYTES);

    let mut buffer = Vec::with_capacity(capacity);
    serde_json::to_writer(&mut buffer, batch.records())?;
    Ok(Bytes::from(buffer))
}
