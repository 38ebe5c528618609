//! Row encoding for vectors and payloads.

use std::collections::HashMap;

use crate::vector_store::VectorStoreError;

/// Little-endian `f32` sequence.
pub(super) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * 4);
    for x in vector {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

pub(super) fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, VectorStoreError> {
    if bytes.len() % 4 != 0 {
        return Err(VectorStoreError::Serialization(format!(
            "vector blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(c);
            f32::from_le_bytes(buf)
        })
        .collect())
}

pub(super) fn encode_payload(
    payload: &HashMap<String, serde_json::Value>,
) -> Result<String, VectorStoreError> {
    serde_json::to_string(payload).map_err(|e| VectorStoreError::Serialization(e.to_string()))
}

pub(super) fn decode_payload(
    text: &str,
) -> Result<HashMap<String, serde_json::Value>, VectorStoreError> {
    serde_json::from_str(text).map_err(|e| VectorStoreError::Serialization(e.to_string()))
}
