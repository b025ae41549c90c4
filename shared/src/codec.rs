//! JSON payload codec
//!
//! Every platform message travels as a single UTF-8 JSON document per
//! publish. Payloads larger than [`MAX_MESSAGE_SIZE`] are refused in both
//! directions.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum payload size (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Empty payload")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message into a JSON payload
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(message)?;

    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }

    Ok(Bytes::from(buf))
}

/// Decode a JSON payload into a message
pub fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T, CodecError> {
    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }

    Ok(serde_json::from_slice(buf)?)
}
