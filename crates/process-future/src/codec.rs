//! Result payload codec
//!
//! A child that needs to hand back more than raw text writes a single payload
//! to stdout: the value serialized as JSON, then zlib-compressed. The parent
//! reverses both stages with [`decode`].

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use thiserror::Error;

/// Errors produced by the payload codec
#[derive(Error, Debug)]
pub enum CodecError {
    /// The value could not be encoded
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// The bytes are not a payload produced by [`encode`]
    #[error("malformed payload ({stage}): {reason}")]
    MalformedPayload {
        /// Which decoding stage rejected the bytes
        stage: &'static str,
        /// The underlying failure
        reason: String,
    },
}

impl CodecError {
    fn malformed(stage: &'static str, reason: impl ToString) -> Self {
        Self::MalformedPayload {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Encode `value` into a compressed payload
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    encoder.finish().map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a payload produced by [`encode`]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let json = inflate(bytes)?;
    serde_json::from_slice(&json).map_err(|e| CodecError::malformed("deserialize", e))
}

/// Inflate a complete zlib stream, rejecting truncated input and trailing bytes.
fn inflate(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::malformed("decompress", "empty payload"));
    }

    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(bytes.len().saturating_mul(4));
    loop {
        if out.capacity() - out.len() < 1024 {
            out.reserve(out.capacity().max(4096));
        }
        let before = (inflater.total_in(), inflater.total_out());
        let input = &bytes[inflater.total_in() as usize..];
        match inflater.decompress_vec(input, &mut out, FlushDecompress::Finish) {
            Ok(Status::StreamEnd) => break,
            Ok(_) if (inflater.total_in(), inflater.total_out()) == before => {
                return Err(CodecError::malformed("decompress", "truncated stream"));
            }
            Ok(_) => {}
            Err(e) => return Err(CodecError::malformed("decompress", e)),
        }
    }

    if inflater.total_in() as usize != bytes.len() {
        return Err(CodecError::malformed("decompress", "trailing bytes after stream"));
    }
    Ok(out)
}
