//! Binary codec shared with the core.
//!
//! Values use bincode's fixed-width little-endian layout: enum variants are
//! tagged by index and sequences/strings are length-prefixed. Both sides are
//! assumed schema-compatible, so a decode failure is a protocol violation.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::protocol::Request;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode value: {0}")]
    Encode(#[source] bincode::Error),

    #[error("Failed to decode value: {0}")]
    Decode(#[source] bincode::Error),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    options().serialize(value).map_err(CodecError::Encode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    options().deserialize(bytes).map_err(CodecError::Decode)
}

/// Decode a batch of requests as returned by every core entry point.
pub fn decode_requests(bytes: &[u8]) -> Result<Vec<Request>, CodecError> {
    decode(bytes)
}
