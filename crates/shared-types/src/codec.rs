//! # Header Codec
//!
//! Decoding is fallible (anything can arrive from the network); encoding a
//! well-formed header is not expected to fail.

use crate::entities::BlockHeader;
use crate::errors::CodecError;

/// Converts headers to and from gossip payloads.
pub trait HeaderCodec: Send + Sync {
    fn encode(&self, header: &BlockHeader) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<BlockHeader, CodecError>;
}

/// JSON codec using Ethereum JSON-RPC field names.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonHeaderCodec;

impl HeaderCodec for JsonHeaderCodec {
    fn encode(&self, header: &BlockHeader) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(header)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<BlockHeader, CodecError> {
        serde_json::from_slice::<Option<BlockHeader>>(payload)?.ok_or(CodecError::MissingHeader)
    }
}
