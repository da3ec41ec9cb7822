//! # Core Entities
//!
//! Header and peer identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CodecError;

/// 32-byte block hash, serialized as `0x`-prefixed hex.
pub type BlockHash = primitive_types::H256;

/// Block height.
pub type Height = u64;

/// A block header as relayed on the gossip topic.
///
/// Only `number` takes part in ordering; the remaining fields are carried
/// through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Height of the block in the chain.
    #[serde(with = "quantity")]
    pub number: Height,
    /// Hash of this block.
    pub hash: BlockHash,
    /// Hash of the parent block.
    pub parent_hash: BlockHash,
    /// Unix timestamp in seconds.
    #[serde(with = "quantity")]
    pub timestamp: u64,
}

impl BlockHeader {
    pub fn new(number: Height, hash: BlockHash, parent_hash: BlockHash, timestamp: u64) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            timestamp,
        }
    }

    /// Height used for tip ordering and forward deduplication.
    #[must_use]
    pub fn height(&self) -> Height {
        self.number
    }
}

/// Stable, opaque identity of a gossip peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Parse an Ethereum JSON-RPC quantity (`0x`-prefixed, big-endian hex).
pub fn parse_quantity(raw: &str) -> Result<u64, CodecError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| CodecError::InvalidQuantity(raw.to_string()))?;
    if digits.is_empty() {
        return Err(CodecError::InvalidQuantity(raw.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| CodecError::InvalidQuantity(raw.to_string()))
}

/// Format a value as an Ethereum JSON-RPC quantity.
#[must_use]
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// Serde adapter for `u64` fields carried as hex quantities.
pub mod quantity {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_quantity(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_quantity(&raw).map_err(D::Error::custom)
    }
}
