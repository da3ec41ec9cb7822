//! Outbound ports (SPI) for the header tracker.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{BlockHeader, Height};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors reported by a chain source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// External chain source the RPC bridge listens to.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Push notifications: one height per newly observed upstream tip.
    fn latest_heights(&self) -> broadcast::Receiver<Height>;

    /// Fetch the header at `height`; `Ok(None)` if the source has none.
    async fn header_by_height(&self, height: Height) -> Result<Option<BlockHeader>, SourceError>;
}

/// Whether the tracker originates headers from an external source.
#[derive(Clone, Default)]
pub enum ChainSourceMode {
    /// Receive, relay and deduplicate only.
    #[default]
    SourceLess,
    /// Also republish headers announced by the source.
    WithSource(Arc<dyn ChainSource>),
}

impl ChainSourceMode {
    pub fn with_source(source: Arc<dyn ChainSource>) -> Self {
        ChainSourceMode::WithSource(source)
    }
}

impl std::fmt::Debug for ChainSourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainSourceMode::SourceLess => f.write_str("SourceLess"),
            ChainSourceMode::WithSource(_) => f.write_str("WithSource(..)"),
        }
    }
}
