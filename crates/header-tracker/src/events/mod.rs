//! Events and error types for the header tracker.

use shared_bus::BusError;
use shared_types::{BlockHeader, CodecError, Height};
use thiserror::Error;

use crate::ports::outbound::SourceError;

/// Notifications emitted to every event subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A header became the new tip.
    Latest(BlockHeader),
    /// A header became the new tip; carries the tip it replaced.
    Sync {
        header: BlockHeader,
        previous: Option<BlockHeader>,
    },
    /// A header was ingested; carries the tip after processing it, which is
    /// still `None` if nothing has advanced the tip yet.
    Block(Option<BlockHeader>),
}

/// Header tracker errors.
///
/// None of these tear the tracker down. Failures on the delivery and bridge
/// paths are logged and counted where they happen.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to decode header: {0}")]
    Decode(CodecError),

    #[error("Failed to encode header at height {height}: {source}")]
    Encode {
        height: Height,
        #[source]
        source: CodecError,
    },

    #[error("Upstream query for height {height} failed: {source}")]
    UpstreamQuery {
        height: Height,
        #[source]
        source: SourceError,
    },

    #[error("Transport rejected publish: {0}")]
    Publish(BusError),

    #[error("Transport registration failed: {0}")]
    Transport(BusError),

    #[error("Tip channel closed")]
    TipChannelClosed,
}
