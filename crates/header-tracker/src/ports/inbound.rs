//! Inbound ports (API) for the header tracker.

use async_trait::async_trait;
use shared_types::{BlockHeader, Height};

use crate::events::TrackerError;

/// Read side of the tracker.
#[async_trait]
pub trait HeaderTrackerApi: Send + Sync {
    /// Current tip, `None` until the first advance.
    fn get_current_header(&self) -> Option<BlockHeader>;

    /// Tip held immediately before the last advance.
    fn get_previous_header(&self) -> Option<BlockHeader>;

    /// Current tip, waiting for the first advance if there is none yet.
    ///
    /// Dropping the future releases the wait without touching tracker state.
    /// No timeout is applied.
    async fn get_latest_header(&self) -> Result<BlockHeader, TrackerError>;

    /// Header at `height` from the cache, falling back to the chain source
    /// when one is configured.
    async fn get_header_by_height(
        &self,
        height: Height,
    ) -> Result<Option<BlockHeader>, TrackerError>;
}
