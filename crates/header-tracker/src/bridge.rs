//! # RPC Bridge
//!
//! Turns chain-source height notifications into topic publications:
//!
//! ```text
//! latest_heights() ──h──→ header_by_height(h) ──→ publish(topic, header, Unlimited)
//! ```
//!
//! Each height is fetched and published in its own task, so a slow lookup
//! never holds up a later one and results may publish out of order. Receivers
//! enforce monotonicity. Failures are logged and counted; nothing is retried.

use std::sync::Arc;

use shared_bus::GossipTransport;
use shared_types::Height;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::ports::outbound::ChainSource;
use crate::service::TrackerCore;

/// Handle to a running bridge. Detaching aborts the listener and every
/// in-flight fetch.
pub(crate) struct RpcBridge {
    listener: JoinHandle<()>,
}

impl RpcBridge {
    pub(crate) fn attach<T>(
        core: Arc<TrackerCore>,
        transport: Arc<T>,
        source: Arc<dyn ChainSource>,
    ) -> Self
    where
        T: GossipTransport + 'static,
    {
        let mut heights = source.latest_heights();
        let listener = tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    received = heights.recv() => match received {
                        Ok(height) => {
                            info!(height, "Latest height from chain source");
                            in_flight.spawn(relay_height(
                                core.clone(),
                                transport.clone(),
                                source.clone(),
                                height,
                            ));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Bridge lagged behind chain source");
                        }
                        Err(RecvError::Closed) => {
                            debug!("Chain source closed, bridge exiting");
                            break;
                        }
                    },
                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        log_join_failure(joined);
                    }
                }
            }
            // Let already-started fetches finish when the source goes away.
            while let Some(joined) = in_flight.join_next().await {
                log_join_failure(joined);
            }
        });
        debug!("RPC bridge attached");
        Self { listener }
    }

    pub(crate) fn detach(self) {
        self.listener.abort();
        debug!("RPC bridge detached");
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "Header fetch task failed");
    }
}

async fn relay_height<T>(
    core: Arc<TrackerCore>,
    transport: Arc<T>,
    source: Arc<dyn ChainSource>,
    height: Height,
) where
    T: GossipTransport + 'static,
{
    match source.header_by_height(height).await {
        Ok(Some(header)) => {
            if let Err(e) = core.publish(transport.as_ref(), &header) {
                warn!(height, error = %e, "Failed to publish header from chain source");
            }
        }
        Ok(None) => {
            warn!(height, "Chain source has no header at announced height");
        }
        Err(e) => {
            core.record_upstream_failure();
            warn!(height, error = %e, "Chain source lookup failed");
        }
    }
}
