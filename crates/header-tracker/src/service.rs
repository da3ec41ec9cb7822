//! # Header Tracker Service
//!
//! Owns the tip state, the header cache and the per-peer forward records,
//! and wires them to a gossip transport.
//!
//! ## Thread Safety
//!
//! Transport callbacks may arrive on any thread. All tracker state sits
//! behind a single mutex. Events and the watched tip are updated while it is
//! held, so every listener sees advances in height order.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ──start()──→ Started ──stop()──→ Stopped
//! ```
//!
//! Repeated `start()` or `stop()` calls are no-ops; handlers and hooks are
//! registered at most once.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::{
    ForwardDecision, ForwardHook, GossipMessage, GossipTransport, HopBudget, MessageHandler,
};
use shared_types::{BlockHeader, HeaderCodec, Height, JsonHeaderCodec, PeerId};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::bridge::RpcBridge;
use crate::domain::{
    capacity, invariant_monotonic_tip, invariant_previous_is_prior_tip, HeaderCache,
    PeerForwardRecords, TipState, TipTransition, TrackerConfig, TrackerMetrics,
};
use crate::events::{TrackerError, TrackerEvent};
use crate::ports::inbound::HeaderTrackerApi;
use crate::ports::outbound::ChainSourceMode;

/// Everything guarded by the tracker's single lock.
struct TrackerState {
    tip: TipState,
    headers: HeaderCache,
    forwarded: PeerForwardRecords,
    metrics: TrackerMetrics,
}

/// Shared core reachable from the transport callbacks and the bridge.
pub(crate) struct TrackerCore {
    config: TrackerConfig,
    codec: Arc<dyn HeaderCodec>,
    state: Mutex<TrackerState>,
    events: broadcast::Sender<TrackerEvent>,
    tip: watch::Sender<Option<BlockHeader>>,
}

impl TrackerCore {
    fn new(config: TrackerConfig, codec: Arc<dyn HeaderCodec>) -> Self {
        let (events, _) = broadcast::channel(capacity(config.event_channel_capacity).get());
        let (tip, _) = watch::channel(None);
        let state = TrackerState {
            tip: TipState::new(),
            headers: HeaderCache::new(config.header_cache_size, config.header_ttl),
            forwarded: PeerForwardRecords::new(
                config.max_tracked_peers,
                config.peer_record_capacity,
                config.forward_record_ttl,
            ),
            metrics: TrackerMetrics::default(),
        };
        Self {
            config,
            codec,
            state: Mutex::new(state),
            events,
            tip,
        }
    }

    /// Decode a received payload, cache it, and advance the tip if higher.
    pub(crate) fn ingest(&self, payload: &[u8]) -> Result<TipTransition, TrackerError> {
        let header = match self.codec.decode(payload) {
            Ok(header) => header,
            Err(e) => {
                self.state.lock().metrics.decode_failures += 1;
                return Err(TrackerError::Decode(e));
            }
        };
        let height = header.height();
        debug!(height, "Received header from topic");

        let mut state = self.state.lock();
        state.headers.insert(header.clone());
        state.metrics.headers_ingested += 1;
        let before = cfg!(debug_assertions).then(|| state.tip.clone());
        let transition = state.tip.observe(header);
        if let Some(before) = &before {
            debug_assert!(invariant_monotonic_tip(before, &state.tip));
            debug_assert!(invariant_previous_is_prior_tip(
                before,
                &transition,
                &state.tip
            ));
        }

        // Events go out under the lock so concurrent ingests publish them in
        // tip order. Neither channel blocks on send.
        if let TipTransition::Advanced { current, previous } = &transition {
            state.metrics.tip_advances += 1;
            info!(
                height,
                previous = previous.as_ref().map(BlockHeader::height),
                "New tip"
            );
            self.tip.send_replace(Some(current.clone()));
            // Sending only fails when nobody is listening.
            let _ = self.events.send(TrackerEvent::Latest(current.clone()));
            let _ = self.events.send(TrackerEvent::Sync {
                header: current.clone(),
                previous: previous.clone(),
            });
        }
        let _ = self
            .events
            .send(TrackerEvent::Block(state.tip.current().cloned()));
        drop(state);

        Ok(transition)
    }

    /// Decide whether `payload` may be sent to `peer`, recording it if so.
    pub(crate) fn should_forward(
        &self,
        peer: &PeerId,
        payload: &[u8],
    ) -> Result<ForwardDecision, TrackerError> {
        let height = match self.codec.decode(payload) {
            Ok(header) => header.height(),
            Err(e) => {
                self.state.lock().metrics.decode_failures += 1;
                return Err(TrackerError::Decode(e));
            }
        };

        let mut state = self.state.lock();
        if state.forwarded.record(peer, height) {
            state.metrics.forwards_allowed += 1;
            return Ok(ForwardDecision::Allow);
        }
        state.metrics.forwards_suppressed += 1;
        drop(state);

        debug!(peer = %peer, height, "Already forwarded to peer, skipping header");
        Ok(ForwardDecision::deny(format!(
            "already forwarded to peer, skipping header {height}"
        )))
    }

    /// Encode and publish `header` with no hop limit.
    pub(crate) fn publish<T>(&self, transport: &T, header: &BlockHeader) -> Result<usize, TrackerError>
    where
        T: GossipTransport + ?Sized,
    {
        let height = header.height();
        let payload = self
            .codec
            .encode(header)
            .map_err(|source| TrackerError::Encode { height, source })?;

        match transport.publish(&self.config.topic, payload, HopBudget::Unlimited) {
            Ok(peers) => {
                self.state.lock().metrics.headers_published += 1;
                debug!(height, peers, "Published header");
                Ok(peers)
            }
            Err(e) => {
                self.state.lock().metrics.publish_failures += 1;
                Err(TrackerError::Publish(e))
            }
        }
    }

    pub(crate) fn cached_header(&self, height: Height) -> Option<BlockHeader> {
        self.state.lock().headers.get(height)
    }

    pub(crate) fn cache_header(&self, header: BlockHeader) {
        self.state.lock().headers.insert(header);
    }

    pub(crate) fn record_upstream_failure(&self) {
        self.state.lock().metrics.upstream_failures += 1;
    }
}

/// Transport message handler feeding the tip state machine.
struct IngestHandler {
    core: Arc<TrackerCore>,
}

impl MessageHandler for IngestHandler {
    fn handle(&self, message: &GossipMessage) {
        if let Err(e) = self.core.ingest(&message.payload) {
            warn!(origin = %message.origin, error = %e, "Dropping header");
        }
    }
}

/// Transport forward hook running the per-peer dedup filter.
struct DedupHook {
    core: Arc<TrackerCore>,
}

impl ForwardHook for DedupHook {
    fn should_forward(&self, peer: &PeerId, message: &GossipMessage) -> ForwardDecision {
        match self.core.should_forward(peer, &message.payload) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Refusing to forward undecodable header");
                ForwardDecision::deny(e.to_string())
            }
        }
    }
}

enum Lifecycle {
    Stopped,
    Started { bridge: Option<RpcBridge> },
}

/// Block-header tracker bound to a gossip transport.
///
/// ## Dependencies
///
/// - `T: GossipTransport` - topic subscription, forward hooks, publish
/// - [`ChainSourceMode`] - optional upstream feeding the RPC bridge
pub struct HeaderTracker<T: GossipTransport + 'static> {
    core: Arc<TrackerCore>,
    transport: Arc<T>,
    source: ChainSourceMode,
    handler: Arc<dyn MessageHandler>,
    hook: Arc<dyn ForwardHook>,
    lifecycle: Mutex<Lifecycle>,
}

impl<T: GossipTransport + 'static> HeaderTracker<T> {
    /// Create a stopped tracker using the JSON header codec.
    pub fn new(config: TrackerConfig, transport: Arc<T>, source: ChainSourceMode) -> Self {
        Self::with_codec(config, transport, source, Arc::new(JsonHeaderCodec))
    }

    pub fn with_codec(
        config: TrackerConfig,
        transport: Arc<T>,
        source: ChainSourceMode,
        codec: Arc<dyn HeaderCodec>,
    ) -> Self {
        let core = Arc::new(TrackerCore::new(config, codec));
        Self {
            handler: Arc::new(IngestHandler { core: core.clone() }),
            hook: Arc::new(DedupHook { core: core.clone() }),
            core,
            transport,
            source,
            lifecycle: Mutex::new(Lifecycle::Stopped),
        }
    }

    /// Register the forward hook and message handler, and attach the RPC
    /// bridge when a chain source is configured. No-op if already started.
    ///
    /// With a chain source this must run inside a Tokio runtime.
    pub async fn start(&self) -> Result<(), TrackerError> {
        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Started { .. }) {
            debug!("Tracker already started");
            return Ok(());
        }

        let topic = self.core.config.topic.as_str();
        self.transport
            .add_forward_hook(topic, self.hook.clone())
            .map_err(TrackerError::Transport)?;
        if let Err(e) = self.transport.subscribe(topic, self.handler.clone()) {
            if let Err(rollback) = self.transport.remove_forward_hook(topic, &self.hook) {
                warn!(error = %rollback, "Failed to remove forward hook after subscribe error");
            }
            return Err(TrackerError::Transport(e));
        }

        let bridge = match &self.source {
            ChainSourceMode::SourceLess => None,
            ChainSourceMode::WithSource(source) => Some(RpcBridge::attach(
                self.core.clone(),
                self.transport.clone(),
                source.clone(),
            )),
        };

        info!(
            topic,
            peer = %self.transport.local_peer_id(),
            bridge = bridge.is_some(),
            "Header tracker started"
        );
        *lifecycle = Lifecycle::Started { bridge };
        Ok(())
    }

    /// Unsubscribe, remove the forward hook, and detach the RPC bridge.
    /// No-op if already stopped.
    pub async fn stop(&self) -> Result<(), TrackerError> {
        let mut lifecycle = self.lifecycle.lock();
        let Lifecycle::Started { bridge } = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            debug!("Tracker already stopped");
            return Ok(());
        };

        if let Some(bridge) = bridge {
            bridge.detach();
        }

        let topic = self.core.config.topic.as_str();
        let unsubscribed = self
            .transport
            .unsubscribe(topic, &self.handler)
            .map_err(TrackerError::Transport);
        let unhooked = self
            .transport
            .remove_forward_hook(topic, &self.hook)
            .map_err(TrackerError::Transport);

        info!(topic, "Header tracker stopped");
        unsubscribed.and(unhooked)
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Started { .. })
    }

    /// Ingest a raw payload as if it had arrived on the topic.
    pub fn ingest(&self, payload: &[u8]) -> Result<TipTransition, TrackerError> {
        self.core.ingest(payload)
    }

    /// Forward dedup decision for sending `payload` to `peer`.
    pub fn should_forward(
        &self,
        peer: &PeerId,
        payload: &[u8],
    ) -> Result<ForwardDecision, TrackerError> {
        self.core.should_forward(peer, payload)
    }

    /// Publish `header` on the topic with no hop limit.
    ///
    /// Does not touch local tip state directly; the transport delivers the
    /// header back to the local handler like any other.
    pub fn publish_header(&self, header: &BlockHeader) -> Result<usize, TrackerError> {
        self.core.publish(self.transport.as_ref(), header)
    }

    /// Subscribe to tracker events. Every subscriber sees every event.
    pub fn events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.core.events.subscribe()
    }

    pub fn metrics(&self) -> TrackerMetrics {
        self.core.state.lock().metrics
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.core.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

#[async_trait]
impl<T: GossipTransport + 'static> HeaderTrackerApi for HeaderTracker<T> {
    fn get_current_header(&self) -> Option<BlockHeader> {
        self.core.state.lock().tip.current().cloned()
    }

    fn get_previous_header(&self) -> Option<BlockHeader> {
        self.core.state.lock().tip.previous().cloned()
    }

    async fn get_latest_header(&self) -> Result<BlockHeader, TrackerError> {
        let mut tip = self.core.tip.subscribe();
        let current = self.core.state.lock().tip.current().cloned();
        if let Some(current) = current {
            return Ok(current);
        }
        let latest = tip
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TrackerError::TipChannelClosed)?;
        latest.clone().ok_or(TrackerError::TipChannelClosed)
    }

    async fn get_header_by_height(
        &self,
        height: Height,
    ) -> Result<Option<BlockHeader>, TrackerError> {
        if let Some(header) = self.core.cached_header(height) {
            return Ok(Some(header));
        }

        let ChainSourceMode::WithSource(source) = &self.source else {
            return Ok(None);
        };

        match source.header_by_height(height).await {
            Ok(Some(header)) => {
                self.core.cache_header(header.clone());
                Ok(Some(header))
            }
            Ok(None) => Ok(None),
            Err(source) => {
                self.core.record_upstream_failure();
                Err(TrackerError::UpstreamQuery { height, source })
            }
        }
    }
}
