//! # Relay Runtime
//!
//! Assembles the local tracker, its optional chain source, and any simulated
//! peers on one in-memory mesh.
//!
//! ## Topology
//!
//! ```text
//!        ┌──── sim-0 ──── sim-1 ────┐
//!   local                            ...
//!        └──────────── sim-(n-1) ───┘
//! ```
//!
//! Simulated peers run transport-only trackers, so every header the local
//! node originates travels the ring in both directions and exercises the
//! per-peer forward dedup on each hop.

use std::sync::Arc;

use anyhow::{Context, Result};
use header_tracker::{ChainSourceMode, HeaderTracker, TrackerEvent};
use shared_bus::{GossipNode, GossipTransport, InMemoryGossipNetwork};
use shared_types::PeerId;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::NodeConfig;
use crate::adapters::JsonRpcChainSource;

/// Peer id of the node this process runs.
pub const LOCAL_PEER_ID: &str = "local";

/// The assembled relay node.
pub struct RelayRuntime {
    config: NodeConfig,
    network: InMemoryGossipNetwork,
    tracker: Arc<HeaderTracker<GossipNode>>,
    peers: Vec<HeaderTracker<GossipNode>>,
    source: Option<Arc<JsonRpcChainSource>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayRuntime {
    /// Build the mesh and trackers. Nothing runs until [`start`](Self::start).
    pub fn new(config: NodeConfig) -> Result<Self> {
        let network = InMemoryGossipNetwork::new();
        let tracker_config = config.tracker_config();

        let source = match &config.rpc_url {
            Some(url) => Some(Arc::new(
                JsonRpcChainSource::new(url.as_str())
                    .with_context(|| format!("building JSON-RPC client for {url}"))?,
            )),
            None => None,
        };
        let mode = match &source {
            Some(source) => ChainSourceMode::with_source(source.clone()),
            None => ChainSourceMode::SourceLess,
        };

        let local = network.add_node(LOCAL_PEER_ID);
        let tracker = Arc::new(HeaderTracker::new(
            tracker_config.clone(),
            Arc::new(local),
            mode,
        ));

        let mut ring = vec![PeerId::from(LOCAL_PEER_ID)];
        let mut peers = Vec::with_capacity(config.simulated_peers);
        for index in 0..config.simulated_peers {
            let node = network.add_node(format!("sim-{index}"));
            ring.push(node.local_peer_id().clone());
            peers.push(HeaderTracker::new(
                tracker_config.clone(),
                Arc::new(node),
                ChainSourceMode::SourceLess,
            ));
        }
        if ring.len() > 1 {
            for (index, peer) in ring.iter().enumerate() {
                let next = &ring[(index + 1) % ring.len()];
                if peer != next {
                    network
                        .connect(peer, next)
                        .with_context(|| format!("linking {peer} to {next}"))?;
                }
            }
        }

        Ok(Self {
            config,
            network,
            tracker,
            peers,
            source,
            tasks: Vec::new(),
        })
    }

    /// Start every tracker, the event logger, and the chain source poller.
    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Block Header Relay Node");
        info!("  Topic: {}", self.config.topic);
        info!(
            "  Chain source: {}",
            self.config.rpc_url.as_deref().unwrap_or("none (transport-only)")
        );
        info!("  Simulated peers: {}", self.peers.len());
        info!("===========================================");

        for peer in &self.peers {
            peer.start().await.context("starting simulated peer")?;
        }
        self.tracker.start().await.context("starting header tracker")?;

        self.tasks.push(spawn_event_logger(&self.tracker));
        if let Some(source) = &self.source {
            self.tasks.push(source.spawn_poller(self.config.poll_interval()));
        }

        info!("Relay node is running");
        Ok(())
    }

    /// Stop every tracker and background task.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.tracker.stop().await {
            warn!(error = %e, "Failed to stop header tracker cleanly");
        }
        for peer in &self.peers {
            if let Err(e) = peer.stop().await {
                warn!(error = %e, "Failed to stop simulated peer cleanly");
            }
        }

        let metrics = self.tracker.metrics();
        info!(
            ingested = metrics.headers_ingested,
            advances = metrics.tip_advances,
            published = metrics.headers_published,
            suppressed = metrics.forwards_suppressed,
            "Shutdown complete"
        );
    }

    pub fn tracker(&self) -> &Arc<HeaderTracker<GossipNode>> {
        &self.tracker
    }

    pub fn peers(&self) -> &[HeaderTracker<GossipNode>] {
        &self.peers
    }

    pub fn network(&self) -> &InMemoryGossipNetwork {
        &self.network
    }
}

fn spawn_event_logger(tracker: &HeaderTracker<GossipNode>) -> JoinHandle<()> {
    let mut events = tracker.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TrackerEvent::Latest(header)) => {
                    info!(height = header.height(), hash = ?header.hash, "Latest header");
                }
                Ok(TrackerEvent::Sync { header, previous }) => {
                    debug!(
                        height = header.height(),
                        previous = previous.as_ref().map(|p| p.height()),
                        "Sync"
                    );
                }
                Ok(TrackerEvent::Block(tip)) => {
                    debug!(tip = tip.as_ref().map(|t| t.height()), "Block");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
