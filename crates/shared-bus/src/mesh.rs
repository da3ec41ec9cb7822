//! # In-Memory Gossip Mesh
//!
//! A set of named nodes joined by undirected links. Delivery is synchronous:
//! `publish` walks the mesh breadth-first through a work queue and returns
//! once every reachable node has processed the message. No lock is held while
//! handlers or hooks run, so a handler may publish again.
//!
//! Relay follows floodsub rules: a node relays only topics it subscribes to,
//! and only to neighbours subscribed to the same topic.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use shared_types::PeerId;
use tracing::{debug, trace};

use crate::message::{GossipMessage, HopBudget};
use crate::seen_cache::TimeBoundedSeenCache;
use crate::transport::{
    same_arc, BusError, ForwardDecision, ForwardHook, GossipTransport, MessageHandler,
};
use crate::DEFAULT_MAX_PAYLOAD_BYTES;

/// Mesh-wide settings.
#[derive(Clone, Debug)]
pub struct MeshConfig {
    /// Largest payload accepted by `publish`.
    pub max_payload_bytes: usize,
    /// How long each node remembers processed message ids.
    pub seen_ttl: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            seen_ttl: TimeBoundedSeenCache::DEFAULT_VALIDITY_WINDOW,
        }
    }
}

/// Per-node delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Messages this node published.
    pub published: u64,
    /// Handler invocations on this node.
    pub delivered: u64,
    /// Sends from this node to a neighbour (first hop or relay).
    pub sent: u64,
    /// Sends from this node denied by a forward hook.
    pub denied: u64,
    /// Arrivals dropped because the message id was already seen.
    pub duplicates: u64,
}

struct NodeState {
    links: BTreeSet<PeerId>,
    handlers: HashMap<String, Vec<Arc<dyn MessageHandler>>>,
    hooks: HashMap<String, Vec<Arc<dyn ForwardHook>>>,
    seen: TimeBoundedSeenCache,
    stats: NodeStats,
}

impl NodeState {
    fn new(seen_ttl: Duration) -> Self {
        Self {
            links: BTreeSet::new(),
            handlers: HashMap::new(),
            hooks: HashMap::new(),
            seen: TimeBoundedSeenCache::with_config(
                seen_ttl,
                TimeBoundedSeenCache::DEFAULT_GC_INTERVAL,
            ),
            stats: NodeStats::default(),
        }
    }

    fn is_subscribed(&self, topic: &str) -> bool {
        self.handlers.get(topic).is_some_and(|h| !h.is_empty())
    }
}

struct MeshInner {
    config: MeshConfig,
    nodes: RwLock<HashMap<PeerId, NodeState>>,
}

/// A message waiting to be processed at `at`.
struct Delivery {
    at: PeerId,
    from: Option<PeerId>,
    message: GossipMessage,
}

/// Everything needed to process one delivery, copied out of the lock.
struct Snapshot {
    handlers: Vec<Arc<dyn MessageHandler>>,
    hooks: Vec<Arc<dyn ForwardHook>>,
    targets: Vec<PeerId>,
}

/// Shared handle to an in-memory mesh.
#[derive(Clone)]
pub struct InMemoryGossipNetwork {
    inner: Arc<MeshInner>,
}

impl InMemoryGossipNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MeshConfig::default())
    }

    #[must_use]
    pub fn with_config(config: MeshConfig) -> Self {
        Self {
            inner: Arc::new(MeshInner {
                config,
                nodes: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Add a node (or return the existing one) and hand back its transport.
    pub fn add_node(&self, id: impl Into<PeerId>) -> GossipNode {
        let id = id.into();
        let ttl = self.inner.config.seen_ttl;
        self.inner
            .nodes
            .write()
            .entry(id.clone())
            .or_insert_with(|| NodeState::new(ttl));
        debug!(peer = %id, "Node joined mesh");
        GossipNode {
            id,
            mesh: self.inner.clone(),
        }
    }

    /// Remove a node and every link to it.
    pub fn remove_node(&self, id: &PeerId) {
        let mut nodes = self.inner.nodes.write();
        if nodes.remove(id).is_some() {
            for node in nodes.values_mut() {
                node.links.remove(id);
            }
            debug!(peer = %id, "Node left mesh");
        }
    }

    /// Link two nodes in both directions.
    pub fn connect(&self, a: &PeerId, b: &PeerId) -> Result<(), BusError> {
        let mut nodes = self.inner.nodes.write();
        if !nodes.contains_key(b) {
            return Err(BusError::UnknownNode(b.clone()));
        }
        nodes
            .get_mut(a)
            .ok_or_else(|| BusError::UnknownNode(a.clone()))?
            .links
            .insert(b.clone());
        if let Some(node) = nodes.get_mut(b) {
            node.links.insert(a.clone());
        }
        Ok(())
    }

    /// Remove the link between `a` and `b`, if any.
    pub fn disconnect(&self, a: &PeerId, b: &PeerId) {
        let mut nodes = self.inner.nodes.write();
        if let Some(node) = nodes.get_mut(a) {
            node.links.remove(b);
        }
        if let Some(node) = nodes.get_mut(b) {
            node.links.remove(a);
        }
    }

    /// Counters for `id`, if it is part of the mesh.
    #[must_use]
    pub fn stats(&self, id: &PeerId) -> Option<NodeStats> {
        self.inner.nodes.read().get(id).map(|n| n.stats)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }
}

impl Default for InMemoryGossipNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's view of the mesh.
#[derive(Clone)]
pub struct GossipNode {
    id: PeerId,
    mesh: Arc<MeshInner>,
}

impl GossipNode {
    fn with_node<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> Result<R, BusError> {
        let mut nodes = self.mesh.nodes.write();
        let node = nodes
            .get_mut(&self.id)
            .ok_or_else(|| BusError::UnknownNode(self.id.clone()))?;
        Ok(f(node))
    }
}

impl MeshInner {
    /// Process `first` and everything it fans out to. Returns the number of
    /// sends made by the first node.
    fn dispatch(&self, first: Delivery) -> usize {
        let mut queue = VecDeque::from([first]);
        let mut first_hop_sends = None;

        while let Some(delivery) = queue.pop_front() {
            let Some(snapshot) = self.snapshot(&delivery) else {
                first_hop_sends.get_or_insert(0);
                continue;
            };

            for handler in &snapshot.handlers {
                handler.handle(&delivery.message);
            }

            let outbound = match delivery.from {
                // The publisher always sends; the budget limits relays.
                None => Some(delivery.message.hops),
                Some(_) => delivery.message.hops.next_hop(),
            };

            let mut sent = 0usize;
            let mut denied = 0u64;
            if let Some(hops) = outbound {
                for target in snapshot.targets {
                    match run_hooks(&snapshot.hooks, &target, &delivery.message) {
                        ForwardDecision::Allow => {
                            trace!(
                                from = %delivery.at,
                                to = %target,
                                topic = %delivery.message.topic,
                                "Sending message"
                            );
                            let mut message = delivery.message.clone();
                            message.hops = hops;
                            queue.push_back(Delivery {
                                at: target,
                                from: Some(delivery.at.clone()),
                                message,
                            });
                            sent += 1;
                        }
                        ForwardDecision::Deny { reason } => {
                            debug!(
                                from = %delivery.at,
                                to = %target,
                                reason = %reason,
                                "Forward denied by hook"
                            );
                            denied += 1;
                        }
                    }
                }
            }

            if let Some(node) = self.nodes.write().get_mut(&delivery.at) {
                node.stats.delivered += snapshot.handlers.len() as u64;
                node.stats.sent += sent as u64;
                node.stats.denied += denied;
            }
            first_hop_sends.get_or_insert(sent);
        }

        first_hop_sends.unwrap_or(0)
    }

    /// Mark the message seen at the delivery's node and copy out what is
    /// needed to process it. `None` when the node is gone or has already
    /// processed this message.
    fn snapshot(&self, delivery: &Delivery) -> Option<Snapshot> {
        let mut nodes = self.nodes.write();
        let topic = delivery.message.topic.as_str();

        let node = nodes.get_mut(&delivery.at)?;
        if !node.seen.insert(delivery.message.id) {
            node.stats.duplicates += 1;
            trace!(peer = %delivery.at, id = %delivery.message.id, "Duplicate message dropped");
            return None;
        }
        if delivery.from.is_some() && !node.is_subscribed(topic) {
            return None;
        }

        let handlers = node.handlers.get(topic).cloned().unwrap_or_default();
        let hooks = node.hooks.get(topic).cloned().unwrap_or_default();
        let links: Vec<PeerId> = node
            .links
            .iter()
            .filter(|peer| Some(*peer) != delivery.from.as_ref())
            .cloned()
            .collect();

        let targets = links
            .into_iter()
            .filter(|peer| nodes.get(peer).is_some_and(|n| n.is_subscribed(topic)))
            .collect();

        Some(Snapshot {
            handlers,
            hooks,
            targets,
        })
    }
}

fn run_hooks(hooks: &[Arc<dyn ForwardHook>], peer: &PeerId, message: &GossipMessage) -> ForwardDecision {
    for hook in hooks {
        if let deny @ ForwardDecision::Deny { .. } = hook.should_forward(peer, message) {
            return deny;
        }
    }
    ForwardDecision::Allow
}

impl GossipTransport for GossipNode {
    fn local_peer_id(&self) -> &PeerId {
        &self.id
    }

    fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), BusError> {
        self.with_node(|node| {
            let handlers = node.handlers.entry(topic.to_string()).or_default();
            if !handlers.iter().any(|h| same_arc(h, &handler)) {
                handlers.push(handler);
                debug!(peer = %self.id, topic, "Subscribed");
            }
        })
    }

    fn unsubscribe(&self, topic: &str, handler: &Arc<dyn MessageHandler>) -> Result<(), BusError> {
        self.with_node(|node| {
            if let Some(handlers) = node.handlers.get_mut(topic) {
                handlers.retain(|h| !same_arc(h, handler));
                if handlers.is_empty() {
                    node.handlers.remove(topic);
                }
                debug!(peer = %self.id, topic, "Unsubscribed");
            }
        })
    }

    fn publish(&self, topic: &str, payload: Vec<u8>, hops: HopBudget) -> Result<usize, BusError> {
        let max = self.mesh.config.max_payload_bytes;
        if payload.len() > max {
            return Err(BusError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        self.with_node(|node| node.stats.published += 1)?;

        let message = GossipMessage::new(topic, payload, hops, self.id.clone());
        debug!(peer = %self.id, topic, id = %message.id, "Publishing message");
        Ok(self.mesh.dispatch(Delivery {
            at: self.id.clone(),
            from: None,
            message,
        }))
    }

    fn add_forward_hook(&self, topic: &str, hook: Arc<dyn ForwardHook>) -> Result<(), BusError> {
        self.with_node(|node| {
            let hooks = node.hooks.entry(topic.to_string()).or_default();
            if !hooks.iter().any(|h| same_arc(h, &hook)) {
                hooks.push(hook);
            }
        })
    }

    fn remove_forward_hook(
        &self,
        topic: &str,
        hook: &Arc<dyn ForwardHook>,
    ) -> Result<(), BusError> {
        self.with_node(|node| {
            if let Some(hooks) = node.hooks.get_mut(topic) {
                hooks.retain(|h| !same_arc(h, hook));
                if hooks.is_empty() {
                    node.hooks.remove(topic);
                }
            }
        })
    }
}
