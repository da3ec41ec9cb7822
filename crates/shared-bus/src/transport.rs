//! # Transport Surface
//!
//! The pub/sub interface a gossip client sees. Handler and hook identity is
//! the identity of the `Arc` they were registered with.

use std::sync::Arc;

use shared_types::PeerId;
use thiserror::Error;

use crate::message::{GossipMessage, HopBudget};

/// Errors from transport operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The node this handle refers to is no longer part of the network.
    #[error("unknown node: {0}")]
    UnknownNode(PeerId),

    /// The payload exceeds the transport's size limit.
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Outcome of a forward hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardDecision {
    Allow,
    /// Skip this peer. Not necessarily an error; `reason` is for logs.
    Deny { reason: String },
}

impl ForwardDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        ForwardDecision::Deny {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, ForwardDecision::Allow)
    }
}

/// Receives messages delivered on a subscribed topic.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &GossipMessage);
}

/// Gate run before a message is sent to a specific peer.
pub trait ForwardHook: Send + Sync {
    fn should_forward(&self, peer: &PeerId, message: &GossipMessage) -> ForwardDecision;
}

/// Topic-based broadcast transport.
pub trait GossipTransport: Send + Sync {
    /// Identity of the local node.
    fn local_peer_id(&self) -> &PeerId;

    /// Register `handler` for `topic`. Registering the same handler twice is a no-op.
    fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<(), BusError>;

    fn unsubscribe(&self, topic: &str, handler: &Arc<dyn MessageHandler>) -> Result<(), BusError>;

    /// Publish `payload` on `topic`.
    ///
    /// Returns the number of peers the message was sent to directly.
    fn publish(&self, topic: &str, payload: Vec<u8>, hops: HopBudget) -> Result<usize, BusError>;

    /// Register `hook` for `topic`. Registering the same hook twice is a no-op.
    fn add_forward_hook(&self, topic: &str, hook: Arc<dyn ForwardHook>) -> Result<(), BusError>;

    fn remove_forward_hook(&self, topic: &str, hook: &Arc<dyn ForwardHook>)
        -> Result<(), BusError>;
}

/// Pointer identity for trait objects.
pub(crate) fn same_arc<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
