//! # Channel Subscriber
//!
//! Bridges synchronous message delivery into async code: every delivered
//! message is pushed onto an unbounded channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::message::GossipMessage;
use crate::transport::MessageHandler;

/// A [`MessageHandler`] that forwards deliveries to a channel.
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<GossipMessage>,
}

impl ChannelHandler {
    /// Create a handler and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<GossipMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl MessageHandler for ChannelHandler {
    fn handle(&self, message: &GossipMessage) {
        if self.sender.send(message.clone()).is_err() {
            debug!(topic = %message.topic, "Channel receiver dropped, message discarded");
        }
    }
}
