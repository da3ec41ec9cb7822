//! # Shared Bus - Gossip Transport
//!
//! The publish/subscribe surface the header tracker consumes, plus an
//! in-memory mesh that implements it for tests and local simulation.
//!
//! ## Relay Model
//!
//! ```text
//!   publish(topic, payload, hops)
//!          │
//!          ▼
//!   ┌─────────────┐  forward hooks   ┌─────────────┐  forward hooks   ┌─────────────┐
//!   │   Node A    │ ───(A → B)────→  │   Node B    │ ───(B → C)────→  │   Node C    │
//!   │  handlers   │                  │  handlers   │                  │  handlers   │
//!   └─────────────┘                  └─────────────┘                  └─────────────┘
//! ```
//!
//! Every outbound send, whether first hop or relay, runs the sending node's
//! forward hooks for the topic. Any hook may deny the send to that peer.
//!
//! ## Loop Protection
//!
//! Each node keeps a time-bounded cache of message ids it has already
//! processed, so cyclic topologies terminate even when no hook is installed.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod mesh;
pub mod message;
pub mod seen_cache;
pub mod subscriber;
pub mod transport;

pub use mesh::{GossipNode, InMemoryGossipNetwork, MeshConfig, NodeStats};
pub use message::{GossipMessage, HopBudget, MessageId};
pub use seen_cache::TimeBoundedSeenCache;
pub use subscriber::ChannelHandler;
pub use transport::{BusError, ForwardDecision, ForwardHook, GossipTransport, MessageHandler};

/// Largest payload the in-memory mesh accepts by default.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
