//! # Header Tracker
//!
//! Tracks the locally known tip of a height-ordered header chain, ingests
//! headers arriving on a gossip topic, and suppresses re-forwarding a header
//! to any peer that has already been sent it.
//!
//! ## Architecture Role
//!
//! ```text
//! [Chain Source] ──height──→ [RPC Bridge] ──fetch + publish──→ [Transport]
//!                                                                  │
//!                                        ┌──────── deliver ────────┤
//!                                        ↓                         │ about to send to peer P
//!                                [Tip State Machine]     [Forward Dedup Filter]
//!                                        │                         │
//!                               latest / sync / block        allow / deny
//! ```
//!
//! ## Subsystems
//!
//! - **Tip state machine**: strictly-greater height wins; previous tip kept.
//! - **Forward dedup filter**: per-peer bounded record of heights already sent.
//! - **RPC bridge** (optional): republishes headers announced by an external
//!   chain source. Without a source the tracker runs transport-only.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bridge;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use domain::*;
pub use events::{TrackerError, TrackerEvent};
pub use ports::inbound::HeaderTrackerApi;
pub use ports::outbound::{ChainSource, ChainSourceMode, SourceError};
pub use service::HeaderTracker;
