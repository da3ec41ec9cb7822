//! Ports for the header tracker.

pub mod inbound;
pub mod outbound;
