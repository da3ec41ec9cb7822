//! # Runtime Container
//!
//! Configuration plus the assembled mesh and trackers.

pub mod config;
pub mod relay;

pub use config::NodeConfig;
pub use relay::RelayRuntime;
