//! # Relay Node Runtime
//!
//! Wiring for the block-header relay binary.
//!
//! ## Modular Structure
//!
//! - `container/` - CLI configuration and the assembled [`RelayRuntime`]
//! - `adapters/` - the JSON-RPC [`JsonRpcChainSource`]
//!
//! ## Startup Sequence
//!
//! 1. Parse flags (`RELAY_*` environment variables as fallback)
//! 2. Build the mesh: local node plus optional simulated ring
//! 3. Start simulated peers, then the local tracker
//! 4. Start the event logger and, with `--rpc-url`, the height poller

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;

pub use adapters::JsonRpcChainSource;
pub use container::{NodeConfig, RelayRuntime};
