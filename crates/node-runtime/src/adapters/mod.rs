//! # Adapters
//!
//! Outbound port implementations that talk to the world outside the mesh.

pub mod rpc_source;

pub use rpc_source::{JsonRpcChainSource, RpcClientError};
