//! # Shared Types Crate
//!
//! Types that cross crate boundaries in the relay: the block header carried on
//! the gossip topic, the opaque peer identity handed to forward hooks, and the
//! codec that turns one into the other.
//!
//! ## Wire Format
//!
//! Headers travel as JSON using the Ethereum JSON-RPC field names, so a full
//! `eth_getBlockByNumber` result decodes directly into a [`BlockHeader`]:
//!
//! ```text
//! {"number":"0x1b4","hash":"0x…","parentHash":"0x…","timestamp":"0x5e3c…"}
//! ```

pub mod codec;
pub mod entities;
pub mod errors;

pub use codec::{HeaderCodec, JsonHeaderCodec};
pub use entities::*;
pub use errors::*;
