//! # Node Configuration
//!
//! Command-line flags for the relay node. Every flag can also be set through
//! a `RELAY_*` environment variable.

use std::time::Duration;

use clap::Parser;
use header_tracker::{TrackerConfig, DEFAULT_TOPIC};

/// Block-header relay node.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-node")]
#[command(about = "Relays block headers over gossip and deduplicates forwards per peer")]
pub struct NodeConfig {
    /// Gossip topic carrying encoded headers.
    #[arg(long, env = "RELAY_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// JSON-RPC endpoint of the chain source. Omit to run transport-only.
    #[arg(long, env = "RELAY_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Interval between `eth_blockNumber` polls, in milliseconds.
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS", default_value_t = 4000)]
    pub poll_interval_ms: u64,

    /// Headers kept in the by-height cache.
    #[arg(long, env = "RELAY_HEADER_CACHE_SIZE", default_value_t = 100)]
    pub header_cache_size: usize,

    /// Heights remembered per peer for forward deduplication.
    #[arg(long, env = "RELAY_PEER_RECORD_CAPACITY", default_value_t = 1000)]
    pub peer_record_capacity: usize,

    /// Peers with a forward record before the least recent is evicted.
    #[arg(long, env = "RELAY_MAX_TRACKED_PEERS", default_value_t = 100)]
    pub max_tracked_peers: usize,

    /// Seconds a cached header answers lookups. Zero never expires.
    #[arg(long, env = "RELAY_HEADER_TTL_SECS", default_value_t = 300)]
    pub header_ttl_secs: u64,

    /// Seconds a forward record suppresses resending a height. Zero never
    /// expires.
    #[arg(long, env = "RELAY_FORWARD_RECORD_TTL_SECS", default_value_t = 300)]
    pub forward_record_ttl_secs: u64,

    /// Transport-only trackers to run in a ring around the local node.
    #[arg(long, env = "RELAY_SIMULATED_PEERS", default_value_t = 0)]
    pub simulated_peers: usize,
}

impl NodeConfig {
    /// Tracker settings derived from the flags.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            topic: self.topic.clone(),
            header_cache_size: self.header_cache_size,
            peer_record_capacity: self.peer_record_capacity,
            max_tracked_peers: self.max_tracked_peers,
            header_ttl: Duration::from_secs(self.header_ttl_secs),
            forward_record_ttl: Duration::from_secs(self.forward_record_ttl_secs),
            ..TrackerConfig::default()
        }
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::parse_from(["relay-node"])
    }
}
