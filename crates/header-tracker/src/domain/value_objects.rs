//! Configuration and metrics for the header tracker.

use std::time::Duration;

/// Default gossip topic for block headers.
pub const DEFAULT_TOPIC: &str = "/relay/block-header";

/// Default time-to-live for cached headers and forward records.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Header tracker configuration.
///
/// Zero capacities are clamped to one entry. A zero time-to-live disables
/// expiry for that cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Gossip topic headers are published and received on.
    pub topic: String,
    /// Headers kept for `get_header_by_height` lookups.
    pub header_cache_size: usize,
    /// Heights remembered per peer for forward deduplication.
    pub peer_record_capacity: usize,
    /// Peers with a forward record; least recently active is evicted first.
    pub max_tracked_peers: usize,
    /// How long a cached header answers lookups.
    pub header_ttl: Duration,
    /// How long a forward record suppresses resending a height to a peer.
    pub forward_record_ttl: Duration,
    /// Buffered events per subscriber before the slowest one lags.
    pub event_channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            header_cache_size: 100,
            peer_record_capacity: 1_000,
            max_tracked_peers: 100,
            header_ttl: DEFAULT_CACHE_TTL,
            forward_record_ttl: DEFAULT_CACHE_TTL,
            event_channel_capacity: 1_000,
        }
    }
}

impl TrackerConfig {
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

/// Tracker counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerMetrics {
    /// Headers decoded from the topic.
    pub headers_ingested: u64,
    /// Headers that became the new tip.
    pub tip_advances: u64,
    /// Payloads that failed to decode (ingest or forward check).
    pub decode_failures: u64,
    /// Forward checks that allowed a send.
    pub forwards_allowed: u64,
    /// Forward checks suppressed as already sent to that peer.
    pub forwards_suppressed: u64,
    /// Headers originated by this tracker.
    pub headers_published: u64,
    /// Publishes rejected by the transport.
    pub publish_failures: u64,
    /// Chain source lookups that failed.
    pub upstream_failures: u64,
}
