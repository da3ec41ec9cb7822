//! Bounded caches owned by the tracker.
//!
//! Both caches evict least-recently-used entries once full, and treat entries
//! older than their time-to-live as absent. A zero time-to-live never
//! expires. A peer whose forward record is evicted starts over with an empty
//! record the next time it is seen.

use lru::LruCache;
use shared_types::{BlockHeader, Height, PeerId};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Clamp a configured capacity to at least one entry.
pub(crate) fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

fn is_expired(stamped: Instant, ttl: Duration, now: Instant) -> bool {
    !ttl.is_zero() && now.saturating_duration_since(stamped) >= ttl
}

/// Height-indexed cache of recently received headers.
pub struct HeaderCache {
    headers: LruCache<Height, (BlockHeader, Instant)>,
    ttl: Duration,
}

impl HeaderCache {
    pub fn new(size: usize, ttl: Duration) -> Self {
        Self {
            headers: LruCache::new(capacity(size)),
            ttl,
        }
    }

    /// Insert or replace the header stored at its height.
    pub fn insert(&mut self, header: BlockHeader) {
        self.insert_at(header, Instant::now());
    }

    pub(crate) fn insert_at(&mut self, header: BlockHeader, now: Instant) {
        self.headers.put(header.height(), (header, now));
    }

    /// Look up a header, marking it recently used.
    pub fn get(&mut self, height: Height) -> Option<BlockHeader> {
        self.get_at(height, Instant::now())
    }

    pub(crate) fn get_at(&mut self, height: Height, now: Instant) -> Option<BlockHeader> {
        let (header, stamped) = self.headers.get(&height)?;
        if is_expired(*stamped, self.ttl, now) {
            self.headers.pop(&height);
            debug!(height, "Expired cached header");
            return None;
        }
        Some(header.clone())
    }

    pub fn contains(&self, height: Height) -> bool {
        self.headers
            .peek(&height)
            .is_some_and(|(_, stamped)| !is_expired(*stamped, self.ttl, Instant::now()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.headers.cap().get()
    }
}

/// Heights already forwarded to one peer with the time of sending, oldest
/// evicted first.
type ForwardRecord = LruCache<Height, Instant>;

/// Per-peer forward records, bounded both per peer and in peer count.
pub struct PeerForwardRecords {
    peers: LruCache<PeerId, ForwardRecord>,
    per_peer: NonZeroUsize,
    ttl: Duration,
}

impl PeerForwardRecords {
    pub fn new(max_peers: usize, per_peer: usize, ttl: Duration) -> Self {
        Self {
            peers: LruCache::new(capacity(max_peers)),
            per_peer: capacity(per_peer),
            ttl,
        }
    }

    /// Record that `height` is about to be sent to `peer`.
    ///
    /// Returns `false` if it was already sent within the time-to-live (the
    /// caller should skip).
    pub fn record(&mut self, peer: &PeerId, height: Height) -> bool {
        self.record_at(peer, height, Instant::now())
    }

    pub(crate) fn record_at(&mut self, peer: &PeerId, height: Height, now: Instant) -> bool {
        if let Some(record) = self.peers.get_mut(peer) {
            if let Some(sent) = record.get(&height) {
                if !is_expired(*sent, self.ttl, now) {
                    return false;
                }
            }
            record.put(height, now);
            return true;
        }

        let mut record = ForwardRecord::new(self.per_peer);
        record.put(height, now);
        if let Some((evicted, _)) = self.peers.push(peer.clone(), record) {
            debug!(peer = %evicted, "Evicted forward record");
        }
        true
    }

    pub fn has_forwarded(&self, peer: &PeerId, height: Height) -> bool {
        self.peers.peek(peer).is_some_and(|record| {
            record
                .peek(&height)
                .is_some_and(|sent| !is_expired(*sent, self.ttl, Instant::now()))
        })
    }

    pub fn tracked_peers(&self) -> usize {
        self.peers.len()
    }
}
