//! # Time-Bounded Seen-Message Cache
//!
//! Remembers which message ids a node has already processed so a message
//! looping back through a cycle is dropped instead of relayed again.
//!
//! - Ids are kept for `validity_window` after they were first seen.
//! - Expired ids are garbage-collected at most once per `gc_interval`.
//! - Memory is bounded by the message rate times the validity window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::message::MessageId;

/// Time-bounded cache of processed message ids.
pub struct TimeBoundedSeenCache {
    /// Map of message id -> instant it was first seen.
    cache: HashMap<MessageId, Instant>,

    /// How long an id is remembered.
    validity_window: Duration,

    /// Last garbage collection.
    last_gc: Instant,

    /// Minimum time between garbage collections.
    gc_interval: Duration,
}

impl TimeBoundedSeenCache {
    /// Default validity window.
    pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(120);

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_VALIDITY_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    #[must_use]
    pub fn with_config(validity_window: Duration, gc_interval: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            validity_window,
            last_gc: Instant::now(),
            gc_interval,
        }
    }

    /// Record `id`, returning `true` if it had not been seen before.
    pub fn insert(&mut self, id: MessageId) -> bool {
        let now = Instant::now();

        if now.duration_since(self.last_gc) >= self.gc_interval {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if self.cache.contains_key(&id) {
            return false;
        }
        self.cache.insert(id, now);
        true
    }

    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.cache.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn garbage_collect(&mut self, now: Instant) {
        let window = self.validity_window;
        self.cache
            .retain(|_, first_seen| now.duration_since(*first_seen) < window);
    }
}

impl Default for TimeBoundedSeenCache {
    fn default() -> Self {
        Self::new()
    }
}
