//! Bounded record of recent arrivals, used as a global load signal.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::trace;

/// Default ceiling on outstanding queue entries.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
/// Largest ceiling accepted from configuration.
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

/// An arrival recorded in the admission queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// `ip:port/path` tag, informational only
    pub key: String,
    /// When the request arrived
    pub arrived_at: Instant,
}

impl PendingRequest {
    /// Build the queue tag for a request.
    pub fn key_for(client: &str, port: u16, endpoint: &str) -> String {
        format!("{}:{}{}", client, port, endpoint)
    }

    /// Age of this entry as of `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.arrived_at)
    }
}

/// Arrivals are counted, not completed: entries leave only when they go
/// stale. Entry order carries no meaning.
pub struct AdmissionQueue {
    capacity: usize,
    entries: Mutex<Vec<PendingRequest>>,
}

impl AdmissionQueue {
    /// Create a queue that holds at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Vec::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY))),
        }
    }

    /// Record an arrival now, unless the queue is full.
    pub fn try_enqueue(&self, key: impl Into<String>) -> bool {
        self.try_enqueue_at(key, Instant::now())
    }

    /// Record an arrival at `arrived_at`, unless the queue is full.
    ///
    /// The capacity check and the insert happen under one lock, so the
    /// length never exceeds the capacity. A full queue is never trimmed to
    /// make room.
    pub fn try_enqueue_at(&self, key: impl Into<String>, arrived_at: Instant) -> bool {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            return false;
        }

        let key = key.into();
        trace!(key = %key, len = entries.len() + 1, "Request enqueued");
        entries.push(PendingRequest { key, arrived_at });
        true
    }

    /// Remove every entry older than `window`, returning how many went.
    pub fn evict_stale(&self, window: Duration) -> usize {
        self.evict_stale_at(window, Instant::now())
    }

    /// Remove every entry whose age at `now` exceeds `window`.
    pub fn evict_stale_at(&self, window: Duration, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();

        let mut i = 0;
        while i < entries.len() {
            if entries[i].age_at(now) > window {
                entries.swap_remove(i);
            } else {
                i += 1;
            }
        }

        before - entries.len()
    }

    /// Get the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured ceiling.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy out the current entries.
    pub fn snapshot(&self) -> Vec<PendingRequest> {
        self.entries.lock().clone()
    }
}

impl Default for AdmissionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
