use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// In-memory counter. Monotonically increasing.
#[derive(Default)]
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn increment(&self) {
        self.add(1);
    }

    fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for traffic on one connection. Written by the dispatcher,
/// read by anyone holding the connection.
#[derive(Default)]
pub struct FrameCounters {
    sent: Counter,
    received: Counter,
    replies: Counter,
    exceptions: Counter,
    state_frames: Counter,
    events: Counter,
    unrouted: Counter,
    unknown: Counter,
    dropped: Counter,
    unknown_by_kind: RwLock<BTreeMap<&'static str, u64>>,
}

/// Point-in-time copy of [`FrameCounters`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrameStatsSnapshot {
    pub sent: u64,
    pub received: u64,
    pub replies: u64,
    pub exceptions: u64,
    pub state_frames: u64,
    pub events: u64,
    /// Events for a call nobody (or nobody any more) listens to.
    pub unrouted: u64,
    /// Frames that matched no known shape.
    pub unknown: u64,
    /// Frames skipped by fan-out listeners that fell behind.
    pub dropped: u64,
    pub unknown_by_kind: BTreeMap<&'static str, u64>,
}

impl FrameCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.sent.increment();
    }

    pub fn record_received(&self) {
        self.received.increment();
    }

    pub fn record_reply(&self, has_exception: bool) {
        self.replies.increment();
        if has_exception {
            self.exceptions.increment();
        }
    }

    pub fn record_state(&self) {
        self.state_frames.increment();
    }

    pub fn record_event(&self) {
        self.events.increment();
    }

    pub fn record_unrouted(&self) {
        self.unrouted.increment();
    }

    /// Count a frame that decoded to nothing known, labelled by why.
    pub fn record_unknown(&self, kind: &'static str) {
        self.unknown.increment();
        *self.unknown_by_kind.write().entry(kind).or_insert(0) += 1;
    }

    /// Count frames a fan-out listener fell too far behind to see.
    pub fn record_dropped(&self, count: u64) {
        self.dropped.add(count);
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            sent: self.sent.get(),
            received: self.received.get(),
            replies: self.replies.get(),
            exceptions: self.exceptions.get(),
            state_frames: self.state_frames.get(),
            events: self.events.get(),
            unrouted: self.unrouted.get(),
            unknown: self.unknown.get(),
            dropped: self.dropped.get(),
            unknown_by_kind: self.unknown_by_kind.read().clone(),
        }
    }
}
