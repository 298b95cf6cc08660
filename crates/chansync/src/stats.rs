//! Request counters for a guardian
//!
//! Counters are atomics updated from callers and from the coordinating task
//! without any extra locking.

use core::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between the handle and the coordinating task
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    reads_served: AtomicU64,
    writes_applied: AtomicU64,
    rejected_closed: AtomicU64,
    cancelled: AtomicU64,
    abandoned_replies: AtomicU64,
}

impl StatsCounters {
    pub fn record_read_served(&self) {
        self.reads_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_applied(&self) {
        self.writes_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_closed(&self) {
        self.rejected_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Reply that the caller stopped waiting for
    pub fn record_abandoned_reply(&self) {
        self.abandoned_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Move a read counted as served to abandoned after its reply failed
    pub fn reclassify_served_as_abandoned(&self) {
        self.reads_served.fetch_sub(1, Ordering::Relaxed);
        self.abandoned_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GuardianStats {
        GuardianStats {
            reads_served: self.reads_served.load(Ordering::Relaxed),
            writes_applied: self.writes_applied.load(Ordering::Relaxed),
            rejected_closed: self.rejected_closed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            abandoned_replies: self.abandoned_replies.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a guardian's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GuardianStats {
    /// Reads whose reply reached a waiting caller. Counted before the caller
    /// is woken, so a caller that got its value already sees it here.
    pub reads_served: u64,
    /// Mutators run to completion
    pub writes_applied: u64,
    /// Calls rejected because the guardian was closed
    pub rejected_closed: u64,
    /// Calls that returned a cancellation or deadline error
    pub cancelled: u64,
    /// Reads answered after the caller stopped waiting
    pub abandoned_replies: u64,
}

impl GuardianStats {
    /// Requests the coordinating task has taken off the channel
    pub fn total_handled(&self) -> u64 {
        self.reads_served + self.writes_applied + self.abandoned_replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = StatsCounters::default();
        assert_eq!(counters.snapshot(), GuardianStats::default());

        counters.record_read_served();
        counters.record_read_served();
        counters.record_write_applied();
        counters.record_rejected_closed();
        counters.record_cancelled();
        counters.record_abandoned_reply();

        let stats = counters.snapshot();
        assert_eq!(stats.reads_served, 2);
        assert_eq!(stats.writes_applied, 1);
        assert_eq!(stats.rejected_closed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.abandoned_replies, 1);
        assert_eq!(stats.total_handled(), 4);

        counters.reclassify_served_as_abandoned();
        let stats = counters.snapshot();
        assert_eq!(stats.reads_served, 1);
        assert_eq!(stats.abandoned_replies, 2);
        assert_eq!(stats.total_handled(), 4);
    }
}
