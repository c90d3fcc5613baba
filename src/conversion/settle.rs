//! Wave settle detection.
//!
//! A wave is one batch of conversions dispatched together. Rather than
//! polling with a settle delay, the tracker counts in-flight conversions:
//! incremented on dispatch, decremented on each terminal transition, with
//! the wave settled exactly when the count returns to zero. Dispatches
//! that overlap an unfinished wave merge into it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-flight conversion counter with a one-shot armed flag.
///
/// Callers must pair exactly one [`settled`](WaveTracker::settled) call
/// with every conversion counted by [`dispatched`](WaveTracker::dispatched).
#[derive(Debug, Default)]
pub struct WaveTracker {
    in_flight: AtomicUsize,
    armed: AtomicBool,
}

impl WaveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` newly dispatched conversions and arm the tracker.
    pub fn dispatched(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.in_flight.fetch_add(count, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Record one conversion reaching a terminal state.
    ///
    /// Returns `true` exactly once per wave: when the last in-flight
    /// conversion lands and the tracker is still armed. It cannot return
    /// `true` again until a new wave is dispatched.
    pub fn settled(&self) -> bool {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous <= 1 && self.armed.swap(false, Ordering::SeqCst)
    }

    /// Number of conversions still in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
