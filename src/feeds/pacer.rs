// =============================================================================
// Request Pacer: spaces outgoing REST calls to respect exchange limits
// =============================================================================
//
// GDAX allows roughly one public request per second per IP. Each caller
// reserves the next free slot under a short lock and then sleeps outside it,
// so concurrent fetches queue up in reservation order without holding the
// lock across an await.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    requests: AtomicU64,
}

/// Serialisable view of the pacer counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacerSnapshot {
    pub interval_ms: u64,
    pub requests: u64,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
            requests: AtomicU64::new(0),
        }
    }

    // -------------------------------------------------------------------------
    // Slot reservation
    // -------------------------------------------------------------------------

    /// Reserve the earliest slot at or after `now` and return it.
    pub fn reserve(&self, now: Instant) -> Instant {
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.interval);
        self.requests.fetch_add(1, Ordering::Relaxed);
        slot
    }

    /// Wait until this caller may send its request.
    pub async fn acquire(&self) {
        let now = Instant::now();
        let slot = self.reserve(now);
        if slot > now {
            debug!(wait_ms = (slot - now).as_millis() as u64, "request pacer delaying call");
            tokio::time::sleep_until(slot).await;
        }
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> PacerSnapshot {
        PacerSnapshot {
            interval_ms: self.interval.as_millis() as u64,
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("interval", &self.interval)
            .field("requests", &self.requests.load(Ordering::Relaxed))
            .finish()
    }
}
