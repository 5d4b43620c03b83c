// =============================================================================
// Throttle: at most one invocation per interval
// =============================================================================
//
// The throttle never sleeps or spawns; callers pass the current `Instant` and
// ask when the next trailing invocation is due. The driver turns that
// deadline into a `tokio::time::sleep_until`.
//
// Trailing edge is on by default: a burst of calls yields one invocation at
// the end of the interval. With the leading edge on, the first call of a
// quiet period fires immediately.
// =============================================================================

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    leading: bool,
    trailing: bool,
    last_fired: Option<Instant>,
    pending: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            leading: false,
            trailing: true,
            last_fired: None,
            pending: None,
        }
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn next_allowed(&self) -> Option<Instant> {
        self.last_fired.map(|t| t + self.interval)
    }

    /// Request an invocation. Returns true when the caller should invoke now
    /// (leading edge); otherwise a trailing invocation may be scheduled.
    pub fn call(&mut self, now: Instant) -> bool {
        let ready = self.next_allowed().map_or(true, |t| now >= t);
        if self.leading && ready && self.pending.is_none() {
            self.last_fired = Some(now);
            return true;
        }
        if self.trailing && self.pending.is_none() {
            let due = match self.next_allowed() {
                Some(t) if t > now => t,
                _ => now + self.interval,
            };
            self.pending = Some(due);
        }
        false
    }

    /// When the pending trailing invocation is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Returns true (and clears the pending call) once the deadline passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(due) if now >= due => {
                self.pending = None;
                self.last_fired = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop any pending invocation.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn trailing_burst_fires_once() {
        let start = Instant::now();
        let mut t = Throttle::new(16 * MS);
        assert!(!t.call(start));
        assert!(!t.call(start + 2 * MS));
        assert!(!t.call(start + 10 * MS));
        assert_eq!(t.deadline(), Some(start + 16 * MS));
        assert!(!t.poll(start + 15 * MS));
        assert!(t.poll(start + 16 * MS));
        assert!(!t.poll(start + 17 * MS));
        assert!(t.deadline().is_none());
    }

    #[test]
    fn next_burst_waits_for_interval() {
        let start = Instant::now();
        let mut t = Throttle::new(16 * MS);
        t.call(start);
        assert!(t.poll(start + 16 * MS));
        t.call(start + 20 * MS);
        assert_eq!(t.deadline(), Some(start + 32 * MS));
    }

    #[test]
    fn leading_edge_fires_immediately_then_trails() {
        let start = Instant::now();
        let mut t = Throttle::new(100 * MS).with_leading(true);
        assert!(t.call(start));
        assert!(t.deadline().is_none());
        assert!(!t.call(start + 10 * MS));
        assert_eq!(t.deadline(), Some(start + 100 * MS));
        assert!(t.poll(start + 100 * MS));
    }

    #[test]
    fn leading_only_drops_calls_inside_interval() {
        let start = Instant::now();
        let mut t = Throttle::new(100 * MS).with_leading(true).with_trailing(false);
        assert!(t.call(start));
        assert!(!t.call(start + 50 * MS));
        assert!(t.deadline().is_none());
        assert!(t.call(start + 100 * MS));
    }

    #[test]
    fn cancel_clears_pending() {
        let start = Instant::now();
        let mut t = Throttle::new(16 * MS);
        t.call(start);
        t.cancel();
        assert!(!t.poll(start + 20 * MS));
    }
}
