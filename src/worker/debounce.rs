//! Rebuild debouncing.
//!
//! Filesystem watchers emit several events for one logical edit (editor
//! temp-file dances, partial writes), and a full graph rebuild is expensive.
//! The debouncer coalesces a burst into a single rebuild once a quiet window
//! passes with no further events.
//!
//! Pure timing state: no timers of its own, no callbacks. The worker loop
//! asks for `sleep_duration()` and calls `take_if_ready()` when it wakes -
//! a cancel-and-restart timer without nested closures.

use std::time::{Duration, Instant};

/// Quiet window: a rebuild fires after this long with no further events.
pub const QUIET_WINDOW_MS: u64 = 600;

/// Coalesces change-event bursts into single rebuild triggers.
pub struct RebuildDebouncer {
    /// Events recorded since the last rebuild fired
    pending: usize,
    pub(super) last_event: Option<Instant>,
}

impl RebuildDebouncer {
    pub fn new() -> Self {
        Self {
            pending: 0,
            last_event: None,
        }
    }

    /// Record a raw change event. Restarts the quiet window.
    pub fn notify(&mut self) {
        self.pending += 1;
        self.last_event = Some(Instant::now());
    }

    /// True once the quiet window has elapsed with events pending.
    pub fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        self.pending > 0 && last_event.elapsed() >= Duration::from_millis(QUIET_WINDOW_MS)
    }

    /// Fire at most once per burst: returns the coalesced event count when
    /// the quiet window has elapsed, resetting for the next burst.
    pub fn take_if_ready(&mut self) -> Option<usize> {
        if !self.is_ready() {
            return None;
        }

        let pending = std::mem::take(&mut self.pending);
        self.last_event = None;
        Some(pending)
    }

    /// Precise sleep duration until the next possible ready time.
    pub fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        Duration::from_millis(QUIET_WINDOW_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backdate the last event so tests need not sleep through the window.
    fn age(debouncer: &mut RebuildDebouncer, ms: u64) {
        debouncer.last_event = debouncer
            .last_event
            .map(|t| t - Duration::from_millis(ms));
    }

    #[test]
    fn test_empty_not_ready() {
        let debouncer = RebuildDebouncer::new();
        assert!(!debouncer.is_ready());
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
    }

    #[test]
    fn test_burst_coalesces_to_one() {
        let mut debouncer = RebuildDebouncer::new();

        // N events within the window: still quiet, nothing fires
        for _ in 0..5 {
            debouncer.notify();
        }
        assert!(!debouncer.is_ready());
        assert!(debouncer.take_if_ready().is_none());

        // Window elapses: exactly one fire carrying the whole burst
        age(&mut debouncer, QUIET_WINDOW_MS + 1);
        assert_eq!(debouncer.take_if_ready(), Some(5));

        // Nothing left for a second fire
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_spaced_events_fire_individually() {
        let mut debouncer = RebuildDebouncer::new();

        debouncer.notify();
        age(&mut debouncer, QUIET_WINDOW_MS + 100);
        assert_eq!(debouncer.take_if_ready(), Some(1));

        debouncer.notify();
        age(&mut debouncer, QUIET_WINDOW_MS + 100);
        assert_eq!(debouncer.take_if_ready(), Some(1));
    }

    #[test]
    fn test_new_event_restarts_window() {
        let mut debouncer = RebuildDebouncer::new();

        debouncer.notify();
        age(&mut debouncer, QUIET_WINDOW_MS - 50);
        // A late event within the window restarts it
        debouncer.notify();
        assert!(!debouncer.is_ready());

        let dur = debouncer.sleep_duration();
        assert!(dur > Duration::from_millis(QUIET_WINDOW_MS - 50));
        assert!(dur <= Duration::from_millis(QUIET_WINDOW_MS));
    }

    #[test]
    fn test_sleep_duration_after_event() {
        let mut debouncer = RebuildDebouncer::new();
        debouncer.notify();

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(QUIET_WINDOW_MS - 10));
        assert!(dur <= Duration::from_millis(QUIET_WINDOW_MS + 10));
    }
}
