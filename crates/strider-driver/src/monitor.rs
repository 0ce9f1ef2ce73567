//! Liveness monitor - watches inbound heartbeats to detect silent link loss
//!
//! **Purpose**: Detect if the server is still responding (process alive, link up).
//!
//! **App Start Relative Time Pattern**:
//! - Uses monotonic time anchored to application start
//! - Unaffected by system clock changes (NTP, manual adjustments)
//! - Safe to store in AtomicU64 for lock-free access

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::warn;

/// Global anchor point for monotonic time
/// Set once on first access, never changes
static APP_START: OnceLock<Instant> = OnceLock::new();

/// Get monotonic time as milliseconds since app start
///
/// This is guaranteed to be:
/// - Monotonic (always increases)
/// - Unaffected by system clock changes
/// - Safe to store in AtomicU64
pub fn now_millis() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// Connection liveness monitor
///
/// Tracks the time since the last verified inbound heartbeat.
pub struct ConnectionMonitor {
    last_heartbeat: AtomicU64,
    timeout: Duration,
}

impl ConnectionMonitor {
    /// Create a new monitor
    ///
    /// # Parameters
    /// - `timeout`: Maximum duration without an inbound heartbeat before the
    ///   connection is considered lost
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_heartbeat: AtomicU64::new(now_millis()),
            timeout,
        }
    }

    /// Check if the link is still alive
    ///
    /// Returns true while a heartbeat arrived within the timeout window.
    pub fn check_connection(&self) -> bool {
        self.time_since_last_heartbeat() < self.timeout
    }

    /// Register a verified inbound heartbeat
    ///
    /// Called by the receive worker for every heartbeat payload it dispatches.
    pub fn register_heartbeat(&self) {
        self.last_heartbeat.store(now_millis(), Ordering::Relaxed);
    }

    /// Time since the last inbound heartbeat
    pub fn time_since_last_heartbeat(&self) -> Duration {
        let last = self.last_heartbeat.load(Ordering::Relaxed);
        Duration::from_millis(now_millis().saturating_sub(last))
    }

    /// Re-arm the monitor (called when a new connection attempt starts)
    pub fn reset(&self) {
        self.last_heartbeat.store(now_millis(), Ordering::Relaxed);
    }
}

/// Consecutive low-level failure tracker
///
/// Shared by the receive and send workers; any successful IO resets it.
/// Reaching the threshold escalates to connection-loss handling.
pub struct FailureTracker {
    count: AtomicU32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }

    /// Record one failure; returns true when the retry budget is exhausted
    pub fn record_failure(&self) -> bool {
        let failures = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.threshold {
            warn!(
                "Consecutive failure budget exhausted ({}/{})",
                failures, self.threshold
            );
            true
        } else {
            false
        }
    }

    /// Reset after any successful IO
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Current consecutive failure count
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_monotonic_millis_always_increases() {
        let t1 = now_millis();
        thread::sleep(Duration::from_millis(10));
        let t2 = now_millis();
        assert!(t2 > t1, "monotonic time should always increase");
    }

    #[test]
    fn test_monitor_initially_alive() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert!(monitor.check_connection());
    }

    #[test]
    fn test_monitor_times_out_after_silence() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(50));
        assert!(monitor.check_connection());
        thread::sleep(Duration::from_millis(100));
        assert!(!monitor.check_connection());
    }

    #[test]
    fn test_heartbeat_resets_timer() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(100));
        thread::sleep(Duration::from_millis(60));
        monitor.register_heartbeat();
        thread::sleep(Duration::from_millis(60));
        // 120 ms since construction, 60 ms since the heartbeat: still alive
        assert!(monitor.check_connection());
    }

    #[test]
    fn test_failure_tracker_threshold() {
        let tracker = FailureTracker::new(3);
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(tracker.record_failure());
        assert_eq!(tracker.count(), 3);
    }

    #[test]
    fn test_failure_tracker_reset() {
        let tracker = FailureTracker::new(3);
        tracker.record_failure();
        tracker.record_failure();
        tracker.reset();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.record_failure());
    }
}
