//! Drift-free periodic task scheduling.
//!
//! A `PeriodicTask` is polled from a busy loop with whatever `now_ms` the
//! caller read from its clock. Deadlines advance by whole intervals so steady
//! polling never drifts; after a stall longer than one interval the phase is
//! restarted at `now` instead of firing once per missed interval.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicTask {
    interval_ms: u64,
    next_deadline_ms: u64,
    resyncs: u64,
}

impl PeriodicTask {
    /// A task whose first deadline is `start_ms + interval_ms`.
    ///
    /// A zero interval is treated as 1 ms.
    pub fn new(interval_ms: u64, start_ms: u64) -> Self {
        let interval_ms = interval_ms.max(1);
        Self {
            interval_ms,
            next_deadline_ms: start_ms.saturating_add(interval_ms),
            resyncs: 0,
        }
    }

    /// Returns `true` at most once per call when the deadline has been reached.
    pub fn is_due(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_deadline_ms {
            return false;
        }
        self.next_deadline_ms = self.next_deadline_ms.saturating_add(self.interval_ms);
        if now_ms >= self.next_deadline_ms {
            // More than one interval was missed: restart the phase at `now`.
            self.next_deadline_ms = now_ms.saturating_add(self.interval_ms);
            self.resyncs = self.resyncs.saturating_add(1);
        }
        true
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn next_deadline_ms(&self) -> u64 {
        self.next_deadline_ms
    }

    /// How many times the phase has been restarted after a stall.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_before_first_interval() {
        let mut t = PeriodicTask::new(10, 0);
        assert!(!t.is_due(0));
        assert!(!t.is_due(9));
        assert!(t.is_due(10));
        assert!(!t.is_due(10));
        assert_eq!(t.next_deadline_ms(), 20);
    }

    #[test]
    fn late_poll_within_one_interval_keeps_phase() {
        let mut t = PeriodicTask::new(10, 0);
        assert!(t.is_due(17));
        assert_eq!(t.next_deadline_ms(), 20);
        assert!(t.is_due(20));
        assert_eq!(t.resyncs(), 0);
    }

    #[test]
    fn stall_resyncs_to_now() {
        let mut t = PeriodicTask::new(10, 0);
        assert!(t.is_due(55));
        assert_eq!(t.next_deadline_ms(), 65);
        assert!(!t.is_due(55));
        assert!(!t.is_due(64));
        assert!(t.is_due(65));
        assert_eq!(t.resyncs(), 1);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let t = PeriodicTask::new(0, 5);
        assert_eq!(t.interval_ms(), 1);
        assert_eq!(t.next_deadline_ms(), 6);
    }
}
