use std::time::Duration;

use tokio::time::Instant;

const TICK: Duration = Duration::from_secs(1);

/// Counters describing the lifetime of countdown timers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Timers armed.
    pub created: u64,
    /// Timers disarmed before they fired.
    pub cancelled: u64,
    /// Timers that ran to completion.
    pub fired: u64,
}

impl TimerStats {
    /// Timers currently armed; never more than one.
    pub fn live(&self) -> u64 {
        self.created - self.cancelled - self.fired
    }
}

/// Locally ticking approximation of the time left before `Playing`.
///
/// At most one one-second timer is armed at a time; restarting disarms the
/// previous one first.
#[derive(Debug, Clone)]
pub struct LocalCountdown {
    start: u8,
    remaining: u8,
    deadline: Option<Instant>,
    stats: TimerStats,
}

impl LocalCountdown {
    /// Idle countdown displaying `start`.
    pub fn new(start: u8) -> Self {
        Self {
            start,
            remaining: start,
            deadline: None,
            stats: TimerStats::default(),
        }
    }

    /// Seconds currently displayed.
    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    /// When the armed timer expires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Timer lifetime counters.
    pub fn stats(&self) -> TimerStats {
        self.stats
    }

    /// A fresh `Countdown` phase arrived: display `start` and tick from now.
    pub fn restart(&mut self, now: Instant) {
        self.cancel();
        self.remaining = self.start;
        self.arm(now);
    }

    /// `Waiting` arrived: display `start` with no timer armed.
    pub fn idle(&mut self) {
        self.cancel();
        self.remaining = self.start;
    }

    /// The phase moved past the countdown: stop ticking, keep the display.
    pub fn halt(&mut self) {
        self.cancel();
    }

    /// Handle the armed timer expiring; returns whether the display changed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.stats.fired += 1;
                self.remaining = self.remaining.saturating_sub(1);
                self.arm(now);
                true
            }
            _ => false,
        }
    }

    fn arm(&mut self, now: Instant) {
        if self.remaining > 0 {
            self.deadline = Some(now + TICK);
            self.stats.created += 1;
        }
    }

    fn cancel(&mut self) {
        if self.deadline.take().is_some() {
            self.stats.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_to_zero_one_second_at_a_time() {
        let t0 = Instant::now();
        let mut countdown = LocalCountdown::new(5);
        countdown.restart(t0);
        assert_eq!(countdown.remaining(), 5);

        let mut now = t0;
        for expected in (0..5).rev() {
            assert!(!countdown.fire(now), "timer must not fire early");
            now += TICK;
            assert!(countdown.fire(now));
            assert_eq!(countdown.remaining(), expected);
        }
        assert_eq!(countdown.deadline(), None);
        assert_eq!(countdown.stats().live(), 0);
        assert_eq!(countdown.stats().fired, 5);
    }

    #[test]
    fn restart_mid_flight_replaces_the_running_timer() {
        let t0 = Instant::now();
        let mut countdown = LocalCountdown::new(5);
        countdown.restart(t0);
        countdown.fire(t0 + TICK);
        countdown.fire(t0 + 2 * TICK);
        assert_eq!(countdown.remaining(), 3);

        let restarts = 4;
        for i in 0..restarts {
            countdown.restart(t0 + 2 * TICK + Duration::from_millis(100 * (i + 1)));
            assert_eq!(countdown.remaining(), 5);
            assert_eq!(countdown.stats().live(), 1);
        }

        let stats = countdown.stats();
        // Ignoring timers that fired, every creation but the live one was cancelled.
        assert_eq!(stats.cancelled, stats.created - stats.fired - 1);
    }

    #[test]
    fn back_to_back_restarts_cancel_all_but_one() {
        let t0 = Instant::now();
        let mut countdown = LocalCountdown::new(5);
        for _ in 0..10 {
            countdown.restart(t0);
        }
        let stats = countdown.stats();
        assert_eq!(stats.created, 10);
        assert_eq!(stats.cancelled, stats.created - 1);
    }

    #[test]
    fn idle_resets_display_and_disarms() {
        let t0 = Instant::now();
        let mut countdown = LocalCountdown::new(5);
        countdown.restart(t0);
        countdown.fire(t0 + TICK);
        countdown.idle();
        assert_eq!(countdown.remaining(), 5);
        assert_eq!(countdown.deadline(), None);
        assert_eq!(countdown.stats().live(), 0);
    }

    #[test]
    fn halt_keeps_display() {
        let t0 = Instant::now();
        let mut countdown = LocalCountdown::new(5);
        countdown.restart(t0);
        countdown.fire(t0 + TICK);
        countdown.halt();
        assert_eq!(countdown.remaining(), 4);
        assert!(!countdown.fire(t0 + 10 * TICK));
    }
}
