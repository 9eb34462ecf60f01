use std::time::{Duration, Instant};

/// Default tick interval, roughly 60 Hz.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Fixed-interval tick scheduler.
///
/// The clock owns no callback and no engine access; the session polls it and
/// runs the tick itself. Timing is best effort: a late poll fires one tick and
/// schedules the next one a full interval later. Missed deadlines are never
/// replayed, so a stall cannot turn into a burst of catch-up ticks.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    next_due: Option<Instant>,
    ticks: u64,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_due: None,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration { self.interval }

    /// Ticks fired since construction.
    pub fn ticks(&self) -> u64 { self.ticks }

    pub fn is_running(&self) -> bool { self.next_due.is_some() }

    /// Starts ticking; the first tick is due one interval after `now`.
    /// Returns `false` (and changes nothing) if the clock is already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.next_due.is_some() {
            return false;
        }
        self.next_due = Some(now + self.interval);
        true
    }

    /// Stops ticking. Effective immediately: no `poll_tick` after this returns
    /// fires, whatever deadline had been scheduled.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Fires at most one tick if its deadline has passed, returning the tick
    /// number.
    pub fn poll_tick(&mut self, now: Instant) -> Option<u64> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        self.next_due = Some(now + self.interval);
        self.ticks += 1;
        Some(self.ticks)
    }

    /// Deadline of the next tick, for hosts that sleep between events.
    pub fn next_deadline(&self) -> Option<Instant> { self.next_due }
}

impl Default for FrameClock {
    fn default() -> Self { Self::new(DEFAULT_TICK_INTERVAL) }
}
