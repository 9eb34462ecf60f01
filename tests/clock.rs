use std::time::{Duration, Instant};

use jclient::clock::*;

const TICK: Duration = Duration::from_millis(16);

#[test]
fn default_interval_is_16ms() {
    assert_eq!(FrameClock::default().interval(), TICK);
    assert_eq!(DEFAULT_TICK_INTERVAL, TICK);
}

#[test]
fn zero_interval_is_clamped() {
    assert_eq!(FrameClock::new(Duration::ZERO).interval(), Duration::from_millis(1));
}

#[test]
fn idle_clock_never_ticks() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    assert!(!clock.is_running());
    assert_eq!(clock.poll_tick(t0 + TICK * 100), None);
    assert_eq!(clock.next_deadline(), None);
}

#[test]
fn first_tick_is_one_interval_after_start() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    assert!(clock.start(t0));
    assert_eq!(clock.next_deadline(), Some(t0 + TICK));
    assert_eq!(clock.poll_tick(t0 + TICK / 2), None);
    assert_eq!(clock.poll_tick(t0 + TICK), Some(1));
    assert_eq!(clock.poll_tick(t0 + TICK), None);
    assert_eq!(clock.poll_tick(t0 + TICK * 2), Some(2));
    assert_eq!(clock.ticks(), 2);
}

#[test]
fn second_start_is_ignored() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    assert!(clock.start(t0));
    assert!(!clock.start(t0 + TICK * 10));
    assert_eq!(clock.next_deadline(), Some(t0 + TICK));
}

/// A long stall produces one tick, not a burst of catch-up ticks.
#[test]
fn missed_deadlines_are_not_replayed() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    clock.start(t0);

    let late = t0 + TICK * 50;
    assert_eq!(clock.poll_tick(late), Some(1));
    assert_eq!(clock.poll_tick(late), None);
    assert_eq!(clock.next_deadline(), Some(late + TICK));
}

#[test]
fn stop_takes_effect_immediately() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    clock.start(t0);
    assert_eq!(clock.poll_tick(t0 + TICK), Some(1));

    clock.stop();
    assert!(!clock.is_running());
    assert_eq!(clock.poll_tick(t0 + TICK * 1000), None);
    assert_eq!(clock.ticks(), 1);
}

#[test]
fn restart_after_stop_keeps_counting() {
    let mut clock = FrameClock::new(TICK);
    let t0 = Instant::now();
    clock.start(t0);
    clock.poll_tick(t0 + TICK);
    clock.stop();

    let t1 = t0 + TICK * 10;
    assert!(clock.start(t1));
    assert_eq!(clock.poll_tick(t1 + TICK), Some(2));
}
