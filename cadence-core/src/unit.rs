//! Schedulable units of work
//!
//! A [`Unit`] pairs a piece of [`Work`] with its next execution time, its
//! repeat interval and running statistics. Units are handed to the
//! [`Scheduler`](crate::Scheduler), which owns them from then on.

use core::fmt;

use cadence_hal::{Clock, Millis};

/// Anything the scheduler can run
///
/// `now` is the tick time the unit was dispatched at, not the time the
/// call actually starts.
pub trait Work {
    /// Run one invocation to completion
    fn run(&mut self, now: Millis);
}

impl<F: FnMut(Millis)> Work for F {
    fn run(&mut self, now: Millis) {
        self(now)
    }
}

/// Running statistics of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnitStats {
    /// Number of invocations
    pub calls: u32,
    /// Sum of (actual start - planned start) over all invocations (ms)
    pub total_delay_ms: u64,
    /// Sum of all execution durations (µs)
    pub total_duration_us: u64,
    /// Duration of the most recent invocation (µs)
    pub last_duration_us: u64,
}

impl UnitStats {
    /// Average scheduling delay, zero before the first call
    pub fn avg_delay_ms(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_delay_ms / self.calls as u64
        }
    }

    /// Average execution duration, zero before the first call
    pub fn avg_duration_us(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_duration_us / self.calls as u64
        }
    }
}

/// A periodic or one-shot unit of work
pub struct Unit<'a> {
    work: &'a mut dyn Work,
    exec_at: Millis,
    /// No start time was given and the unit has not been scheduled yet
    unplanned: bool,
    interval: Millis,
    halting: bool,
    stats: UnitStats,
}

impl<'a> Unit<'a> {
    /// Create a unit
    ///
    /// Without a `start_time` the unit first runs one `interval` after
    /// submission, whatever the clock reads at that point. An `interval` of
    /// zero makes the unit one-shot.
    pub fn new(work: &'a mut dyn Work, start_time: Option<Millis>, interval: Millis) -> Self {
        Self {
            work,
            exec_at: start_time.unwrap_or(0),
            unplanned: start_time.is_none(),
            interval,
            halting: false,
            stats: UnitStats::default(),
        }
    }

    /// Create a unit repeating every `interval`, first run one interval
    /// after submission
    pub fn periodic(work: &'a mut dyn Work, interval: Millis) -> Self {
        Self::new(work, None, interval)
    }

    /// Create a unit that runs once at `at`
    ///
    /// After its run the unit stays parked in the scheduler until it is
    /// removed or a later submit reclaims its slot.
    pub fn one_shot(work: &'a mut dyn Work, at: Millis) -> Self {
        Self::new(work, Some(at), 0)
    }

    /// Run the unit for the tick at `now`
    ///
    /// Updates statistics, measures the execution duration with `clock`
    /// and plans the next execution at `now + interval`.
    pub fn start<C: Clock>(&mut self, now: Millis, clock: &C) {
        self.stats.calls = self.stats.calls.wrapping_add(1);
        self.stats.total_delay_ms += now.saturating_sub(self.exec_at);

        let t0 = clock.now_us();
        self.work.run(now);
        let duration = clock.now_us().saturating_sub(t0);

        self.stats.last_duration_us = duration;
        self.stats.total_duration_us += duration;
        self.set_exec_at(now + self.interval);
    }

    /// Request deactivation
    ///
    /// Takes effect the next time the unit is dequeued; an invocation in
    /// progress is never interrupted.
    pub fn halt(&mut self) {
        self.halting = true;
    }

    /// Whether a halt is pending
    pub fn is_halting(&self) -> bool {
        self.halting
    }

    pub(crate) fn clear_halt(&mut self) {
        self.halting = false;
    }

    /// Repeat interval, zero for one-shot units
    pub fn interval(&self) -> Millis {
        self.interval
    }

    /// Change the repeat interval
    ///
    /// The already planned execution time is left alone.
    pub fn set_interval(&mut self, interval: Millis) {
        self.interval = interval;
    }

    /// Planned time of the next execution
    ///
    /// Zero for a unit created without a start time until it is submitted.
    pub fn exec_at(&self) -> Millis {
        self.exec_at
    }

    /// Whether the unit still waits for the scheduler to pick its first
    /// execution time
    pub(crate) fn is_unplanned(&self) -> bool {
        self.unplanned
    }

    pub(crate) fn set_exec_at(&mut self, at: Millis) {
        self.exec_at = at;
        self.unplanned = false;
    }

    /// Statistics collected so far
    pub fn stats(&self) -> &UnitStats {
        &self.stats
    }
}

impl fmt::Debug for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("exec_at", &self.exec_at)
            .field("unplanned", &self.unplanned)
            .field("interval", &self.interval)
            .field("halting", &self.halting)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_hal::mock::MockClock;
    use core::cell::Cell;

    #[test]
    fn test_start_updates_stats() {
        let clock = MockClock::new();
        let runs = Cell::new(0u32);
        let mut work = |_now: Millis| {
            runs.set(runs.get() + 1);
            clock.advance_us(750);
        };

        let mut unit = Unit::new(&mut work, Some(100), 50);
        clock.set_ms(104);
        unit.start(104, &clock);

        assert_eq!(runs.get(), 1);
        assert_eq!(unit.stats().calls, 1);
        assert_eq!(unit.stats().total_delay_ms, 4);
        assert_eq!(unit.stats().last_duration_us, 750);
        assert_eq!(unit.exec_at(), 154);

        unit.start(154, &clock);
        assert_eq!(unit.stats().calls, 2);
        assert_eq!(unit.stats().total_duration_us, 1500);
        assert_eq!(unit.stats().avg_duration_us(), 750);
        assert_eq!(unit.stats().avg_delay_ms(), 2);
    }

    #[test]
    fn test_averages_before_first_call() {
        let stats = UnitStats::default();
        assert_eq!(stats.avg_delay_ms(), 0);
        assert_eq!(stats.avg_duration_us(), 0);
    }

    #[test]
    fn test_set_interval_affects_future_only() {
        let clock = MockClock::new();
        let mut work = |_now: Millis| {};

        let mut unit = Unit::periodic(&mut work, 10);
        unit.start(0, &clock);
        assert_eq!(unit.exec_at(), 10);

        unit.set_interval(25);
        assert_eq!(unit.exec_at(), 10);

        unit.start(10, &clock);
        assert_eq!(unit.exec_at(), 35);
    }

    #[test]
    fn test_start_time_marks_unit_planned() {
        let mut a = |_now: Millis| {};
        let mut b = |_now: Millis| {};
        let mut c = |_now: Millis| {};
        let clock = MockClock::new();

        assert!(Unit::periodic(&mut a, 100).is_unplanned());
        assert!(!Unit::new(&mut b, Some(0), 100).is_unplanned());

        let mut unit = Unit::periodic(&mut c, 100);
        unit.start(0, &clock);
        assert!(!unit.is_unplanned());
        assert_eq!(unit.exec_at(), 100);
    }

    #[test]
    fn test_halt_flag() {
        let mut work = |_now: Millis| {};
        let mut unit = Unit::one_shot(&mut work, 5);
        assert!(!unit.is_halting());
        unit.halt();
        assert!(unit.is_halting());
        assert_eq!(unit.interval(), 0);
    }
}
