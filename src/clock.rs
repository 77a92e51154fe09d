//! Injectable monotonic clock and fixed-timestep accumulator loop (spec
//! §5, design notes "global time source").
//!
//! Uses `web_time::Instant` rather than `std::time::Instant`, matching the
//! teacher's `time_sync.rs`/session-type usage, so the same code compiles
//! for native and `wasm32` targets without a cfg split.

use std::time::Duration;

use web_time::Instant;

/// A source of monotonic time. Exists so tests can drive the tick loop
/// deterministically (design notes: "the monotonic wall clock is an
/// injected dependency") instead of depending on wall-clock timing.
pub trait Clock {
    /// The current instant, monotonically non-decreasing across calls.
    fn now(&self) -> Instant;
}

/// The real system clock, backed by `web_time::Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Default cap on ticks dispatched per [`FixedTimestepLoop::ticks_due`]
/// call (spec §5: "implementations should cap at ~5 ticks per dispatch to
/// avoid spiral-of-death").
const DEFAULT_MAX_TICKS_PER_DISPATCH: u32 = 5;

/// A fixed-timestep accumulator: absorbs real-time jitter between polls and
/// reports how many discrete simulation ticks have accrued (spec §5).
///
/// The loop itself never calls [`crate::controller::RollbackSession::tick`]
/// — it only answers "how many ticks are due right now"; the caller drives
/// the actual ticking, which keeps this type ignorant of the session it's
/// paired with.
pub struct FixedTimestepLoop<C: Clock = SystemClock> {
    clock: C,
    last_poll: Instant,
    accumulator: Duration,
    tick_duration: Duration,
    max_ticks_per_dispatch: u32,
}

impl FixedTimestepLoop<SystemClock> {
    /// Builds a loop running at `frame_rate` ticks per second on the real
    /// system clock.
    #[must_use]
    pub fn new(frame_rate: u32) -> Self {
        Self::with_clock(SystemClock, frame_rate)
    }
}

impl<C: Clock> FixedTimestepLoop<C> {
    /// Builds a loop running at `frame_rate` ticks per second, sourcing
    /// time from `clock`.
    #[must_use]
    pub fn with_clock(clock: C, frame_rate: u32) -> Self {
        let tick_duration = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
        let last_poll = clock.now();
        Self {
            clock,
            last_poll,
            accumulator: Duration::ZERO,
            tick_duration,
            max_ticks_per_dispatch: DEFAULT_MAX_TICKS_PER_DISPATCH,
        }
    }

    /// Overrides the per-dispatch tick cap (default 5).
    #[must_use]
    pub const fn with_max_ticks_per_dispatch(mut self, max: u32) -> Self {
        self.max_ticks_per_dispatch = if max == 0 { 1 } else { max };
        self
    }

    /// Advances the accumulator by the elapsed time since the last call and
    /// returns how many ticks are due, up to the dispatch cap.
    ///
    /// If real time has run far enough ahead that the cap was hit, the
    /// remaining backlog is discarded rather than carried forward — the
    /// spiral-of-death guard spec §5 calls for, since carrying it forward
    /// would just make the next call dispatch the cap again indefinitely.
    pub fn ticks_due(&mut self) -> u32 {
        let now = self.clock.now();
        self.accumulator += now.saturating_duration_since(self.last_poll);
        self.last_poll = now;

        let mut ticks = 0;
        while self.accumulator >= self.tick_duration && ticks < self.max_ticks_per_dispatch {
            self.accumulator -= self.tick_duration;
            ticks += 1;
        }
        if ticks == self.max_ticks_per_dispatch {
            self.accumulator = Duration::ZERO;
        }
        ticks
    }
}

/// A manually advanced clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct ManualClock {
    now: Instant,
}

impl ManualClock {
    /// Starts the clock at the real current instant (the starting value is
    /// arbitrary; only relative advances matter).
    #[must_use]
    pub fn new() -> Self {
        Self { now: Instant::now() }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_due_reports_zero_with_no_elapsed_time() {
        let mut loop_ = FixedTimestepLoop::with_clock(ManualClock::new(), 60);
        assert_eq!(loop_.ticks_due(), 0);
    }

    #[test]
    fn ticks_due_reports_exactly_one_tick_worth() {
        let mut loop_ = FixedTimestepLoop::with_clock(ManualClock::new(), 60);
        loop_.ticks_due(); // establishes the baseline poll instant

        loop_.clock.advance(Duration::from_millis(1000 / 60));
        assert_eq!(loop_.ticks_due(), 1);
        assert_eq!(loop_.ticks_due(), 0);
    }

    #[test]
    fn dispatch_caps_at_max_ticks_and_drops_backlog() {
        struct FakeClock(std::cell::Cell<Instant>);
        impl Clock for FakeClock {
            fn now(&self) -> Instant {
                self.0.get()
            }
        }
        let start = Instant::now();
        let fake = FakeClock(std::cell::Cell::new(start));
        let mut loop_ = FixedTimestepLoop::with_clock(fake, 60).with_max_ticks_per_dispatch(3);
        loop_.ticks_due(); // prime last_poll

        loop_.clock.0.set(start + Duration::from_secs(10));
        assert_eq!(loop_.ticks_due(), 3);
        // Backlog beyond the cap was discarded, not carried forward.
        loop_.clock.0.set(start + Duration::from_secs(10) + Duration::from_millis(1));
        assert_eq!(loop_.ticks_due(), 0);
    }
}
