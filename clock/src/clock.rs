//! Millisecond and microsecond clock extended in software from a small
//! hardware timer.
//!
//! The timer overflows roughly once per millisecond (see
//! [`Timebase`](crate::timebase::Timebase)). Every overflow interrupt must
//! call [`Clock::on_overflow`], which advances the shared counters.
//! Foreground code reads them with [`Clock::millis`] and [`Clock::micros`].

use fugit::{MillisDurationU32, TimerInstantU32};

use crate::state::ClockState;
use crate::timebase::Timebase;
use crate::timer::OverflowTimer;

/// A point in time with microsecond resolution, wrapping after ~71.6 minutes.
pub type Instant = TimerInstantU32<1_000_000>;

/// Software-extended timebase timer running at `CPU_HZ`.
pub struct Clock<T, const CPU_HZ: u32> {
    timer: T,
    state: ClockState,
}

impl<T: OverflowTimer, const CPU_HZ: u32> Clock<T, CPU_HZ> {
    /// Timer configuration for `CPU_HZ`. Evaluating this for an unsupported
    /// frequency is a compile error.
    pub const TIMEBASE: Timebase = Timebase::new(CPU_HZ);

    const PERIOD: u32 = Self::TIMEBASE.period;
    const MICROS_PER_TICK: u32 = Self::TIMEBASE.micros_per_tick;

    /// Wrap the timer. The timer is not started yet.
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            state: ClockState::new(),
        }
    }

    /// Start the timer with the derived prescaler and period.
    pub fn start(&mut self) {
        self.timer.start(Self::TIMEBASE.prescaler, Self::PERIOD);
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Release the timer.
    pub fn free(self) -> T {
        self.timer
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Overflow interrupt handler body.
    ///
    /// Must be called once per update event, from the timer interrupt. The
    /// handler must not be re-entered.
    pub fn on_overflow(&self) {
        critical_section::with(|cs| self.state.advance(cs, &Self::TIMEBASE));

        // Clear the update flag only after the counters are advanced
        self.timer.clear_overflow();
    }

    /// Milliseconds since the timer was started. Wraps after ~49.7 days.
    pub fn millis(&self) -> u32 {
        critical_section::with(|cs| self.state.millis(cs))
    }

    /// Microseconds since the timer was started. Wraps after ~71.6 minutes.
    pub fn micros(&self) -> u32 {
        let (overflows, ticks) = critical_section::with(|cs| {
            let mut overflows = self.state.overflow_count(cs);
            let ticks = self.timer.counter();

            // If the update flag is set, the interrupt for an overflow that
            // already happened has not run yet. Compensate for it, unless
            // the counter was read right before the wrap.
            if self.timer.is_overflow_pending() && ticks < Self::PERIOD - 1 {
                overflows = overflows.wrapping_add(1);
            }
            (overflows, ticks)
        });

        overflows
            .wrapping_mul(Self::PERIOD)
            .wrapping_add(ticks)
            .wrapping_mul(Self::MICROS_PER_TICK)
    }

    /// Number of processed timer overflows.
    pub fn overflow_count(&self) -> u32 {
        critical_section::with(|cs| self.state.overflow_count(cs))
    }

    /// Current time as a [`fugit`] instant, for wrap-safe comparisons.
    pub fn now(&self) -> Instant {
        Instant::from_ticks(self.micros())
    }

    /// Time since the timer was started, based on [`Clock::millis`].
    pub fn uptime(&self) -> MillisDurationU32 {
        MillisDurationU32::from_ticks(self.millis())
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &ClockState {
        &self.state
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use rstest::rstest;

    /// Simulated timer. The counter only moves when the test says so.
    #[derive(Default)]
    pub struct MockTimer {
        pub counter: AtomicU32,
        pub pending: AtomicBool,
        pub running: bool,
        pub config: Option<(u32, u32)>,
    }

    impl OverflowTimer for MockTimer {
        fn start(&mut self, prescaler: u32, period: u32) {
            self.config = Some((prescaler, period));
            self.pending.store(false, Ordering::SeqCst);
            self.running = true;
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn counter(&self) -> u32 {
            self.counter.load(Ordering::SeqCst)
        }

        fn is_overflow_pending(&self) -> bool {
            self.pending.load(Ordering::SeqCst)
        }

        fn clear_overflow(&self) {
            self.pending.store(false, Ordering::SeqCst);
        }
    }

    pub type Clock16 = Clock<MockTimer, 16_000_000>;

    /// Advance the simulated counter by `ticks`, running the interrupt
    /// handler for every overflow.
    pub fn advance<const HZ: u32>(clock: &Clock<MockTimer, HZ>, ticks: u32) {
        let period = Clock::<MockTimer, HZ>::TIMEBASE.period;
        let mut counter = clock.timer().counter() + ticks;
        while counter >= period {
            counter -= period;
            clock.timer().counter.store(0, Ordering::SeqCst);
            clock.timer().pending.store(true, Ordering::SeqCst);
            clock.on_overflow();
        }
        clock.timer().counter.store(counter, Ordering::SeqCst);
    }

    #[test]
    fn test_start_programs_timer() {
        let mut clock = Clock16::new(MockTimer::default());
        clock.start();
        assert_eq!(clock.timer().config, Some((64, 250)));
        assert!(clock.timer().running);
        clock.stop();
        assert!(!clock.free().running);
    }

    #[test]
    fn test_millis_after_four_overflows() {
        let clock = Clock16::new(MockTimer::default());
        for _ in 0..4 {
            advance(&clock, 250);
        }
        assert_eq!(clock.millis(), 4);
        assert_eq!(clock.overflow_count(), 4);
        assert_eq!(clock.uptime(), MillisDurationU32::from_ticks(4));
    }

    #[test]
    fn test_on_overflow_clears_flag() {
        let clock = Clock16::new(MockTimer::default());
        clock.timer().pending.store(true, Ordering::SeqCst);
        clock.on_overflow();
        assert!(!clock.timer().is_overflow_pending());
    }

    #[test]
    fn test_overflow_counted_once() {
        let clock = Clock16::new(MockTimer::default());
        for n in 1..=5 {
            advance(&clock, 250);
            // Handled overflow: no pending flag left that micros() would
            // count a second time
            assert!(!clock.timer().is_overflow_pending());
            assert_eq!(clock.micros(), n * 1000);
            assert_eq!(clock.overflow_count(), n);
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 4)]
    #[case(249, 996)]
    #[case(250, 1000)]
    #[case(1_000, 4_000)]
    #[case(2_501, 10_004)]
    fn test_micros(#[case] ticks: u32, #[case] expected_micros: u32) {
        let clock = Clock16::new(MockTimer::default());
        advance(&clock, ticks);
        assert_eq!(clock.micros(), expected_micros);
        assert_eq!(clock.now(), Instant::from_ticks(expected_micros));
    }

    #[rstest]
    #[case(0, true)]
    #[case(10, true)]
    #[case(247, true)]
    #[case(248, true)]
    #[case(249, false)]
    fn test_micros_pending_overflow(#[case] counter: u32, #[case] compensated: bool) {
        let clock = Clock16::new(MockTimer::default());
        advance(&clock, 3 * 250);
        clock.timer().counter.store(counter, Ordering::SeqCst);
        clock.timer().pending.store(true, Ordering::SeqCst);

        let overflows = if compensated { 4 } else { 3 };
        assert_eq!(clock.micros(), (overflows * 250 + counter) * 4);
        // The counters themselves are untouched
        assert_eq!(clock.overflow_count(), 3);
    }

    #[test]
    fn test_micros_wraps() {
        let clock = Clock16::new(MockTimer::default());
        // One overflow short of 2^32 µs / 1000 µs
        let overflows = u32::MAX / 1000;
        critical_section::with(|cs| clock.state().preset(cs, overflows, overflows, 0));
        let before = clock.now();
        assert_eq!(before.ticks(), overflows * 1000);

        advance(&clock, 2 * 250);
        let after = clock.now();
        assert!(after.ticks() < before.ticks());
        assert_eq!(after.checked_duration_since(before).unwrap().ticks(), 2000);
    }

    #[test]
    fn test_millis_with_fraction() {
        let clock = Clock::<MockTimer, 24_000_000>::new(MockTimer::default());
        for _ in 0..1000 {
            advance(&clock, 187);
        }
        assert_eq!(clock.overflow_count(), 1000);
        // 1000 * 124 / 125 = 992 ms, the 8 µs fraction granularity loses the rest
        assert_eq!(clock.millis(), 992);
    }

    #[test]
    fn test_no_torn_reads() {
        // 24 MHz so that the fractional carry is exercised as well
        let clock = Clock::<MockTimer, 24_000_000>::new(MockTimer::default());
        let timebase = Clock::<MockTimer, 24_000_000>::TIMEBASE;
        let preset_millis = u32::MAX - 500;
        critical_section::with(|cs| clock.state().preset(cs, 0, preset_millis, 0));

        // Every value a reader may see, indexed by number of overflows
        let reference = ClockState::new();
        critical_section::with(|cs| reference.preset(cs, 0, preset_millis, 0));
        let mut expected = vec![preset_millis];
        for _ in 0..2000 {
            critical_section::with(|cs| {
                reference.advance(cs, &timebase);
                expected.push(reference.millis(cs));
            });
        }

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..2000 {
                    clock.on_overflow();
                }
            });
            s.spawn(|| {
                let mut last_index = 0;
                for _ in 0..5000 {
                    let millis = clock.millis();
                    let index = expected[last_index..]
                        .iter()
                        .position(|&m| m == millis)
                        .map(|offset| last_index + offset)
                        .unwrap_or_else(|| panic!("torn read: {}", millis));
                    last_index = index;
                }
            });
        });
        assert_eq!(clock.millis(), expected[2000]);
    }
}
