//! Blocking delays.
//!
//! [`Clock::delay`] waits on the interrupt-driven clock and calls a yield
//! hook while polling. [`BusyDelay`] burns a calibrated number of CPU cycles
//! and is meant for short, precise waits where the polling jitter of
//! `Clock::delay` is too large.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::clock::Clock;
use crate::timer::OverflowTimer;

impl<T: OverflowTimer, const CPU_HZ: u32> Clock<T, CPU_HZ> {
    /// Wait for `ms` milliseconds, calling `yield_now` on every poll.
    ///
    /// Only the lower 16 bits of [`Clock::micros`] are compared. The
    /// difference to the start marker never gets much above 1000, and the
    /// wrapping subtraction stays correct when the truncated value rolls
    /// over during the wait.
    pub fn delay<Y: FnMut()>(&self, mut ms: u32, mut yield_now: Y) {
        let mut start = self.micros() as u16;

        while ms > 0 {
            yield_now();
            let now = self.micros() as u16;
            while ms > 0 && now.wrapping_sub(start) >= 1000 {
                ms -= 1;
                start = start.wrapping_add(1000);
            }
        }
    }
}

/// Burns CPU cycles without yielding.
pub trait BusyLoop {
    /// Block for (at least) `cycles` CPU cycles.
    fn spin(&mut self, cycles: u32);
}

/// Target specific timing of the [`BusyDelay`] call itself.
#[derive(Debug, Copy, Clone, Default)]
pub struct Calibration {
    /// CPU cycles spent in the call, the conversion and the return
    pub overhead_cycles: u32,
}

/// Calibrated busy-wait delay for a CPU running at `CPU_HZ`.
pub struct BusyDelay<B, const CPU_HZ: u32> {
    busy: B,
    calibration: Calibration,
}

impl<B: BusyLoop, const CPU_HZ: u32> BusyDelay<B, CPU_HZ> {
    pub fn new(busy: B, calibration: Calibration) -> Self {
        Self { busy, calibration }
    }

    /// Busy-wait for approximately `us` microseconds.
    ///
    /// Requests shorter than the call overhead return immediately.
    pub fn delay_us(&mut self, us: u32) {
        let cycles = Self::cycles_for(us);
        if cycles <= self.calibration.overhead_cycles {
            return;
        }
        self.busy.spin(cycles - self.calibration.overhead_cycles);
    }

    /// CPU cycles in `us` microseconds, saturating at `u32::MAX`.
    pub const fn cycles_for(us: u32) -> u32 {
        let cycles = us as u64 * CPU_HZ as u64 / 1_000_000;
        if cycles > u32::MAX as u64 {
            u32::MAX
        } else {
            cycles as u32
        }
    }

    pub fn free(self) -> B {
        self.busy
    }
}

/// `embedded-hal` delay provider on top of a [`Clock`].
///
/// Millisecond delays go through [`Clock::delay`] (cooperative),
/// microsecond delays through [`BusyDelay`].
pub struct ClockDelay<'a, T, Y, B, const CPU_HZ: u32> {
    clock: &'a Clock<T, CPU_HZ>,
    yield_now: Y,
    busy: BusyDelay<B, CPU_HZ>,
}

impl<'a, T, Y, B, const CPU_HZ: u32> ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    pub fn new(clock: &'a Clock<T, CPU_HZ>, yield_now: Y, busy: BusyDelay<B, CPU_HZ>) -> Self {
        Self {
            clock,
            yield_now,
            busy,
        }
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayMs<u32> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay(ms, &mut self.yield_now);
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayMs<u16> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_ms(&mut self, ms: u16) {
        self.delay_ms(u32::from(ms));
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayMs<u8> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_ms(&mut self, ms: u8) {
        self.delay_ms(u32::from(ms));
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayUs<u32> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_us(&mut self, us: u32) {
        self.busy.delay_us(us);
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayUs<u16> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_us(&mut self, us: u16) {
        self.busy.delay_us(u32::from(us));
    }
}

impl<'a, T, Y, B, const CPU_HZ: u32> DelayUs<u8> for ClockDelay<'a, T, Y, B, CPU_HZ>
where
    T: OverflowTimer,
    Y: FnMut(),
    B: BusyLoop,
{
    fn delay_us(&mut self, us: u8) {
        self.busy.delay_us(u32::from(us));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::Cell;

    use rstest::rstest;

    use crate::clock::tests::{advance, Clock16, MockTimer};

    #[derive(Default)]
    struct RecordingBusyLoop {
        spins: Vec<u32>,
    }

    impl BusyLoop for RecordingBusyLoop {
        fn spin(&mut self, cycles: u32) {
            self.spins.push(cycles);
        }
    }

    /// Run `clock.delay(ms)` with every yield advancing the clock by
    /// `step_ticks`. Returns the number of yields.
    fn run_delay(clock: &Clock16, ms: u32, step_ticks: u32) -> u32 {
        let yields = Cell::new(0);
        clock.delay(ms, || {
            yields.set(yields.get() + 1);
            advance(clock, step_ticks);
        });
        yields.get()
    }

    #[test]
    fn test_delay_zero_does_not_yield() {
        let clock = Clock16::new(MockTimer::default());
        assert_eq!(run_delay(&clock, 0, 25), 0);
        assert_eq!(clock.micros(), 0);
    }

    #[rstest]
    #[case(1, 25, 10)]
    #[case(3, 25, 30)]
    #[case(5, 500, 3)]
    #[case(2, 249, 3)]
    fn test_delay_duration(
        #[case] ms: u32,
        #[case] step_ticks: u32,
        #[case] expected_yields: u32,
    ) {
        let clock = Clock16::new(MockTimer::default());
        let yields = run_delay(&clock, ms, step_ticks);
        assert_eq!(yields, expected_yields);
        assert!(clock.micros() >= ms * 1000);
    }

    #[test]
    fn test_delay_across_16_bit_wrap() {
        let clock = Clock16::new(MockTimer::default());
        // 65 overflows = 65_000 µs, 536 µs before the 16 bit counter wraps
        for _ in 0..65 {
            advance(&clock, 250);
        }
        assert_eq!(clock.micros(), 65_000);

        let yields = run_delay(&clock, 5, 25);
        assert_eq!(yields, 50);
        assert_eq!(clock.micros(), 70_000);
    }

    #[rstest]
    #[case(16_383)] // 65_532 µs
    #[case(16_384)] // 65_536 µs, the truncated marker is 0
    #[case(16_130)] // 64_520 µs
    fn test_delay_started_near_16_bit_wrap(#[case] start_ticks: u32) {
        let clock = Clock16::new(MockTimer::default());
        advance(&clock, start_ticks);
        let start = clock.micros();

        run_delay(&clock, 7, 3);
        let elapsed = clock.micros() - start;
        // Never early, and at most one 12 µs poll step late
        assert!((7_000..7_012).contains(&elapsed), "elapsed {} µs", elapsed);
    }

    #[test]
    fn test_delay_long_wait_keeps_yielding() {
        let clock = Clock16::new(MockTimer::default());
        let yields = run_delay(&clock, 200, 250);
        assert_eq!(yields, 200);
        assert_eq!(clock.millis(), 200);
    }

    #[rstest]
    #[case(0, None)]
    #[case(1, None)]
    #[case(2, Some(12))]
    #[case(10, Some(140))]
    #[case(1_000, Some(15_980))]
    fn test_busy_delay(#[case] us: u32, #[case] expected_spin: Option<u32>) {
        let mut delay = BusyDelay::<_, 16_000_000>::new(
            RecordingBusyLoop::default(),
            Calibration {
                overhead_cycles: 20,
            },
        );
        delay.delay_us(us);
        let spins = delay.free().spins;
        assert_eq!(spins.first().copied(), expected_spin);
        assert!(spins.len() <= 1);
    }

    #[rstest]
    #[case(1_000_000, 7, 7)]
    #[case(8_000_000, 7, 56)]
    #[case(2_097_000, 1_000, 2_097)]
    #[case(32_000_000, u32::MAX, u32::MAX)]
    fn test_cycles_for(#[case] cpu_hz: u32, #[case] us: u32, #[case] expected: u32) {
        let cycles = match cpu_hz {
            1_000_000 => BusyDelay::<RecordingBusyLoop, 1_000_000>::cycles_for(us),
            8_000_000 => BusyDelay::<RecordingBusyLoop, 8_000_000>::cycles_for(us),
            2_097_000 => BusyDelay::<RecordingBusyLoop, 2_097_000>::cycles_for(us),
            _ => BusyDelay::<RecordingBusyLoop, 32_000_000>::cycles_for(us),
        };
        assert_eq!(cycles, expected);
    }

    #[test]
    fn test_clock_delay_embedded_hal() {
        let clock = Clock16::new(MockTimer::default());
        let yields = Cell::new(0);
        let mut delay = ClockDelay::new(
            &clock,
            || {
                yields.set(yields.get() + 1);
                advance(&clock, 250);
            },
            BusyDelay::new(RecordingBusyLoop::default(), Calibration::default()),
        );

        DelayMs::<u8>::delay_ms(&mut delay, 3);
        DelayMs::<u16>::delay_ms(&mut delay, 2);
        DelayMs::<u32>::delay_ms(&mut delay, 0);
        DelayUs::<u16>::delay_us(&mut delay, 10);
        drop(delay);

        assert_eq!(yields.get(), 5);
        assert_eq!(clock.millis(), 5);
    }
}
