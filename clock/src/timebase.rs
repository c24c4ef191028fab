//! Timer prescaler and period selection.
//!
//! The timebase timer is an up-counter that raises an update event every
//! `period` ticks, with one tick every `prescaler` CPU cycles. The prescaler
//! is picked so that one overflow is as close as possible to one millisecond
//! while the period still fits the 8-bit counter range:
//!
//! | CPU clock | Prescaler | Period | Overflow interval |
//! |-----------|-----------|--------|-------------------|
//! |     1 MHz |         4 |    250 |           1000 µs |
//! |     2 MHz |         8 |    250 |           1000 µs |
//! |     8 MHz |        32 |    250 |           1000 µs |
//! |    16 MHz |        64 |    250 |           1000 µs |
//! |    24 MHz |       128 |    187 |            997 µs |
//!
//! All of this happens in `const fn`s, so the selection is baked into the
//! binary and an unsupported clock frequency fails the build.

use core::fmt;

/// Prescaler divisors supported by the timer, in order of preference.
pub const PRESCALER_DIVISORS: [u32; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// The period must stay below this value (8-bit counter).
pub const COUNTER_RANGE: u32 = 256;

/// Sub-millisecond remainders are kept in units of 8 µs so they fit a byte.
const FRACT_SHIFT: u32 = 3;

/// Fractional ceiling: one millisecond in 8 µs units.
pub const FRACT_MAX: u8 = (1000 >> FRACT_SHIFT) as u8;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum TimebaseError {
    /// No prescaler brings the period into the counter range.
    ClockTooFast(u32),
    /// Less than one CPU cycle per millisecond.
    ClockTooSlow(u32),
}

impl fmt::Display for TimebaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockTooFast(hz) => write!(f, "No timer prescaler fits a {} Hz clock", hz),
            Self::ClockTooSlow(hz) => write!(f, "Clock too slow for a millisecond timebase ({} Hz)", hz),
        }
    }
}

/// Timer configuration and accumulator constants for one CPU clock frequency.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct Timebase {
    /// CPU clock frequency in Hz
    pub cpu_hz: u32,
    /// Timer prescaler divisor
    pub prescaler: u32,
    /// Timer ticks per overflow
    pub period: u32,
    /// Duration of one overflow in µs
    pub micros_per_overflow: u32,
    /// Whole milliseconds added per overflow
    pub millis_inc: u32,
    /// Fractional milliseconds (8 µs units) added per overflow
    pub fract_inc: u8,
    /// Fractional ceiling, see [`FRACT_MAX`]
    pub fract_max: u8,
    /// Duration of one timer tick in µs
    pub micros_per_tick: u32,
}

impl Timebase {
    /// Pick the smallest prescaler for which the per-millisecond tick count
    /// fits the counter range.
    pub const fn select(cpu_hz: u32) -> Result<Self, TimebaseError> {
        let cycles_per_ms = cpu_hz / 1000;
        if cycles_per_ms == 0 {
            return Err(TimebaseError::ClockTooSlow(cpu_hz));
        }

        let mut i = 0;
        while i < PRESCALER_DIVISORS.len() {
            let prescaler = PRESCALER_DIVISORS[i];
            if cycles_per_ms / prescaler < COUNTER_RANGE {
                return Ok(Self::with_prescaler(cpu_hz, prescaler));
            }
            i += 1;
        }
        Err(TimebaseError::ClockTooFast(cpu_hz))
    }

    /// Like [`Timebase::select`], but panics on an unsupported frequency.
    ///
    /// Use this in const context (e.g. `const TB: Timebase =
    /// Timebase::new(F_CPU);`) to turn a bad clock into a build error.
    pub const fn new(cpu_hz: u32) -> Self {
        match Self::select(cpu_hz) {
            Ok(timebase) => timebase,
            Err(TimebaseError::ClockTooFast(_)) => {
                panic!("could not find a timer prescaler for this CPU clock")
            }
            Err(TimebaseError::ClockTooSlow(_)) => {
                panic!("CPU clock too slow for a millisecond timebase")
            }
        }
    }

    const fn with_prescaler(cpu_hz: u32, prescaler: u32) -> Self {
        let period = cpu_hz / 1000 / prescaler;

        // 64 bit intermediates: prescaler * period * 10^6 exceeds u32 above ~4 MHz
        let micros_per_overflow =
            (prescaler as u64 * period as u64 * 1_000_000 / cpu_hz as u64) as u32;
        let micros_per_tick = (prescaler as u64 * 1_000_000 / cpu_hz as u64) as u32;

        Self {
            cpu_hz,
            prescaler,
            period,
            micros_per_overflow,
            millis_inc: micros_per_overflow / 1000,
            fract_inc: ((micros_per_overflow % 1000) >> FRACT_SHIFT) as u8,
            fract_max: FRACT_MAX,
            micros_per_tick,
        }
    }

    /// Whether the tick duration is a whole number of microseconds. If not,
    /// `micros()` runs slightly slow because the tick duration is truncated.
    pub const fn is_tick_exact(&self) -> bool {
        (self.prescaler as u64 * 1_000_000) % self.cpu_hz as u64 == 0
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz: prescaler={} period={} ({} µs/overflow, {} µs/tick, +{} ms +{}/{})",
            self.cpu_hz,
            self.prescaler,
            self.period,
            self.micros_per_overflow,
            self.micros_per_tick,
            self.millis_inc,
            self.fract_inc,
            self.fract_max,
        )
    }
}
