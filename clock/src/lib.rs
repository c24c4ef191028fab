#![cfg_attr(not(test), no_std)]
//! # Timer-Driven Clock
//!
//! Arduino-style `millis()`, `micros()` and delays on top of a small
//! periodically overflowing hardware timer.
//!
//! - [`timebase`]: picks the timer prescaler and period for the CPU clock at
//!   compile time.
//! - [`Clock`]: extends the timer in software. The timer interrupt calls
//!   [`Clock::on_overflow`], foreground code calls [`Clock::millis`] and
//!   [`Clock::micros`].
//! - [`delay`]: cooperative millisecond delays and calibrated busy waits.
//!
//! The hardware is reached through the [`OverflowTimer`] trait. Shared
//! counters are protected with the [`critical_section`] crate, the target
//! has to provide an implementation (e.g. the `critical-section-single-core`
//! feature of `cortex-m`).

pub mod adc_prescaler;
pub mod clock;
pub mod delay;
pub mod state;
pub mod timebase;
pub mod timer;

pub use crate::clock::{Clock, Instant};
pub use crate::delay::{BusyDelay, BusyLoop, Calibration, ClockDelay};
pub use crate::timebase::{Timebase, TimebaseError};
pub use crate::timer::OverflowTimer;
