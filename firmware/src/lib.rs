#![cfg_attr(not(test), no_std)]
#![cfg(target_arch = "arm")]
//! STM32L071 binding for `wiring-clock`: TIM6 timebase, busy-wait delays
//! and the one-time startup configuration.

pub mod busy;
pub mod config;
pub mod setup;
pub mod timer;

/// The millisecond clock of this board.
pub type SystemClock = wiring_clock::Clock<timer::Tim6Timer, { config::CPU_HZ }>;
