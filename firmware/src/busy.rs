//! Busy-wait microsecond delays.
//!
//! Unlike the millisecond delay, these never yield and do not depend on the
//! timebase interrupt, so they can be used with interrupts disabled.

use wiring_clock::{BusyDelay, BusyLoop, Calibration};

use crate::config::CPU_HZ;

/// Cycle accurate spinning with `cortex_m::asm::delay`.
pub struct CortexMBusyLoop;

impl BusyLoop for CortexMBusyLoop {
    #[inline(always)]
    fn spin(&mut self, cycles: u32) {
        cortex_m::asm::delay(cycles);
    }
}

/// Cycles spent in `BusyDelay::delay_us` outside of the spin loop on a
/// Cortex-M0+ with one flash wait state. Estimated, so requests of a
/// microsecond or two return almost immediately.
// TODO: Verify with a logic analyzer using the `delay` example
const OVERHEAD_CYCLES: u32 = 24;

pub type MicrosDelay = BusyDelay<CortexMBusyLoop, CPU_HZ>;

pub fn micros_delay() -> MicrosDelay {
    BusyDelay::new(
        CortexMBusyLoop,
        Calibration {
            overhead_cycles: OVERHEAD_CYCLES,
        },
    )
}
