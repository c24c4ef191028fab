//! Counters shared between the overflow interrupt and foreground code.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

use crate::timebase::Timebase;

/// The three shared counters.
///
/// Only the overflow handler writes them. Every access needs a
/// [`CriticalSection`] token so a foreground read can never observe a
/// half-written value.
pub struct ClockState {
    /// Number of processed timer overflows
    overflow_count: Mutex<Cell<u32>>,
    /// Milliseconds as of the last processed overflow
    millis: Mutex<Cell<u32>>,
    /// Sub-millisecond remainder, always below `fract_max`
    fract: Mutex<Cell<u8>>,
}

impl ClockState {
    pub const fn new() -> Self {
        Self {
            overflow_count: Mutex::new(Cell::new(0)),
            millis: Mutex::new(Cell::new(0)),
            fract: Mutex::new(Cell::new(0)),
        }
    }

    /// Account for one timer overflow.
    ///
    /// Adds the whole milliseconds of one overflow and carries the
    /// fractional part into the millisecond counter once it reaches a full
    /// millisecond. All counters wrap silently.
    #[inline(always)]
    pub fn advance(&self, cs: CriticalSection, timebase: &Timebase) {
        let millis_cell = self.millis.borrow(cs);
        let mut m = millis_cell.get();

        m = m.wrapping_add(timebase.millis_inc);
        if timebase.fract_inc != 0 {
            let fract_cell = self.fract.borrow(cs);
            let mut f = fract_cell.get();
            f += timebase.fract_inc;
            if f >= timebase.fract_max {
                f -= timebase.fract_max;
                m = m.wrapping_add(1);
            }
            fract_cell.set(f);
        }
        millis_cell.set(m);

        let overflow_cell = self.overflow_count.borrow(cs);
        overflow_cell.set(overflow_cell.get().wrapping_add(1));
    }

    pub fn millis(&self, cs: CriticalSection) -> u32 {
        self.millis.borrow(cs).get()
    }

    pub fn overflow_count(&self, cs: CriticalSection) -> u32 {
        self.overflow_count.borrow(cs).get()
    }

    pub fn fract(&self, cs: CriticalSection) -> u8 {
        self.fract.borrow(cs).get()
    }

    /// Overwrite all counters to start from a known point, e.g. right
    /// before a counter wraps.
    #[cfg(test)]
    pub(crate) fn preset(&self, cs: CriticalSection, overflow_count: u32, millis: u32, fract: u8) {
        self.overflow_count.borrow(cs).set(overflow_count);
        self.millis.borrow(cs).set(millis);
        self.fract.borrow(cs).set(fract);
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}
