//! The hardware timer the clock is built on.

/// A periodic up-counting timer with an update (overflow) event.
///
/// Register accesses that happen while the clock is shared between the
/// interrupt handler and foreground code take `&self`.
pub trait OverflowTimer {
    /// Program the prescaler divisor and the number of ticks per period,
    /// clear a pending update flag, enable the update interrupt and start
    /// counting.
    fn start(&mut self, prescaler: u32, period: u32);

    /// Stop counting and disable the update interrupt.
    fn stop(&mut self);

    /// The live counter value, in `0..period`.
    fn counter(&self) -> u32;

    /// Whether an update event happened that was not cleared yet.
    fn is_overflow_pending(&self) -> bool;

    /// Clear the update flag. The flag must read as cleared once this
    /// returns, otherwise the interrupt is raised again for the same
    /// overflow.
    fn clear_overflow(&self);
}
