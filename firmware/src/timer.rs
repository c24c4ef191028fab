//! Timebase timer on TIM6.
//!
//! TIM6 is a basic 16-bit up-counter. It counts `0..period` at
//! `CPU_HZ / prescaler` and raises the update interrupt on every wrap. The
//! clock only ever uses the lower 8 bits of the counter range.

use stm32l0xx_hal::pac;
use wiring_clock::OverflowTimer;

/// TIM6 driven as an [`OverflowTimer`].
///
/// The register block is accessed through its raw pointer so that the
/// timer can be shared (`&self`) between the interrupt handler and
/// foreground code. Ownership of `pac::TIM6` is taken in [`Tim6Timer::new`].
pub struct Tim6Timer {
    _private: (),
}

impl Tim6Timer {
    pub fn new(tim6: pac::TIM6) -> Self {
        // Correctness: Since we only modify TIM6 related registers in the RCC
        // register block, and since we own pac::TIM6, we should be safe.
        unsafe {
            let rcc = &*pac::RCC::ptr();

            // Enable timer clock
            rcc.apb1enr.modify(|_, w| w.tim6en().set_bit());

            // Reset timer
            rcc.apb1rstr.modify(|_, w| w.tim6rst().set_bit());
            rcc.apb1rstr.modify(|_, w| w.tim6rst().clear_bit());
        }
        drop(tim6);

        Self { _private: () }
    }

    #[inline(always)]
    fn regs(&self) -> &pac::tim6::RegisterBlock {
        // Note(unsafe): We own TIM6 (see `new`), all accesses go through
        // this type.
        unsafe { &*pac::TIM6::ptr() }
    }
}

impl OverflowTimer for Tim6Timer {
    fn start(&mut self, prescaler: u32, period: u32) {
        let tim6 = self.regs();

        // Only counter overflows raise an update interrupt, not the UG bit
        tim6.cr1.modify(|_, w| w.urs().set_bit());

        tim6.psc.write(|w| w.psc().bits((prescaler - 1) as u16));

        // Subtract 1 from the ARR register because the update event is
        // triggered *after* that tick.
        tim6.arr.write(|w| unsafe { w.arr().bits((period - 1) as u16) });

        // Trigger update event (UEV) in the event generation register (EGR)
        // in order to immediately apply the config
        tim6.egr.write(|w| w.ug().set_bit());

        self.clear_overflow();
        tim6.dier.modify(|_, w| w.uie().set_bit());
        tim6.cr1.modify(|_, w| w.cen().set_bit());
    }

    fn stop(&mut self) {
        let tim6 = self.regs();
        tim6.cr1.modify(|_, w| w.cen().clear_bit());
        tim6.dier.modify(|_, w| w.uie().clear_bit());
    }

    #[inline(always)]
    fn counter(&self) -> u32 {
        self.regs().cnt.read().cnt().bits() as u32
    }

    #[inline(always)]
    fn is_overflow_pending(&self) -> bool {
        // Return whether the UIF (update interrupt) flag in the SR
        // (status register) is set.
        self.regs().sr.read().uif().bit_is_set()
    }

    #[inline(always)]
    fn clear_overflow(&self) {
        let tim6 = self.regs();
        tim6.sr.modify(|_, w| w.uif().clear_bit());
        // Read back so the write has reached the peripheral before the
        // interrupt handler returns. A late clear re-pends TIM6.
        let _ = tim6.sr.read();
    }
}
