//! ADC clock prescaler selection for the startup configuration.
//!
//! The ADC wants a clock of at most 2 MHz. The dividers are the ones the
//! STM32L0 `ADC_CCR.PRESC` field offers; dividing by one is never used.

use core::fmt;

/// Highest ADC clock we aim for.
pub const ADC_MAX_CLOCK_HZ: u32 = 2_000_000;

/// `ADC_CCR.PRESC` dividers, index + 1 is the register encoding.
const DIVIDERS: [u32; 11] = [2, 4, 6, 8, 10, 12, 16, 32, 64, 128, 256];

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct AdcPrescaler {
    index: u8,
}

impl AdcPrescaler {
    /// Smallest divider that brings `cpu_hz` down to at most
    /// [`ADC_MAX_CLOCK_HZ`]. Falls back to the largest divider.
    pub const fn for_clock(cpu_hz: u32) -> Self {
        let mut i = 0;
        while i < DIVIDERS.len() - 1 {
            if cpu_hz / DIVIDERS[i] <= ADC_MAX_CLOCK_HZ {
                break;
            }
            i += 1;
        }
        Self { index: i as u8 }
    }

    pub const fn divider(&self) -> u32 {
        DIVIDERS[self.index as usize]
    }

    /// Value for the 4 bit `PRESC` field.
    pub const fn bits(&self) -> u8 {
        self.index + 1
    }

    /// Resulting ADC clock in Hz.
    pub const fn adc_clock_hz(&self, cpu_hz: u32) -> u32 {
        cpu_hz / self.divider()
    }
}

impl fmt::Display for AdcPrescaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.divider())
    }
}
