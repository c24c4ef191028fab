//! Compile-time board configuration.
//!
//! There is no runtime configuration: the timebase constants are derived
//! from [`CPU_HZ`] during the build, and an unsupported clock frequency
//! fails the build.

use wiring_clock::adc_prescaler::AdcPrescaler;
use wiring_clock::Timebase;

/// Core clock: HSI16 without AHB or APB division.
pub const CPU_HZ: u32 = 16_000_000;

/// Baudrate of the USART1 debug output
pub const DEBUG_BAUDRATE: u32 = 57_600;

/// Carrier frequency of the TIM2 PWM channels
pub const PWM_FREQUENCY_KHZ: u32 = 1;

/// Timer configuration of the millisecond clock.
pub const TIMEBASE: Timebase = Timebase::new(CPU_HZ);

/// The ADC runs from HSI16 as well.
pub const ADC_PRESCALER: AdcPrescaler = AdcPrescaler::for_clock(CPU_HZ);
