//! One-time startup configuration of the chip.
//!
//! Must run exactly once, before anything reads the clock.

use stm32l0xx_hal::{
    self as hal,
    adc::{self, Adc},
    gpio::{Output, Pin, PushPull},
    pac,
    prelude::*,
    pwm, serial, time,
};

use crate::busy::{micros_delay, MicrosDelay};
use crate::config::{ADC_PRESCALER, DEBUG_BAUDRATE, PWM_FREQUENCY_KHZ};
use crate::timer::Tim6Timer;
use crate::SystemClock;

/// Everything `init` configured.
pub struct Board {
    /// Running millisecond clock. The TIM6 interrupt must call
    /// `on_overflow`.
    pub clock: SystemClock,
    /// Busy-wait microsecond delays
    pub micros_delay: MicrosDelay,
    /// Serial debug output
    pub debug: serial::Serial<pac::USART1>,
    /// Status LED
    pub led: Pin<Output<PushPull>>,
    /// PWM timer. The channels are not connected to any pin yet.
    pub pwm: pwm::Timer<pac::TIM2>,
    /// ADC, clocked with `ADC_PRESCALER`
    pub adc: Adc<adc::Ready>,
}

/// Configure clocks, GPIO ports, the debug serial port, the timebase
/// timer, the PWM timer and the ADC.
///
/// The TIM6 interrupt is unmasked in the NVIC, but interrupts are not
/// enabled globally. RTIC does that after `#[init]` returns.
pub fn init(dp: pac::Peripherals) -> Board {
    // Timebase timer. Take it before freezing the RCC.
    let timer = Tim6Timer::new(dp.TIM6);

    // Clock configuration. Use HSI at 16 MHz, see `config::CPU_HZ`.
    let mut rcc = dp.RCC.freeze(hal::rcc::Config::hsi16());

    // Get access to GPIOs (all pins start out in their reset state)
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);

    // Initialize debug serial port
    let debug = serial::Serial::usart1(
        dp.USART1,
        gpiob.pb6.into_floating_input(),
        gpiob.pb7.into_floating_input(),
        serial::Config {
            baudrate: time::Bps(DEBUG_BAUDRATE),
            wordlength: serial::WordLength::DataBits8,
            parity: serial::Parity::ParityNone,
            stopbits: serial::StopBits::STOP1,
        },
        &mut rcc,
    )
    .expect("Could not initialize debug serial port");

    // Start the millisecond clock
    let mut clock = SystemClock::new(timer);
    clock.start();

    // TIM2 is used for hardware PWM. Channels get a pin assigned on first
    // use, until then the outputs stay disabled.
    let pwm = pwm::Timer::new(dp.TIM2, PWM_FREQUENCY_KHZ.khz(), &mut rcc);

    // Keep the ADC clock at or below 2 MHz. PRESC only applies while the
    // ADC is disabled and clocked asynchronously (CKMODE = 0).
    let adc = dp.ADC.constrain(&mut rcc);
    // Note(unsafe): We own the ADC, the ADC is not enabled at this point.
    unsafe {
        let adc_regs = &*pac::ADC::ptr();
        adc_regs.cfgr2.modify(|_, w| w.ckmode().bits(0b00));
        adc_regs
            .ccr
            .modify(|_, w| w.presc().bits(ADC_PRESCALER.bits()));
    }

    // Initialize status LED
    let mut led = gpioa.pa7.into_push_pull_output().downgrade();
    led.set_low().ok();

    // Let the timebase interrupt through once interrupts are enabled
    unsafe { cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM6) };

    Board {
        clock,
        micros_delay: micros_delay(),
        debug,
        led,
        pwm,
        adc,
    }
}
