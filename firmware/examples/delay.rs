//! Toggle the status LED pin. Useful for verifying the delay implementation
//! using a logic analyzer.

#![cfg_attr(target_arch = "arm", no_main)]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(target_arch = "arm")]
#[rtic::app(device = stm32l0xx_hal::pac, peripherals = true)]
mod app {
    use embedded_hal::blocking::delay::{DelayMs, DelayUs};
    use panic_persist as _;
    use stm32l0xx_hal::gpio::{Output, Pin, PushPull};
    use stm32l0xx_hal::prelude::*;
    use wiring_clock::ClockDelay;
    use wiring_firmware::busy::MicrosDelay;
    use wiring_firmware::{setup, SystemClock};

    #[shared]
    struct Shared {
        clock: SystemClock,
    }

    #[local]
    struct Local {
        led: Pin<Output<PushPull>>,
        micros_delay: Option<MicrosDelay>,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let board = setup::init(ctx.device);
        (
            Shared { clock: board.clock },
            Local {
                led: board.led,
                micros_delay: Some(board.micros_delay),
            },
            init::Monotonics(),
        )
    }

    #[idle(shared = [&clock], local = [led, micros_delay])]
    fn idle(ctx: idle::Context) -> ! {
        let pin = ctx.local.led;
        let micros_delay = ctx.local.micros_delay.take().unwrap();
        let mut delay = ClockDelay::new(ctx.shared.clock, || {}, micros_delay);

        // Trigger signal: Pull low for 100 µs, then high for 50 µs
        pin.set_low().unwrap();
        delay.delay_us(100u32);
        pin.set_high().unwrap();
        delay.delay_us(50u32);

        // Toggle with increasing durations
        for i in 1..=10u32 {
            pin.set_low().unwrap();
            delay.delay_us(i);
            pin.set_high().unwrap();
            delay.delay_us(i);
        }
        for i in 1..=10u32 {
            pin.set_low().unwrap();
            delay.delay_ms(i);
            pin.set_high().unwrap();
            delay.delay_ms(i);
        }

        loop {
            cortex_m::asm::wfi();
        }
    }

    #[task(binds = TIM6, shared = [&clock], priority = 2)]
    fn tim6(ctx: tim6::Context) {
        ctx.shared.clock.on_overflow();
    }
}

#[cfg(not(target_arch = "arm"))]
fn main() {}
