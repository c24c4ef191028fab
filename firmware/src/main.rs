#![cfg_attr(target_arch = "arm", no_main)]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(target_arch = "arm")]
#[rtic::app(device = stm32l0xx_hal::pac, peripherals = true)]
mod app {
    // Libcore
    use core::fmt::Write;

    // Third party
    use panic_persist as _;
    use stm32l0xx_hal::gpio::{Output, Pin, PushPull};
    use stm32l0xx_hal::{pac, prelude::*, serial};

    // First party crates
    use wiring_firmware::busy::MicrosDelay;
    use wiring_firmware::{config, setup, SystemClock};

    const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// LED blink half-period in milliseconds
    const BLINK_MS: u32 = 500;

    #[shared]
    struct Shared {
        // Millisecond clock, advanced by the TIM6 interrupt
        clock: SystemClock,
    }

    #[local]
    struct Local {
        // Serial debug output
        debug: serial::Serial<pac::USART1>,

        // Status LED
        led: Pin<Output<PushPull>>,

        // Busy-wait delay provider
        micros_delay: MicrosDelay,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        let board = setup::init(ctx.device);
        let mut debug = board.debug;

        writeln!(debug, "Booting: wiring firmware={}", FIRMWARE_VERSION).unwrap();

        // Check whether we just woke up after a panic
        if let Some(msg) = panic_persist::get_panic_message_utf8() {
            // If yes, send backtrace via serial
            writeln!(debug, "=== 🔥 FOUND PANIC 🔥 ===").ok();
            writeln!(debug, "{}", msg.trim_end()).ok();
            writeln!(debug, "==== 🚒 END PANIC 🚒 ====").ok();
        }

        if cfg!(feature = "dev") {
            writeln!(debug, "Timebase: {}", config::TIMEBASE).unwrap();
            writeln!(debug, "ADC prescaler: {}", config::ADC_PRESCALER).unwrap();
            if !config::TIMEBASE.is_tick_exact() {
                writeln!(debug, "Warning: micros() tick duration is truncated").unwrap();
            }
        }

        writeln!(debug, "Initialization done").unwrap();

        (
            Shared { clock: board.clock },
            Local {
                debug,
                led: board.led,
                micros_delay: board.micros_delay,
            },
            init::Monotonics(),
        )
    }

    /// Blink the status LED and report the clock.
    #[idle(shared = [&clock], local = [debug, led, micros_delay])]
    fn idle(ctx: idle::Context) -> ! {
        let clock: &SystemClock = ctx.shared.clock;
        let debug = ctx.local.debug;
        let led = ctx.local.led;
        let micros_delay = ctx.local.micros_delay;

        let mut last = clock.now();
        loop {
            led.set_high().ok();
            // Short pulse marker on the LED, visible on a logic analyzer
            micros_delay.delay_us(50);
            led.set_low().ok();
            micros_delay.delay_us(50);
            led.set_high().ok();
            clock.delay(BLINK_MS, cortex_m::asm::nop);
            led.set_low().ok();
            clock.delay(BLINK_MS, cortex_m::asm::nop);

            let now = clock.now();
            let elapsed = now.checked_duration_since(last).map(|d| d.ticks());
            last = now;
            writeln!(
                debug,
                "millis={} micros={} loop={:?} µs",
                clock.millis(),
                now.ticks(),
                elapsed,
            )
            .ok();
        }
    }

    /// Timebase overflow: advance the clock.
    #[task(binds = TIM6, shared = [&clock], priority = 2)]
    fn tim6(ctx: tim6::Context) {
        ctx.shared.clock.on_overflow();
    }
}

#[cfg(not(target_arch = "arm"))]
fn main() {}
