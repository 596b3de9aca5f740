//! Count 0..=9999 on a 74HC595 7-segment module.
//!
//! Wiring: SCLK on PC6 (pin 36), RCLK on PC10 (pin 38), DIO on PC11 (pin 40).
//! Runs forever, or for the number of seconds given as first argument.

mod common;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use a64_pio::{DisplayConfig, DisplayPins, Function, Gpio, Pin, SegmentDisplay};

const PINS: DisplayPins = DisplayPins {
    serial_clock: Pin::from_raw(0b001_00110), // PC6
    serial_data: Pin::from_raw(0b001_01011),  // PC11
    latch_clock: Pin::from_raw(0b001_01010),  // PC10
};

/// Full refreshes of each value before moving on.
const REFRESHES: usize = 60;
const REFRESH_PAUSE: Duration = Duration::from_micros(200);
const LIMIT: u32 = 9999;

fn main() -> ExitCode {
    common::init_logging();
    let run_for = match common::seconds_arg() {
        Ok(limit) => limit,
        Err(code) => return code,
    };
    let mapping = match common::open_mapping() {
        Ok(mapping) => mapping,
        Err(code) => return code,
    };
    let gpio = Gpio::new(mapping);

    for pin in [PINS.serial_clock, PINS.latch_clock, PINS.serial_data] {
        gpio.set_function(pin, Function::OUTPUT);
    }

    {
        let display = SegmentDisplay::new(&gpio, PINS, DisplayConfig::default());
        display.clear();

        let started = Instant::now();
        for counter in (0..=LIMIT).cycle() {
            if run_for.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }
            for _ in 0..REFRESHES {
                display.display_number(counter, 10);
                std::thread::sleep(REFRESH_PAUSE);
            }
            log::trace!("counter {}", counter);
        }
        display.clear();
    }

    common::close_mapping(gpio.into_inner())
}
