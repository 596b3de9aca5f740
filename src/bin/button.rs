//! Mirror a push button on PC10 (header pin 38) to an LED on PC11 (pin 40).
//!
//! Runs forever, or for the number of seconds given as first argument.

mod common;

use std::process::ExitCode;
use std::time::{Duration, Instant};

use a64_pio::{Gpio, Input, Io, Level, Output, Pin, Pull};

const BUTTON: Pin = Pin::from_raw(0b001_01010); // PC10
const LED: Pin = Pin::from_raw(0b001_01011); // PC11
const POLL: Duration = Duration::from_millis(1);

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

    {
        let mut button = Io::<_, Input>::init(&gpio, BUTTON);
        button.set_pull(Pull::Up);
        let mut led = Io::<_, Output>::init(&gpio, LED);

        log::info!("mirroring {} to {}", button.pin(), led.pin());
        let started = Instant::now();
        let mut last = None;
        while run_for.is_none_or(|limit| started.elapsed() < limit) {
            let level = button.read();
            if last != Some(level) {
                log::debug!("button {}", if level == Level::High { "released" } else { "pressed" });
                last = Some(level);
            }
            led.write(level);
            std::thread::sleep(POLL);
        }
    }

    common::close_mapping(gpio.into_inner())
}
