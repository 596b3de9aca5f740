//! Controller and display driver wired together over an in-memory window.

use a64_pio::display::digit_select_byte;
use a64_pio::{
    DisplayConfig, DisplayPins, Function, Gpio, Level, MemoryWindow, Pin, PinOutput,
    SegmentDisplay, port_offset,
};

const SCLK: Pin = Pin::from_raw(0b001_00110); // PC6
const DIO: Pin = Pin::from_raw(0b001_01011); // PC11
const RCLK: Pin = Pin::from_raw(0b001_01010); // PC10

fn pins() -> DisplayPins {
    DisplayPins {
        serial_clock: SCLK,
        serial_data: DIO,
        latch_clock: RCLK,
    }
}

/// Counts how often each line goes high, on top of the real controller.
struct EdgeCounter<'a, O: PinOutput> {
    inner: &'a O,
    rises: std::cell::RefCell<Vec<Pin>>,
}

impl<O: PinOutput> PinOutput for EdgeCounter<'_, O> {
    fn set_value(&self, pin: Pin, level: Level) {
        if level == Level::High {
            self.rises.borrow_mut().push(pin);
        }
        self.inner.set_value(pin, level);
    }
}

#[test]
fn display_leaves_clocks_low_and_other_lines_untouched() {
    let window = MemoryWindow::new();
    let gpio = Gpio::new(&window);
    for pin in [SCLK, RCLK, DIO] {
        gpio.set_function(pin, Function::OUTPUT);
    }
    // An unrelated output on the same port, driven high.
    let other = Pin::new(1, 2);
    gpio.set_function(other, Function::OUTPUT);
    gpio.set_value(other, Level::High);
    let cfg_before = window.read_word(port_offset(1));

    let display = SegmentDisplay::new(&gpio, pins(), DisplayConfig::IMMEDIATE);
    display.clear();
    display.display_number(4321, 10);

    assert_eq!(gpio.get_value(SCLK), Level::Low);
    assert_eq!(gpio.get_value(RCLK), Level::Low);
    assert_eq!(gpio.get_value(other), Level::High);
    assert_eq!(window.read_word(port_offset(1)), cfg_before);
    // Last bit shifted is bit 7 of the select byte for position 3.
    assert_eq!(gpio.get_value(DIO), Level::from_bit(digit_select_byte(3) >> 7));
}

#[test]
fn one_number_is_four_frames_of_sixteen_bits() {
    let window = MemoryWindow::new();
    let gpio = Gpio::new(&window);
    let counter = EdgeCounter {
        inner: &gpio,
        rises: Default::default(),
    };
    let display = SegmentDisplay::new(&counter, pins(), DisplayConfig::IMMEDIATE);
    display.display_number(42, 10);

    let rises = counter.rises.borrow();
    assert_eq!(rises.iter().filter(|&&p| p == SCLK).count(), 4 * 16);
    assert_eq!(rises.iter().filter(|&&p| p == RCLK).count(), 4);
}
