//! Bit-banged driver for a 4-digit 7-segment module.
//!
//! The module carries two 74HC595 serial-in/parallel-out shift registers in
//! series, fed by three lines: serial clock (SCLK), serial data (DIO) and
//! latch clock (RCLK). Sixteen bits are clocked in, then a latch pulse
//! copies them to the outputs.
//!
//! After a full frame the register nearest the input holds the digit select
//! byte and the far one holds the segment byte:
//!
//! ```text
//! digit select   segments
//! 1000_0000      7654321 0
//! ^^^^ one bit   abcdefg dp   (0 = lit, active low)
//! ```
//!
//! The segment byte of a digit is its table pattern shifted left once with
//! the inverted decimal point in bit 0. Only one digit is ever enabled per
//! frame, so showing several digits at once relies on the caller refreshing
//! positions fast enough for persistence of vision. There is no refresh
//! loop here.

use std::time::Duration;

use crate::gpio::PinOutput;
use crate::{Level, Pin};

/// Active-low segment patterns for hex digits `0..=F`.
///
/// Bit 6 is segment a (top) down to bit 0 for segment g (middle).
pub const SEGMENT_TABLE: [u8; 16] = [
    0b000_0001, // 0
    0b100_1111, // 1
    0b001_0010, // 2
    0b000_0110, // 3
    0b100_1100, // 4
    0b010_0100, // 5
    0b010_0000, // 6
    0b000_1111, // 7
    0b000_0000, // 8
    0b000_0100, // 9
    0b000_1000, // A
    0b110_0000, // b
    0b111_0010, // c
    0b100_0010, // d
    0b011_0000, // E
    0b011_1000, // F
];

/// Number of digit positions on the module.
pub const DIGITS: u8 = 4;

/// Segment byte for `digit`, with the decimal point lit when asked.
///
/// # Panics
///
/// If `digit` is 16 or more. The table has no pattern for such values and
/// they are not folded back into range.
#[inline]
pub fn segment_byte(digit: u8, decimal_point: bool) -> u8 {
    (SEGMENT_TABLE[usize::from(digit)] << 1) | u8::from(!decimal_point)
}

/// Digit select byte for `position`.
///
/// Position 0 sets bit 7, position 3 sets bit 4; the low nibble is always
/// clear. Positions past 3 select no digit at all.
#[inline]
pub fn digit_select_byte(position: u8) -> u8 {
    0b1000u8.checked_shr(u32::from(position)).unwrap_or(0) << 4
}

/// Lines the module is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPins {
    /// Shift register clock (SCLK).
    pub serial_clock: Pin,
    /// Serial data input (DIO).
    pub serial_data: Pin,
    /// Storage register clock (RCLK).
    pub latch_clock: Pin,
}

/// Timing of the bit-banged protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Wait after every line transition so the level settles before the
    /// next edge. `Duration::ZERO` skips the wait entirely.
    pub settle: Duration,
}

impl DisplayConfig {
    /// No settle wait, for targets that follow every write synchronously.
    pub const IMMEDIATE: DisplayConfig = DisplayConfig {
        settle: Duration::ZERO,
    };
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_micros(1),
        }
    }
}

/// Driver for the shift-register display.
///
/// Holds nothing but the pin bindings and timing; what is shown lives in
/// the shift registers. `O` is usually `&Gpio<_>`, so the controller stays
/// usable for other pins.
pub struct SegmentDisplay<O: PinOutput> {
    output: O,
    pins: DisplayPins,
    config: DisplayConfig,
}

impl<O: PinOutput> SegmentDisplay<O> {
    /// Bind the driver to its lines and pull both clocks low.
    ///
    /// The lines must already be configured as outputs.
    pub fn new(output: O, pins: DisplayPins, config: DisplayConfig) -> Self {
        let display = Self {
            output,
            pins,
            config,
        };
        display.output.set_value(pins.serial_clock, Level::Low);
        display.output.set_value(pins.latch_clock, Level::Low);
        display.settle();
        log::debug!(
            "segment display on SCLK {} DIO {} RCLK {}",
            pins.serial_clock,
            pins.serial_data,
            pins.latch_clock
        );
        display
    }

    /// Lines the display is wired to.
    pub fn pins(&self) -> DisplayPins {
        self.pins
    }

    /// Timing the driver was created with.
    pub fn config(&self) -> DisplayConfig {
        self.config
    }

    #[inline]
    fn settle(&self) {
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }
    }

    #[inline]
    fn drive(&self, pin: Pin, level: Level) {
        self.output.set_value(pin, level);
        self.settle();
    }

    /// Clock `byte` into the shift registers, least significant bit first.
    pub fn shift_out(&self, byte: u8) {
        for bit in 0..8 {
            self.drive(self.pins.serial_data, Level::from_bit(byte >> bit));
            self.drive(self.pins.serial_clock, Level::High);
            self.drive(self.pins.serial_clock, Level::Low);
        }
    }

    /// Pulse the latch clock, making the shifted bits visible.
    pub fn latch(&self) {
        self.drive(self.pins.latch_clock, Level::High);
        self.drive(self.pins.latch_clock, Level::Low);
    }

    /// Turn every segment off and deselect every digit.
    pub fn clear(&self) {
        self.shift_out(0b1111_1111);
        self.shift_out(0b0000_0000);
        self.latch();
    }

    /// Show `digit` at `position`, all other positions dark.
    ///
    /// `position` 0 is the rightmost digit.
    ///
    /// # Panics
    ///
    /// If `digit` is 16 or more, see [`segment_byte`].
    pub fn display_digit(&self, position: u8, digit: u8, decimal_point: bool) {
        let segments = segment_byte(digit, decimal_point);
        let select = digit_select_byte(position);
        log::trace!("digit {:X} at {} -> {:08b} {:08b}", digit, position, select, segments);
        self.shift_out(segments);
        self.shift_out(select);
        self.latch();
    }

    /// Show the low four digits of `number` in `base`, one position at a
    /// time from position 0 (least significant).
    ///
    /// Each call lights every position once; call it repeatedly to keep
    /// the number visible.
    ///
    /// # Panics
    ///
    /// If `base` is 0, or above 16 so that a digit has no table entry.
    /// Debug builds reject any base outside `2..=16`.
    pub fn display_number(&self, number: u32, base: u32) {
        debug_assert!((2..=16).contains(&base), "base {} outside 2..=16", base);
        let mut rest = number;
        for position in 0..DIGITS {
            self.display_digit(position, (rest % base) as u8, false);
            rest /= base;
        }
    }
}
