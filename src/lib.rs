//! A64-PIO: userspace access to the Allwinner A64 port controller.
//!
//! The crate maps the PIO register page through `/dev/mem`
//! ([`Mapping`]), exposes per-pin function, pull, drive and value control on
//! top of it ([`Gpio`]), and drives a 4-digit 7-segment module built from two
//! chained 74HC595 shift registers by bit-banging three of those pins
//! ([`SegmentDisplay`]).
//!
//! The register layer is a mirror of the hardware, not a safety net: pins
//! are plain port/line bytes and a line index the port does not implement
//! writes reserved register bits, just as the silicon would. [`Pin::checked`]
//! and `"PC10".parse::<Pin>()` are available when validation is wanted.
//!
//! Everything is synchronous and single-threaded. The only waiting is the
//! fixed settle delay between line transitions of the display protocol.
#![doc = include_str!("../doc/example.md")]

pub mod display;
pub mod gpio;
mod low;
pub mod mapper;
pub mod pin;

use core::marker::PhantomData;

pub use display::{DisplayConfig, DisplayPins, SEGMENT_TABLE, SegmentDisplay};
pub use gpio::{Gpio, PinOutput};
pub use low::{
    MemoryWindow, PORT_BLOCK_SIZE, PORT_TABLE_OFFSET, PortBlock, WINDOW_SIZE, io::PortRegisters,
    port_offset, register::RegisterSpace,
};
pub use mapper::{MapConfig, MapError, Mapping, ReleaseError, ReleaseFailures};
pub use pin::{Pin, PinError};

mod private {
    // Sealed trait to keep the direction markers local to the crate.
    pub trait Sealed {}
    impl Sealed for super::Input {}
    impl Sealed for super::Output {}
}

use self::private::Sealed;

/// Logical level of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Logical low / 0.
    Low,
    /// Logical high / 1.
    High,
}

impl Level {
    /// Level of the least significant bit of `bit`; the other bits are ignored.
    #[inline]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 { Level::Low } else { Level::High }
    }

    /// `0` or `1`.
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Function select value of a line (3 bits).
///
/// `0` and `1` are input and output on every line and `7` disables the line.
/// `2..=6` select peripheral signals that differ from line to line; PC13
/// for instance offers NAND_DQ5 on 2 and SDC2_D5 on 3 (manual, p. 381).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Function(u8);

impl Function {
    /// Line is an input.
    pub const INPUT: Function = Function(0b000);
    /// Line is an output.
    pub const OUTPUT: Function = Function(0b001);
    /// Line is disconnected (reset state of most lines).
    pub const DISABLED: Function = Function(0b111);

    /// Keep the low 3 bits of `bits`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Function(bits & 0b111)
    }

    /// Alternate function `n` (2 through 6), masked like [`from_bits`](Self::from_bits).
    #[inline]
    pub const fn alternate(n: u8) -> Self {
        Self::from_bits(n)
    }

    /// Raw 3-bit select value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Pull resistor setting of a line (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pull {
    /// No pull resistor.
    Disabled = 0b00,
    /// Pull-up enabled.
    Up = 0b01,
    /// Pull-down enabled.
    Down = 0b10,
    /// Reserved encoding; reads back as written.
    Reserved = 0b11,
}

impl Pull {
    /// Decode the low 2 bits of `bits`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Pull::Disabled,
            0b01 => Pull::Up,
            0b10 => Pull::Down,
            _ => Pull::Reserved,
        }
    }

    /// Raw 2-bit register value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Multi-drive level of a line (2 bits, level 0 is the weakest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Drive {
    /// Weakest drive.
    Level0 = 0b00,
    /// Reset default.
    Level1 = 0b01,
    /// Stronger drive.
    Level2 = 0b10,
    /// Strongest drive.
    Level3 = 0b11,
}

impl Drive {
    /// Decode the low 2 bits of `bits`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Drive::Level0,
            0b01 => Drive::Level1,
            0b10 => Drive::Level2,
            _ => Drive::Level3,
        }
    }

    /// Raw 2-bit register value.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Trait implemented by the direction markers ([`Input`], [`Output`]).
///
/// Sealed, so [`Io`] only ever exists in the two known directions.
pub trait Direction: Sealed {
    /// Function the line is switched to when the handle is created.
    const FUNCTION: Function;
}

/// Marker type for an input line.
pub struct Input;
/// Marker type for an output line.
pub struct Output;

impl Direction for Input {
    const FUNCTION: Function = Function::INPUT;
}
impl Direction for Output {
    const FUNCTION: Function = Function::OUTPUT;
}

/// Typed handle to one line, configured for direction `D`.
///
/// A convenience over the raw [`Gpio`] calls for programs that treat a line
/// as a plain input or output; it borrows the controller and adds no state
/// of its own.
pub struct Io<'a, W: RegisterSpace, D: Direction> {
    gpio: &'a Gpio<W>,
    pin: Pin,
    dir: PhantomData<fn() -> D>,
}

impl<'a, W: RegisterSpace, D: Direction> Io<'a, W, D> {
    /// Switch `pin` to the function of `D` and wrap it.
    pub fn init(gpio: &'a Gpio<W>, pin: Pin) -> Self {
        gpio.set_function(pin, D::FUNCTION);
        Self {
            gpio,
            pin,
            dir: PhantomData,
        }
    }

    /// The wrapped pin.
    #[inline]
    pub fn pin(&self) -> Pin {
        self.pin
    }
}

impl<W: RegisterSpace> Io<'_, W, Input> {
    /// Select the pull resistor of this input.
    pub fn set_pull(&mut self, pull: Pull) {
        self.gpio.set_pull(self.pin, pull);
    }

    /// Read the current level of the line.
    pub fn read(&self) -> Level {
        self.gpio.get_value(self.pin)
    }
}

impl<W: RegisterSpace> Io<'_, W, Output> {
    /// Drive the line to `level`.
    #[inline]
    pub fn write(&mut self, level: Level) {
        self.gpio.set_value(self.pin, level);
    }

    /// Drive the line low.
    #[inline]
    pub fn set_low(&mut self) {
        self.write(Level::Low);
    }

    /// Drive the line high.
    #[inline]
    pub fn set_high(&mut self) {
        self.write(Level::High);
    }
}
