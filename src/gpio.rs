//! The port controller.
//!
//! Every setter is a read-modify-write of one 32-bit register: the field
//! owned by the pin is cleared, the new value is masked to the field width,
//! shifted into place and written back with the rest of the word intact.
//! Every getter shifts its field down to bit 0 and masks it, so bits of
//! other lines never leak into the result.
//!
//! | Register | Field width | Lines per word | Word index  | Bit offset        |
//! |----------|-------------|----------------|-------------|-------------------|
//! | `CFG`    | 3 (4 slot)  | 8              | `line / 8`  | `(line % 8) * 4`  |
//! | `DAT`    | 1           | 32             | -           | `line`            |
//! | `DRV`    | 2           | 16             | `line / 16` | `(line % 16) * 2` |
//! | `PUL`    | 2           | 16             | `line / 16` | `(line % 16) * 2` |
//!
//! Line indices must be valid for the pin's port. Lines past the end of a
//! port land in register bits the manual marks reserved, which is what the
//! hardware itself would do with such a write.

use crate::low::io::PortRegisters;
use crate::low::register::RegisterSpace;
use crate::{Drive, Function, Level, Pin, Pull};

const CFG_WIDTH: u32 = 3;
const CFG_SLOT: u32 = 4;
const CFG_LINES_PER_WORD: u8 = 8;

const PUL_WIDTH: u32 = 2;
const PUL_LINES_PER_WORD: u8 = 16;

const DRV_WIDTH: u32 = 2;
const DRV_LINES_PER_WORD: u8 = 16;

/// Position of a pin's field inside a family of registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    word: usize,
    shift: u32,
    mask: u32,
}

impl Field {
    #[inline]
    const fn locate(line: u8, lines_per_word: u8, slot: u32, width: u32) -> Self {
        Self {
            word: (line / lines_per_word) as usize,
            shift: (line % lines_per_word) as u32 * slot,
            mask: (1 << width) - 1,
        }
    }

    #[inline]
    const fn insert(self, word: u32, value: u32) -> u32 {
        (word & !(self.mask << self.shift)) | ((value & self.mask) << self.shift)
    }

    #[inline]
    const fn extract(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }
}

/// Anything the display driver can toggle lines through.
///
/// The driver never reads pins or touches configuration, so this is the
/// whole contract it needs from a controller.
pub trait PinOutput {
    /// Drive `pin` to `level`.
    fn set_value(&self, pin: Pin, level: Level);
}

impl<T: PinOutput + ?Sized> PinOutput for &T {
    fn set_value(&self, pin: Pin, level: Level) {
        (**self).set_value(pin, level);
    }
}

/// GPIO controller over a register window.
///
/// The controller owns its window. Operations take `&self` because the
/// registers are device memory rather than Rust-owned state; the window
/// types are not `Sync`, which keeps a controller on one thread.
pub struct Gpio<W: RegisterSpace> {
    space: W,
}

impl<W: RegisterSpace> Gpio<W> {
    /// Wrap a register window.
    pub fn new(space: W) -> Self {
        Self { space }
    }

    /// The underlying window.
    pub fn space(&self) -> &W {
        &self.space
    }

    /// Give the window back, e.g. to close a [`Mapping`](crate::Mapping)
    /// explicitly.
    pub fn into_inner(self) -> W {
        self.space
    }

    #[inline]
    fn port(&self, pin: Pin) -> PortRegisters<'_> {
        PortRegisters::new(&self.space, pin.port())
    }

    /// Select the function of `pin`.
    pub fn set_function(&self, pin: Pin, function: Function) {
        let field = Field::locate(pin.line(), CFG_LINES_PER_WORD, CFG_SLOT, CFG_WIDTH);
        let port = self.port(pin);
        let word = port.cfg(field.word);
        port.set_cfg(field.word, field.insert(word, u32::from(function.bits())));
    }

    /// Current function of `pin`.
    pub fn get_function(&self, pin: Pin) -> Function {
        let field = Field::locate(pin.line(), CFG_LINES_PER_WORD, CFG_SLOT, CFG_WIDTH);
        Function::from_bits(field.extract(self.port(pin).cfg(field.word)) as u8)
    }

    /// Select the pull resistor of `pin`.
    pub fn set_pull(&self, pin: Pin, pull: Pull) {
        let field = Field::locate(pin.line(), PUL_LINES_PER_WORD, PUL_WIDTH, PUL_WIDTH);
        let port = self.port(pin);
        let word = port.pul(field.word);
        port.set_pul(field.word, field.insert(word, u32::from(pull.bits())));
    }

    /// Current pull resistor of `pin`.
    pub fn get_pull(&self, pin: Pin) -> Pull {
        let field = Field::locate(pin.line(), PUL_LINES_PER_WORD, PUL_WIDTH, PUL_WIDTH);
        Pull::from_bits(field.extract(self.port(pin).pul(field.word)) as u8)
    }

    /// Select the multi-drive level of `pin`.
    pub fn set_drive(&self, pin: Pin, drive: Drive) {
        let field = Field::locate(pin.line(), DRV_LINES_PER_WORD, DRV_WIDTH, DRV_WIDTH);
        let port = self.port(pin);
        let word = port.drv(field.word);
        port.set_drv(field.word, field.insert(word, u32::from(drive.bits())));
    }

    /// Current multi-drive level of `pin`.
    pub fn get_drive(&self, pin: Pin) -> Drive {
        let field = Field::locate(pin.line(), DRV_LINES_PER_WORD, DRV_WIDTH, DRV_WIDTH);
        Drive::from_bits(field.extract(self.port(pin).drv(field.word)) as u8)
    }

    /// Write the data bit of `pin`.
    ///
    /// Only meaningful for lines configured as [`Function::OUTPUT`].
    pub fn set_value(&self, pin: Pin, level: Level) {
        let field = Field::locate(pin.line(), 32, 1, 1);
        let port = self.port(pin);
        let word = port.dat();
        port.set_dat(field.insert(word, u32::from(level.bit())));
    }

    /// Read the data bit of `pin`.
    ///
    /// For lines set to an alternate function the manual leaves the bit
    /// undefined; it is returned as read.
    pub fn get_value(&self, pin: Pin) -> Level {
        let field = Field::locate(pin.line(), 32, 1, 1);
        Level::from_bit(field.extract(self.port(pin).dat()) as u8)
    }
}

impl<W: RegisterSpace> PinOutput for Gpio<W> {
    #[inline]
    fn set_value(&self, pin: Pin, level: Level) {
        Gpio::set_value(self, pin, level);
    }
}
