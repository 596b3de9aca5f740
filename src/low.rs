//! Low-level register building blocks used by the [`Gpio`](crate::Gpio)
//! controller.
//!
//! This module defines the single unsafe boundary of the crate: a
//! [`RegisterSpace`](register::RegisterSpace) hands out the base pointer of a
//! 4 KiB window whose layout matches the A64 port controller (manual,
//! chapter 3.21). Everything above it goes through the fixed-offset
//! accessors of [`io::PortRegisters`], so no caller ever computes a raw
//! address.
//!
//! Layout of the window (offsets from the page-aligned base `0x01C2_0000`):
//!
//! | Offset   | Contents                                   |
//! |----------|--------------------------------------------|
//! | `0x800`  | PIO module base                            |
//! | `0x824`  | port table, PB first, `0x24` bytes per port |
//!
//! Each port block is `CFG0..3`, `DAT`, `DRV0..1`, `PUL0..1`, all 32 bits.
//!
//! Safety notes:
//! - Accesses are volatile so every read-modify-write reaches the device.
//! - Nothing here is atomic. Two writers on the same window can lose each
//!   other's bit-fields within a shared register word.

use core::mem::size_of;

/// Size of the mapped register window in bytes.
pub const WINDOW_SIZE: usize = 4 * 1024;

/// Offset of the PIO module inside the window.
pub const PIO_OFFSET: usize = 0x800;

/// Offset of the first port block (PB) inside the window.
pub const PORT_TABLE_OFFSET: usize = PIO_OFFSET + 0x24;

/// Register block of one port.
#[repr(C)]
pub struct PortBlock {
    /// `Pn_CFG0..3`, function select, 4 bits per line.
    pub cfg: [u32; 4],
    /// `Pn_DAT`, one bit per line.
    pub dat: u32,
    /// `Pn_DRV0..1`, multi-drive level, 2 bits per line.
    pub drv: [u32; 2],
    /// `Pn_PUL0..1`, pull resistor, 2 bits per line.
    pub pul: [u32; 2],
}

/// Stride between consecutive port blocks.
pub const PORT_BLOCK_SIZE: usize = size_of::<PortBlock>();

static_assertions::const_assert_eq!(PORT_BLOCK_SIZE, 0x24);
// A 3-bit port index can never leave the window.
static_assertions::const_assert!(PORT_TABLE_OFFSET + 8 * PORT_BLOCK_SIZE <= WINDOW_SIZE);

/// Byte offset of the block of `port` from the window base.
#[inline]
pub const fn port_offset(port: u8) -> usize {
    PORT_TABLE_OFFSET + (port & 0b111) as usize * PORT_BLOCK_SIZE
}

/// The unsafe seam between a register window provider and the controller.
pub mod register {
    use core::ptr::NonNull;

    /// A readable and writable window laid out like the A64 PIO page.
    ///
    /// # Safety
    ///
    /// `base()` must return a pointer that is 4-byte aligned and valid for
    /// volatile reads and writes of [`WINDOW_SIZE`](super::WINDOW_SIZE)
    /// bytes for as long as the implementor is alive, and it must return the
    /// same pointer on every call.
    pub unsafe trait RegisterSpace {
        /// Base address of the window.
        fn base(&self) -> NonNull<u8>;
    }

    unsafe impl<T: RegisterSpace + ?Sized> RegisterSpace for &T {
        fn base(&self) -> NonNull<u8> {
            (**self).base()
        }
    }
}

/// Typed access to one port block.
pub mod io {
    use core::marker::PhantomData;
    use core::ptr::{self, NonNull};

    use super::register::RegisterSpace;
    use super::{PortBlock, port_offset};

    /// Volatile view over the register block of a single port.
    ///
    /// Borrowing the space ties the view to the window's lifetime; the view
    /// itself is only a pointer and is cheap to rebuild per operation.
    pub struct PortRegisters<'a> {
        block: NonNull<PortBlock>,
        space: PhantomData<&'a ()>,
    }

    impl<'a> PortRegisters<'a> {
        /// View of the block of `port` inside `space`.
        #[inline]
        pub fn new<S: RegisterSpace + ?Sized>(space: &'a S, port: u8) -> Self {
            // SAFETY: port_offset stays inside the window for every u8
            // (checked at compile time above), so the sum is in bounds of
            // the allocation promised by RegisterSpace.
            let block = unsafe { space.base().add(port_offset(port)) }.cast::<PortBlock>();
            Self {
                block,
                space: PhantomData,
            }
        }

        #[inline]
        pub fn cfg(&self, index: usize) -> u32 {
            // SAFETY: `block` points at a live PortBlock, index is bounds-checked.
            unsafe { ptr::addr_of!((*self.block.as_ptr()).cfg[index]).read_volatile() }
        }

        #[inline]
        pub fn set_cfg(&self, index: usize, value: u32) {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of_mut!((*self.block.as_ptr()).cfg[index]).write_volatile(value) }
        }

        #[inline]
        pub fn dat(&self) -> u32 {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of!((*self.block.as_ptr()).dat).read_volatile() }
        }

        #[inline]
        pub fn set_dat(&self, value: u32) {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of_mut!((*self.block.as_ptr()).dat).write_volatile(value) }
        }

        #[inline]
        pub fn drv(&self, index: usize) -> u32 {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of!((*self.block.as_ptr()).drv[index]).read_volatile() }
        }

        #[inline]
        pub fn set_drv(&self, index: usize, value: u32) {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of_mut!((*self.block.as_ptr()).drv[index]).write_volatile(value) }
        }

        #[inline]
        pub fn pul(&self, index: usize) -> u32 {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of!((*self.block.as_ptr()).pul[index]).read_volatile() }
        }

        #[inline]
        pub fn set_pul(&self, index: usize, value: u32) {
            // SAFETY: as in `cfg`.
            unsafe { ptr::addr_of_mut!((*self.block.as_ptr()).pul[index]).write_volatile(value) }
        }
    }
}

/// Heap-backed register window.
///
/// Behaves like plain memory: whatever is written is read back. Useful for
/// running the controller and the display driver without hardware, and for
/// inspecting the exact register words they produce.
pub struct MemoryWindow {
    words: Box<[core::cell::Cell<u32>]>,
}

impl MemoryWindow {
    /// A zero-filled window.
    pub fn new() -> Self {
        Self {
            words: (0..WINDOW_SIZE / 4).map(|_| core::cell::Cell::new(0)).collect(),
        }
    }

    /// Read the 32-bit word at byte `offset`.
    ///
    /// # Panics
    ///
    /// If `offset` is not 4-aligned or lies outside the window.
    pub fn read_word(&self, offset: usize) -> u32 {
        assert_eq!(offset % 4, 0, "unaligned register offset {:#x}", offset);
        self.words[offset / 4].get()
    }

    /// Write the 32-bit word at byte `offset`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`read_word`](Self::read_word).
    pub fn write_word(&self, offset: usize, value: u32) {
        assert_eq!(offset % 4, 0, "unaligned register offset {:#x}", offset);
        self.words[offset / 4].set(value);
    }

    /// Copy of the whole window, one entry per 32-bit word.
    pub fn snapshot(&self) -> Vec<u32> {
        self.words.iter().map(core::cell::Cell::get).collect()
    }
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the boxed slice holds WINDOW_SIZE bytes of u32 cells, is never
// reallocated, and Cell permits writes through shared references.
unsafe impl register::RegisterSpace for MemoryWindow {
    fn base(&self) -> core::ptr::NonNull<u8> {
        core::ptr::NonNull::from(&*self.words).cast::<u8>()
    }
}
