//! Mapping of the PIO register page into the process.
//!
//! The page is reached through the physical-memory character device. The
//! mapping is placed at an address chosen here rather than by the kernel:
//! a buffer of `map_len + page_size - 1` bytes is allocated, the first
//! page-aligned address inside it is computed, and the device is mapped
//! over exactly that address with `MAP_FIXED`.
//!
//! Acquisition is all-or-nothing. If opening, allocating or mapping fails,
//! whatever was already acquired is released before the error is returned.
//! Release attempts both of its steps even when the first one fails and
//! reports the failures together.

use core::fmt;
use core::ptr::NonNull;
use std::alloc::{self, Layout};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use crate::low::WINDOW_SIZE;
use crate::low::register::RegisterSpace;

/// Page-aligned physical address of the window holding the PIO block.
///
/// The PIO module itself starts at `0x01C2_0800` (manual, p. 376), which is
/// not a page boundary, so the enclosing page is mapped instead.
pub const PIO_PAGE_BASE: u64 = 0x01C2_0000;

/// Where to map the window from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    /// Character device (or file) backing the window.
    pub device: PathBuf,
    /// Offset of the window within `device`. Must be page-aligned.
    pub physical_base: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/mem"),
            physical_base: PIO_PAGE_BASE,
        }
    }
}

/// Failure to acquire the register window.
#[derive(Debug)]
pub enum MapError {
    /// The device could not be opened.
    Open(io::Error),
    /// The alignment buffer could not be allocated.
    Allocation,
    /// The device could not be mapped at the aligned address.
    Map(io::Error),
}

impl MapError {
    /// Negative status code for command line consumers.
    pub fn code(&self) -> i32 {
        match self {
            MapError::Open(_) => -2,
            MapError::Allocation => -3,
            MapError::Map(_) => -4,
        }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Open(err) => write!(f, "failed to open register device: {}", err),
            MapError::Allocation => write!(f, "failed to allocate the alignment buffer"),
            MapError::Map(err) => write!(f, "failed to map register window: {}", err),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Open(err) | MapError::Map(err) => Some(err),
            MapError::Allocation => None,
        }
    }
}

bitflags::bitflags! {
    /// Release steps that failed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ReleaseFailures: u8 {
        /// The device mapping could not be removed.
        const UNMAP = 1 << 0;
        /// The device handle could not be closed.
        const CLOSE = 1 << 1;
    }
}

/// Failure to release the register window.
///
/// Carries the raw OS error of each failed step so the outcome can be
/// reported again by later [`Mapping::close`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseError {
    unmap: Option<i32>,
    close: Option<i32>,
}

impl ReleaseError {
    /// Which steps failed.
    pub fn failures(&self) -> ReleaseFailures {
        let mut failures = ReleaseFailures::empty();
        failures.set(ReleaseFailures::UNMAP, self.unmap.is_some());
        failures.set(ReleaseFailures::CLOSE, self.close.is_some());
        failures
    }

    /// OS error of the unmap step, if it failed.
    pub fn unmap_error(&self) -> Option<io::Error> {
        self.unmap.map(io::Error::from_raw_os_error)
    }

    /// OS error of the close step, if it failed.
    pub fn close_error(&self) -> Option<io::Error> {
        self.close.map(io::Error::from_raw_os_error)
    }
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to release register window")?;
        if let Some(err) = self.unmap_error() {
            write!(f, "; unmap: {}", err)?;
        }
        if let Some(err) = self.close_error() {
            write!(f, "; close: {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReleaseError {}

fn errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}

/// Size of a virtual memory page on this system.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

/// Heap region the window is mapped into.
struct AlignBuffer {
    raw: NonNull<u8>,
    layout: Layout,
}

impl AlignBuffer {
    fn allocate(size: usize) -> Result<Self, MapError> {
        let layout = Layout::from_size_align(size, 1).map_err(|_| MapError::Allocation)?;
        // SAFETY: size is non-zero (it includes at least one window).
        let raw = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(MapError::Allocation)?;
        Ok(Self { raw, layout })
    }

    /// First address inside the buffer that is a multiple of `page`.
    fn aligned(&self, page: usize) -> NonNull<u8> {
        let offset = self.raw.as_ptr().align_offset(page);
        // SAFETY: offset < page and the buffer is at least page - 1 bytes
        // longer than the mapping.
        unsafe { self.raw.add(offset) }
    }
}

impl Drop for AlignBuffer {
    fn drop(&mut self) {
        // SAFETY: raw was returned by alloc with this layout.
        unsafe { alloc::dealloc(self.raw.as_ptr(), self.layout) }
    }
}

/// Exclusive owner of the mapped register window.
///
/// Created by [`Mapping::open`]; released by [`Mapping::close`] or, failing
/// that, on drop. The window pointer is page-aligned and stays valid until
/// release.
pub struct Mapping {
    file: Option<File>,
    buffer: Option<AlignBuffer>,
    window: Option<NonNull<u8>>,
    map_len: usize,
    released: Option<Result<(), ReleaseError>>,
}

impl Mapping {
    /// Map the PIO page from `/dev/mem`.
    pub fn open() -> Result<Self, MapError> {
        Self::open_with(&MapConfig::default())
    }

    /// Map the window described by `config`.
    pub fn open_with(config: &MapConfig) -> Result<Self, MapError> {
        let page = page_size();
        let map_len = WINDOW_SIZE.next_multiple_of(page);
        let mut mapping = Self {
            file: None,
            buffer: None,
            window: None,
            map_len,
            released: None,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(&config.device)
            .map_err(|err| {
                log::error!("open {}: {}", config.device.display(), err);
                MapError::Open(err)
            })?;
        let fd = file.as_raw_fd();
        mapping.file = Some(file);

        // On error `mapping` is dropped here, closing what was opened.
        let buffer = AlignBuffer::allocate(map_len + page - 1)?;
        let aligned = buffer.aligned(page);
        mapping.buffer = Some(buffer);

        // SAFETY: [aligned, aligned + map_len) lies inside the buffer we own,
        // so replacing those pages cannot clobber anything else.
        let ptr = unsafe {
            libc::mmap(
                aligned.as_ptr().cast(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                fd,
                config.physical_base as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            log::error!("mmap {:#x}: {}", config.physical_base, err);
            return Err(MapError::Map(err));
        }
        mapping.window = Some(aligned);

        log::debug!(
            "mapped {} at {:#x} -> {:p} ({} bytes, page {})",
            config.device.display(),
            config.physical_base,
            aligned,
            map_len,
            page
        );
        Ok(mapping)
    }

    /// Whether [`close`](Self::close) has already run.
    pub fn is_released(&self) -> bool {
        self.released.is_some()
    }

    /// Release the mapping and the device handle.
    ///
    /// Both steps are attempted regardless of each other. Once run, further
    /// calls return the same outcome without touching anything.
    pub fn close(&mut self) -> Result<(), ReleaseError> {
        if let Some(outcome) = self.released {
            return outcome;
        }

        let mut error = ReleaseError {
            unmap: None,
            close: None,
        };

        if let Some(window) = self.window.take() {
            if let Err(err) = self.unmap(window) {
                log::error!("unmap {:p}: {}", window, err);
                error.unmap = Some(errno(&err));
                // The device is still mapped into the buffer; returning it
                // to the allocator would hand out device memory.
                if let Some(buffer) = self.buffer.take() {
                    core::mem::forget(buffer);
                }
            }
        }
        drop(self.buffer.take());

        if let Some(file) = self.file.take() {
            // SAFETY: into_raw_fd gives up ownership, so the descriptor is
            // closed exactly once.
            if unsafe { libc::close(file.into_raw_fd()) } == -1 {
                let err = io::Error::last_os_error();
                log::error!("close: {}", err);
                error.close = Some(errno(&err));
            }
        }

        let outcome = if error.failures().is_empty() {
            log::debug!("register window released");
            Ok(())
        } else {
            Err(error)
        };
        self.released = Some(outcome);
        outcome
    }

    /// Drop the device mapping by putting private anonymous pages back in
    /// its place, so the buffer is ordinary memory again before it is freed.
    fn unmap(&self, window: NonNull<u8>) -> io::Result<()> {
        // SAFETY: window..window + map_len is the fixed mapping created in
        // open_with and lies inside our buffer.
        let ptr = unsafe {
            libc::mmap(
                window.as_ptr().cast(),
                self.map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Length of the mapping in bytes (the window rounded up to a page).
    pub fn map_len(&self) -> usize {
        self.map_len
    }
}

// SAFETY: while a Mapping is alive and not released the window points at a
// page-aligned mapping of at least WINDOW_SIZE bytes.
unsafe impl RegisterSpace for Mapping {
    fn base(&self) -> NonNull<u8> {
        match self.window {
            Some(window) => window,
            None => panic!("register window used after release"),
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if self.released.is_none() {
            if let Err(err) = self.close() {
                log::warn!("dropping mapping: {}", err);
            }
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("window", &self.window)
            .field("map_len", &self.map_len)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing_file(name: &str) -> PathBuf {
        let name = format!("a64-pio-unit-{}-{}", name, std::process::id());
        let path = std::env::temp_dir().join(name);
        let file = File::create(&path).unwrap();
        file.set_len(WINDOW_SIZE.next_multiple_of(page_size()) as u64)
            .unwrap();
        path
    }

    #[test]
    fn failed_close_is_reported_on_every_call() {
        let path = backing_file("close");
        let config = MapConfig {
            device: path.clone(),
            physical_base: 0,
        };
        let mut mapping = Mapping::open_with(&config).unwrap();

        // Pull the descriptor out from under the mapping.
        let fd = mapping.file.as_ref().unwrap().as_raw_fd();
        // SAFETY: the window stays mapped without its descriptor; the File
        // is only ever consumed through into_raw_fd afterwards.
        assert_eq!(unsafe { libc::close(fd) }, 0);

        let first = mapping.close();
        let second = mapping.close();
        std::fs::remove_file(&path).unwrap();

        let err = first.unwrap_err();
        assert_eq!(err.failures(), ReleaseFailures::CLOSE);
        assert_eq!(err.failures().bits(), 2);
        assert_eq!(err.close_error().unwrap().raw_os_error(), Some(libc::EBADF));
        assert!(err.unmap_error().is_none());
        assert_eq!(second, Err(err));
        assert!(mapping.is_released());
    }

    #[test]
    fn failure_bits_combine() {
        let unmap = ReleaseError {
            unmap: Some(libc::EINVAL),
            close: None,
        };
        assert_eq!(unmap.failures(), ReleaseFailures::UNMAP);
        assert_eq!(unmap.failures().bits(), 1);

        let both = ReleaseError {
            unmap: Some(libc::EINVAL),
            close: Some(libc::EIO),
        };
        assert_eq!(both.failures(), ReleaseFailures::UNMAP | ReleaseFailures::CLOSE);
        assert_eq!(both.failures().bits(), 3);
        assert_eq!(
            both.to_string(),
            format!(
                "failed to release register window; unmap: {}; close: {}",
                io::Error::from_raw_os_error(libc::EINVAL),
                io::Error::from_raw_os_error(libc::EIO)
            )
        );
    }
}
