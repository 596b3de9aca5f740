//! Host tests for the register window mapper.
//!
//! `/dev/mem` is not available to unprivileged test runs, so the mapping
//! algorithm is exercised against ordinary files of one window's length.
//! Writes through a shared mapping land in the file, which makes the
//! register words easy to check from outside.

use std::fs::{self, File};
use std::path::PathBuf;

use a64_pio::mapper::{MapConfig, page_size};
use a64_pio::{
    Function, Gpio, Level, MapError, Mapping, Pin, Pull, RegisterSpace, WINDOW_SIZE, port_offset,
};

struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("a64-pio-{}-{}", name, std::process::id()));
        let file = File::create(&path).unwrap();
        file.set_len(WINDOW_SIZE.next_multiple_of(page_size()) as u64)
            .unwrap();
        Scratch(path)
    }

    fn config(&self) -> MapConfig {
        MapConfig {
            device: self.0.clone(),
            physical_base: 0,
        }
    }

    fn word(&self, offset: usize) -> u32 {
        let bytes = fs::read(&self.0).unwrap();
        u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn set_word(&self, offset: usize, value: u32) {
        let mut bytes = fs::read(&self.0).unwrap();
        bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        fs::write(&self.0, bytes).unwrap();
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn window_is_page_aligned() {
    let scratch = Scratch::new("aligned");
    let mut mapping = Mapping::open_with(&scratch.config()).unwrap();
    assert_eq!(mapping.base().as_ptr() as usize % page_size(), 0);
    assert!(mapping.map_len() >= WINDOW_SIZE);
    assert_eq!(mapping.map_len() % page_size(), 0);
    assert_eq!(mapping.close(), Ok(()));
}

#[test]
fn register_writes_reach_the_backing_device() {
    let scratch = Scratch::new("writes");
    let mapping = Mapping::open_with(&scratch.config()).unwrap();
    let gpio = Gpio::new(mapping);

    let led = Pin::new(1, 11);
    let button = Pin::new(1, 10);
    gpio.set_function(led, Function::OUTPUT);
    gpio.set_pull(button, Pull::Up);
    gpio.set_value(led, Level::High);

    let mut mapping = gpio.into_inner();
    assert_eq!(mapping.close(), Ok(()));

    let pc = port_offset(1);
    assert_eq!(scratch.word(pc + 0x04), 0x0000_1000);
    assert_eq!(scratch.word(pc + 0x10), 1 << 11);
    assert_eq!(scratch.word(pc + 0x1c), 1 << 20);
    assert_eq!(scratch.word(port_offset(0) + 0x10), 0);
}

#[test]
fn reads_come_from_the_backing_device() {
    let scratch = Scratch::new("reads");
    scratch.set_word(port_offset(6) + 0x10, 1 << 3);
    scratch.set_word(port_offset(6) + 0x00, 0x7 << 8);

    let gpio = Gpio::new(Mapping::open_with(&scratch.config()).unwrap());
    assert_eq!(gpio.get_value(Pin::new(6, 3)), Level::High);
    assert_eq!(gpio.get_value(Pin::new(6, 4)), Level::Low);
    assert_eq!(gpio.get_function(Pin::new(6, 2)), Function::DISABLED);
}

#[test]
fn close_twice_reports_the_same_outcome() {
    let scratch = Scratch::new("twice");
    let mut mapping = Mapping::open_with(&scratch.config()).unwrap();
    assert!(!mapping.is_released());
    let first = mapping.close();
    let second = mapping.close();
    assert_eq!(first, Ok(()));
    assert_eq!(first, second);
    assert!(mapping.is_released());
}

#[test]
fn dropping_without_close_releases() {
    let scratch = Scratch::new("drop");
    let mapping = Mapping::open_with(&scratch.config()).unwrap();
    drop(mapping);
    // The file can be mapped again straight away.
    let mut again = Mapping::open_with(&scratch.config()).unwrap();
    assert_eq!(again.close(), Ok(()));
}

#[test]
fn missing_device_is_an_open_error() {
    let config = MapConfig {
        device: PathBuf::from("/nonexistent/a64-pio/mem"),
        physical_base: 0,
    };
    let err = Mapping::open_with(&config).unwrap_err();
    assert!(matches!(err, MapError::Open(_)), "{:?}", err);
    assert_eq!(err.code(), -2);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn unmappable_device_is_a_map_error() {
    // /dev/null opens read/write but refuses mmap.
    let config = MapConfig {
        device: PathBuf::from("/dev/null"),
        physical_base: 0,
    };
    let err = Mapping::open_with(&config).unwrap_err();
    assert!(matches!(err, MapError::Map(_)), "{:?}", err);
    assert_eq!(err.code(), -4);
}

#[test]
fn unaligned_base_is_a_map_error() {
    let scratch = Scratch::new("unaligned");
    let config = MapConfig {
        physical_base: 0x24,
        ..scratch.config()
    };
    let err = Mapping::open_with(&config).unwrap_err();
    assert!(matches!(err, MapError::Map(_)), "{:?}", err);
}

#[test]
#[should_panic(expected = "after release")]
fn window_is_unusable_after_close() {
    let scratch = Scratch::new("closed");
    let mut mapping = Mapping::open_with(&scratch.config()).unwrap();
    mapping.close().unwrap();
    let gpio = Gpio::new(mapping);
    gpio.set_value(Pin::new(1, 0), Level::High);
}

#[test]
fn default_config_targets_the_pio_page() {
    let config = MapConfig::default();
    assert_eq!(config.device, PathBuf::from("/dev/mem"));
    assert_eq!(config.physical_base, 0x01C2_0000);
    assert_eq!(config.physical_base as usize + port_offset(0), 0x01C2_0824);
}
