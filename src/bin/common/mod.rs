//! Pieces shared by the demo programs.

use std::process::ExitCode;
use std::time::Duration;

use a64_pio::Mapping;
use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable selecting the log level (`error` .. `trace`).
pub const LOG_ENV: &str = "A64_PIO_LOG";

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the stderr logger at the level named by [`LOG_ENV`], `warn` if unset.
pub fn init_logging() {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Optional run time in whole seconds from the first argument.
pub fn seconds_arg() -> Result<Option<Duration>, ExitCode> {
    match std::env::args().nth(1) {
        None => Ok(None),
        Some(arg) => match arg.parse::<u64>() {
            Ok(seconds) => Ok(Some(Duration::from_secs(seconds))),
            Err(_) => {
                eprintln!("usage: {} [seconds]", env!("CARGO_BIN_NAME"));
                Err(ExitCode::from(2))
            }
        },
    }
}

/// Map the PIO page, turning a failure into the matching status code.
pub fn open_mapping() -> Result<Mapping, ExitCode> {
    Mapping::open().map_err(|err| {
        eprintln!("init error {}: {}", err.code(), err);
        exit_code(err.code())
    })
}

/// Release the mapping, reporting the failed-step bits as status code.
pub fn close_mapping(mut mapping: Mapping) -> ExitCode {
    match mapping.close() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let bits = err.failures().bits();
            eprintln!("cleanup error {}: {}", bits, err);
            ExitCode::from(bits)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    // Shells see the low byte of negative codes, as with C's exit().
    ExitCode::from(code as u8)
}
