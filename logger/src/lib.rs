//! Global trace sink used by the emulation core.
//!
//! The CPU step loop traces every executed instruction. Formatting happens at
//! the call site; this crate only timestamps lines (relative to logger start)
//! and writes them to the chosen sink. Until [`init_logger`] is called every
//! [`log`] is a no-op, so the hot path costs nothing in release use.

use std::{
    fs::File,
    io::{self, Write},
    sync::Mutex,
    time::Instant,
};

use chrono::Utc;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Where trace lines end up.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// Write to the console.
    Stdout,

    /// Write to `satsuma-<timestamp>.log` in the system temp directory.
    File,
}

struct Logger {
    sink: Mutex<Box<dyn Write + Send>>,
    started: Instant,
}

impl Logger {
    fn new(kind: LogKind) -> Self {
        let sink: Box<dyn Write + Send> = match kind {
            LogKind::Stdout => Box::new(io::stdout()),
            LogKind::File => {
                let filename = format!("satsuma-{}.log", Utc::now().timestamp());
                let path = std::env::temp_dir().join(filename);
                Box::new(File::create(path).expect("creating the log file"))
            }
        };

        Self {
            sink: Mutex::new(sink),
            started: Instant::now(),
        }
    }

    fn log<T: std::fmt::Display>(&self, data: T) {
        let elapsed = self.started.elapsed();
        let seconds = elapsed.as_secs();
        let hours = seconds / 3600;
        let minutes = (seconds / 60) % 60;
        let seconds = seconds % 60;
        let millis = elapsed.subsec_millis();

        if let Ok(ref mut sink) = self.sink.lock() {
            // A broken sink (e.g. a closed pipe) is not worth crashing over.
            let _ = writeln!(
                sink,
                "[{hours:02}:{minutes:02}:{seconds:02}.{millis:03}] {data}"
            );
        }
    }
}

/// Install the global sink. Later calls are ignored.
pub fn init_logger(kind: LogKind) {
    LOGGER.set(Logger::new(kind)).ok();
}

/// Write one timestamped line to the sink, if one is installed.
pub fn log<T: std::fmt::Display>(data: T) {
    if let Some(logger) = LOGGER.get() {
        logger.log(data);
    }
}
