//! Error types and reporting for pipeline stations.

use std::fmt;

/// Errors that can occur while a station processes one item.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// The item is skipped; the station keeps processing.
    Recoverable(String),
    /// The station cannot continue; the run is aborted.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
///
/// Reports go to a diagnostic channel (stderr in the CLI), never to the
/// record stream.
pub trait ErrorReporter {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);

    /// Reports a non-error observation (e.g. a document without speech).
    fn warn(&self, station: &str, message: &str) {
        self.report(station, &StationError::Recoverable(message.to_string()));
    }
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        eprintln!("[{}] {}", station, error);
    }

    fn warn(&self, station: &str, message: &str) {
        eprintln!("[{}] Warning: {}", station, message);
    }
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ErrorReporter for SilentReporter {
    fn report(&self, _station: &str, _error: &StationError) {}
}
