//! Stage framework shared by every pipeline command.
//!
//! A stage is a [`Station`] driven by a [`LineRunner`] from a line stream
//! into a [`RecordSink`]. Stations never talk to each other in-process;
//! they are chained by piping one process into the next.

pub mod error;
pub mod sink;
pub mod station;

pub use error::{ErrorReporter, LogReporter, SilentReporter, StationError};
pub use sink::{CollectorSink, RecordSink, StreamSink};
pub use station::{LineRunner, RunSummary, Station};
