//! Core station abstraction and the synchronous line runner.
//!
//! Every stage runs single-threaded: the runner reads one line, hands the
//! parsed record to the station, and writes whatever comes out before
//! reading the next line. Backpressure comes from the OS pipe buffers
//! between processes.

use crate::error::TcpSpeechError;
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::sink::RecordSink;
use crate::record::{InputForm, Record, parse_line};
use std::io::BufRead;

/// A processing station in the pipeline.
pub trait Station {
    /// The input type this station receives.
    type Input;
    /// The output type this station produces.
    type Output;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called at end of input. Stations that buffer return their remaining
    /// output here.
    fn finish(&mut self) -> Result<Vec<Self::Output>, StationError> {
        Ok(Vec::new())
    }
}

/// Counters collected while running a station over a stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines read, including blank and malformed ones.
    pub lines_read: usize,
    /// Records successfully parsed and handed to the station.
    pub records_in: usize,
    /// Records written to the sink.
    pub records_out: usize,
    /// Lines skipped because they were not valid records.
    pub malformed: usize,
    /// Recoverable station errors.
    pub errors: usize,
}

impl RunSummary {
    /// True when something was skipped or failed along the way.
    pub fn has_problems(&self) -> bool {
        self.malformed > 0 || self.errors > 0
    }
}

/// Drives a record station over a line stream.
pub struct LineRunner<'a> {
    input_form: InputForm,
    reporter: &'a dyn ErrorReporter,
}

impl<'a> LineRunner<'a> {
    pub fn new(input_form: InputForm, reporter: &'a dyn ErrorReporter) -> Self {
        Self {
            input_form,
            reporter,
        }
    }

    /// Run `station` over every line of `reader`, writing output to `sink`.
    ///
    /// Blank lines are ignored. Malformed lines are reported and skipped.
    /// A fatal station error aborts the run with [`TcpSpeechError::StageFailed`].
    pub fn run<S, R, K>(
        &self,
        station: &mut S,
        mut reader: R,
        sink: &mut K,
    ) -> crate::error::Result<RunSummary>
    where
        S: Station<Input = Record, Output = Record> + ?Sized,
        R: BufRead,
        K: RecordSink + ?Sized,
    {
        let mut summary = RunSummary::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            summary.lines_read += 1;

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            let form = self.input_form.resolve(line);
            let record = match parse_line(line, form, summary.lines_read) {
                Ok(record) => record,
                Err(e) => {
                    summary.malformed += 1;
                    self.reporter.report(
                        station.name(),
                        &StationError::Recoverable(format!("skipping line: {e}")),
                    );
                    continue;
                }
            };
            summary.records_in += 1;

            match station.process(record) {
                Ok(Some(output)) => {
                    sink.handle(&output)?;
                    summary.records_out += 1;
                }
                Ok(None) => {}
                Err(error) => self.handle_error(station.name(), error, &mut summary)?,
            }
        }

        match station.finish() {
            Ok(outputs) => {
                for output in outputs {
                    sink.handle(&output)?;
                    summary.records_out += 1;
                }
            }
            Err(error) => self.handle_error(station.name(), error, &mut summary)?,
        }

        sink.finish()?;
        Ok(summary)
    }

    fn handle_error(
        &self,
        station: &str,
        error: StationError,
        summary: &mut RunSummary,
    ) -> crate::error::Result<()> {
        self.reporter.report(station, &error);
        match error {
            StationError::Recoverable(_) => {
                summary.errors += 1;
                Ok(())
            }
            StationError::Fatal(message) => Err(TcpSpeechError::StageFailed {
                station: station.to_string(),
                message,
            }),
        }
    }
}
