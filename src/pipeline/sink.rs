use crate::error::Result;
use crate::record::Record;
use std::io::Write;

/// Pluggable output for records leaving a station.
pub trait RecordSink {
    /// Handle one record. Called for each record in stream order.
    fn handle(&mut self, record: &Record) -> Result<()>;

    /// Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Writes each record as one serialized line to any writer (stdout, a file).
pub struct StreamSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for StreamSink<W> {
    fn handle(&mut self, record: &Record) -> Result<()> {
        self.writer.write_all(record.to_line().as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

/// Keeps records in memory. Used by tests and by library callers that want
/// the stage output as values.
#[derive(Debug, Default)]
pub struct CollectorSink {
    records: Vec<Record>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl RecordSink for CollectorSink {
    fn handle(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordForm;

    fn record(form: RecordForm, payload: &[&str]) -> Record {
        Record::new(
            "A001",
            "Hamlet",
            payload.iter().map(|s| s.to_string()).collect(),
            form,
        )
    }

    #[test]
    fn record_sink_is_object_safe() {
        let _sink: Box<dyn RecordSink> = Box::new(CollectorSink::new());
    }

    #[test]
    fn stream_sink_writes_one_line_per_record() {
        let mut sink = StreamSink::new(Vec::new());
        sink.handle(&record(RecordForm::Word, &["to", "be"])).unwrap();
        sink.handle(&record(RecordForm::Raw, &["<l>a</l>"])).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.written(), 2);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "A001 Hamlet to be\nA001\tHamlet\t<l>a</l>\n");
    }

    #[test]
    fn collector_sink_keeps_order() {
        let mut sink = CollectorSink::new();
        sink.handle(&record(RecordForm::Word, &["one"])).unwrap();
        sink.handle(&record(RecordForm::Word, &["two"])).unwrap();
        let records = sink.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, vec!["one".to_string()]);
        assert_eq!(records[1].payload, vec!["two".to_string()]);
    }

    #[test]
    fn sink_names() {
        assert_eq!(StreamSink::new(Vec::new()).name(), "stream");
        assert_eq!(CollectorSink::new().name(), "collector");
    }
}
