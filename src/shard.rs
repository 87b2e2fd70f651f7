//! Sharder: fan a record stream out into one file per character.
//!
//! The stage has two outputs. Every record is passed through unchanged to
//! the primary stream, and its payload line is appended to the character's
//! shard file through a [`ShardWriter`].

use crate::defaults;
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::{ErrorReporter, RecordSink, Station, StationError};
use crate::record::Record;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Shard files held open at once; past this every handle is flushed and
/// closed.
const MAX_OPEN_SHARDS: usize = 64;

/// Where shard files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    pub directory: PathBuf,
    /// Extension without the dot; empty for none.
    pub extension: String,
    /// Nest files under a per-source directory.
    pub bucket: bool,
}

impl Default for ShardLayout {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(defaults::SHARD_DIRECTORY),
            extension: defaults::SHARD_EXTENSION.to_string(),
            bucket: false,
        }
    }
}

/// Check that `name` can be used as a single path component.
fn check_component(what: &str, name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err(format!("empty {what}"));
    }
    if name == "." || name == ".." {
        return Err(format!("{what} '{name}' is not a file name"));
    }
    if name.contains(['/', '\0']) {
        return Err(format!("{what} '{name}' contains a path separator or NUL"));
    }
    Ok(())
}

impl ShardLayout {
    fn with_extension(&self, stem: String) -> String {
        if self.extension.is_empty() {
            stem
        } else {
            format!("{stem}.{}", self.extension)
        }
    }

    /// Shard file path for a record identity.
    ///
    /// Flat: `<dir>/<source>_<character>.<ext>`.
    /// Bucketed: `<dir>/<source>/<character>.<ext>`.
    pub fn path_for(
        &self,
        source_id: &str,
        character_name: &str,
    ) -> std::result::Result<PathBuf, String> {
        check_component("source id", source_id)?;
        check_component("character name", character_name)?;
        let path = if self.bucket {
            self.directory
                .join(source_id)
                .join(self.with_extension(character_name.to_string()))
        } else {
            self.directory.join(self.with_extension(format!(
                "{source_id}{}{character_name}",
                defaults::SEGMENT_SEPARATOR
            )))
        };
        Ok(path)
    }
}

/// Appends payload lines to per-character files.
///
/// A file is truncated the first time it is written during a run; later
/// writes append.
pub struct ShardWriter {
    layout: ShardLayout,
    open: HashMap<PathBuf, BufWriter<File>>,
    touched: HashSet<PathBuf>,
    lines: usize,
}

impl ShardWriter {
    pub fn new(layout: ShardLayout) -> Self {
        Self {
            layout,
            open: HashMap::new(),
            touched: HashSet::new(),
            lines: 0,
        }
    }

    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    /// Distinct shard files written this run.
    pub fn files_written(&self) -> usize {
        self.touched.len()
    }

    /// Payload lines written this run.
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    fn open_shard(&mut self, path: &Path) -> Result<&mut BufWriter<File>> {
        if !self.open.contains_key(path) {
            if self.open.len() >= MAX_OPEN_SHARDS {
                self.flush()?;
                self.open.clear();
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let first = self.touched.insert(path.to_path_buf());
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(first)
                .append(!first)
                .open(path)
                .map_err(|e| {
                    TcpSpeechError::Other(format!("Failed to open shard {}: {}", path.display(), e))
                })?;
            self.open.insert(path.to_path_buf(), BufWriter::new(file));
        }
        self.open
            .get_mut(path)
            .ok_or_else(|| TcpSpeechError::Other(format!("shard {} not open", path.display())))
    }

    /// Append the record's payload line to its shard file.
    ///
    /// Fails with [`TcpSpeechError::Other`] when the record's identity cannot
    /// be turned into a file name.
    pub fn write(&mut self, record: &Record) -> Result<PathBuf> {
        let path = self
            .layout
            .path_for(&record.source_id, &record.character_name)
            .map_err(TcpSpeechError::Other)?;
        let line = record.payload_line();
        let writer = self.open_shard(&path)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(path)
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in self.open.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl RecordSink for ShardWriter {
    fn handle(&mut self, record: &Record) -> Result<()> {
        self.write(record).map(|_| ())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }

    fn name(&self) -> &'static str {
        "shard"
    }
}

/// Pass-through station that also writes every record to its shard.
///
/// Records whose identity cannot be used as a file name are reported and
/// still passed through.
pub struct Sharder<'a> {
    shards: ShardWriter,
    reporter: &'a dyn ErrorReporter,
    rejected: usize,
}

impl<'a> Sharder<'a> {
    pub fn new(layout: ShardLayout, reporter: &'a dyn ErrorReporter) -> Self {
        Self {
            shards: ShardWriter::new(layout),
            reporter,
            rejected: 0,
        }
    }

    pub fn shards(&self) -> &ShardWriter {
        &self.shards
    }

    /// Records that were passed through but not written to a shard.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl Station for Sharder<'_> {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, input: Record) -> std::result::Result<Option<Record>, StationError> {
        let usable = self
            .shards
            .layout()
            .path_for(&input.source_id, &input.character_name);
        match usable {
            Ok(_) => {
                self.shards
                    .write(&input)
                    .map_err(|e| StationError::Fatal(e.to_string()))?;
            }
            Err(message) => {
                self.rejected += 1;
                self.reporter
                    .warn(self.name(), &format!("not sharded: {message}"));
            }
        }
        Ok(Some(input))
    }

    fn name(&self) -> &'static str {
        "separate"
    }

    fn finish(&mut self) -> std::result::Result<Vec<Record>, StationError> {
        self.shards
            .flush()
            .map_err(|e| StationError::Fatal(e.to_string()))?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::testing::CollectingReporter;
    use crate::pipeline::{LineRunner, StreamSink};
    use crate::record::{InputForm, RecordForm, parse_line};
    use tempfile::TempDir;

    fn layout(dir: &TempDir, bucket: bool) -> ShardLayout {
        ShardLayout {
            directory: dir.path().to_path_buf(),
            extension: "txt".to_string(),
            bucket,
        }
    }

    #[test]
    fn flat_and_bucketed_paths() {
        let flat = ShardLayout::default();
        assert_eq!(
            flat.path_for("A001", "Hamlet").unwrap(),
            PathBuf::from("./A001_Hamlet.txt")
        );

        let bucketed = ShardLayout {
            directory: PathBuf::from("out"),
            extension: String::new(),
            bucket: true,
        };
        assert_eq!(
            bucketed.path_for("A001", "First Witch").unwrap(),
            PathBuf::from("out/A001/First Witch")
        );
    }

    #[test]
    fn unusable_names_are_rejected() {
        let layout = ShardLayout::default();
        assert!(layout.path_for("A001", "..").is_err());
        assert!(layout.path_for("A001", "a/b").is_err());
        assert!(layout.path_for(".", "Hamlet").is_err());
        assert!(layout.path_for("A001", "").is_err());
    }

    #[test]
    fn writer_appends_payload_lines() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::new(layout(&dir, false));
        writer
            .write(&parse_line("A001 Hamlet to be", RecordForm::Word, 1).unwrap())
            .unwrap();
        writer
            .write(&parse_line("A001 Hamlet or not", RecordForm::Word, 2).unwrap())
            .unwrap();
        writer
            .write(&parse_line("A001\tGhost\t<l>Swear</l>\t<l>Swear</l>", RecordForm::Raw, 3).unwrap())
            .unwrap();
        writer.flush().unwrap();

        assert_eq!(writer.files_written(), 2);
        assert_eq!(writer.lines_written(), 3);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("A001_Hamlet.txt")).unwrap(),
            "to be\nor not\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("A001_Ghost.txt")).unwrap(),
            "<l>Swear</l>\t<l>Swear</l>\n"
        );
    }

    #[test]
    fn first_write_truncates_stale_shards() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A001_Hamlet.txt"), "stale\n").unwrap();

        let mut writer = ShardWriter::new(layout(&dir, false));
        writer
            .write(&parse_line("A001 Hamlet fresh", RecordForm::Word, 1).unwrap())
            .unwrap();
        writer.flush().unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("A001_Hamlet.txt")).unwrap(),
            "fresh\n"
        );
    }

    #[test]
    fn reopened_shards_append() {
        let dir = TempDir::new().unwrap();
        let mut writer = ShardWriter::new(layout(&dir, true));
        // Write more characters than the open-handle limit, then revisit
        // the first one.
        for i in 0..=MAX_OPEN_SHARDS {
            let line = format!("A001 C{i} word{i}");
            writer
                .write(&parse_line(&line, RecordForm::Word, i).unwrap())
                .unwrap();
        }
        writer
            .write(&parse_line("A001 C0 again", RecordForm::Word, 0).unwrap())
            .unwrap();
        writer.flush().unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("A001").join("C0.txt")).unwrap(),
            "word0\nagain\n"
        );
    }

    #[test]
    fn sharder_passes_every_record_through() {
        let dir = TempDir::new().unwrap();
        let reporter = CollectingReporter::default();
        let mut sharder = Sharder::new(layout(&dir, true), &reporter);
        let runner = LineRunner::new(InputForm::Auto, &reporter);
        let mut sink = StreamSink::new(Vec::new());

        let input = "A001 Hamlet to be\nA001 Ophelia my lord\nA001 .. hidden\n";
        let summary = runner
            .run(&mut sharder, input.as_bytes(), &mut sink)
            .unwrap();

        assert_eq!(summary.records_out, 3);
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), input);
        assert_eq!(sharder.rejected(), 1);
        assert_eq!(reporter.count(), 1);
        assert!(dir.path().join("A001/Hamlet.txt").is_file());
        assert!(dir.path().join("A001/Ophelia.txt").is_file());
    }
}
