//! Merger: rebuild a record stream from per-character files.
//!
//! The inverse of the sharder. Each file's identity comes from its name
//! (flat layout) or from its directory plus name (bucketed layout), and every
//! line of the file becomes one record.

use crate::defaults;
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::{ErrorReporter, RecordSink, Station, StationError};
use crate::record::{Record, RecordForm};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How shard file names split into identity segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    pub segment_separator: String,
    /// Joins the segments left for the character name.
    pub join_separator: String,
    /// Segments dropped from the left of the name.
    pub left_strip: usize,
    /// Segments dropped from the right of the name.
    pub right_strip: usize,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            segment_separator: defaults::SEGMENT_SEPARATOR.to_string(),
            join_separator: defaults::SEGMENT_SEPARATOR.to_string(),
            left_strip: 0,
            right_strip: 0,
        }
    }
}

/// Drop the last extension. Leading dots are not extensions.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index > 0 => &name[..index],
        _ => name,
    }
}

fn naming_error(name: &str, message: String) -> TcpSpeechError {
    TcpSpeechError::NamingConvention {
        filename: name.to_string(),
        message,
    }
}

/// Segments left after stripping, requiring at least `needed`.
fn kept_segments<'n>(
    name: &'n str,
    convention: &NamingConvention,
    needed: usize,
) -> Result<Vec<&'n str>> {
    if convention.segment_separator.is_empty() {
        return Err(naming_error(name, "empty segment separator".to_string()));
    }
    let segments: Vec<&str> = strip_extension(name)
        .split(convention.segment_separator.as_str())
        .collect();
    let strip = convention.left_strip + convention.right_strip;
    if segments.len() < strip + needed {
        return Err(naming_error(
            name,
            format!(
                "{} segment(s), need at least {} with left strip {} and right strip {}",
                segments.len(),
                strip + needed,
                convention.left_strip,
                convention.right_strip
            ),
        ));
    }
    Ok(segments[convention.left_strip..segments.len() - convention.right_strip].to_vec())
}

/// Split a flat shard name into `(source_id, character_name)`.
///
/// `orig_A001_First_Witch_clean.txt` with left strip 1 and right strip 1
/// gives `("A001", "First_Witch")`.
pub fn decompose_filename(name: &str, convention: &NamingConvention) -> Result<(String, String)> {
    let segments = kept_segments(name, convention, 2)?;
    let source_id = segments[0];
    if source_id.is_empty() {
        return Err(naming_error(name, "empty source id".to_string()));
    }
    Ok((
        source_id.to_string(),
        segments[1..].join(&convention.join_separator),
    ))
}

/// Character name of a bucketed shard file; the source id is its directory.
pub fn decompose_bucketed(name: &str, convention: &NamingConvention) -> Result<String> {
    let segments = kept_segments(name, convention, 1)?;
    Ok(segments.join(&convention.join_separator))
}

/// Payload separator of merged files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorChoice {
    /// Tab if any input file contains one, otherwise space.
    #[default]
    Auto,
    Tab,
    Space,
}

impl FromStr for SeparatorChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SeparatorChoice::Auto),
            "tab" | "\t" | "\\t" => Ok(SeparatorChoice::Tab),
            "space" | " " => Ok(SeparatorChoice::Space),
            other => Err(format!(
                "unknown separator '{other}' (expected auto, tab or space)"
            )),
        }
    }
}

/// One input file and, for bucketed files, its source id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry {
    pub path: PathBuf,
    pub bucket: Option<String>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn has_extension(path: &Path, extension: Option<&str>) -> bool {
    match extension {
        None => true,
        Some(ext) => path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == ext.trim_start_matches('.')),
    }
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_hidden(&path) {
            children.push(path);
        }
    }
    children.sort();
    Ok(children)
}

/// Expand input paths into merge entries.
///
/// Files are taken as flat entries. A directory contributes its own files as
/// flat entries and the files of its immediate subdirectories as bucketed
/// entries named after the subdirectory. Hidden files are skipped and
/// directory contents are visited in sorted order.
pub fn collect_entries(inputs: &[PathBuf], extension: Option<&str>) -> Result<Vec<MergeEntry>> {
    let mut entries = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for child in sorted_children(input)? {
                if child.is_dir() {
                    let bucket = child
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    for file in sorted_children(&child)? {
                        if file.is_file() && has_extension(&file, extension) {
                            entries.push(MergeEntry {
                                path: file,
                                bucket: Some(bucket.clone()),
                            });
                        }
                    }
                } else if child.is_file() && has_extension(&child, extension) {
                    entries.push(MergeEntry {
                        path: child,
                        bucket: None,
                    });
                }
            }
        } else if input.is_file() {
            entries.push(MergeEntry {
                path: input.clone(),
                bucket: None,
            });
        } else {
            return Err(TcpSpeechError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("merge input not found: {}", input.display()),
            )));
        }
    }
    Ok(entries)
}

/// Outcome of a merge run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub files: usize,
    pub records: usize,
    /// Files skipped, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    pub form: Option<RecordForm>,
}

/// Reassembles records from shard files.
#[derive(Debug, Clone)]
pub struct Merger {
    convention: NamingConvention,
    form: RecordForm,
}

impl Merger {
    /// Merger with a fixed payload form.
    pub fn new(convention: NamingConvention, form: RecordForm) -> Self {
        Self { convention, form }
    }

    /// Resolve `choice` against the input files.
    pub fn resolve_form(choice: SeparatorChoice, entries: &[MergeEntry]) -> Result<RecordForm> {
        match choice {
            SeparatorChoice::Tab => Ok(RecordForm::Raw),
            SeparatorChoice::Space => Ok(RecordForm::Word),
            SeparatorChoice::Auto => {
                for entry in entries {
                    if fs::read(&entry.path)?.contains(&b'\t') {
                        return Ok(RecordForm::Raw);
                    }
                }
                Ok(RecordForm::Word)
            }
        }
    }

    /// Identity of an entry's records.
    pub fn identity(&self, entry: &MergeEntry) -> Result<(String, String)> {
        let name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &entry.bucket {
            Some(source_id) => Ok((
                source_id.clone(),
                decompose_bucketed(&name, &self.convention)?,
            )),
            None => decompose_filename(&name, &self.convention),
        }
    }

    fn payload(&self, line: &str) -> Vec<String> {
        if line.is_empty() {
            return Vec::new();
        }
        match self.form {
            RecordForm::Raw => line.split('\t').map(str::to_string).collect(),
            RecordForm::Word => line
                .split(' ')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Merge every entry into `sink`. Files that do not follow the naming
    /// convention or cannot be read are reported and skipped.
    pub fn run<K: RecordSink + ?Sized>(
        &mut self,
        entries: &[MergeEntry],
        sink: &mut K,
        reporter: &dyn ErrorReporter,
    ) -> Result<MergeSummary> {
        let mut summary = MergeSummary {
            form: Some(self.form),
            ..Default::default()
        };

        for entry in entries {
            match self.process(entry.clone()) {
                Ok(Some(records)) => {
                    summary.files += 1;
                    for record in &records {
                        sink.handle(record)?;
                    }
                    summary.records += records.len();
                }
                Ok(None) => {}
                Err(error) => {
                    reporter.report(self.name(), &error);
                    let reason = match error {
                        StationError::Recoverable(m) | StationError::Fatal(m) => m,
                    };
                    summary.skipped.push((entry.path.clone(), reason));
                }
            }
        }

        sink.finish()?;
        Ok(summary)
    }
}

impl Station for Merger {
    type Input = MergeEntry;
    type Output = Vec<Record>;

    fn process(
        &mut self,
        entry: MergeEntry,
    ) -> std::result::Result<Option<Vec<Record>>, StationError> {
        let (source_id, character_name) = self
            .identity(&entry)
            .map_err(|e| StationError::Recoverable(e.to_string()))?;

        let file = fs::File::open(&entry.path).map_err(|e| {
            StationError::Recoverable(format!("cannot read {}: {}", entry.path.display(), e))
        })?;
        let mut reader = std::io::BufReader::new(file);
        let mut records = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
                StationError::Recoverable(format!("cannot read {}: {}", entry.path.display(), e))
            })?;
            if read == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            let line = text
                .strip_suffix('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l))
                .unwrap_or(&*text);
            records.push(Record::new(
                source_id.clone(),
                character_name.clone(),
                self.payload(line),
                self.form,
            ));
        }
        Ok(Some(records))
    }

    fn name(&self) -> &'static str {
        "merge"
    }
}
