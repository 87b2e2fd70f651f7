//! Speech extraction from TCP (TEI) play transcripts.
//!
//! Walks a document in order, collects the outermost `<l>`/`<p>` elements of
//! every `<sp>`, and groups consecutive speeches by the same speaker into one
//! raw record. A speaker who is interrupted and speaks again later yields a
//! second record.
//!
//! The same walk also lists the cast from `<div type="dramatis_personae">`
//! sections, see [`extract_personae`].

use crate::clean::markup::{strip_markup, strip_tags_lossy};
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::sink::RecordSink;
use crate::pipeline::station::Station;
use crate::record::{Record, RecordForm};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs;
use std::path::{Path, PathBuf};

const SPEECH: &[u8] = b"sp";
const SPEAKER: &[u8] = b"speaker";
const LINE: &[u8] = b"l";
const PARAGRAPH: &[u8] = b"p";
const DIV: &[u8] = b"div";
const ITEM: &[u8] = b"item";
const TABLE: &[u8] = b"table";
const ROW: &[u8] = b"row";
const CELL: &[u8] = b"cell";
const PERSONAE_TYPE: &[u8] = b"dramatis_personae";

/// One input document and the archival code its records carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_id: String,
    pub path: PathBuf,
}

impl SourceDocument {
    /// Use the file stem as source id (`texts/A00001.xml` becomes `A00001`).
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { source_id, path }
    }
}

/// Records and warnings produced from one document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub warnings: Vec<String>,
}

/// Extract raw speech records from the XML text of one document.
///
/// `origin` names the document in error messages.
pub fn extract_document(source_id: &str, xml: &str, origin: &str) -> Result<Extraction> {
    let malformed = |message: String| TcpSpeechError::MalformedDocument {
        path: origin.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    let mut extraction = Extraction::default();
    let mut depth = 0usize;
    let mut speech: Option<SpeechState> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("at byte {}: {e}", reader.buffer_position())))?;
        let position = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                match speech.as_mut() {
                    None if name.as_ref() == SPEECH => speech = Some(SpeechState::new(depth)),
                    None => {}
                    Some(state) => {
                        if state.fragment_start.is_some() || state.speaker_depth.is_some() {
                            continue;
                        }
                        if name.as_ref() == SPEAKER {
                            state.speaker_depth = Some(depth);
                        } else if name.as_ref() == LINE || name.as_ref() == PARAGRAPH {
                            let start = xml[..position].rfind('<').ok_or_else(|| {
                                malformed(format!("lost start of element at byte {position}"))
                            })?;
                            state.fragment_start = Some((start, depth));
                        }
                    }
                }
            }
            Event::End(_) => {
                let mut closes_speech = false;
                if let Some(state) = speech.as_mut() {
                    match state.fragment_start {
                        Some((start, fragment_depth)) if fragment_depth == depth => {
                            let raw = xml.get(start..position).ok_or_else(|| {
                                malformed(format!("bad fragment bounds {start}..{position}"))
                            })?;
                            state.push_fragment(raw);
                            state.fragment_start = None;
                        }
                        Some(_) => {}
                        None if state.speaker_depth == Some(depth) => state.speaker_depth = None,
                        None => closes_speech = state.depth == depth,
                    }
                }
                if closes_speech && let Some(state) = speech.take() {
                    finish_speech(source_id, origin, state, &mut extraction);
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced end tag".to_string()))?;
            }
            Event::Text(text) => {
                if let Some(state) = speech.as_mut()
                    && state.speaker_depth.is_some()
                {
                    match text.unescape() {
                        Ok(unescaped) => state.speaker.push_str(&unescaped),
                        Err(_) => state.speaker.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Event::CData(data) => {
                if let Some(state) = speech.as_mut()
                    && state.speaker_depth.is_some()
                {
                    state.speaker.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(malformed(format!(
                        "unexpected end of document with {depth} open element(s)"
                    )));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(extraction)
}

/// Speech element currently being read.
struct SpeechState {
    /// Element depth of the `<sp>` tag.
    depth: usize,
    speaker: String,
    /// Depth of the open `<speaker>`, if inside one.
    speaker_depth: Option<usize>,
    /// Byte offset and depth of the open outermost `<l>`/`<p>`.
    fragment_start: Option<(usize, usize)>,
    fragments: Vec<String>,
}

impl SpeechState {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            speaker: String::new(),
            speaker_depth: None,
            fragment_start: None,
            fragments: Vec::new(),
        }
    }

    fn push_fragment(&mut self, raw: &str) {
        let fragment = raw.replace(['\n', '\r', '\t'], " ");
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            self.fragments.push(fragment.to_string());
        }
    }
}

fn finish_speech(source_id: &str, origin: &str, state: SpeechState, out: &mut Extraction) {
    let speaker = state.speaker.split_whitespace().collect::<Vec<_>>().join(" ");
    if speaker.is_empty() {
        out.warnings.push(format!(
            "{origin}: <sp> without a speaker skipped ({} fragment(s))",
            state.fragments.len()
        ));
        return;
    }
    if state.fragments.is_empty() {
        return;
    }

    match out.records.last_mut() {
        Some(open) if open.character_name == speaker => open.payload.extend(state.fragments),
        _ => out.records.push(Record::new(
            source_id,
            speaker,
            state.fragments,
            RecordForm::Raw,
        )),
    }
}

/// List the cast of one document from its dramatis personae sections.
///
/// Every `<div type="dramatis_personae">` is numbered from 1 in document
/// order. Each outermost `<item>` in it, and each `<p>` outside an item,
/// yields one record `CODE-N<TAB>entry` with an empty payload. An item
/// holding a `<table>` yields the first cell of every row instead. Entries
/// are stripped of markup and whitespace is collapsed.
pub fn extract_personae(source_id: &str, xml: &str, origin: &str) -> Result<Extraction> {
    let malformed = |message: String| TcpSpeechError::MalformedDocument {
        path: origin.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    let mut extraction = Extraction::default();
    let mut depth = 0usize;
    let mut sections = 0usize;
    let mut section: Option<PersonaeState> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("at byte {}: {e}", reader.buffer_position())))?;
        let position = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                let Some(state) = section.as_mut() else {
                    if name.as_ref() == DIV && is_personae_div(&e) {
                        sections += 1;
                        section = Some(PersonaeState::new(depth));
                    }
                    continue;
                };
                let tag_start = || {
                    xml[..position].rfind('<').ok_or_else(|| {
                        malformed(format!("lost start of element at byte {position}"))
                    })
                };
                let nested = state.item.is_some() || state.paragraph.is_some();
                match name.as_ref() {
                    ITEM if !nested => state.item = Some(ItemState::new(tag_start()?, depth)),
                    PARAGRAPH if !nested => state.paragraph = Some((tag_start()?, depth)),
                    _ => {
                        let Some(item) = state.item.as_mut() else {
                            continue;
                        };
                        match name.as_ref() {
                            TABLE => item.table = true,
                            ROW if item.table && item.row.is_none() => {
                                item.row = Some((depth, false));
                            }
                            CELL if item.cell.is_none() => {
                                if let Some((_, taken)) = item.row.as_mut()
                                    && !*taken
                                {
                                    *taken = true;
                                    item.cell = Some((tag_start()?, depth));
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let name = e.local_name();
                match section.as_mut() {
                    None if name.as_ref() == DIV && is_personae_div(&e) => sections += 1,
                    Some(state) if name.as_ref() == CELL => {
                        if let Some(item) = state.item.as_mut()
                            && let Some((_, taken)) = item.row.as_mut()
                        {
                            *taken = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                let mut closes_section = false;
                if let Some(state) = section.as_mut() {
                    state.close(depth, xml, position).map_err(malformed)?;
                    closes_section = state.depth == depth;
                }
                if closes_section && let Some(state) = section.take() {
                    finish_personae(source_id, origin, sections, state, &mut extraction);
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced end tag".to_string()))?;
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(malformed(format!(
                        "unexpected end of document with {depth} open element(s)"
                    )));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(extraction)
}

fn is_personae_div(e: &BytesStart) -> bool {
    matches!(
        e.try_get_attribute("type"),
        Ok(Some(attribute)) if attribute.value.as_ref() == PERSONAE_TYPE
    )
}

/// Dramatis personae section currently being read.
struct PersonaeState {
    depth: usize,
    item: Option<ItemState>,
    /// Byte offset and depth of the open `<p>` outside any item.
    paragraph: Option<(usize, usize)>,
    entries: Vec<String>,
    rows_without_cell: usize,
}

/// Outermost `<item>` currently being read.
struct ItemState {
    start: usize,
    depth: usize,
    table: bool,
    /// Depth of the open table row and whether its first cell was seen.
    row: Option<(usize, bool)>,
    cell: Option<(usize, usize)>,
    cells: Vec<String>,
}

impl ItemState {
    fn new(start: usize, depth: usize) -> Self {
        Self {
            start,
            depth,
            table: false,
            row: None,
            cell: None,
            cells: Vec::new(),
        }
    }
}

impl PersonaeState {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            item: None,
            paragraph: None,
            entries: Vec::new(),
            rows_without_cell: 0,
        }
    }

    /// Handle the end tag at `depth`, which ends at byte `end`.
    fn close(&mut self, depth: usize, xml: &str, end: usize) -> std::result::Result<(), String> {
        let verbatim = |start: usize| {
            xml.get(start..end)
                .map(str::to_string)
                .ok_or_else(|| format!("bad fragment bounds {start}..{end}"))
        };

        let mut closes_item = false;
        if let Some(item) = self.item.as_mut() {
            if let Some((start, cell_depth)) = item.cell
                && cell_depth == depth
            {
                item.cells.push(verbatim(start)?);
                item.cell = None;
            } else if let Some((row_depth, taken)) = item.row
                && row_depth == depth
            {
                if !taken {
                    self.rows_without_cell += 1;
                }
                item.row = None;
            } else {
                closes_item = item.depth == depth;
            }
        } else if let Some((start, paragraph_depth)) = self.paragraph
            && paragraph_depth == depth
        {
            self.entries.push(verbatim(start)?);
            self.paragraph = None;
        }

        if closes_item && let Some(item) = self.item.take() {
            if item.table {
                self.entries.extend(item.cells);
            } else {
                self.entries.push(verbatim(item.start)?);
            }
        }
        Ok(())
    }
}

fn finish_personae(
    source_id: &str,
    origin: &str,
    section: usize,
    state: PersonaeState,
    out: &mut Extraction,
) {
    if state.rows_without_cell > 0 {
        out.warnings.push(format!(
            "{origin}: {} table row(s) without a cell skipped",
            state.rows_without_cell
        ));
    }

    let id = format!("{source_id}-{section}");
    for entry in state.entries {
        let flat = entry.replace(['\n', '\r', '\t'], " ");
        let text = strip_markup(&flat).unwrap_or_else(|message| {
            out.warnings.push(format!(
                "{origin}: malformed cast entry ({message}), dropping everything between < and >"
            ));
            strip_tags_lossy(&flat)
        });
        let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !name.is_empty() {
            out.records
                .push(Record::new(id.as_str(), name, Vec::new(), RecordForm::Raw));
        }
    }
}

/// Where the documents to extract come from.
#[derive(Debug, Clone, Default)]
pub struct ExtractInputs {
    /// Files named directly.
    pub files: Vec<PathBuf>,
    /// Directory prepended to every file and every listed code.
    pub directory: Option<PathBuf>,
    /// File listing TCP codes, one per line (first comma-separated column).
    pub list: Option<PathBuf>,
    /// Skip the first non-comment line of `list`.
    pub skip_header: bool,
}

impl ExtractInputs {
    /// Resolve every input to a document path, files first, then listed codes.
    ///
    /// An unreadable list file is fatal.
    pub fn resolve(&self) -> Result<Vec<SourceDocument>> {
        let mut paths: Vec<PathBuf> = self.files.clone();

        if let Some(list) = &self.list {
            let contents = fs::read_to_string(list)?;
            paths.extend(parse_code_list(&contents, self.skip_header));
        }

        Ok(paths
            .into_iter()
            .map(|path| match &self.directory {
                Some(dir) => dir.join(path),
                None => path,
            })
            .map(SourceDocument::from_path)
            .collect())
    }
}

/// First comma-separated column of a CSV row.
///
/// A quoted column may contain commas and `""` escapes. Quoted newlines are
/// not supported; every row is one line.
fn first_column(line: &str) -> String {
    let line = line.trim_start();
    let Some(quoted) = line.strip_prefix('"') else {
        return line.split(',').next().unwrap_or_default().to_string();
    };

    let mut column = String::new();
    let mut chars = quoted.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if chars.peek() == Some(&'"') => {
                column.push('"');
                chars.next();
            }
            '"' => break,
            other => column.push(other),
        }
    }
    column
}

/// Parse a code list into `<code>.xml` file names.
fn parse_code_list(contents: &str, skip_header: bool) -> Vec<PathBuf> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .skip(usize::from(skip_header))
        .map(first_column)
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .map(|code| {
            if code.ends_with(".xml") {
                PathBuf::from(code)
            } else {
                PathBuf::from(format!("{code}.xml"))
            }
        })
        .collect()
}

/// Per-run counters for the extractor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub documents: usize,
    pub records: usize,
    /// Documents that parsed but yielded no records.
    pub empty: usize,
    /// Documents that failed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl ExtractSummary {
    pub fn all_failed(&self) -> bool {
        self.documents > 0 && self.failed.len() == self.documents
    }
}

/// What an [`Extractor`] pulls out of each document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExtractTarget {
    /// Speeches grouped by speaker.
    #[default]
    Speech,
    /// Cast entries from dramatis personae sections.
    Personae,
}

/// Extractor station: one document in, its raw records out.
#[derive(Debug, Default)]
pub struct Extractor {
    target: ExtractTarget,
    warnings: Vec<String>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor listing dramatis personae instead of speeches.
    pub fn personae() -> Self {
        Self {
            target: ExtractTarget::Personae,
            ..Self::default()
        }
    }

    /// Extract every document in order, writing records to `sink`.
    ///
    /// A document that cannot be read or parsed is reported, tallied and
    /// skipped; the remaining documents are still processed.
    pub fn run<K: RecordSink + ?Sized>(
        &mut self,
        documents: &[SourceDocument],
        sink: &mut K,
        reporter: &dyn ErrorReporter,
    ) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();

        for document in documents {
            summary.documents += 1;
            let result = self.process(document.clone());
            for warning in std::mem::take(&mut self.warnings) {
                reporter.warn(self.name(), &warning);
            }
            match result {
                Ok(Some(records)) => {
                    if records.is_empty() {
                        summary.empty += 1;
                        let missing = match self.target {
                            ExtractTarget::Speech => "speech",
                            ExtractTarget::Personae => "dramatis personae",
                        };
                        reporter.warn(
                            self.name(),
                            &format!("no {missing} found in {}", document.path.display()),
                        );
                    }
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
                    summary.failed.push((document.path.clone(), reason));
                }
            }
        }

        sink.finish()?;
        Ok(summary)
    }
}

impl Station for Extractor {
    type Input = SourceDocument;
    type Output = Vec<Record>;

    fn process(
        &mut self,
        document: SourceDocument,
    ) -> std::result::Result<Option<Vec<Record>>, StationError> {
        let origin = document.path.display().to_string();
        let xml = fs::read_to_string(&document.path).map_err(|e| {
            StationError::Recoverable(
                TcpSpeechError::MalformedDocument {
                    path: origin.clone(),
                    message: e.to_string(),
                }
                .to_string(),
            )
        })?;

        let extract = match self.target {
            ExtractTarget::Speech => extract_document,
            ExtractTarget::Personae => extract_personae,
        };
        let extraction = extract(&document.source_id, &xml, &origin)
            .map_err(|e| StationError::Recoverable(e.to_string()))?;
        self.warnings.extend(extraction.warnings);
        Ok(Some(extraction.records))
    }

    fn name(&self) -> &'static str {
        match self.target {
            ExtractTarget::Speech => "extract",
            ExtractTarget::Personae => "personae",
        }
    }
}

/// Convenience for callers holding a path.
pub fn extract_file(path: &Path) -> Result<Vec<Record>> {
    let document = SourceDocument::from_path(path);
    let xml = fs::read_to_string(path)?;
    let origin = path.display().to_string();
    Ok(extract_document(&document.source_id, &xml, &origin)?.records)
}
