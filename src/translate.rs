//! Translator: dictionary substitution over word records.

use crate::defaults;
use crate::dictionary::Dictionary;
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::{Station, StationError};
use crate::record::{Record, RecordForm};
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Per-word occurrence counts, written as `word<TAB>count` lines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WordTally {
    counts: HashMap<String, usize>,
}

impl WordTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str) {
        self.add_count(word, 1);
    }

    fn add_count(&mut self, word: &str, count: usize) {
        *self.counts.entry(word.to_string()).or_default() += count;
    }

    pub fn get(&self, word: &str) -> usize {
        self.counts.get(word).copied().unwrap_or(0)
    }

    /// Distinct words.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all words.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Add counts from a previously written tally.
    ///
    /// Lines without a numeric count are counted once.
    pub fn seed_from_tsv<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split('\t');
            let Some(word) = fields.next().map(str::trim).filter(|w| !w.is_empty()) else {
                continue;
            };
            let count = fields
                .next()
                .and_then(|c| c.trim().parse::<usize>().ok())
                .unwrap_or(1);
            self.add_count(word, count);
        }
        Ok(())
    }

    /// Entries sorted by count descending, then word.
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(word, count)| (word.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn write_tsv<W: Write>(&self, mut writer: W) -> Result<()> {
        for (word, count) in self.sorted() {
            writeln!(writer, "{word}\t{count}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Translator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorOptions {
    /// Keep unmatched tokens as written. When false they are replaced by
    /// `placeholder`.
    pub preserve_original: bool,
    pub placeholder: String,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            preserve_original: true,
            placeholder: defaults::PLACEHOLDER.to_string(),
        }
    }
}

/// Applies one dictionary token by token.
///
/// Several dictionaries are chained by running several translate stages in
/// sequence.
pub struct Translator {
    dictionary: Dictionary,
    options: TranslatorOptions,
    untranslated: WordTally,
    translated: usize,
}

impl Translator {
    pub fn new(dictionary: Dictionary, options: TranslatorOptions) -> Self {
        Self {
            dictionary,
            options,
            untranslated: WordTally::new(),
            translated: 0,
        }
    }

    /// Translate a single token. Unmatched tokens are tallied.
    pub fn translate_token(&mut self, token: &str) -> String {
        match self.dictionary.lookup(token) {
            Some(replacement) => {
                self.translated += 1;
                replacement.to_string()
            }
            None => {
                self.untranslated.add(token);
                if self.options.preserve_original {
                    token.to_string()
                } else {
                    self.options.placeholder.clone()
                }
            }
        }
    }

    /// Tokens that had no dictionary entry.
    pub fn untranslated(&self) -> &WordTally {
        &self.untranslated
    }

    /// Untranslated tally, for seeding with an earlier run's counts.
    pub fn untranslated_mut(&mut self) -> &mut WordTally {
        &mut self.untranslated
    }

    /// Number of tokens replaced so far.
    pub fn translated_count(&self) -> usize {
        self.translated
    }
}

impl Station for Translator {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, input: Record) -> std::result::Result<Option<Record>, StationError> {
        if input.form != RecordForm::Word {
            return Err(StationError::Recoverable(format!(
                "expected a word record for {} in {}, got raw form (run clean first)",
                input.character_name, input.source_id
            )));
        }

        let Record {
            source_id,
            character_name,
            payload,
            ..
        } = input;
        let payload = payload
            .iter()
            .map(|token| self.translate_token(token))
            .collect();

        Ok(Some(Record::new(
            source_id,
            character_name,
            payload,
            RecordForm::Word,
        )))
    }

    fn name(&self) -> &'static str {
        "translate"
    }
}

/// Write `tally` to a file, creating parent directories.
pub fn write_tally_file(tally: &WordTally, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path).map_err(|e| {
        TcpSpeechError::Other(format!("Failed to create {}: {}", path.display(), e))
    })?;
    tally.write_tsv(std::io::BufWriter::new(file))
}

/// Add the counts of a tally file written by an earlier run.
///
/// A missing file leaves `tally` unchanged.
pub fn seed_tally_file(tally: &mut WordTally, path: &std::path::Path) -> Result<()> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(TcpSpeechError::Other(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            )));
        }
    };
    tally.seed_from_tsv(std::io::BufReader::new(file))
}
