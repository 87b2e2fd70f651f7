//! Word-to-phoneme conversion with a CMU-style pronouncing dictionary.
//!
//! Dictionary lines look like `word W ER1 D`. Alternative pronunciations
//! (`read(2) ...`) and repeated words are ignored; the first entry wins.

use crate::defaults;
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::{Station, StationError};
use crate::record::{Record, RecordForm};
use crate::translate::WordTally;
use std::collections::HashMap;
use std::path::Path;

/// Lowercased word -> phonemes.
#[derive(Debug, Clone, Default)]
pub struct PronouncingDictionary {
    entries: HashMap<String, Vec<String>>,
}

/// `read(2)` -> `read`.
fn base_word(key: &str) -> &str {
    match key.strip_suffix(')').and_then(|k| k.rsplit_once('(')) {
        Some((word, variant)) if !word.is_empty() && variant.chars().all(|c| c.is_ascii_digit()) => {
            word
        }
        _ => key,
    }
}

impl PronouncingDictionary {
    pub fn load(path: &Path, separator: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TcpSpeechError::DictionaryLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string(), separator)
    }

    pub fn parse(content: &str, origin: &str, separator: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            // CMU dict uses ;;; for comments
            if line.is_empty() || line.starts_with('#') || line.starts_with(";;;") {
                continue;
            }
            let mut fields = line.split(separator).filter(|f| !f.is_empty());
            let (Some(word), Some(first)) = (fields.next(), fields.next()) else {
                return Err(TcpSpeechError::DictionaryLoad {
                    path: origin.to_string(),
                    message: format!("line {}: expected a word and its phonemes", index + 1),
                });
            };
            let mut phonemes = vec![first.to_string()];
            phonemes.extend(fields.map(str::to_string));
            entries
                .entry(base_word(word).to_lowercase())
                .or_insert(phonemes);
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, word: &str) -> Option<&[String]> {
        self.entries.get(&word.to_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `AH0` -> `AH`.
pub fn strip_stress(phoneme: &str) -> &str {
    phoneme.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Replaces every word token with its phonemes.
pub struct Phonemizer {
    dictionary: PronouncingDictionary,
    preserve_stress: bool,
    unknown: WordTally,
}

impl Phonemizer {
    pub fn new(dictionary: PronouncingDictionary, preserve_stress: bool) -> Self {
        Self {
            dictionary,
            preserve_stress,
            unknown: WordTally::new(),
        }
    }

    /// Words with no pronunciation, lowercased.
    pub fn unknown(&self) -> &WordTally {
        &self.unknown
    }

    pub fn unknown_mut(&mut self) -> &mut WordTally {
        &mut self.unknown
    }
}

impl Station for Phonemizer {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, input: Record) -> std::result::Result<Option<Record>, StationError> {
        if input.form != RecordForm::Word {
            return Err(StationError::Recoverable(format!(
                "expected a word record for {} in {}, got raw form",
                input.character_name, input.source_id
            )));
        }

        let mut phonemes = Vec::with_capacity(input.payload.len() * 4);
        for word in &input.payload {
            match self.dictionary.lookup(word) {
                Some(pronunciation) => {
                    phonemes.extend(pronunciation.iter().map(|p| {
                        if self.preserve_stress {
                            p.clone()
                        } else {
                            strip_stress(p).to_string()
                        }
                    }));
                }
                None => self.unknown.add(&word.to_lowercase()),
            }
        }

        Ok(Some(Record::new(
            input.source_id,
            input.character_name,
            phonemes,
            RecordForm::Word,
        )))
    }

    fn name(&self) -> &'static str {
        "phonemes"
    }
}
