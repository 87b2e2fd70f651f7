//! Character-name remapping.
//!
//! A character map renames the abbreviated or variant speaker names found in
//! transcripts to one canonical name per character. With grouping enabled
//! the stage also concatenates every record of a character into one.

use crate::defaults;
use crate::error::{Result, TcpSpeechError};
use crate::pipeline::{Station, StationError};
use crate::record::{Record, RecordForm, word_safe_name};
use std::collections::HashMap;
use std::path::Path;

type CharacterKey = (String, String);

/// `(source_id, raw name) -> canonical name`.
#[derive(Debug, Clone, Default)]
pub struct CharacterMap {
    raw: HashMap<CharacterKey, String>,
    // Same entries keyed by the word-safe raw name.
    word: HashMap<CharacterKey, String>,
    joiner: String,
}

impl CharacterMap {
    /// Load a map file of `source_id<sep>raw name<sep>canonical` lines.
    pub fn load(path: &Path, separator: &str, joiner: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TcpSpeechError::DictionaryLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string(), separator, joiner)
    }

    pub fn parse(content: &str, origin: &str, separator: &str, joiner: &str) -> Result<Self> {
        let mut map = Self {
            joiner: joiner.to_string(),
            ..Default::default()
        };
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(separator).map(str::trim).collect();
            let [source_id, raw_name, canonical] = fields.as_slice() else {
                return Err(TcpSpeechError::DictionaryLoad {
                    path: origin.to_string(),
                    message: format!(
                        "line {}: expected source id, name and replacement, found {} field(s)",
                        index + 1,
                        fields.len()
                    ),
                });
            };
            map.insert(source_id, raw_name, canonical);
        }
        Ok(map)
    }

    fn insert(&mut self, source_id: &str, raw_name: &str, canonical: &str) {
        self.raw.insert(
            (source_id.to_string(), raw_name.to_string()),
            canonical.to_string(),
        );
        self.word.insert(
            (source_id.to_string(), word_safe_name(raw_name, &self.joiner)),
            canonical.to_string(),
        );
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Canonical name for a record's speaker, in the record's form.
    pub fn rename(&self, source_id: &str, name: &str, form: RecordForm) -> Option<String> {
        let key = (source_id.to_string(), name.to_string());
        match form {
            RecordForm::Raw => self.raw.get(&key).cloned(),
            RecordForm::Word => self
                .raw
                .get(&key)
                .or_else(|| self.word.get(&key))
                .map(|canonical| word_safe_name(canonical, &self.joiner)),
        }
    }
}

/// Renames speakers and optionally groups their records.
pub struct Combiner {
    map: CharacterMap,
    group: bool,
    order: Vec<CharacterKey>,
    grouped: HashMap<CharacterKey, Record>,
    renamed: usize,
}

impl Combiner {
    pub fn new(map: CharacterMap, group: bool) -> Self {
        Self {
            map,
            group,
            order: Vec::new(),
            grouped: HashMap::new(),
            renamed: 0,
        }
    }

    /// Records whose speaker was renamed.
    pub fn renamed(&self) -> usize {
        self.renamed
    }
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new(
            CharacterMap {
                joiner: defaults::NAME_JOINER.to_string(),
                ..Default::default()
            },
            false,
        )
    }
}

impl Station for Combiner {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, mut input: Record) -> std::result::Result<Option<Record>, StationError> {
        if let Some(canonical) = self
            .map
            .rename(&input.source_id, &input.character_name, input.form)
        {
            input.character_name = canonical;
            self.renamed += 1;
        }

        if !self.group {
            return Ok(Some(input));
        }

        let key = (input.source_id.clone(), input.character_name.clone());
        match self.grouped.get_mut(&key) {
            Some(existing) => existing.payload.extend(input.payload),
            None => {
                self.order.push(key.clone());
                self.grouped.insert(key, input);
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "combine"
    }

    fn finish(&mut self) -> std::result::Result<Vec<Record>, StationError> {
        let mut grouped = std::mem::take(&mut self.grouped);
        Ok(std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|key| grouped.remove(&key))
            .collect())
    }
}
