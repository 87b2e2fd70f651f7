//! Cleaner: raw records in, word records out.

pub mod charset;
pub mod markup;

use crate::pipeline::{Station, StationError};
use crate::defaults;
use crate::record::{Record, RecordForm, word_safe_name};

/// Cleaner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerOptions {
    /// Lowercase every token.
    pub lowercase: bool,
    /// Remove sentence punctuation.
    pub strip_punctuation: bool,
    /// Placeholder for characters that cannot be transliterated.
    pub unknown_char: Option<String>,
    /// Replacement for whitespace runs in character names.
    pub name_joiner: String,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_punctuation: true,
            unknown_char: None,
            name_joiner: defaults::NAME_JOINER.to_string(),
        }
    }
}

/// Tokens of one cleaned fragment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanedFragment {
    pub tokens: Vec<String>,
    /// Set when the fragment was not well-formed and had its tags dropped
    /// lexically.
    pub fallback: Option<String>,
}

/// Clean one markup fragment into word tokens.
pub fn clean_fragment(fragment: &str, options: &CleanerOptions) -> CleanedFragment {
    let (text, fallback) = match markup::strip_markup(fragment) {
        Ok(text) => (text, None),
        Err(message) => (markup::strip_tags_lossy(fragment), Some(message)),
    };

    let mut text = charset::filter_text(&text, options.unknown_char.as_deref());
    if options.strip_punctuation {
        text = charset::strip_punctuation(&text);
    }
    if options.lowercase {
        text = text.to_lowercase();
    }

    CleanedFragment {
        tokens: text.split_whitespace().map(str::to_string).collect(),
        fallback,
    }
}

/// Converts raw records into word records.
pub struct Cleaner {
    options: CleanerOptions,
    fallbacks: usize,
}

impl Cleaner {
    pub fn new(options: CleanerOptions) -> Self {
        Self {
            options,
            fallbacks: 0,
        }
    }

    /// Fragments that had to be cleaned without a markup parse.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(CleanerOptions::default())
    }
}

impl Station for Cleaner {
    type Input = Record;
    type Output = Record;

    fn process(&mut self, input: Record) -> Result<Option<Record>, StationError> {
        if input.form != RecordForm::Raw {
            return Err(StationError::Recoverable(format!(
                "expected a raw record for {} in {}, got {} form",
                input.character_name, input.source_id, input.form
            )));
        }

        let mut tokens = Vec::new();
        for fragment in &input.payload {
            let cleaned = clean_fragment(fragment, &self.options);
            if cleaned.fallback.is_some() {
                self.fallbacks += 1;
            }
            tokens.extend(cleaned.tokens);
        }

        Ok(Some(Record::new(
            input.source_id,
            word_safe_name(&input.character_name, &self.options.name_joiner),
            tokens,
            RecordForm::Word,
        )))
    }

    fn name(&self) -> &'static str {
        "clean"
    }
}
