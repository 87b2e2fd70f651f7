//! Line-record protocol shared by every stage.
//!
//! Two forms travel between stages:
//!
//! ```text
//! raw:  source_id\tcharacter_name\tfragment[\tfragment]...
//! word: source_id character_name word [word]...
//! ```
//!
//! The form is carried explicitly on each [`Record`] instead of being guessed
//! from the separator, so a character name containing a space can still
//! travel in raw form. Only the cleaner converts raw records into word records.

use crate::error::{Result, TcpSpeechError};
use std::fmt;
use std::str::FromStr;

/// The two serializations of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordForm {
    /// Tab separated; payload units are markup fragments.
    Raw,
    /// Space separated; payload units are single tokens.
    Word,
}

impl RecordForm {
    pub fn separator(self) -> char {
        match self {
            RecordForm::Raw => '\t',
            RecordForm::Word => ' ',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordForm::Raw => "raw",
            RecordForm::Word => "word",
        }
    }
}

impl fmt::Display for RecordForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form a stage expects on its input.
///
/// `Auto` is only meant for stages that accept either form (separate,
/// combine, characters): it picks `Raw` for any line containing a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputForm {
    #[default]
    Auto,
    Raw,
    Word,
}

impl InputForm {
    /// Decide the form of a single input line.
    pub fn resolve(self, line: &str) -> RecordForm {
        match self {
            InputForm::Raw => RecordForm::Raw,
            InputForm::Word => RecordForm::Word,
            InputForm::Auto => {
                if line.contains('\t') {
                    RecordForm::Raw
                } else {
                    RecordForm::Word
                }
            }
        }
    }
}

impl From<RecordForm> for InputForm {
    fn from(form: RecordForm) -> Self {
        match form {
            RecordForm::Raw => InputForm::Raw,
            RecordForm::Word => InputForm::Word,
        }
    }
}

impl FromStr for InputForm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(InputForm::Auto),
            "raw" | "tab" => Ok(InputForm::Raw),
            "word" | "space" => Ok(InputForm::Word),
            other => Err(format!(
                "unknown record form '{other}' (expected auto, raw or word)"
            )),
        }
    }
}

/// The unit flowing through every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Archival code of the originating document.
    pub source_id: String,
    /// Display name of the speaker.
    pub character_name: String,
    /// Markup fragments (raw form) or tokens (word form), in reading order.
    pub payload: Vec<String>,
    pub form: RecordForm,
}

impl Record {
    pub fn new(
        source_id: impl Into<String>,
        character_name: impl Into<String>,
        payload: Vec<String>,
        form: RecordForm,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            character_name: character_name.into(),
            payload,
            form,
        }
    }

    /// `(source_id, character_name)`, the identity preserved by every stage.
    pub fn key(&self) -> (&str, &str) {
        (&self.source_id, &self.character_name)
    }

    /// Serialize in the record's own form, without a trailing newline.
    pub fn to_line(&self) -> String {
        serialize(self, self.form)
    }

    /// Payload joined with the form separator, as stored in shard files.
    pub fn payload_line(&self) -> String {
        let mut sep = [0u8; 4];
        self.payload.join(self.form.separator().encode_utf8(&mut sep))
    }
}

/// Parse one line of a record stream.
///
/// A single trailing `\n` or `\r\n` is ignored. `line_number` is only used
/// for error messages.
pub fn parse_line(line: &str, form: RecordForm, line_number: usize) -> Result<Record> {
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);

    let mut fields = line.split(form.separator());
    let (source_id, character_name) = match (fields.next(), fields.next()) {
        (Some(source), Some(character)) => (source, character),
        _ => {
            return Err(TcpSpeechError::MalformedRecord {
                line: line_number,
                message: format!("expected at least 2 {form} fields, found 1"),
            });
        }
    };

    if source_id.is_empty() {
        return Err(TcpSpeechError::MalformedRecord {
            line: line_number,
            message: "empty source id".to_string(),
        });
    }

    let payload = match form {
        RecordForm::Raw => fields.map(str::to_string).collect(),
        // Repeated spaces never produce empty tokens.
        RecordForm::Word => fields
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
    };

    Ok(Record::new(source_id, character_name, payload, form))
}

/// Serialize `record` using the separator of `form`.
pub fn serialize(record: &Record, form: RecordForm) -> String {
    let sep = form.separator();
    let mut line = String::with_capacity(
        record.source_id.len()
            + record.character_name.len()
            + record.payload.iter().map(|p| p.len() + 1).sum::<usize>()
            + 1,
    );
    line.push_str(&record.source_id);
    line.push(sep);
    line.push_str(&record.character_name);
    for unit in &record.payload {
        line.push(sep);
        line.push_str(unit);
    }
    line
}

/// Make a character name safe for word form.
///
/// Every run of whitespace becomes `joiner`; leading and trailing whitespace
/// is dropped. `"First  Witch"` becomes `"First-Witch"` with the default joiner.
pub fn word_safe_name(name: &str, joiner: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(joiner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn parse_raw_line_splits_on_tabs() {
        let record = parse_line("A001\tHamlet\t<l>To be</l>\t<l>or not</l>", RecordForm::Raw, 1)
            .unwrap();
        assert_eq!(record.source_id, "A001");
        assert_eq!(record.character_name, "Hamlet");
        assert_eq!(record.payload, words(&["<l>To be</l>", "<l>or not</l>"]));
        assert_eq!(record.form, RecordForm::Raw);
    }

    #[test]
    fn raw_character_name_may_contain_spaces() {
        let record = parse_line("A001\tFirst Witch\t<l>When</l>", RecordForm::Raw, 1).unwrap();
        assert_eq!(record.character_name, "First Witch");
        assert_eq!(record.payload.len(), 1);
    }

    #[test]
    fn parse_word_line_splits_on_spaces() {
        let record = parse_line("A001 Hamlet thee shalt\n", RecordForm::Word, 1).unwrap();
        assert_eq!(record.key(), ("A001", "Hamlet"));
        assert_eq!(record.payload, words(&["thee", "shalt"]));
    }

    #[test]
    fn word_form_ignores_repeated_spaces() {
        let record = parse_line("A001 Hamlet  thee   shalt", RecordForm::Word, 1).unwrap();
        assert_eq!(record.payload, words(&["thee", "shalt"]));
    }

    #[test]
    fn crlf_line_ending_is_stripped() {
        let record = parse_line("A001 Hamlet word\r\n", RecordForm::Word, 1).unwrap();
        assert_eq!(record.payload, words(&["word"]));
    }

    #[test]
    fn identity_only_line_has_empty_payload() {
        let record = parse_line("A001\tHamlet", RecordForm::Raw, 1).unwrap();
        assert!(record.payload.is_empty());
        assert_eq!(record.to_line(), "A001\tHamlet");
    }

    #[test]
    fn single_field_line_is_malformed() {
        let err = parse_line("A001", RecordForm::Raw, 7).unwrap_err();
        match err {
            TcpSpeechError::MalformedRecord { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn word_line_is_malformed_when_read_as_raw() {
        assert!(parse_line("A001 Hamlet to be", RecordForm::Raw, 1).is_err());
    }

    #[test]
    fn empty_source_id_is_malformed() {
        assert!(parse_line("\tHamlet\t<l/>", RecordForm::Raw, 1).is_err());
    }

    #[test]
    fn round_trip_raw_and_word() {
        let raw = Record::new(
            "A001",
            "First Witch",
            words(&["<l>When shall we</l>", "<l>three meet</l>"]),
            RecordForm::Raw,
        );
        assert_eq!(parse_line(&serialize(&raw, RecordForm::Raw), RecordForm::Raw, 1).unwrap(), raw);

        let word = Record::new(
            "A001",
            "First-Witch",
            words(&["when", "shall", "we"]),
            RecordForm::Word,
        );
        assert_eq!(
            parse_line(&serialize(&word, RecordForm::Word), RecordForm::Word, 1).unwrap(),
            word
        );
    }

    #[test]
    fn payload_line_uses_form_separator() {
        let raw = Record::new("A", "B", words(&["<l>a</l>", "<l>b</l>"]), RecordForm::Raw);
        assert_eq!(raw.payload_line(), "<l>a</l>\t<l>b</l>");
        let word = Record::new("A", "B", words(&["a", "b"]), RecordForm::Word);
        assert_eq!(word.payload_line(), "a b");
    }

    #[test]
    fn auto_form_prefers_tab() {
        assert_eq!(InputForm::Auto.resolve("A\tB C\t<l/>"), RecordForm::Raw);
        assert_eq!(InputForm::Auto.resolve("A B c"), RecordForm::Word);
        assert_eq!(InputForm::Word.resolve("A\tB"), RecordForm::Word);
    }

    #[test]
    fn input_form_from_str() {
        assert_eq!("raw".parse::<InputForm>().unwrap(), InputForm::Raw);
        assert_eq!("WORD".parse::<InputForm>().unwrap(), InputForm::Word);
        assert_eq!("auto".parse::<InputForm>().unwrap(), InputForm::Auto);
        assert!("csv".parse::<InputForm>().is_err());
    }

    #[test]
    fn word_safe_name_collapses_whitespace() {
        assert_eq!(word_safe_name("First  Witch", "-"), "First-Witch");
        assert_eq!(word_safe_name(" Lady\tMacbeth ", "-"), "Lady-Macbeth");
        assert_eq!(word_safe_name("Hamlet", "-"), "Hamlet");
        assert_eq!(word_safe_name("Duke of York", "_"), "Duke_of_York");
    }
}
