//! Substitution dictionaries for the translate stage.
//!
//! A dictionary file holds one `key<sep>value[<sep>priority]` entry per
//! line. Blank lines and `#` comments are skipped. The loaded dictionary is
//! an immutable value; one is built per translate invocation.

use crate::defaults;
use crate::error::{Result, TcpSpeechError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which entry wins when a key occurs more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Later entries override earlier ones.
    #[default]
    LastWins,
    FirstWins,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::LastWins => write!(f, "last-wins"),
            DuplicatePolicy::FirstWins => write!(f, "first-wins"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "last-wins" | "last" => Ok(DuplicatePolicy::LastWins),
            "first-wins" | "first" => Ok(DuplicatePolicy::FirstWins),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected last-wins or first-wins)"
            )),
        }
    }
}

/// How a dictionary file is read and matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryOptions {
    pub separator: String,
    pub duplicates: DuplicatePolicy,
    /// When false, keys and lookups are lowercased.
    pub case_sensitive: bool,
    /// Apply priority-2 (modernizing) entries.
    pub modernize: bool,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            separator: defaults::DICTIONARY_SEPARATOR.to_string(),
            duplicates: DuplicatePolicy::default(),
            case_sensitive: true,
            modernize: true,
        }
    }
}

/// Immutable word-to-word substitution map.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, String>,
    case_sensitive: bool,
}

impl Dictionary {
    /// Build a case-sensitive dictionary from pairs; later pairs win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            case_sensitive: true,
        }
    }

    /// Load a dictionary file. Any unparseable line fails the whole load.
    pub fn load(path: &Path, options: &DictionaryOptions) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TcpSpeechError::DictionaryLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string(), options)
    }

    /// Parse dictionary text. `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str, options: &DictionaryOptions) -> Result<Self> {
        if options.separator.is_empty() {
            return Err(TcpSpeechError::DictionaryLoad {
                path: origin.to_string(),
                message: "empty field separator".to_string(),
            });
        }

        let fail = |line: usize, message: String| TcpSpeechError::DictionaryLoad {
            path: origin.to_string(),
            message: format!("line {line}: {message}"),
        };

        let mut entries = HashMap::new();
        for (index, raw) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(options.separator.as_str()).collect();
            let (key, value) = match fields.as_slice() {
                [key, value] | [key, value, _] => (key.trim(), value.trim()),
                [_] => return Err(fail(line_number, "expected key and value".to_string())),
                _ => {
                    return Err(fail(
                        line_number,
                        format!("expected at most 3 fields, found {}", fields.len()),
                    ));
                }
            };

            if key.is_empty() {
                return Err(fail(line_number, "empty key".to_string()));
            }
            if value.is_empty() {
                return Err(fail(line_number, format!("empty value for '{key}'")));
            }
            if key.contains(char::is_whitespace) || value.contains(char::is_whitespace) {
                return Err(fail(
                    line_number,
                    format!("'{key}' -> '{value}' is not a single word"),
                ));
            }

            if let Some(priority) = fields.get(2) {
                match priority.trim() {
                    "0" | "1" => {}
                    "2" if options.modernize => {}
                    "2" => continue,
                    other => {
                        return Err(fail(line_number, format!("unknown priority '{other}'")));
                    }
                }
            }

            let key = if options.case_sensitive {
                key.to_string()
            } else {
                key.to_lowercase()
            };
            match options.duplicates {
                DuplicatePolicy::LastWins => {
                    entries.insert(key, value.to_string());
                }
                DuplicatePolicy::FirstWins => {
                    entries.entry(key).or_insert_with(|| value.to_string());
                }
            }
        }

        Ok(Self {
            entries,
            case_sensitive: options.case_sensitive,
        })
    }

    /// Replacement for `word`, if any.
    pub fn lookup(&self, word: &str) -> Option<&str> {
        if self.case_sensitive {
            self.entries.get(word).map(String::as_str)
        } else {
            self.entries.get(&word.to_lowercase()).map(String::as_str)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
