use crate::clean::CleanerOptions;
use crate::defaults;
use crate::dictionary::{DictionaryOptions, DuplicatePolicy};
use crate::error::{Result, TcpSpeechError};
use crate::merge::{NamingConvention, SeparatorChoice};
use crate::shard::ShardLayout;
use crate::translate::TranslatorOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub clean: CleanConfig,
    pub translate: TranslateConfig,
    pub shard: ShardConfig,
    pub merge: MergeConfig,
    pub phonemes: PhonemesConfig,
}

/// Cleaner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleanConfig {
    pub lowercase: bool,
    pub strip_punctuation: bool,
    /// Placeholder for characters with no ASCII transliteration.
    pub unknown_char: Option<String>,
    pub name_joiner: String,
}

/// Translator and dictionary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// Dictionary used when none is given on the command line.
    pub dictionary: Option<PathBuf>,
    pub separator: String,
    pub duplicates: DuplicatePolicy,
    pub case_sensitive: bool,
    pub modernize: bool,
    pub preserve_original: bool,
    pub placeholder: String,
}

/// Sharder output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShardConfig {
    pub directory: PathBuf,
    pub extension: String,
    pub bucket: bool,
}

/// Merger naming convention
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeConfig {
    pub segment_separator: String,
    pub join_separator: String,
    pub left_strip: usize,
    pub right_strip: usize,
    pub separator: SeparatorChoice,
    /// Only merge files with this extension.
    pub extension: Option<String>,
}

/// Pronouncing dictionary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhonemesConfig {
    pub dictionary: Option<PathBuf>,
    pub separator: String,
    pub preserve_stress: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        let options = CleanerOptions::default();
        Self {
            lowercase: options.lowercase,
            strip_punctuation: options.strip_punctuation,
            unknown_char: options.unknown_char,
            name_joiner: options.name_joiner,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        let options = DictionaryOptions::default();
        Self {
            dictionary: None,
            separator: options.separator,
            duplicates: options.duplicates,
            case_sensitive: options.case_sensitive,
            modernize: options.modernize,
            preserve_original: true,
            placeholder: defaults::PLACEHOLDER.to_string(),
        }
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        let layout = ShardLayout::default();
        Self {
            directory: layout.directory,
            extension: layout.extension,
            bucket: layout.bucket,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        let convention = NamingConvention::default();
        Self {
            segment_separator: convention.segment_separator,
            join_separator: convention.join_separator,
            left_strip: convention.left_strip,
            right_strip: convention.right_strip,
            separator: SeparatorChoice::default(),
            extension: None,
        }
    }
}

impl Default for PhonemesConfig {
    fn default() -> Self {
        Self {
            dictionary: None,
            separator: defaults::PHONEME_SEPARATOR.to_string(),
            preserve_stress: false,
        }
    }
}

impl CleanConfig {
    pub fn options(&self) -> CleanerOptions {
        CleanerOptions {
            lowercase: self.lowercase,
            strip_punctuation: self.strip_punctuation,
            unknown_char: self.unknown_char.clone(),
            name_joiner: self.name_joiner.clone(),
        }
    }
}

impl TranslateConfig {
    pub fn dictionary_options(&self) -> DictionaryOptions {
        DictionaryOptions {
            separator: self.separator.clone(),
            duplicates: self.duplicates,
            case_sensitive: self.case_sensitive,
            modernize: self.modernize,
        }
    }

    pub fn translator_options(&self) -> TranslatorOptions {
        TranslatorOptions {
            preserve_original: self.preserve_original,
            placeholder: self.placeholder.clone(),
        }
    }
}

impl ShardConfig {
    pub fn layout(&self) -> ShardLayout {
        ShardLayout {
            directory: self.directory.clone(),
            extension: self.extension.trim_start_matches('.').to_string(),
            bucket: self.bucket,
        }
    }
}

impl MergeConfig {
    pub fn convention(&self) -> NamingConvention {
        NamingConvention {
            segment_separator: self.segment_separator.clone(),
            join_separator: self.join_separator.clone(),
            left_strip: self.left_strip,
            right_strip: self.right_strip,
        }
    }
}

fn invalid(key: &str, message: &str) -> TcpSpeechError {
    TcpSpeechError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. A missing file is
    /// [`TcpSpeechError::ConfigFileNotFound`]; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TcpSpeechError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                TcpSpeechError::ConfigParse {
                    message: format!("{}: {}", path.display(), e),
                }
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if it doesn't exist
    ///
    /// Only a missing file yields defaults; invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(TcpSpeechError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Configuration for a run: an explicit path must exist, the default
    /// path may be absent. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) => Self::load_or_default(&path)?,
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides())
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.translate.separator.is_empty() {
            return Err(invalid("translate.separator", "must not be empty"));
        }
        if self.translate.placeholder.is_empty()
            || self.translate.placeholder.chars().any(char::is_whitespace)
        {
            return Err(invalid(
                "translate.placeholder",
                "must be a single non-empty word",
            ));
        }
        if self.merge.segment_separator.is_empty() {
            return Err(invalid("merge.segment_separator", "must not be empty"));
        }
        if self.phonemes.separator.is_empty() {
            return Err(invalid("phonemes.separator", "must not be empty"));
        }
        if self.clean.name_joiner.chars().any(char::is_whitespace) {
            return Err(invalid("clean.name_joiner", "must not contain whitespace"));
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TCPSPEECH_DICTIONARY → translate.dictionary
    /// - TCPSPEECH_SHARD_DIR → shard.directory
    /// - TCPSPEECH_PHONEME_DICTIONARY → phonemes.dictionary
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dictionary) = std::env::var("TCPSPEECH_DICTIONARY")
            && !dictionary.is_empty()
        {
            self.translate.dictionary = Some(PathBuf::from(dictionary));
        }

        if let Ok(directory) = std::env::var("TCPSPEECH_SHARD_DIR")
            && !directory.is_empty()
        {
            self.shard.directory = PathBuf::from(directory);
        }

        if let Ok(dictionary) = std::env::var("TCPSPEECH_PHONEME_DICTIONARY")
            && !dictionary.is_empty()
        {
            self.phonemes.dictionary = Some(PathBuf::from(dictionary));
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/tcpspeech/config.toml on Linux, or `None` when no
    /// config directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tcpspeech").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_tcpspeech_env() {
        remove_env("TCPSPEECH_DICTIONARY");
        remove_env("TCPSPEECH_SHARD_DIR");
        remove_env("TCPSPEECH_PHONEME_DICTIONARY");
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert!(config.clean.lowercase);
        assert!(config.clean.strip_punctuation);
        assert_eq!(config.clean.unknown_char, None);
        assert_eq!(config.clean.name_joiner, "-");

        assert_eq!(config.translate.dictionary, None);
        assert_eq!(config.translate.separator, "\t");
        assert_eq!(config.translate.duplicates, DuplicatePolicy::LastWins);
        assert!(config.translate.case_sensitive);
        assert!(config.translate.modernize);
        assert!(config.translate.preserve_original);
        assert_eq!(config.translate.placeholder, "<unk>");

        assert_eq!(config.shard.directory, PathBuf::from("."));
        assert_eq!(config.shard.extension, "txt");
        assert!(!config.shard.bucket);

        assert_eq!(config.merge.segment_separator, "_");
        assert_eq!(config.merge.join_separator, "_");
        assert_eq!(config.merge.left_strip, 0);
        assert_eq!(config.merge.right_strip, 0);
        assert_eq!(config.merge.separator, SeparatorChoice::Auto);

        assert_eq!(config.phonemes.separator, " ");
        assert!(!config.phonemes.preserve_stress);
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [clean]
            lowercase = false
            unknown_char = "?"

            [translate]
            dictionary = "/usr/share/tcpspeech/modern.tsv"
            separator = "="
            duplicates = "first-wins"
            case_sensitive = false
            modernize = false

            [shard]
            directory = "shards"
            extension = ".tsv"
            bucket = true

            [merge]
            left_strip = 2
            right_strip = 1
            separator = "tab"
            extension = "txt"

            [phonemes]
            preserve_stress = true
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert!(!config.clean.lowercase);
        assert_eq!(config.clean.unknown_char.as_deref(), Some("?"));
        assert_eq!(
            config.translate.dictionary,
            Some(PathBuf::from("/usr/share/tcpspeech/modern.tsv"))
        );
        assert_eq!(config.translate.duplicates, DuplicatePolicy::FirstWins);
        assert!(!config.translate.dictionary_options().case_sensitive);
        assert!(!config.translate.dictionary_options().modernize);
        assert_eq!(config.translate.dictionary_options().separator, "=");

        let layout = config.shard.layout();
        assert_eq!(layout.directory, PathBuf::from("shards"));
        assert_eq!(layout.extension, "tsv");
        assert!(layout.bucket);

        let convention = config.merge.convention();
        assert_eq!(convention.left_strip, 2);
        assert_eq!(convention.right_strip, 1);
        assert_eq!(config.merge.separator, SeparatorChoice::Tab);
        assert_eq!(config.merge.extension.as_deref(), Some("txt"));

        assert!(config.phonemes.preserve_stress);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [shard]
            bucket = true
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert!(config.shard.bucket);
        assert_eq!(config.shard.extension, "txt");
        assert_eq!(config.clean, CleanConfig::default());
        assert_eq!(config.translate, TranslateConfig::default());
    }

    #[test]
    fn test_options_match_stage_defaults() {
        let config = Config::default();
        assert_eq!(config.clean.options(), CleanerOptions::default());
        assert_eq!(config.translate.dictionary_options(), DictionaryOptions::default());
        assert_eq!(config.translate.translator_options(), TranslatorOptions::default());
        assert_eq!(config.shard.layout(), ShardLayout::default());
        assert_eq!(config.merge.convention(), NamingConvention::default());
    }

    #[test]
    fn test_env_override_dictionary() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_tcpspeech_env();

        set_env("TCPSPEECH_DICTIONARY", "/tmp/modern.tsv");
        let config = Config::default().with_env_overrides();

        assert_eq!(
            config.translate.dictionary,
            Some(PathBuf::from("/tmp/modern.tsv"))
        );
        assert_eq!(config.shard.directory, PathBuf::from(".")); // Not overridden

        clear_tcpspeech_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_tcpspeech_env();

        set_env("TCPSPEECH_DICTIONARY", "d.tsv");
        set_env("TCPSPEECH_SHARD_DIR", "out");
        set_env("TCPSPEECH_PHONEME_DICTIONARY", "cmudict");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.translate.dictionary, Some(PathBuf::from("d.tsv")));
        assert_eq!(config.shard.directory, PathBuf::from("out"));
        assert_eq!(config.phonemes.dictionary, Some(PathBuf::from("cmudict")));

        clear_tcpspeech_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_tcpspeech_env();

        set_env("TCPSPEECH_SHARD_DIR", "");
        let config = Config::default().with_env_overrides();

        // Empty string should not override default
        assert_eq!(config.shard.directory, PathBuf::from("."));

        clear_tcpspeech_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [shard
            directory = "broken
        "#,
        );

        let result = Config::load(temp_file.path());

        assert!(matches!(result, Err(TcpSpeechError::Config(_))));
    }

    #[test]
    fn test_unknown_duplicate_policy_is_rejected() {
        let temp_file = write_config("[translate]\nduplicates = \"random\"\n");
        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_empty_separator_is_invalid_value() {
        let temp_file = write_config("[merge]\nsegment_separator = \"\"\n");
        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(
            err,
            TcpSpeechError::ConfigInvalidValue { ref key, .. } if key == "merge.segment_separator"
        ));
    }

    #[test]
    fn test_placeholder_must_be_one_word() {
        for placeholder in ["\"\"", "\"no match\""] {
            let temp_file = write_config(&format!("[translate]\nplaceholder = {placeholder}\n"));
            let err = Config::load(temp_file.path()).unwrap_err();
            assert!(matches!(
                err,
                TcpSpeechError::ConfigInvalidValue { ref key, .. } if key == "translate.placeholder"
            ));
        }
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        if let Some(path) = Config::default_path() {
            let path_str = path.to_string_lossy();
            assert!(path_str.contains("tcpspeech"));
            assert!(path_str.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_missing_explicit_file_is_not_found() {
        let missing_path = Path::new("/tmp/nonexistent_tcpspeech_config_12345.toml");
        assert!(matches!(
            Config::load(missing_path),
            Err(TcpSpeechError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_tcpspeech_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let temp_file = write_config("[clean\nlowercase = maybe\n");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }
}
