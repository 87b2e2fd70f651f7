//! Default configuration constants for tcpspeech.
//!
//! Shared by the stage option types and the TOML configuration so both agree
//! on what an unset value means.

/// Joiner replacing whitespace in character names of word records.
///
/// `"First Witch"` becomes `"First-Witch"`. Hyphens keep underscores free
/// for the shard file naming convention.
pub const NAME_JOINER: &str = "-";

/// Field separator of substitution dictionaries.
pub const DICTIONARY_SEPARATOR: &str = "\t";

/// Token written for untranslated words when originals are not preserved.
pub const PLACEHOLDER: &str = "<unk>";

/// Directory shard files are written to.
pub const SHARD_DIRECTORY: &str = ".";

/// Extension of shard files, without the dot.
pub const SHARD_EXTENSION: &str = "txt";

/// Separator between name segments of shard files.
pub const SEGMENT_SEPARATOR: &str = "_";

/// Field separator of pronouncing dictionaries (CMU format).
pub const PHONEME_SEPARATOR: &str = " ";

/// Field separator of character map files.
pub const CHARACTER_MAP_SEPARATOR: &str = "\t";
