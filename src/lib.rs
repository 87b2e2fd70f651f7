//! tcpspeech - per-character speech streams from TCP play transcripts
//!
//! Each stage reads line records and writes line records, so stages compose
//! with ordinary shell pipes: extract, clean, translate, separate, merge.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod characters;
pub mod clean;
#[cfg(feature = "cli")]
pub mod cli;
pub mod combine;
pub mod config;
pub mod defaults;
pub mod dictionary;
pub mod error;
pub mod extract;
pub mod merge;
#[cfg(feature = "cli")]
pub mod output;
pub mod phonemes;
pub mod pipeline;
pub mod record;
pub mod shard;
pub mod sys;
pub mod translate;

// Record protocol
pub use record::{InputForm, Record, RecordForm, parse_line, serialize, word_safe_name};

// Stages
pub use clean::{Cleaner, CleanerOptions};
pub use dictionary::{Dictionary, DictionaryOptions, DuplicatePolicy};
pub use extract::{
    ExtractInputs, ExtractTarget, Extractor, SourceDocument, extract_document, extract_personae,
};
pub use merge::{Merger, NamingConvention, SeparatorChoice, decompose_filename};
pub use shard::{ShardLayout, ShardWriter, Sharder};
pub use translate::{Translator, TranslatorOptions, WordTally};

// Error handling
pub use error::{Result, TcpSpeechError};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::sink::{CollectorSink, RecordSink, StreamSink};
pub use pipeline::station::{LineRunner, RunSummary, Station};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
