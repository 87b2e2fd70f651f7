//! Command-line interface for tcpspeech
//!
//! Provides argument parsing using clap derive macros.

use crate::merge::SeparatorChoice;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Turn TCP play transcripts into per-character word streams
#[derive(Parser, Debug)]
#[command(
    name = "tcpspeech",
    version,
    about = "Turn TCP play transcripts into per-character word streams"
)]
pub struct Cli {
    /// Stage to run
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress warnings and summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-stage summaries)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Field separator given on the command line.
///
/// `tab`, `\t` and `space` name the whitespace separators, which are awkward
/// to type in a shell.
pub fn parse_separator(value: &str) -> Result<String, String> {
    let separator = match value {
        "tab" | "\\t" => "\t",
        "space" => " ",
        other => other,
    };
    if separator.is_empty() {
        return Err("separator must not be empty".to_string());
    }
    Ok(separator.to_string())
}

/// Input and output of a line-stream stage.
#[derive(Args, Debug, Clone, Default)]
pub struct StreamArgs {
    /// Read records from FILE instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Write records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Documents read by the XML stages.
#[derive(Args, Debug, Clone, Default)]
pub struct DocumentArgs {
    /// Documents to read
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory prepended to every file and listed code
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// CSV file listing TCP codes in its first column
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Skip the first line of the code list
    #[arg(long, requires = "list")]
    pub skip_header: bool,

    /// Write records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract raw speech records from TCP XML documents
    Extract {
        #[command(flatten)]
        documents: DocumentArgs,
    },

    /// List the cast named in dramatis personae sections
    Personae {
        #[command(flatten)]
        documents: DocumentArgs,
    },

    /// Strip markup and normalise raw records into word records
    Clean {
        #[command(flatten)]
        stream: StreamArgs,

        /// Keep the original letter case
        #[arg(long)]
        preserve_case: bool,

        /// Keep punctuation
        #[arg(long)]
        keep_punctuation: bool,

        /// Replace characters that cannot be transliterated with TEXT
        #[arg(long, value_name = "TEXT")]
        unknown_char: Option<String>,
    },

    /// Substitute words using a dictionary
    Translate {
        #[command(flatten)]
        stream: StreamArgs,

        /// Substitution dictionary (overrides config and TCPSPEECH_DICTIONARY)
        #[arg(short, long, value_name = "FILE")]
        dictionary: Option<PathBuf>,

        /// Field separator of the dictionary (default: tab)
        #[arg(short, long, value_name = "SEP", value_parser = parse_separator)]
        separator: Option<String>,

        /// Seed untranslated-word counts from FILE and write the updated tally back
        #[arg(long, value_name = "FILE")]
        untranslated: Option<PathBuf>,

        /// Keep the first entry for a repeated key
        #[arg(long)]
        first_wins: bool,

        /// Match dictionary keys case-insensitively
        #[arg(long)]
        ignore_case: bool,

        /// Skip priority 2 (modernising) entries
        #[arg(long)]
        no_modernize: bool,

        /// Replace untranslated words with the placeholder
        #[arg(long)]
        no_preserve: bool,
    },

    /// Write each character's payload to its own file and pass records through
    Separate {
        #[command(flatten)]
        stream: StreamArgs,

        /// Directory for character files
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Extension of character files
        #[arg(long, value_name = "EXT")]
        ext: Option<String>,

        /// One subdirectory per source id
        #[arg(long)]
        bucket: bool,
    },

    /// Reassemble records from character files
    Merge {
        /// Files or directories to merge
        #[arg(value_name = "PATH", required = true)]
        inputs: Vec<PathBuf>,

        /// Leading filename segments to ignore
        #[arg(short, long, value_name = "N")]
        left: Option<usize>,

        /// Trailing filename segments to ignore
        #[arg(short, long, value_name = "N")]
        right: Option<usize>,

        /// Payload separator: auto, tab or space
        #[arg(short, long, value_name = "SEP")]
        separator: Option<SeparatorChoice>,

        /// Only merge files with this extension
        #[arg(long, value_name = "EXT")]
        ext: Option<String>,

        /// Write records to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rename characters with a character map
    Combine {
        #[command(flatten)]
        stream: StreamArgs,

        /// Map of source id, raw name and canonical name
        #[arg(short, long, value_name = "FILE")]
        map: PathBuf,

        /// Concatenate all records of a character into one
        #[arg(long)]
        group: bool,

        /// Field separator of the map file (default: tab)
        #[arg(short, long, value_name = "SEP", value_parser = parse_separator)]
        separator: Option<String>,
    },

    /// List every character once
    Characters {
        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Convert words to phonemes with a pronouncing dictionary
    Phonemes {
        #[command(flatten)]
        stream: StreamArgs,

        /// Pronouncing dictionary (overrides config and TCPSPEECH_PHONEME_DICTIONARY)
        #[arg(short, long, value_name = "FILE")]
        dictionary: Option<PathBuf>,

        /// Field separator of the dictionary (default: space)
        #[arg(short, long, value_name = "SEP", value_parser = parse_separator)]
        separator: Option<String>,

        /// Keep stress digits on vowels
        #[arg(long)]
        preserve_stress: bool,

        /// Seed unknown-word counts from FILE and write the updated tally back
        #[arg(long, value_name = "FILE")]
        unknowns: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_a_command() {
        assert!(Cli::try_parse_from(["tcpspeech"]).is_err());
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["tcpspeech", "clean", "-vv", "--config", "c.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "tcpspeech",
            "extract",
            "--dir",
            "corpus",
            "--list",
            "codes.csv",
            "--skip-header",
            "A001.xml",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract { documents } => {
                assert_eq!(documents.files, vec![PathBuf::from("A001.xml")]);
                assert_eq!(documents.dir, Some(PathBuf::from("corpus")));
                assert_eq!(documents.list, Some(PathBuf::from("codes.csv")));
                assert!(documents.skip_header);
                assert!(documents.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_personae() {
        let cli = Cli::try_parse_from([
            "tcpspeech",
            "personae",
            "--list",
            "codes.csv",
            "-o",
            "cast.tsv",
        ])
        .unwrap();
        match cli.command {
            Commands::Personae { documents } => {
                assert!(documents.files.is_empty());
                assert_eq!(documents.list, Some(PathBuf::from("codes.csv")));
                assert_eq!(documents.output, Some(PathBuf::from("cast.tsv")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["tcpspeech", "personae", "--skip-header"]).is_err());
    }

    #[test]
    fn test_skip_header_needs_list() {
        assert!(Cli::try_parse_from(["tcpspeech", "extract", "--skip-header"]).is_err());
    }

    #[test]
    fn test_parse_stream_args() {
        let cli = Cli::try_parse_from([
            "tcpspeech",
            "clean",
            "-i",
            "raw.tsv",
            "-o",
            "words.txt",
            "--preserve-case",
        ])
        .unwrap();
        match cli.command {
            Commands::Clean {
                stream,
                preserve_case,
                keep_punctuation,
                unknown_char,
            } => {
                assert_eq!(stream.input, Some(PathBuf::from("raw.tsv")));
                assert_eq!(stream.output, Some(PathBuf::from("words.txt")));
                assert!(preserve_case);
                assert!(!keep_punctuation);
                assert!(unknown_char.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from([
            "tcpspeech", "merge", "-l", "0", "-r", "1", "-s", "tab", "shards",
        ])
        .unwrap();
        match cli.command {
            Commands::Merge {
                inputs,
                left,
                right,
                separator,
                ..
            } => {
                assert_eq!(inputs, vec![PathBuf::from("shards")]);
                assert_eq!(left, Some(0));
                assert_eq!(right, Some(1));
                assert_eq!(separator, Some(SeparatorChoice::Tab));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_merge_needs_inputs() {
        assert!(Cli::try_parse_from(["tcpspeech", "merge"]).is_err());
    }

    #[test]
    fn test_parse_translate_flags() {
        let cli = Cli::try_parse_from([
            "tcpspeech",
            "translate",
            "-d",
            "modern.tsv",
            "--first-wins",
            "--no-preserve",
            "--untranslated",
            "missing.tsv",
        ])
        .unwrap();
        match cli.command {
            Commands::Translate {
                dictionary,
                first_wins,
                no_preserve,
                ignore_case,
                untranslated,
                ..
            } => {
                assert_eq!(dictionary, Some(PathBuf::from("modern.tsv")));
                assert!(first_wins);
                assert!(no_preserve);
                assert!(!ignore_case);
                assert_eq!(untranslated, Some(PathBuf::from("missing.tsv")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_separator_flags() {
        let cli = Cli::try_parse_from(["tcpspeech", "translate", "-s", ":", "-d", "old.txt"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Translate { separator: Some(ref s), .. } if s == ":"
        ));

        let cli = Cli::try_parse_from(["tcpspeech", "translate", "--separator", "tab"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Translate { separator: Some(ref s), .. } if s == "\t"
        ));

        let cli = Cli::try_parse_from(["tcpspeech", "phonemes", "-s", "space"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Phonemes { separator: Some(ref s), .. } if s == " "
        ));

        let cli = Cli::try_parse_from(["tcpspeech", "combine", "-m", "map.csv", "-s", ","]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Combine { separator: Some(ref s), .. } if s == ","
        ));

        assert!(Cli::try_parse_from(["tcpspeech", "translate", "-s", ""]).is_err());
    }

    #[test]
    fn test_separator_names() {
        assert_eq!(parse_separator("\\t").unwrap(), "\t");
        assert_eq!(parse_separator("tab").unwrap(), "\t");
        assert_eq!(parse_separator("space").unwrap(), " ");
        assert_eq!(parse_separator("=").unwrap(), "=");
        assert!(parse_separator("").is_err());
    }

    #[test]
    fn test_combine_requires_map() {
        assert!(Cli::try_parse_from(["tcpspeech", "combine"]).is_err());
        let cli = Cli::try_parse_from(["tcpspeech", "combine", "-m", "map.tsv", "--group"]).unwrap();
        assert!(matches!(cli.command, Commands::Combine { group: true, .. }));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["tcpspeech", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
