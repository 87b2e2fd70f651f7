use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tcpspeech::characters::CharacterLister;
use tcpspeech::clean::Cleaner;
use tcpspeech::cli::{Cli, Commands, DocumentArgs, StreamArgs};
use tcpspeech::combine::{CharacterMap, Combiner};
use tcpspeech::config::Config;
use tcpspeech::defaults;
use tcpspeech::dictionary::{Dictionary, DuplicatePolicy};
use tcpspeech::extract::{ExtractInputs, Extractor};
use tcpspeech::merge::{Merger, collect_entries};
use tcpspeech::output::Diagnostics;
use tcpspeech::phonemes::{Phonemizer, PronouncingDictionary};
use tcpspeech::pipeline::{ErrorReporter, LineRunner, RunSummary, Station, StreamSink};
use tcpspeech::record::{InputForm, Record};
use tcpspeech::shard::Sharder;
use tcpspeech::translate::{Translator, seed_tally_file, write_tally_file};

fn main() -> Result<()> {
    tcpspeech::sys::reset_sigpipe();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "tcpspeech",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let config = Config::resolve(cli.config.as_deref())?;
    let diagnostics = Diagnostics::new(cli.quiet, cli.verbose);
    diagnostics.info("tcpspeech", &format!("version {}", tcpspeech::version_string()));

    match cli.command {
        Commands::Extract { documents } => {
            run_documents(Extractor::new(), documents, &diagnostics)?;
        }
        Commands::Personae { documents } => {
            run_documents(Extractor::personae(), documents, &diagnostics)?;
        }
        Commands::Clean {
            stream,
            preserve_case,
            keep_punctuation,
            unknown_char,
        } => {
            let mut options = config.clean.options();
            if preserve_case {
                options.lowercase = false;
            }
            if keep_punctuation {
                options.strip_punctuation = false;
            }
            if unknown_char.is_some() {
                options.unknown_char = unknown_char;
            }
            let mut cleaner = Cleaner::new(options);
            run_stream(&mut cleaner, &stream, InputForm::Raw, &diagnostics)?;
            if cleaner.fallback_count() > 0 {
                diagnostics.warn(
                    "clean",
                    &format!(
                        "{} malformed fragment(s) cleaned by dropping everything between < and >",
                        cleaner.fallback_count()
                    ),
                );
            }
        }
        Commands::Translate {
            stream,
            dictionary,
            separator,
            untranslated,
            first_wins,
            ignore_case,
            no_modernize,
            no_preserve,
        } => {
            let path = dictionary
                .or_else(|| config.translate.dictionary.clone())
                .context("No dictionary given (use --dictionary or TCPSPEECH_DICTIONARY)")?;
            let mut dictionary_options = config.translate.dictionary_options();
            if let Some(separator) = separator {
                dictionary_options.separator = separator;
            }
            if first_wins {
                dictionary_options.duplicates = DuplicatePolicy::FirstWins;
            }
            if ignore_case {
                dictionary_options.case_sensitive = false;
            }
            if no_modernize {
                dictionary_options.modernize = false;
            }
            let dictionary = Dictionary::load(&path, &dictionary_options)?;
            diagnostics.info(
                "translate",
                &format!("{} entries from {}", dictionary.len(), path.display()),
            );

            let mut translator_options = config.translate.translator_options();
            if no_preserve {
                translator_options.preserve_original = false;
            }
            let mut translator = Translator::new(dictionary, translator_options);
            if let Some(path) = &untranslated {
                seed_tally_file(translator.untranslated_mut(), path)?;
            }
            run_stream(&mut translator, &stream, InputForm::Word, &diagnostics)?;
            diagnostics.info(
                "translate",
                &format!(
                    "{} token(s) translated, {} distinct word(s) untranslated",
                    translator.translated_count(),
                    translator.untranslated().len()
                ),
            );
            if let Some(path) = untranslated {
                write_tally_file(translator.untranslated(), &path)?;
            }
        }
        Commands::Separate {
            stream,
            dir,
            ext,
            bucket,
        } => {
            let mut layout = config.shard.layout();
            if let Some(dir) = dir {
                layout.directory = dir;
            }
            if let Some(ext) = ext {
                layout.extension = ext.trim_start_matches('.').to_string();
            }
            if bucket {
                layout.bucket = true;
            }
            std::fs::create_dir_all(&layout.directory).with_context(|| {
                format!("Failed to create {}", layout.directory.display())
            })?;

            let mut sharder = Sharder::new(layout, &diagnostics);
            run_stream(&mut sharder, &stream, InputForm::Auto, &diagnostics)?;
            diagnostics.info(
                "separate",
                &format!(
                    "{} line(s) written to {} file(s), {} record(s) not sharded",
                    sharder.shards().lines_written(),
                    sharder.shards().files_written(),
                    sharder.rejected()
                ),
            );
        }
        Commands::Merge {
            inputs,
            left,
            right,
            separator,
            ext,
            output,
        } => {
            let mut convention = config.merge.convention();
            if let Some(left) = left {
                convention.left_strip = left;
            }
            if let Some(right) = right {
                convention.right_strip = right;
            }
            let extension = ext.or_else(|| config.merge.extension.clone());
            let entries = collect_entries(&inputs, extension.as_deref())?;
            let form =
                Merger::resolve_form(separator.unwrap_or(config.merge.separator), &entries)?;

            let mut sink = StreamSink::new(open_output(output.as_deref())?);
            let summary = Merger::new(convention, form).run(&entries, &mut sink, &diagnostics)?;
            diagnostics.merge_summary(&summary);
        }
        Commands::Combine {
            stream,
            map,
            group,
            separator,
        } => {
            let separator =
                separator.unwrap_or_else(|| defaults::CHARACTER_MAP_SEPARATOR.to_string());
            let map = CharacterMap::load(&map, &separator, &config.clean.name_joiner)?;
            diagnostics.info("combine", &format!("{} mapping(s) loaded", map.len()));
            let mut combiner = Combiner::new(map, group);
            run_stream(&mut combiner, &stream, InputForm::Auto, &diagnostics)?;
            diagnostics.info(
                "combine",
                &format!("{} record(s) renamed", combiner.renamed()),
            );
        }
        Commands::Characters { stream } => {
            let mut lister = CharacterLister::new();
            run_stream(&mut lister, &stream, InputForm::Auto, &diagnostics)?;
        }
        Commands::Phonemes {
            stream,
            dictionary,
            separator,
            preserve_stress,
            unknowns,
        } => {
            let path = dictionary
                .or_else(|| config.phonemes.dictionary.clone())
                .context(
                    "No pronouncing dictionary given (use --dictionary or TCPSPEECH_PHONEME_DICTIONARY)",
                )?;
            let separator = separator.unwrap_or_else(|| config.phonemes.separator.clone());
            let dictionary = PronouncingDictionary::load(&path, &separator)?;
            let mut phonemizer =
                Phonemizer::new(dictionary, preserve_stress || config.phonemes.preserve_stress);
            if let Some(path) = &unknowns {
                seed_tally_file(phonemizer.unknown_mut(), path)?;
            }

            run_stream(&mut phonemizer, &stream, InputForm::Word, &diagnostics)?;

            match unknowns {
                Some(path) => write_tally_file(phonemizer.unknown(), &path)?,
                None if !cli.quiet && !phonemizer.unknown().is_empty() => {
                    eprintln!("Words without a pronunciation:");
                    phonemizer.unknown().write_tsv(std::io::stderr().lock())?;
                }
                None => {}
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Run an XML stage over the named documents to `-o`/stdout.
fn run_documents(
    mut extractor: Extractor,
    args: DocumentArgs,
    diagnostics: &Diagnostics,
) -> Result<()> {
    let inputs = ExtractInputs {
        files: args.files,
        directory: args.dir,
        list: args.list,
        skip_header: args.skip_header,
    };
    let documents = inputs.resolve().context("Failed to read document list")?;
    anyhow::ensure!(
        !documents.is_empty(),
        "No documents to read (give files or --list)"
    );

    let mut sink = StreamSink::new(open_output(args.output.as_deref())?);
    let summary = extractor.run(&documents, &mut sink, diagnostics)?;
    diagnostics.extract_summary(extractor.name(), &summary);
    if summary.all_failed() {
        anyhow::bail!("All {} document(s) failed to extract", summary.documents);
    }
    Ok(())
}

/// Run a record station from `-i`/stdin to `-o`/stdout.
fn run_stream<S>(
    station: &mut S,
    stream: &StreamArgs,
    form: InputForm,
    diagnostics: &Diagnostics,
) -> Result<RunSummary>
where
    S: Station<Input = Record, Output = Record>,
{
    let reader = open_input(stream.input.as_deref())?;
    let mut sink = StreamSink::new(open_output(stream.output.as_deref())?);
    let summary = LineRunner::new(form, diagnostics).run(station, reader, &mut sink)?;
    diagnostics.run_summary(station.name(), &summary);
    Ok(summary)
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(std::io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout().lock()))),
    }
}
