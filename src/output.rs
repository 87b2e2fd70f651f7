//! Diagnostics rendering for the command line.
//!
//! Everything here goes to stderr so it never mixes with records on stdout.

use crate::extract::ExtractSummary;
use crate::merge::MergeSummary;
use crate::pipeline::{ErrorReporter, RunSummary, StationError};
use owo_colors::OwoColorize;
use std::io::IsTerminal;

/// CLI error reporter honouring `--quiet` and `-v`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    quiet: bool,
    verbose: u8,
    color: bool,
}

impl Diagnostics {
    pub fn new(quiet: bool, verbose: u8) -> Self {
        Self {
            quiet,
            verbose,
            color: std::io::stderr().is_terminal(),
        }
    }

    /// Same settings, without colour.
    pub fn plain(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    fn tag(&self, station: &str) -> String {
        let tag = format!("[{station}]");
        if self.color {
            tag.dimmed().to_string()
        } else {
            tag
        }
    }

    fn paint_error(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_warning(&self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    /// Formatted report line, or `None` when it is suppressed.
    pub fn format_report(&self, station: &str, error: &StationError) -> Option<String> {
        match error {
            StationError::Recoverable(_) if self.quiet => None,
            StationError::Recoverable(_) => Some(format!(
                "{} {}",
                self.tag(station),
                self.paint_warning(&error.to_string())
            )),
            StationError::Fatal(_) => Some(format!(
                "{} {}",
                self.tag(station),
                self.paint_error(&error.to_string())
            )),
        }
    }

    pub fn format_warning(&self, station: &str, message: &str) -> Option<String> {
        if self.quiet {
            return None;
        }
        Some(format!(
            "{} {} {}",
            self.tag(station),
            self.paint_warning("Warning:"),
            message
        ))
    }

    /// Print an informational line when verbose.
    pub fn info(&self, station: &str, message: &str) {
        if self.is_verbose() {
            eprintln!("{} {}", self.tag(station), message);
        }
    }

    /// Print a stage summary when verbose or when something was skipped.
    pub fn run_summary(&self, station: &str, summary: &RunSummary) {
        if self.quiet || !(self.is_verbose() || summary.has_problems()) {
            return;
        }
        eprintln!("{} {}", self.tag(station), format_run_summary(summary));
    }

    pub fn extract_summary(&self, station: &str, summary: &ExtractSummary) {
        if self.quiet {
            return;
        }
        if self.is_verbose() || !summary.failed.is_empty() || summary.empty > 0 {
            eprintln!("{} {}", self.tag(station), format_extract_summary(summary));
        }
        for (path, reason) in &summary.failed {
            eprintln!("    {}: {}", path.display(), reason);
        }
    }

    pub fn merge_summary(&self, summary: &MergeSummary) {
        if self.quiet {
            return;
        }
        if self.is_verbose() || !summary.skipped.is_empty() {
            eprintln!("{} {}", self.tag("merge"), format_merge_summary(summary));
        }
        for (path, reason) in &summary.skipped {
            eprintln!("    {}: {}", path.display(), reason);
        }
    }
}

impl ErrorReporter for Diagnostics {
    fn report(&self, station: &str, error: &StationError) {
        if let Some(line) = self.format_report(station, error) {
            eprintln!("{line}");
        }
    }

    fn warn(&self, station: &str, message: &str) {
        if let Some(line) = self.format_warning(station, message) {
            eprintln!("{line}");
        }
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut text = format!(
        "{} read, {} in, {} out",
        plural(summary.lines_read, "line"),
        plural(summary.records_in, "record"),
        plural(summary.records_out, "record"),
    );
    if summary.malformed > 0 {
        text.push_str(&format!(
            ", {} skipped",
            plural(summary.malformed, "malformed line")
        ));
    }
    if summary.errors > 0 {
        text.push_str(&format!(", {}", plural(summary.errors, "error")));
    }
    text
}

pub fn format_extract_summary(summary: &ExtractSummary) -> String {
    let mut text = format!(
        "{}, {}",
        plural(summary.documents, "document"),
        plural(summary.records, "record")
    );
    if summary.empty > 0 {
        text.push_str(&format!(", {} with nothing to extract", summary.empty));
    }
    if !summary.failed.is_empty() {
        text.push_str(&format!(", {} failed:", summary.failed.len()));
    }
    text
}

pub fn format_merge_summary(summary: &MergeSummary) -> String {
    let mut text = format!(
        "{}, {}",
        plural(summary.files, "file"),
        plural(summary.records, "record")
    );
    if let Some(form) = summary.form {
        text.push_str(&format!(" ({form} form)"));
    }
    if !summary.skipped.is_empty() {
        text.push_str(&format!(", {} skipped:", summary.skipped.len()));
    }
    text
}
