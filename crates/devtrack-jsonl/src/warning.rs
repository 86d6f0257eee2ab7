//! Lines dropped while reading a JSONL file.

use std::fmt;

/// Why a line was left out of a resilient read.
///
/// Reading carries on past every warning; callers decide whether to log,
/// surface or ignore them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The line is not valid JSON for the record type.
    MalformedJson {
        /// Line as numbered in an editor (first line is 1)
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// The line was dropped without being parsed (for example, too long).
    SkippedLine {
        /// Line as numbered in an editor (first line is 1)
        line_number: usize,
        /// Why it was dropped
        reason: String,
    },
}

impl Warning {
    /// Line the warning refers to.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match *self {
            Self::MalformedJson { line_number, .. } | Self::SkippedLine { line_number, .. } => {
                line_number
            }
        }
    }

    /// Short machine-readable tag, stable across releases.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        if matches!(self, Self::MalformedJson { .. }) {
            "malformed_json"
        } else {
            "skipped_line"
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.line_number();
        match self {
            Self::MalformedJson { error, .. } => write!(f, "line {line}: malformed JSON: {error}"),
            Self::SkippedLine { reason, .. } => write!(f, "line {line}: skipped: {reason}"),
        }
    }
}
