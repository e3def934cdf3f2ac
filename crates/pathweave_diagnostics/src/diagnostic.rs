//! Structured diagnostic messages with severity, codes and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Each diagnostic carries a severity, a code, a message and, optionally, the
/// name of the design object it concerns (a net or wire), plus free-form notes
/// and help lines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The net, wire or site this diagnostic is about, if any.
    pub subject: Option<String>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: String) -> Self {
        Self {
            severity,
            code,
            message,
            subject: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message.into())
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message.into())
    }

    /// Creates a new note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, code, message.into())
    }

    /// Names the design object this diagnostic is about.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}
