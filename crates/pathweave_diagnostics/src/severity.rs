//! How serious a diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`Diagnostic`](crate::Diagnostic), ordered `Note < Warning < Error`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Progress output, such as a per-iteration summary.
    Note,
    /// A partial outcome: some nets were dropped or left congested, but the
    /// run returned a report.
    Warning,
    /// The run could not complete.
    Error,
}

impl Severity {
    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// The lowercase label used in rendered output.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
