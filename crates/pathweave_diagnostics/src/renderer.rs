//! Diagnostic rendering backends.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[R001]: sink could not be routed
///   --> net_a
///    = note: request dropped for the remainder of the run
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in the header line.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        let header = format!("{}[{}]", diag.severity, diag.code);
        if self.color {
            let color = match diag.severity {
                crate::Severity::Error => "31",
                crate::Severity::Warning => "33",
                crate::Severity::Note => "36",
            };
            out.push_str(&format!("\x1b[1;{color}m{header}\x1b[0m: {}\n", diag.message));
        } else {
            out.push_str(&format!("{header}: {}\n", diag.message));
        }

        if let Some(subject) = &diag.subject {
            out.push_str(&format!("  --> {subject}\n"));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}
