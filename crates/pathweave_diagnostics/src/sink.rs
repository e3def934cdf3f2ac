//! Diagnostic accumulator shared by the router's phases.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Collects diagnostics emitted during a routing run.
///
/// Takes `&self` so request construction, the engine and callers can all hold
/// the same sink. Error and warning counts are kept in atomics and can be read
/// without taking the lock.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            errors: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `diag`.
    pub fn emit(&self, diag: Diagnostic) {
        let counter = match diag.severity {
            Severity::Error => Some(&self.errors),
            Severity::Warning => Some(&self.warnings),
            Severity::Note => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    /// Returns `true` if an error was emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Number of warnings emitted so far (unroutable sinks, non-convergence).
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Drains the sink. Counters keep their values.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns a copy of everything emitted so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Returns the diagnostics carrying `code`, in emission order.
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter(|d| d.code == code)
            .cloned()
            .collect()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
