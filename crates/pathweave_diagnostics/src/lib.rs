//! Structured diagnostics emitted while routing.
//!
//! The router reports per-net outcomes (unroutable sinks, non-convergence,
//! per-iteration congestion summaries) as [`Diagnostic`] values accumulated in
//! a thread-safe [`DiagnosticSink`]. [`TerminalRenderer`] formats them as text.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
