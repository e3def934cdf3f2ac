//! Common result and error types for the router.

/// The standard result type for operations that can hit a broken invariant.
///
/// `Err` indicates an inconsistency between the router's bookkeeping and the
/// data it was given (a bug or a malformed fabric), never a per-net routing
/// outcome. Unroutable nets are reported as values and the run still
/// returns `Ok`.
pub type PathweaveResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant rather than bad user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal router error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
