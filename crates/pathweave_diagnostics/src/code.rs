//! Category-prefixed diagnostic codes such as `R001`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Groups codes and picks their prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Input or internal failures (`E`).
    Error,
    /// Routing outcomes: unroutable sinks, convergence, tie-offs and
    /// per-iteration summaries (`R`).
    Routing,
}

impl Category {
    /// The prefix letter of this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Routing => 'R',
        }
    }
}

/// A diagnostic code, printed as its prefix and a three-digit number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// Which group the code belongs to.
    pub category: Category,
    /// Number within the group.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
