//! Interned names for wires, muxes and other fabric resources.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a name stored in an [`Interner`].
///
/// Wire names repeat across every tile of a device (`EE2_BEG0`, `IMUX12`,
/// ...), so the fabric stores each distinct string once and keeps a `u32`
/// handle per wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Wraps a raw index. Only meaningful for the interner that produced it.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `into_usize` and `try_from_usize` round-trip every index that fits
// in a `u32`, and larger indices are rejected.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Self)
    }
}

/// Name table shared by a fabric graph. Interning takes `&self`.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Returns the handle for `name`, adding it on first use.
    pub fn get_or_intern(&self, name: &str) -> Ident {
        self.rodeo.get_or_intern(name)
    }

    /// Returns the handle for `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<Ident> {
        self.rodeo.get(name)
    }

    /// Returns the string behind `ident`.
    ///
    /// # Panics
    ///
    /// Panics if `ident` came from a different interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing was interned.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interner({} names)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_wire_names_share_a_handle() {
        let names = Interner::new();
        let a = names.get_or_intern("IMUX12");
        let b = names.get_or_intern("EE2_BEG0");
        assert_eq!(names.get_or_intern("IMUX12"), a);
        assert_ne!(a, b);
        assert_eq!(names.len(), 2);
        assert_eq!(names.resolve(b), "EE2_BEG0");
    }

    #[test]
    fn get_does_not_intern() {
        let names = Interner::new();
        assert!(names.get("AOUTMUX").is_none());
        assert!(names.is_empty());
        let id = names.get_or_intern("AOUTMUX");
        assert_eq!(names.get("AOUTMUX"), Some(id));
    }

    #[test]
    fn default_interner_is_usable() {
        let names = Interner::default();
        let id = names.get_or_intern("GFAN0");
        assert_eq!(names.resolve(id), "GFAN0");
        assert_eq!(format!("{names:?}"), "Interner(1 names)");
    }

    #[test]
    fn serde_roundtrip() {
        let id = Ident::from_raw(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: Ident = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
