//! Shared foundational types used across the pathweave router crates.
//!
//! This crate provides interned names for fabric resources and the internal
//! result type used to surface broken invariants.

#![warn(missing_docs)]

pub mod ident;
pub mod result;

pub use ident::{Ident, Interner};
pub use result::{InternalError, PathweaveResult};
