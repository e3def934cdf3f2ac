//! Router tuning parameters.
//!
//! [`RouterConfig`] holds every knob the negotiated-congestion router reads:
//! congestion factors and their growth, the iteration cap, wire costs and the
//! static-source search window. It is usually built in code; tools that keep
//! settings on disk can load a `[router]` table from TOML with [`load_config`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::RouterConfig;
