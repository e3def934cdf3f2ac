//! Error and outcome types for a routing run.

use crate::ids::NetId;
use pathweave_common::InternalError;
use pathweave_config::ConfigError;
use pathweave_fabric::WireId;
use serde::{Deserialize, Serialize};

/// Errors that abort a routing run.
///
/// A net that cannot be routed is not an error; it is reported as an
/// [`UnroutableSink`] in the run's report.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The fabric or congestion state contradicted the router's invariants.
    #[error("invalid fabric query: {0}")]
    InvalidFabricQuery(#[from] InternalError),

    /// The router settings failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A sink the maze router could not reach. Its whole request is abandoned
/// for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnroutableSink {
    /// The net whose request was abandoned.
    pub net: NetId,
    /// The name of that net.
    pub net_name: String,
    /// The target wire of the sink that had no legal path.
    pub wire: WireId,
    /// The name of that wire.
    pub wire_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathweave_config::RouterConfig;

    #[test]
    fn display_invalid_fabric_query() {
        let err = RouteError::from(InternalError::new("wire 7 has no usage entry"));
        assert_eq!(
            format!("{err}"),
            "invalid fabric query: internal router error: wire 7 has no usage entry"
        );
    }

    #[test]
    fn config_errors_pass_through() {
        let err = RouterConfig {
            max_iterations: 0,
            ..RouterConfig::default()
        }
        .validate()
        .map_err(RouteError::from)
        .unwrap_err();
        assert_eq!(
            format!("{err}"),
            "invalid router setting `max_iterations`: must be at least 1"
        );
    }
}
