//! Routing engine.
//!
//! Routes every net of a [`RouteNetlist`] through the fabric, connecting each
//! driver to its sink pins. Uses the PathFinder negotiated congestion
//! algorithm with A* search for the individual sinks.

pub mod astar;
pub mod congestion;
pub mod filter;
pub mod pathfinder;
pub mod request;
pub mod static_sources;

use crate::data::RouteNetlist;
use crate::error::{RouteError, UnroutableSink};
use crate::ids::NetId;
use pathweave_config::RouterConfig;
use pathweave_diagnostics::DiagnosticSink;
use pathweave_fabric::FabricGraph;
use serde::{Deserialize, Serialize};

pub use astar::{AStarRouter, MazeRouter, RouteContext};
pub use congestion::{CongestionTable, WireUsage};
pub use pathfinder::{EngineState, PathFinder};
pub use request::{build_requests, RouteRequest, SinkRecord};

/// Congestion figures of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// The pass number, starting at 1.
    pub iteration: u32,
    /// Wires with more occupants than capacity after the pass.
    pub congested_wires: usize,
    /// Requests queued for the next pass.
    pub rerouted_requests: usize,
}

/// The outcome of a routing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    /// Number of passes run.
    pub iterations: u32,
    /// Per-pass congestion, in pass order.
    pub congestion_history: Vec<IterationSummary>,
    /// Nets whose routes were committed, aliases included.
    pub routed: Vec<NetId>,
    /// Requests abandoned because a sink had no legal path.
    pub dropped: Vec<UnroutableSink>,
    /// Nets left uncommitted because they still shared wires when the
    /// iteration cap was hit.
    pub congested: Vec<NetId>,
    /// Whether the last pass ended without congestion.
    pub converged: bool,
}

impl RouteReport {
    /// Returns `true` if every request was committed.
    pub fn is_complete(&self) -> bool {
        self.converged && self.dropped.is_empty() && self.congested.is_empty()
    }
}

/// Routes all nets in the netlist with the default tie-off locality policy.
///
/// Committed trees are stored on the nets; constant nets get one tree per
/// driver. Settings are validated first.
pub fn route_design(
    netlist: &mut RouteNetlist,
    fabric: &FabricGraph,
    config: &RouterConfig,
    sink: &DiagnosticSink,
) -> Result<RouteReport, RouteError> {
    PathFinder::new(fabric, config).run(netlist, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_empty_netlist() {
        let mut nl = RouteNetlist::new();
        let fabric = FabricGraph::new();
        let sink = DiagnosticSink::new();
        let report = route_design(&mut nl, &fabric, &RouterConfig::default(), &sink).unwrap();
        assert!(report.converged);
        assert!(report.is_complete());
        assert_eq!(report.iterations, 1);
        assert!(nl.is_fully_routed());
    }

    #[test]
    fn report_serde_roundtrip() {
        let report = RouteReport {
            iterations: 3,
            congestion_history: vec![IterationSummary {
                iteration: 1,
                congested_wires: 2,
                rerouted_requests: 2,
            }],
            routed: vec![NetId::from_raw(0)],
            dropped: Vec::new(),
            congested: Vec::new(),
            converged: true,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: RouteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
