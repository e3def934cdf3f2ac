//! Negotiated-congestion inter-site router.
//!
//! This crate takes a placed [`RouteNetlist`] and a [`FabricGraph`] and
//! connects every net's driver to its sink pins through shared wiring,
//! resolving conflicts between competing nets over several passes. The
//! committed [`RouteTree`]s are stored back on the nets.
//!
//! # Pipeline
//!
//! 1. **Requests** - one per net or alias set, with pre-built sink subtrees
//!    and reserved wires
//! 2. **Route** - A* search per sink, seeded by the net's current tree
//! 3. **Negotiate** - sinks on overused wires are ripped up and re-routed
//!    with grown congestion costs
//! 4. **Commit** - final trees, static-source cells and site mux settings
//!
//! # Usage
//!
//! ```ignore
//! use pathweave_route::route_design;
//!
//! let report = route_design(&mut netlist, &fabric, &RouterConfig::default(), &sink)?;
//! assert!(report.converged);
//! ```
//!
//! [`FabricGraph`]: pathweave_fabric::FabricGraph

#![warn(missing_docs)]

pub mod data;
pub mod error;
pub mod ids;
pub mod route_tree;
pub mod routing;

pub use data::{
    Cell, Net, NetClass, Pin, PinDirection, ReusePolicy, RouteNetlist, RouteStatus, WireAccess,
};
pub use error::{RouteError, UnroutableSink};
pub use ids::{CellId, NetId, PinId, RequestId, RouteNodeId};
pub use route_tree::{RouteNode, RouteTree};
pub use routing::{route_design, IterationSummary, PathFinder, RouteReport};
