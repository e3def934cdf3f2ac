//! Physical interconnect model of a programmable-logic fabric.
//!
//! The router sees the fabric as a directed graph: nodes are [`Wire`]s and
//! edges are [`Connection`]s (programmable pips, site route-throughs, hard
//! direct links and pin terminals). Wires live on a tile grid; each tile may
//! be served by VCC/GND tie-off wires and may host idle sites usable as
//! static sources.
//!
//! [`FabricGraph`] is an in-memory model populated through builder methods.
//! Device-file import is left to callers.

#![warn(missing_docs)]

pub mod graph;
pub mod ids;
pub mod locality;
pub mod types;

pub use graph::FabricGraph;
pub use ids::{BelId, MuxId, NodeId, SiteId, TileId, WireId};
pub use locality::{SameTile, TieOffLocality, WithinDistance};
pub use types::{
    Bel, Connection, ConnectionKind, Mux, Site, StaticKind, StaticSourceCandidate, Tile, Wire,
    WireKind,
};
