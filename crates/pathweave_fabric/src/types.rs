//! Structural elements of the fabric: tiles, sites, BELs, muxes, wires and
//! the connections between wires.

use crate::ids::{BelId, MuxId, NodeId, SiteId, TileId, WireId};
use pathweave_common::Ident;
use serde::{Deserialize, Serialize};

/// Polarity of a constant-value net or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StaticKind {
    /// Logic one.
    Vcc,
    /// Logic zero.
    Gnd,
}

impl StaticKind {
    /// Returns the other polarity.
    pub fn opposite(self) -> Self {
        match self {
            StaticKind::Vcc => StaticKind::Gnd,
            StaticKind::Gnd => StaticKind::Vcc,
        }
    }
}

/// The resource class of a wire, used by net-class gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireKind {
    /// Ordinary interconnect.
    General,
    /// Dedicated clock distribution wire.
    Clock,
    /// Global clock fanout wire feeding clock pins from the clock spine.
    ClockFanout,
    /// A tile-local constant driver.
    TieOff(StaticKind),
    /// The virtual design-wide constant source. Has no tile.
    Global(StaticKind),
}

impl WireKind {
    /// Returns `true` for [`Clock`](WireKind::Clock) wires.
    pub fn is_clock(self) -> bool {
        self == WireKind::Clock
    }

    /// Returns `true` for [`ClockFanout`](WireKind::ClockFanout) wires.
    pub fn is_clock_fanout(self) -> bool {
        self == WireKind::ClockFanout
    }

    /// Returns the polarity of a tie-off wire, or `None` for other kinds.
    pub fn tie_off(self) -> Option<StaticKind> {
        match self {
            WireKind::TieOff(kind) => Some(kind),
            _ => None,
        }
    }
}

/// A single tile in the device grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// The unique ID of this tile.
    pub id: TileId,
    /// The instance name of this tile (e.g., "INT_L_X2Y5").
    pub name: String,
    /// Column index in the device grid.
    pub col: u32,
    /// Row index in the device grid.
    pub row: u32,
    /// Whether routing may use wires in this tile. Tiles outside a partial
    /// device region are visible but unusable.
    pub in_region: bool,
}

/// A placement location within a tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// The unique ID of this site.
    pub id: SiteId,
    /// The instance name of this site.
    pub name: String,
    /// The tile containing this site.
    pub tile: TileId,
    /// The BELs contained in this site.
    pub bels: Vec<BelId>,
}

/// A basic element of logic within a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bel {
    /// The unique ID of this BEL.
    pub id: BelId,
    /// The instance name of this BEL (e.g., "A6LUT").
    pub name: String,
    /// The site containing this BEL.
    pub site: SiteId,
}

/// A configurable multiplexer inside a site (e.g., an output mux).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mux {
    /// The unique ID of this mux.
    pub id: MuxId,
    /// The interned mux name (e.g., "AOUTMUX").
    pub name: Ident,
    /// The site containing this mux.
    pub site: SiteId,
}

/// A routing wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    /// The unique ID of this wire.
    pub id: WireId,
    /// The interned wire name.
    pub name: Ident,
    /// The tile the wire belongs to. `None` only for the virtual global
    /// constant sources.
    pub tile: Option<TileId>,
    /// The resource class of this wire.
    pub kind: WireKind,
    /// The group of wires electrically equivalent to this one.
    pub node: NodeId,
}

/// How a connection is realized in silicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// A programmable interconnect point between two routing wires.
    Pip,
    /// A path through an otherwise unused site, from an input pin to an
    /// output pin or between output pins.
    RouteThrough,
    /// A hard-wired link that needs no configuration.
    Direct,
    /// The link between a site pin and the routing wire it touches.
    PinTerminal,
}

/// A directed edge from one wire to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// The driving wire.
    pub source: WireId,
    /// The driven wire.
    pub sink: WireId,
    /// How the edge is realized.
    pub kind: ConnectionKind,
    /// The site a route-through passes through.
    pub site: Option<SiteId>,
    /// The site output mux a route-through occupies, if any.
    pub mux: Option<MuxId>,
}

impl Connection {
    /// Creates a pip connection.
    pub fn pip(source: WireId, sink: WireId) -> Self {
        Self {
            source,
            sink,
            kind: ConnectionKind::Pip,
            site: None,
            mux: None,
        }
    }

    /// Creates a hard-wired connection.
    pub fn direct(source: WireId, sink: WireId) -> Self {
        Self {
            kind: ConnectionKind::Direct,
            ..Self::pip(source, sink)
        }
    }

    /// Creates a pin-terminal connection.
    pub fn pin_terminal(source: WireId, sink: WireId) -> Self {
        Self {
            kind: ConnectionKind::PinTerminal,
            ..Self::pip(source, sink)
        }
    }

    /// Creates a route-through across `site`, optionally occupying `mux`.
    pub fn route_through(source: WireId, sink: WireId, site: SiteId, mux: Option<MuxId>) -> Self {
        Self {
            source,
            sink,
            kind: ConnectionKind::RouteThrough,
            site: Some(site),
            mux,
        }
    }

    /// Returns `true` if this connection is a programmable pip.
    pub fn is_pip(&self) -> bool {
        self.kind == ConnectionKind::Pip
    }

    /// Returns `true` if this connection is a site route-through.
    pub fn is_route_through(&self) -> bool {
        self.kind == ConnectionKind::RouteThrough
    }
}

/// An idle BEL that can drive a constant onto the routing fabric.
///
/// The candidate is usable while `bel` hosts no cell and neither `select`
/// nor any of `requires_free` has been configured at the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSourceCandidate {
    /// The site containing the BEL.
    pub site: SiteId,
    /// The BEL that would be configured as a constant driver.
    pub bel: BelId,
    /// The routing wire driven by the site output pin.
    pub output_wire: WireId,
    /// The mux that routes the BEL output to the pin; set to `"0"` on use.
    pub select: MuxId,
    /// Other muxes whose use by placed logic disqualifies the candidate.
    pub requires_free: Vec<MuxId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_kind_opposite() {
        assert_eq!(StaticKind::Vcc.opposite(), StaticKind::Gnd);
        assert_eq!(StaticKind::Gnd.opposite(), StaticKind::Vcc);
    }

    #[test]
    fn wire_kind_queries() {
        assert!(WireKind::Clock.is_clock());
        assert!(!WireKind::ClockFanout.is_clock());
        assert!(WireKind::ClockFanout.is_clock_fanout());
        assert_eq!(
            WireKind::TieOff(StaticKind::Gnd).tie_off(),
            Some(StaticKind::Gnd)
        );
        assert_eq!(WireKind::Global(StaticKind::Gnd).tie_off(), None);
    }

    #[test]
    fn connection_constructors() {
        let a = WireId::from_raw(0);
        let b = WireId::from_raw(1);
        assert!(Connection::pip(a, b).is_pip());
        assert_eq!(Connection::direct(a, b).kind, ConnectionKind::Direct);
        let rt = Connection::route_through(a, b, SiteId::from_raw(3), Some(MuxId::from_raw(4)));
        assert!(rt.is_route_through());
        assert!(!rt.is_pip());
        assert_eq!(rt.site, Some(SiteId::from_raw(3)));
        assert_ne!(rt, Connection::pip(a, b));
    }

    #[test]
    fn connection_serde_roundtrip() {
        let conn = Connection::pin_terminal(WireId::from_raw(5), WireId::from_raw(6));
        let json = serde_json::to_string(&conn).unwrap();
        let back: Connection = serde_json::from_str(&json).unwrap();
        assert_eq!(conn, back);
    }
}
