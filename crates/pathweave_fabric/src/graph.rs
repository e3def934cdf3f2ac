//! The fabric graph and its builder methods.

use crate::ids::{BelId, MuxId, NodeId, SiteId, TileId, WireId};
use crate::types::{
    Bel, Connection, Mux, Site, StaticKind, StaticSourceCandidate, Tile, Wire, WireKind,
};
use pathweave_common::{Ident, Interner};
use std::collections::BTreeMap;

/// Directed wire graph over a tile grid.
///
/// Connection lists are kept in insertion order so traversals are
/// deterministic. Two virtual wires, one per [`StaticKind`], act as the
/// design-wide constant sources; they have no tile and no stored
/// connections.
pub struct FabricGraph {
    names: Interner,
    tiles: Vec<Tile>,
    sites: Vec<Site>,
    bels: Vec<Bel>,
    muxes: Vec<Mux>,
    wires: Vec<Wire>,
    forward: Vec<Vec<Connection>>,
    reverse: Vec<Vec<Connection>>,
    nodes: Vec<Vec<WireId>>,
    tie_offs: BTreeMap<(TileId, StaticKind), WireId>,
    static_candidates: Vec<StaticSourceCandidate>,
    vcc: WireId,
    gnd: WireId,
}

impl FabricGraph {
    /// Creates a fabric holding only the two virtual constant sources.
    pub fn new() -> Self {
        let mut fabric = Self {
            names: Interner::new(),
            tiles: Vec::new(),
            sites: Vec::new(),
            bels: Vec::new(),
            muxes: Vec::new(),
            wires: Vec::new(),
            forward: Vec::new(),
            reverse: Vec::new(),
            nodes: Vec::new(),
            tie_offs: BTreeMap::new(),
            static_candidates: Vec::new(),
            vcc: WireId::from_raw(0),
            gnd: WireId::from_raw(0),
        };
        fabric.vcc = fabric.push_wire("GLOBAL_VCC", None, WireKind::Global(StaticKind::Vcc));
        fabric.gnd = fabric.push_wire("GLOBAL_GND", None, WireKind::Global(StaticKind::Gnd));
        fabric
    }

    fn push_wire(&mut self, name: &str, tile: Option<TileId>, kind: WireKind) -> WireId {
        let id = WireId::from_raw(self.wires.len() as u32);
        let node = NodeId::from_raw(self.nodes.len() as u32);
        self.wires.push(Wire {
            id,
            name: self.names.get_or_intern(name),
            tile,
            kind,
            node,
        });
        self.nodes.push(vec![id]);
        self.forward.push(Vec::new());
        self.reverse.push(Vec::new());
        id
    }

    /// Adds a tile at grid position (`col`, `row`) inside the routing region.
    pub fn add_tile(&mut self, name: &str, col: u32, row: u32) -> TileId {
        let id = TileId::from_raw(self.tiles.len() as u32);
        self.tiles.push(Tile {
            id,
            name: name.to_string(),
            col,
            row,
            in_region: true,
        });
        id
    }

    /// Marks a tile as lying outside the routable region.
    pub fn set_outside_region(&mut self, tile: TileId) {
        self.tiles[tile.as_raw() as usize].in_region = false;
    }

    /// Adds a site to `tile`.
    pub fn add_site(&mut self, name: &str, tile: TileId) -> SiteId {
        let id = SiteId::from_raw(self.sites.len() as u32);
        self.sites.push(Site {
            id,
            name: name.to_string(),
            tile,
            bels: Vec::new(),
        });
        id
    }

    /// Adds a BEL to `site`.
    pub fn add_bel(&mut self, name: &str, site: SiteId) -> BelId {
        let id = BelId::from_raw(self.bels.len() as u32);
        self.bels.push(Bel {
            id,
            name: name.to_string(),
            site,
        });
        self.sites[site.as_raw() as usize].bels.push(id);
        id
    }

    /// Adds a configurable mux to `site`.
    pub fn add_mux(&mut self, name: &str, site: SiteId) -> MuxId {
        let id = MuxId::from_raw(self.muxes.len() as u32);
        self.muxes.push(Mux {
            id,
            name: self.names.get_or_intern(name),
            site,
        });
        id
    }

    /// Adds a wire to `tile`.
    ///
    /// A [`WireKind::TieOff`] wire is registered as the tie-off serving its
    /// own tile unless one is already set; use [`set_tie_off`](Self::set_tie_off)
    /// to serve neighbouring tiles.
    pub fn add_wire(&mut self, name: &str, tile: TileId, kind: WireKind) -> WireId {
        let id = self.push_wire(name, Some(tile), kind);
        if let WireKind::TieOff(polarity) = kind {
            self.tie_offs.entry((tile, polarity)).or_insert(id);
        }
        id
    }

    /// Adds a connection to the forward list of its source and the reverse
    /// list of its sink.
    pub fn add_connection(&mut self, conn: Connection) {
        self.forward[conn.source.as_raw() as usize].push(conn);
        self.reverse[conn.sink.as_raw() as usize].push(conn);
    }

    /// Adds a pip from `source` to `sink`.
    pub fn add_pip(&mut self, source: WireId, sink: WireId) {
        self.add_connection(Connection::pip(source, sink));
    }

    /// Merges the nodes of `a` and `b` so both wires report the same
    /// equivalence group.
    pub fn join_nodes(&mut self, a: WireId, b: WireId) {
        let keep = self.wires[a.as_raw() as usize].node;
        let absorb = self.wires[b.as_raw() as usize].node;
        if keep == absorb {
            return;
        }
        let moved = std::mem::take(&mut self.nodes[absorb.as_raw() as usize]);
        for wire in &moved {
            self.wires[wire.as_raw() as usize].node = keep;
        }
        let group = &mut self.nodes[keep.as_raw() as usize];
        group.extend(moved);
        group.sort();
    }

    /// Declares `wire` as the `kind` tie-off serving `tile`.
    pub fn set_tie_off(&mut self, tile: TileId, kind: StaticKind, wire: WireId) {
        self.tie_offs.insert((tile, kind), wire);
    }

    /// Registers an idle BEL that may be turned into a constant driver.
    pub fn add_static_source_candidate(&mut self, candidate: StaticSourceCandidate) {
        self.static_candidates.push(candidate);
    }

    /// Returns the wire with the given ID.
    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.as_raw() as usize]
    }

    /// Returns the resolved name of a wire.
    pub fn wire_name(&self, id: WireId) -> &str {
        self.names.resolve(self.wire(id).name)
    }

    /// Returns the number of wires, including the two virtual sources.
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Returns the tile with the given ID.
    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.as_raw() as usize]
    }

    /// Returns the site with the given ID.
    pub fn site(&self, id: SiteId) -> &Site {
        &self.sites[id.as_raw() as usize]
    }

    /// Returns the BEL with the given ID.
    pub fn bel(&self, id: BelId) -> &Bel {
        &self.bels[id.as_raw() as usize]
    }

    /// Returns the mux with the given ID.
    pub fn mux(&self, id: MuxId) -> &Mux {
        &self.muxes[id.as_raw() as usize]
    }

    /// Returns the resolved name of an interned identifier.
    pub fn resolve(&self, name: Ident) -> &str {
        self.names.resolve(name)
    }

    /// Returns the connections driven by `wire`.
    pub fn forward(&self, wire: WireId) -> &[Connection] {
        &self.forward[wire.as_raw() as usize]
    }

    /// Returns the connections driving `wire`.
    pub fn reverse(&self, wire: WireId) -> &[Connection] {
        &self.reverse[wire.as_raw() as usize]
    }

    /// Returns every wire in the same node as `wire`, `wire` included.
    pub fn wires_in_node(&self, wire: WireId) -> &[WireId] {
        &self.nodes[self.wire(wire).node.as_raw() as usize]
    }

    /// Returns the virtual constant source of the given polarity.
    pub fn global_wire(&self, kind: StaticKind) -> WireId {
        match kind {
            StaticKind::Vcc => self.vcc,
            StaticKind::Gnd => self.gnd,
        }
    }

    /// Returns the tie-off wire of polarity `kind` serving `tile`.
    pub fn tie_off_for(&self, tile: TileId, kind: StaticKind) -> Option<WireId> {
        self.tie_offs.get(&(tile, kind)).copied()
    }

    /// Returns `true` if routing may use wires in `tile`.
    pub fn is_in_region(&self, tile: TileId) -> bool {
        self.tile(tile).in_region
    }

    /// Manhattan distance between two tiles on the grid.
    pub fn tile_distance(&self, a: TileId, b: TileId) -> u32 {
        let a = self.tile(a);
        let b = self.tile(b);
        a.col.abs_diff(b.col) + a.row.abs_diff(b.row)
    }

    /// Manhattan distance between the tiles of two wires; 0 when either has
    /// no tile.
    pub fn wire_distance(&self, a: WireId, b: WireId) -> u32 {
        match (self.wire(a).tile, self.wire(b).tile) {
            (Some(ta), Some(tb)) => self.tile_distance(ta, tb),
            _ => 0,
        }
    }

    /// Returns the static-source candidates whose site lies in the square
    /// window of half-width `radius` around `tile`.
    pub fn static_sources_near(
        &self,
        tile: TileId,
        radius: u32,
    ) -> impl Iterator<Item = &StaticSourceCandidate> + '_ {
        let center = self.tile(tile);
        let (col, row) = (center.col, center.row);
        self.static_candidates.iter().filter(move |c| {
            let t = self.tile(self.site(c.site).tile);
            t.col.abs_diff(col) <= radius && t.row.abs_diff(row) <= radius
        })
    }
}

impl Default for FabricGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionKind;

    #[test]
    fn new_fabric_has_global_sources() {
        let fabric = FabricGraph::new();
        assert_eq!(fabric.wire_count(), 2);
        let vcc = fabric.global_wire(StaticKind::Vcc);
        let gnd = fabric.global_wire(StaticKind::Gnd);
        assert_ne!(vcc, gnd);
        assert!(fabric.wire(vcc).tile.is_none());
        assert_eq!(fabric.wire_name(gnd), "GLOBAL_GND");
    }

    #[test]
    fn forward_and_reverse_lists() {
        let mut fabric = FabricGraph::new();
        let t = fabric.add_tile("INT_X0Y0", 0, 0);
        let a = fabric.add_wire("A", t, WireKind::General);
        let b = fabric.add_wire("B", t, WireKind::General);
        let c = fabric.add_wire("C", t, WireKind::General);
        fabric.add_pip(a, b);
        fabric.add_connection(Connection::direct(a, c));

        let fwd: Vec<WireId> = fabric.forward(a).iter().map(|c| c.sink).collect();
        assert_eq!(fwd, vec![b, c]);
        assert_eq!(fabric.reverse(c)[0].kind, ConnectionKind::Direct);
        assert!(fabric.forward(b).is_empty());
    }

    #[test]
    fn nodes_merge() {
        let mut fabric = FabricGraph::new();
        let t = fabric.add_tile("INT_X0Y0", 0, 0);
        let a = fabric.add_wire("A", t, WireKind::General);
        let b = fabric.add_wire("B", t, WireKind::General);
        let c = fabric.add_wire("C", t, WireKind::General);
        assert_eq!(fabric.wires_in_node(a), &[a]);

        fabric.join_nodes(a, b);
        fabric.join_nodes(c, a);
        assert_eq!(fabric.wires_in_node(b), &[a, b, c]);
        assert_eq!(fabric.wire(a).node, fabric.wire(c).node);
    }

    #[test]
    fn tie_off_registration() {
        let mut fabric = FabricGraph::new();
        let int = fabric.add_tile("INT_X1Y0", 1, 0);
        let clb = fabric.add_tile("CLB_X0Y0", 0, 0);
        let vcc = fabric.add_wire("VCC_WIRE", int, WireKind::TieOff(StaticKind::Vcc));
        assert_eq!(fabric.tie_off_for(int, StaticKind::Vcc), Some(vcc));
        assert_eq!(fabric.tie_off_for(clb, StaticKind::Vcc), None);
        assert_eq!(fabric.tie_off_for(int, StaticKind::Gnd), None);

        fabric.set_tie_off(clb, StaticKind::Vcc, vcc);
        assert_eq!(fabric.tie_off_for(clb, StaticKind::Vcc), Some(vcc));
    }

    #[test]
    fn distances() {
        let mut fabric = FabricGraph::new();
        let t0 = fabric.add_tile("T0", 0, 0);
        let t1 = fabric.add_tile("T1", 3, 4);
        let a = fabric.add_wire("A", t0, WireKind::General);
        let b = fabric.add_wire("B", t1, WireKind::General);
        assert_eq!(fabric.tile_distance(t0, t1), 7);
        assert_eq!(fabric.wire_distance(a, b), 7);
        assert_eq!(fabric.wire_distance(fabric.global_wire(StaticKind::Vcc), b), 0);
    }

    #[test]
    fn region_membership() {
        let mut fabric = FabricGraph::new();
        let t = fabric.add_tile("OOC_X0Y0", 0, 0);
        assert!(fabric.is_in_region(t));
        fabric.set_outside_region(t);
        assert!(!fabric.is_in_region(t));
    }

    #[test]
    fn static_source_window() {
        let mut fabric = FabricGraph::new();
        let near = fabric.add_tile("CLB_X1Y1", 1, 1);
        let far = fabric.add_tile("CLB_X6Y1", 6, 1);
        for tile in [near, far] {
            let site = fabric.add_site("SLICE", tile);
            let bel = fabric.add_bel("A6LUT", site);
            let select = fabric.add_mux("AUSED", site);
            let output_wire = fabric.add_wire("A_OUT", tile, WireKind::General);
            fabric.add_static_source_candidate(StaticSourceCandidate {
                site,
                bel,
                output_wire,
                select,
                requires_free: Vec::new(),
            });
        }
        let origin = fabric.add_tile("INT_X0Y0", 0, 0);
        assert_eq!(fabric.static_sources_near(origin, 0).count(), 0);
        assert_eq!(fabric.static_sources_near(origin, 1).count(), 1);
        assert_eq!(fabric.static_sources_near(origin, 6).count(), 2);
    }
}
