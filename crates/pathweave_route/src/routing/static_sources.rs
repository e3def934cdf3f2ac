//! Idle BELs reused as constant drivers.
//!
//! Each pass, free candidates near a still-unrouted constant sink become
//! extra branches of the net's virtual source. A candidate only becomes a
//! real driver when a committed tree starts at its output wire.

use crate::data::RouteNetlist;
use crate::ids::CellId;
use crate::routing::request::RouteRequest;
use pathweave_fabric::{FabricGraph, StaticKind, StaticSourceCandidate};

/// Adds every free candidate within `radius` of a pending sink of `request`.
///
/// Returns the number of candidates added.
pub fn refresh_static_sources(
    request: &mut RouteRequest,
    netlist: &RouteNetlist,
    fabric: &FabricGraph,
    radius: u32,
) -> usize {
    if !request.class.is_static() {
        return 0;
    }
    let tiles: Vec<_> = request
        .to_route
        .iter()
        .filter_map(|&s| fabric.wire(request.tree.wire(request.sinks[s].terminal)).tile)
        .collect();

    let mut added = 0;
    for tile in tiles {
        let nearby: Vec<StaticSourceCandidate> = fabric
            .static_sources_near(tile, radius)
            .filter(|c| netlist.is_static_source_free(c))
            .cloned()
            .collect();
        for candidate in &nearby {
            if request.add_static_source(candidate) {
                added += 1;
            }
        }
    }
    added
}

/// Claims `candidate` as a `kind` driver: places a pseudo-cell on its BEL,
/// ties its select mux to `"0"` and records the BEL as a constant source.
pub fn materialize_static_source(
    netlist: &mut RouteNetlist,
    fabric: &FabricGraph,
    kind: StaticKind,
    candidate: &StaticSourceCandidate,
) -> CellId {
    let prefix = match kind {
        StaticKind::Vcc => "StaticVccSource",
        StaticKind::Gnd => "StaticGndSource",
    };
    let name = format!(
        "{prefix}_{}/{}",
        fabric.site(candidate.site).name,
        fabric.bel(candidate.bel).name
    );
    let cell = netlist.place_pseudo_cell(name, candidate.bel);
    netlist.select_mux(candidate.select, "0");
    netlist.add_static_source_bel(kind, candidate.bel);
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Cell, Net, NetClass, Pin, PinDirection};
    use crate::ids::PinId;
    use crate::routing::request::build_requests;
    use pathweave_diagnostics::DiagnosticSink;
    use pathweave_fabric::{SiteId, TileId, WireKind};

    struct Grid {
        fabric: FabricGraph,
        tiles: Vec<TileId>,
    }

    impl Grid {
        fn new(cols: u32) -> Self {
            let mut fabric = FabricGraph::new();
            let tiles = (0..cols)
                .map(|c| fabric.add_tile(&format!("CLB_X{c}Y0"), c, 0))
                .collect();
            Self { fabric, tiles }
        }

        fn candidate(&mut self, col: usize) -> (SiteId, StaticSourceCandidate) {
            let tile = self.tiles[col];
            let site = self.fabric.add_site(&format!("SLICE_X{col}Y0"), tile);
            let bel = self.fabric.add_bel("A6LUT", site);
            let select = self.fabric.add_mux("AUSED", site);
            let out = self.fabric.add_wire("CLB_A", tile, WireKind::General);
            let candidate = StaticSourceCandidate {
                site,
                bel,
                output_wire: out,
                select,
                requires_free: Vec::new(),
            };
            self.fabric.add_static_source_candidate(candidate.clone());
            (site, candidate)
        }
    }

    fn gnd_request(
        fabric: &FabricGraph,
        netlist: &mut RouteNetlist,
        sink_wire: pathweave_fabric::WireId,
    ) -> RouteRequest {
        let cell = netlist.add_cell(Cell {
            id: CellId::from_raw(0),
            name: "ff".into(),
            bel: None,
            pseudo: false,
        });
        let pin = netlist.add_pin(Pin {
            id: PinId::from_raw(0),
            name: "SR".into(),
            cell,
            direction: PinDirection::Input,
            net: None,
            wire: Some(sink_wire),
        });
        let mut net = Net::new("GLOBAL_LOGIC0", NetClass::Gnd);
        net.sinks.push(pin);
        netlist.add_net(net);
        build_requests(netlist, fabric, &DiagnosticSink::new()).remove(0)
    }

    #[test]
    fn refresh_respects_radius_and_freedom() {
        let mut grid = Grid::new(6);
        let (_, near) = grid.candidate(1);
        let (_, far) = grid.candidate(5);
        let sink_wire = grid.fabric.add_wire("SR", grid.tiles[0], WireKind::General);
        let mut netlist = RouteNetlist::new();
        let mut req = gnd_request(&grid.fabric, &mut netlist, sink_wire);

        assert_eq!(refresh_static_sources(&mut req, &netlist, &grid.fabric, 0), 0);
        assert_eq!(refresh_static_sources(&mut req, &netlist, &grid.fabric, 1), 1);
        assert!(req.static_candidates.contains_key(&near.output_wire));
        // Already known candidates are not added twice.
        assert_eq!(refresh_static_sources(&mut req, &netlist, &grid.fabric, 1), 0);

        netlist.select_mux(far.select, "1");
        assert_eq!(refresh_static_sources(&mut req, &netlist, &grid.fabric, 9), 0);
    }

    #[test]
    fn signal_requests_are_ignored() {
        let mut grid = Grid::new(2);
        grid.candidate(0);
        let mut netlist = RouteNetlist::new();
        let src = grid.fabric.add_wire("O", grid.tiles[1], WireKind::General);
        let dst = grid.fabric.add_wire("I", grid.tiles[1], WireKind::General);
        let cell = netlist.add_cell(Cell {
            id: CellId::from_raw(0),
            name: "c".into(),
            bel: None,
            pseudo: false,
        });
        let mut net = Net::new("sig", NetClass::Logic);
        for (direction, wire) in [(PinDirection::Output, src), (PinDirection::Input, dst)] {
            let p = netlist.add_pin(Pin {
                id: PinId::from_raw(0),
                name: "P".into(),
                cell,
                direction,
                net: None,
                wire: Some(wire),
            });
            match direction {
                PinDirection::Output => net.driver = Some(p),
                PinDirection::Input => net.sinks.push(p),
            }
        }
        netlist.add_net(net);
        let mut req = build_requests(&mut netlist, &grid.fabric, &DiagnosticSink::new()).remove(0);
        assert_eq!(refresh_static_sources(&mut req, &netlist, &grid.fabric, 5), 0);
    }

    #[test]
    fn materialize_claims_the_bel() {
        let mut grid = Grid::new(1);
        let (_, candidate) = grid.candidate(0);
        let mut netlist = RouteNetlist::new();
        assert!(netlist.is_static_source_free(&candidate));

        let cell =
            materialize_static_source(&mut netlist, &grid.fabric, StaticKind::Vcc, &candidate);
        assert_eq!(netlist.cell(cell).name, "StaticVccSource_SLICE_X0Y0/A6LUT");
        assert!(netlist.cell(cell).pseudo);
        assert_eq!(netlist.mux_selection(candidate.select), Some("0"));
        assert!(netlist.vcc_source_bels.contains(&candidate.bel));
        assert!(!netlist.is_static_source_free(&candidate));
    }
}
