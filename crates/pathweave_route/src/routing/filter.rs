//! Edge legality for the maze search.

use crate::data::{RouteNetlist, WireAccess};
use crate::routing::astar::RouteContext;
use crate::routing::request::RouteRequest;
use pathweave_fabric::{Connection, TileId};

/// Returns `true` if the search for `request` may take `conn`.
///
/// `sink_tile` is the tile of the terminal wire currently being routed; it
/// decides which tie-offs a constant net may use.
pub fn is_connection_valid(
    ctx: &RouteContext<'_>,
    netlist: &RouteNetlist,
    request: &RouteRequest,
    conn: &Connection,
    sink_tile: Option<TileId>,
) -> bool {
    let fabric = ctx.fabric;
    let sink = fabric.wire(conn.sink);

    if let Some(tile) = sink.tile {
        if !fabric.is_in_region(tile) {
            return false;
        }
    }

    if conn.is_route_through() {
        if !ctx.config.allow_route_throughs {
            return false;
        }
        match (conn.mux, conn.site) {
            (Some(mux), _) if netlist.is_mux_selected(mux) => return false,
            (None, Some(site)) if netlist.is_site_used(fabric, site) => return false,
            _ => {}
        }
    }

    let class_ok = match request.class.wire_access(sink.kind) {
        WireAccess::Open => true,
        WireAccess::Closed => false,
        WireAccess::LocalTieOff(kind) => sink_tile
            .is_some_and(|tile| ctx.locality.is_local(fabric, tile, conn.sink, kind)),
    };
    if !class_ok {
        return false;
    }

    netlist.is_wire_available(request.net, conn.sink)
}
