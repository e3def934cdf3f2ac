//! Policies deciding whether a tie-off is close enough to serve a sink.

use crate::graph::FabricGraph;
use crate::ids::{TileId, WireId};
use crate::types::StaticKind;

/// Decides whether a constant net may reach a sink through a given tie-off.
///
/// Static nets only route through tie-offs local to the sink; non-local
/// tie-offs are pruned from the search to keep it small.
pub trait TieOffLocality {
    /// Returns `true` if `tie_off` (of polarity `kind`) may serve a sink whose
    /// terminal wire lies in `sink_tile`.
    fn is_local(
        &self,
        fabric: &FabricGraph,
        sink_tile: TileId,
        tie_off: WireId,
        kind: StaticKind,
    ) -> bool;
}

/// Only the tie-off registered as serving the sink's own tile is local.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameTile;

impl TieOffLocality for SameTile {
    fn is_local(
        &self,
        fabric: &FabricGraph,
        sink_tile: TileId,
        tie_off: WireId,
        kind: StaticKind,
    ) -> bool {
        fabric.tie_off_for(sink_tile, kind) == Some(tie_off)
    }
}

/// Any tie-off within a Manhattan tile distance of the sink is local.
#[derive(Debug, Clone, Copy)]
pub struct WithinDistance(pub u32);

impl TieOffLocality for WithinDistance {
    fn is_local(
        &self,
        fabric: &FabricGraph,
        sink_tile: TileId,
        tie_off: WireId,
        _kind: StaticKind,
    ) -> bool {
        match fabric.wire(tie_off).tile {
            Some(tile) => fabric.tile_distance(sink_tile, tile) <= self.0,
            None => false,
        }
    }
}
