//! A* search for single-sink routing.
//!
//! Each sink of a request is searched separately. The search is seeded with
//! the request's current tree, so later sinks branch off wires the net
//! already owns, and stops when it reaches the first wire of the sink's
//! pre-built subtree. The cost of an edge is the negotiated wire cost from
//! the [`CongestionTable`] plus a fixed segment cost; the heuristic is the
//! tile-grid Manhattan distance to the target.

use crate::data::{ReusePolicy, RouteNetlist};
use crate::error::UnroutableSink;
use crate::ids::RouteNodeId;
use crate::routing::congestion::CongestionTable;
use crate::routing::filter::is_connection_valid;
use crate::routing::request::RouteRequest;
use pathweave_config::RouterConfig;
use pathweave_fabric::{Connection, FabricGraph, TieOffLocality, TileId, WireId};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashSet};

/// Read-only state shared by every search of a pass.
pub struct RouteContext<'a> {
    /// The interconnect graph.
    pub fabric: &'a FabricGraph,
    /// Current wire costs.
    pub congestion: &'a CongestionTable,
    /// Router settings.
    pub config: &'a RouterConfig,
    /// Decides which tie-offs may serve a constant sink.
    pub locality: &'a dyn TieOffLocality,
}

/// Routes every pending sink of one request.
pub trait MazeRouter {
    /// Extends `request.tree` to reach every sink in `request.to_route`.
    ///
    /// Returns the summed cost of the paths found. On failure the tree is
    /// pruned back to the sinks reached so far and the first sink without a
    /// legal path is returned.
    fn route(
        &mut self,
        ctx: &RouteContext<'_>,
        netlist: &mut RouteNetlist,
        request: &mut RouteRequest,
    ) -> Result<f64, UnroutableSink>;
}

/// An entry in the open set.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    /// `segment + congestion + heuristic`.
    priority: f64,
    /// Insertion sequence; earlier entries win ties.
    seq: u64,
    node: RouteNodeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The default maze router. Reuses its queue and closed set between
/// searches.
#[derive(Debug, Default)]
pub struct AStarRouter {
    open: BinaryHeap<OpenEntry>,
    closed: HashSet<WireId>,
    seq: u64,
}

impl AStarRouter {
    /// Creates a router with empty search state.
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.open.clear();
        self.closed.clear();
        self.seq = 0;
    }

    fn push(
        &mut self,
        fabric: &FabricGraph,
        request: &RouteRequest,
        node: RouteNodeId,
        target: WireId,
    ) {
        let n = request.tree.node(node);
        let priority = n.cost() + f64::from(fabric.wire_distance(n.wire, target));
        self.open.push(OpenEntry {
            priority,
            seq: self.seq,
            node,
        });
        self.seq += 1;
    }

    /// Puts the nodes the search may branch from into the open set.
    fn seed(
        &mut self,
        ctx: &RouteContext<'_>,
        request: &mut RouteRequest,
        target: WireId,
        sink_tile: Option<TileId>,
    ) {
        let root = request.root;
        let ReusePolicy::LocalBranches(kind) = request.class.reuse_policy() else {
            let nodes: Vec<RouteNodeId> = request.tree.iter(root).collect();
            for node in nodes {
                request.tree.set_costs(node, 0.0, 0.0);
                self.closed.insert(request.tree.wire(node));
                self.push(ctx.fabric, request, node, target);
            }
            return;
        };

        request.tree.set_costs(root, 0.0, 0.0);
        self.closed.insert(request.tree.wire(root));
        self.push(ctx.fabric, request, root, target);

        let branches = request.tree.children(root).to_vec();
        for branch in branches {
            let head = request.tree.wire(branch);
            let local = ctx.fabric.wire(head).kind.tie_off() == Some(kind)
                && sink_tile
                    .is_some_and(|tile| ctx.locality.is_local(ctx.fabric, tile, head, kind));
            let (segment, congestion) = if local {
                (0.0, 0.0)
            } else {
                (
                    ctx.config.static_reuse_segment_cost,
                    ctx.config.static_reuse_congestion_cost,
                )
            };
            let nodes: Vec<RouteNodeId> = request.tree.iter(branch).collect();
            for node in nodes {
                request.tree.set_costs(node, segment, congestion);
                self.closed.insert(request.tree.wire(node));
                self.push(ctx.fabric, request, node, target);
            }
        }
    }

    /// Searches for sink `index`. Returns the cost of the path found.
    fn route_sink(
        &mut self,
        ctx: &RouteContext<'_>,
        netlist: &RouteNetlist,
        request: &mut RouteRequest,
        index: usize,
    ) -> Option<f64> {
        self.reset();
        let target = request.sinks[index].target;
        let terminal = request.sinks[index].terminal;
        let target_wire = request.tree.wire(target);
        let terminal_wire = request.tree.wire(terminal);
        let sink_tile = ctx.fabric.wire(terminal_wire).tile;
        self.seed(ctx, request, target_wire, sink_tile);

        while let Some(OpenEntry { node, .. }) = self.open.pop() {
            if !request.tree.contains(node) {
                continue;
            }
            let cost = request.tree.node(node).cost();
            if node == target {
                return Some(cost);
            }

            let wire = request.tree.wire(node);
            if wire == target_wire {
                // Already in the tree: direct connection or a shared source
                // wire. The sink subtree takes the node's place.
                let pairs = request.tree.replace(node, target);
                request.remap(&pairs);
                return Some(cost);
            }
            if wire == terminal_wire {
                // Reached the pin without going through the subtree's top;
                // the forced prefix is discarded.
                request.tree.disconnect(terminal);
                let pairs = request.tree.replace(node, terminal);
                request.remap(&pairs);
                request.tree.remove_subtree(target);
                request.sinks[index].target = terminal;
                return Some(cost);
            }

            let conns: Vec<Connection> = request.connections_from(ctx.fabric, wire).to_vec();
            for conn in conns {
                if self.closed.contains(&conn.sink)
                    || !is_connection_valid(ctx, netlist, request, &conn, sink_tile)
                {
                    continue;
                }
                if conn.sink == target_wire {
                    let pairs = request.tree.connect_subtree(node, conn, target);
                    request.remap(&pairs);
                    return Some(cost);
                }

                let (segment, congestion) = {
                    let parent = request.tree.node(node);
                    (parent.segment_cost, parent.congestion_cost)
                };
                let (segment, congestion) = if conn.is_pip() {
                    let step = if same_tile(ctx.fabric, conn.source, conn.sink) {
                        ctx.config.same_tile_segment_cost
                    } else {
                        ctx.config.segment_cost
                    };
                    (segment + step, congestion + ctx.congestion.cost(conn.sink))
                } else {
                    (segment, congestion)
                };
                let child = request.tree.connect(node, conn);
                request.tree.set_costs(child, segment, congestion);
                self.closed.insert(conn.sink);
                self.push(ctx.fabric, request, child, target_wire);
            }
        }
        None
    }
}

fn same_tile(fabric: &FabricGraph, a: WireId, b: WireId) -> bool {
    match (fabric.wire(a).tile, fabric.wire(b).tile) {
        (Some(ta), Some(tb)) => ta == tb,
        _ => false,
    }
}

/// Orders the pending sinks: farthest first for signal nets, construction
/// order for constant nets.
fn sink_order(fabric: &FabricGraph, request: &RouteRequest) -> Vec<usize> {
    let mut order = request.to_route.clone();
    if !request.class.is_static() {
        let source = request.tree.wire(request.root);
        order.sort_by_key(|&s| {
            let wire = request.tree.wire(request.sinks[s].target);
            Reverse((fabric.wire_distance(source, wire), wire))
        });
    }
    order
}

impl MazeRouter for AStarRouter {
    fn route(
        &mut self,
        ctx: &RouteContext<'_>,
        netlist: &mut RouteNetlist,
        request: &mut RouteRequest,
    ) -> Result<f64, UnroutableSink> {
        let mut done: Vec<usize> = request.routed.iter().copied().collect();
        let mut total = 0.0;

        for index in sink_order(ctx.fabric, request) {
            let found = self.route_sink(ctx, netlist, request, index);
            if found.is_some() {
                done.push(index);
            }
            let keep: BTreeSet<RouteNodeId> =
                done.iter().map(|&s| request.sinks[s].terminal).collect();
            request.tree.prune(request.root, &keep);

            let Some(cost) = found else {
                let wire = request.tree.wire(request.sinks[index].target);
                let net = netlist.net(request.net);
                return Err(UnroutableSink {
                    net: request.net,
                    net_name: net.name.clone(),
                    wire,
                    wire_name: ctx.fabric.wire_name(wire).to_string(),
                });
            };
            total += cost;
            for pin in request.sinks[index].pins.clone() {
                netlist.add_routed_sink(pin);
            }
        }

        request.tree.unregister_leaves(request.root);
        for &s in &done {
            request.tree.register_leaf(request.sinks[s].terminal);
        }
        Ok(total)
    }
}
