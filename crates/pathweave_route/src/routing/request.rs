//! Routing requests: one per net (or alias set) that needs inter-site routes.
//!
//! A [`RouteRequest`] owns a route-tree arena holding the growing main tree
//! and one pre-built subtree per sink. Sink subtrees run from the first wire
//! the router has to reach down to the pin-adjacent terminal wire; they are
//! grown backwards from the terminal as long as the path is forced.

use crate::data::{NetClass, RouteNetlist, RouteStatus};
use crate::ids::{NetId, PinId, RequestId, RouteNodeId};
use crate::route_tree::RouteTree;
use pathweave_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use pathweave_fabric::{Connection, FabricGraph, StaticKind, StaticSourceCandidate, WireId};
use std::collections::{BTreeMap, BTreeSet};

/// One sink of a request.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    /// Root of the sink subtree: the wire the maze router searches for.
    pub target: RouteNodeId,
    /// The pin-adjacent leaf of the sink subtree.
    pub terminal: RouteNodeId,
    /// Netlist pins served by the terminal wire.
    pub pins: Vec<PinId>,
}

/// The routing state of one net across PathFinder iterations.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Stable identity of this request.
    pub id: RequestId,
    /// The net that owns the committed route.
    pub net: NetId,
    /// Every net of the alias set, `net` first.
    pub nets: Vec<NetId>,
    /// The resource class of the net.
    pub class: NetClass,
    /// Arena holding the main tree and the detached sink subtrees.
    pub tree: RouteTree,
    /// Root of the main tree.
    pub root: RouteNodeId,
    /// Sink records, indexed by sink number.
    pub sinks: Vec<SinkRecord>,
    /// Reverse map from terminal node to sink number.
    pub terminal_to_sink: BTreeMap<RouteNodeId, usize>,
    /// Sinks reached without conflict.
    pub routed: BTreeSet<usize>,
    /// Sinks the next search must reach, in construction order.
    pub to_route: Vec<usize>,
    /// Forward connections of the virtual source (constant nets only).
    pub static_connections: Vec<Connection>,
    /// Static-source candidates reachable from the virtual source, by output
    /// wire.
    pub static_candidates: BTreeMap<WireId, StaticSourceCandidate>,
}

impl RouteRequest {
    fn new(
        id: RequestId,
        nets: Vec<NetId>,
        class: NetClass,
        tree: RouteTree,
        root: RouteNodeId,
    ) -> Self {
        Self {
            id,
            net: nets[0],
            nets,
            class,
            tree,
            root,
            sinks: Vec::new(),
            terminal_to_sink: BTreeMap::new(),
            routed: BTreeSet::new(),
            to_route: Vec::new(),
            static_connections: Vec::new(),
            static_candidates: BTreeMap::new(),
        }
    }

    /// Returns the number of sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns the constant polarity of a VCC/GND request.
    pub fn static_kind(&self) -> Option<StaticKind> {
        self.class.static_kind()
    }

    /// Returns the connections the search may take out of `wire`.
    ///
    /// The virtual source of a constant net has no stored connections; its
    /// per-request list is used instead.
    pub fn connections_from<'a>(
        &'a self,
        fabric: &'a FabricGraph,
        wire: WireId,
    ) -> &'a [Connection] {
        if self.class.is_static() && wire == self.tree.wire(self.root) {
            &self.static_connections
        } else {
            fabric.forward(wire)
        }
    }

    /// Returns the terminal nodes of the routed sinks.
    pub fn routed_terminals(&self) -> BTreeSet<RouteNodeId> {
        self.routed.iter().map(|&s| self.sinks[s].terminal).collect()
    }

    /// Returns every pin served by this request.
    pub fn pins(&self) -> impl Iterator<Item = PinId> + '_ {
        self.sinks.iter().flat_map(|s| s.pins.iter().copied())
    }

    /// Marks every sink as routed.
    pub fn mark_all_routed(&mut self) {
        self.routed = (0..self.sinks.len()).collect();
        self.to_route.clear();
    }

    /// Re-points stored node references after a tree merge.
    pub fn remap(&mut self, pairs: &[(RouteNodeId, RouteNodeId)]) {
        for &(absorbed, survivor) in pairs {
            if self.root == absorbed {
                self.root = survivor;
            }
            for sink in &mut self.sinks {
                if sink.target == absorbed {
                    sink.target = survivor;
                }
                if sink.terminal == absorbed {
                    sink.terminal = survivor;
                }
            }
            if let Some(s) = self.terminal_to_sink.remove(&absorbed) {
                self.terminal_to_sink.insert(survivor, s);
            }
        }
    }

    /// Makes `candidate` reachable from the virtual source. Returns `false`
    /// if it already was.
    pub fn add_static_source(&mut self, candidate: &StaticSourceCandidate) -> bool {
        if self.static_candidates.contains_key(&candidate.output_wire) {
            return false;
        }
        let source = self.tree.wire(self.root);
        self.static_connections
            .push(Connection::pip(source, candidate.output_wire));
        self.static_candidates
            .insert(candidate.output_wire, candidate.clone());
        true
    }

    fn add_sink(
        &mut self,
        fabric: &FabricGraph,
        terminal_wire: WireId,
        claimed: &mut BTreeSet<WireId>,
    ) -> usize {
        let chain = sink_chain(fabric, self.class, terminal_wire, claimed);
        let top = chain.first().map_or(terminal_wire, |c| c.source);
        let target = self.tree.add_root(top);
        let mut terminal = target;
        for conn in chain {
            terminal = self.tree.connect(terminal, conn);
        }
        claimed.extend(self.tree.wires(target));

        let index = self.sinks.len();
        self.sinks.push(SinkRecord {
            target,
            terminal,
            pins: Vec::new(),
        });
        self.terminal_to_sink.insert(terminal, index);
        self.to_route.push(index);
        index
    }
}

/// Walks backwards from `terminal` while the driver is unique, returning the
/// forced connections from the top wire down to `terminal`.
fn sink_chain(
    fabric: &FabricGraph,
    class: NetClass,
    terminal: WireId,
    claimed: &BTreeSet<WireId>,
) -> Vec<Connection> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::from([terminal]);
    let mut wire = terminal;
    loop {
        let [conn] = fabric.reverse(wire) else {
            break;
        };
        // Going back through a route-through would target the wrong pin.
        if conn.is_route_through()
            || claimed.contains(&conn.source)
            || seen.contains(&conn.source)
        {
            break;
        }
        chain.push(*conn);
        seen.insert(conn.source);
        wire = conn.source;
    }

    // A global clock must be entered from the clock spine.
    if class == NetClass::GlobalClock && !fabric.wire(wire).kind.is_clock() {
        let fanouts: Vec<&Connection> = fabric
            .reverse(wire)
            .iter()
            .filter(|c| fabric.wire(c.source).kind.is_clock_fanout())
            .collect();
        if let [conn] = fanouts.as_slice() {
            if !claimed.contains(&conn.source) && !seen.contains(&conn.source) {
                chain.push(**conn);
            }
        }
    }

    chain.reverse();
    chain
}

/// Grows the source tree forward from `root` while the fanout is one.
fn grow_source(tree: &mut RouteTree, root: RouteNodeId, fabric: &FabricGraph) {
    let mut seen = BTreeSet::from([tree.wire(root)]);
    let mut cur = root;
    while let [conn] = fabric.forward(tree.wire(cur)) {
        if !seen.insert(conn.sink) {
            break;
        }
        cur = tree.connect(cur, *conn);
    }
}

/// Builds one request per net that still needs inter-site routing and
/// reserves the wires every request is committed to.
///
/// Constant nets come first, then signal nets, each group in net order.
/// Aliased signal nets, chains of aliases included, share one request owned
/// by the first net of the set that needs routing.
pub fn build_requests(
    netlist: &mut RouteNetlist,
    fabric: &FabricGraph,
    sink: &DiagnosticSink,
) -> Vec<RouteRequest> {
    let mut requests = Vec::new();

    for net in &netlist.nets {
        if !net.class.is_static()
            || net.intrasite
            || net.status == RouteStatus::FullyRouted
            || net.sinks.is_empty()
        {
            continue;
        }
        let id = RequestId::from_raw(requests.len() as u32);
        if let Some(request) = build_static(id, net.id, netlist, fabric, sink) {
            requests.push(request);
        }
    }

    let mut handled = BTreeSet::new();
    for net in &netlist.nets {
        if net.class.is_static()
            || net.intrasite
            || net.status == RouteStatus::FullyRouted
            || net.sinks.is_empty()
            || handled.contains(&net.id)
        {
            continue;
        }
        let Some(source) = net.driver.and_then(|p| netlist.pin(p).wire) else {
            continue;
        };
        let mut nets = vec![net.id];
        nets.extend(netlist.alias_set(net.id).into_iter().filter(|&a| a != net.id));
        handled.extend(nets.iter().copied());

        let id = RequestId::from_raw(requests.len() as u32);
        if let Some(request) = build_signal(id, nets, source, netlist, fabric) {
            requests.push(request);
        }
    }

    for request in &requests {
        let net = request.net;
        for record in &request.sinks {
            for wire in request.tree.wires(record.target) {
                netlist.reserve_wire(wire, net);
            }
        }
        if !request.class.is_static() {
            for wire in request.tree.wires(request.root) {
                netlist.reserve_wire(wire, net);
            }
        }
    }

    requests
}

/// Adds every sink pin of `nets` to `request`, sharing a sink between pins
/// that land on the same terminal wire.
fn collect_sinks(
    request: &mut RouteRequest,
    nets: &[NetId],
    netlist: &RouteNetlist,
    fabric: &FabricGraph,
) {
    let mut by_terminal: BTreeMap<WireId, usize> = BTreeMap::new();
    let mut claimed = BTreeSet::new();
    for &net in nets {
        for &pin in &netlist.net(net).sinks {
            let Some(wire) = netlist.pin(pin).wire else {
                continue;
            };
            let index = match by_terminal.get(&wire) {
                Some(&index) => index,
                None => {
                    let index = request.add_sink(fabric, wire, &mut claimed);
                    by_terminal.insert(wire, index);
                    index
                }
            };
            request.sinks[index].pins.push(pin);
        }
    }
}

fn build_signal(
    id: RequestId,
    nets: Vec<NetId>,
    source: WireId,
    netlist: &RouteNetlist,
    fabric: &FabricGraph,
) -> Option<RouteRequest> {
    let class = netlist.net(nets[0]).class;
    let mut tree = RouteTree::new();
    let root = tree.add_root(source);
    grow_source(&mut tree, root, fabric);

    let mut request = RouteRequest::new(id, nets.clone(), class, tree, root);
    collect_sinks(&mut request, &nets, netlist, fabric);
    (request.sink_count() > 0).then_some(request)
}

fn build_static(
    id: RequestId,
    net: NetId,
    netlist: &RouteNetlist,
    fabric: &FabricGraph,
    sink: &DiagnosticSink,
) -> Option<RouteRequest> {
    let class = netlist.net(net).class;
    let kind = class.static_kind()?;
    let mut tree = RouteTree::new();
    let root = tree.add_root(fabric.global_wire(kind));

    let mut request = RouteRequest::new(id, vec![net], class, tree, root);
    collect_sinks(&mut request, &[net], netlist, fabric);
    if request.sink_count() == 0 {
        return None;
    }

    let global = fabric.global_wire(kind);
    let mut tie_offs = BTreeSet::new();
    for record in &request.sinks {
        let terminal = request.tree.wire(record.terminal);
        let Some(tile) = fabric.wire(terminal).tile else {
            continue;
        };
        match fabric.tie_off_for(tile, kind) {
            Some(tie_off) => {
                if tie_offs.insert(tie_off) {
                    request
                        .static_connections
                        .push(Connection::pip(global, tie_off));
                }
            }
            None => sink.emit(
                Diagnostic::note(
                    DiagnosticCode::new(Category::Routing, 3),
                    format!("tile '{}' has no tie-off for this net", fabric.tile(tile).name),
                )
                .with_subject(netlist.net(net).name.clone())
                .with_help("a static source may still be found when enabled"),
            ),
        }
    }
    Some(request)
}
