//! PathFinder negotiated congestion routing.
//!
//! Iteratively routes every request, using congestion-aware costs to resolve
//! resource conflicts. After each pass the wires used by more requests than
//! they can carry get a history penalty, and only the sinks routed through
//! them are ripped up and re-routed in the next pass. The loop ends when no
//! wire is overused or the iteration cap is reached.

use crate::data::{RouteNetlist, RouteStatus};
use crate::error::RouteError;
use crate::ids::RouteNodeId;
use crate::route_tree::RouteTree;
use crate::routing::astar::{AStarRouter, MazeRouter, RouteContext};
use crate::routing::congestion::CongestionTable;
use crate::routing::request::{build_requests, RouteRequest};
use crate::routing::static_sources::{materialize_static_source, refresh_static_sources};
use crate::routing::{IterationSummary, RouteReport};
use pathweave_common::{InternalError, PathweaveResult};
use pathweave_config::RouterConfig;
use pathweave_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use pathweave_fabric::{FabricGraph, SameTile, TieOffLocality, WireId};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Mutable state of one run, carried across iterations.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Per-wire occupancy and costs.
    pub congestion: CongestionTable,
    /// Present-congestion factor `p`, grown after every congested pass.
    pub present_factor: f64,
    /// Tile radius searched for static-source candidates.
    pub static_radius: u32,
    /// The current pass, starting at 1.
    pub iteration: u32,
}

impl EngineState {
    /// Creates the state of a fresh run.
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            congestion: CongestionTable::from_config(config),
            present_factor: config.present_congestion_factor,
            static_radius: config.static_search_radius,
            iteration: 1,
        }
    }

    /// Moves to the next pass: refreshes present congestion with the
    /// current factor, then grows the factor and the static-source radius.
    pub fn advance(&mut self, config: &RouterConfig) {
        self.congestion.refresh_present(self.present_factor);
        self.present_factor *= config.present_congestion_growth;
        self.iteration += 1;
        self.static_radius = self
            .static_radius
            .saturating_add(self.iteration.saturating_mul(config.static_search_growth));
    }
}

/// The negotiated congestion engine.
///
/// Holds the fabric, the settings and the pluggable pieces of a run: the
/// tie-off locality policy (default [`SameTile`]) and the maze router
/// (default [`AStarRouter`]).
pub struct PathFinder<'a> {
    fabric: &'a FabricGraph,
    config: &'a RouterConfig,
    locality: Box<dyn TieOffLocality + 'a>,
    router: Box<dyn MazeRouter + 'a>,
    state: EngineState,
}

impl<'a> PathFinder<'a> {
    /// Creates an engine with the default locality policy and router.
    pub fn new(fabric: &'a FabricGraph, config: &'a RouterConfig) -> Self {
        Self {
            fabric,
            config,
            locality: Box::new(SameTile),
            router: Box::new(AStarRouter::new()),
            state: EngineState::new(config),
        }
    }

    /// Replaces the tie-off locality policy.
    pub fn with_locality(mut self, locality: impl TieOffLocality + 'a) -> Self {
        self.locality = Box::new(locality);
        self
    }

    /// Replaces the maze router.
    pub fn with_router(mut self, router: impl MazeRouter + 'a) -> Self {
        self.router = Box::new(router);
        self
    }

    /// Returns the state left by the last run.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Routes every net of `netlist` that needs inter-site routing and
    /// commits the results.
    ///
    /// Unroutable nets are reported, not returned as errors. An error means
    /// the settings were invalid or the fabric contradicted the router; the
    /// latter is also emitted as an `E001` diagnostic.
    pub fn run(
        &mut self,
        netlist: &mut RouteNetlist,
        sink: &DiagnosticSink,
    ) -> Result<RouteReport, RouteError> {
        self.config.validate()?;
        self.state = EngineState::new(self.config);
        self.negotiate(netlist, sink).map_err(|err| abort(sink, err))
    }

    fn negotiate(
        &mut self,
        netlist: &mut RouteNetlist,
        sink: &DiagnosticSink,
    ) -> PathweaveResult<RouteReport> {
        let mut requests = build_requests(netlist, self.fabric, sink);
        let mut dropped = vec![false; requests.len()];
        let mut held_back = BTreeSet::new();
        let mut pending: Vec<usize> = (0..requests.len()).collect();
        let mut report = RouteReport::default();

        loop {
            pending.sort_by_key(|&r| (Reverse(requests[r].sink_count()), r));

            let mut routed_now = Vec::new();
            for &r in &pending {
                let request = &mut requests[r];
                if self.state.iteration > 1 {
                    self.rip_up(netlist, request)?;
                }
                if self.config.static_sources {
                    refresh_static_sources(request, netlist, self.fabric, self.state.static_radius);
                }

                let ctx = RouteContext {
                    fabric: self.fabric,
                    congestion: &self.state.congestion,
                    config: self.config,
                    locality: &*self.locality,
                };
                match self.router.route(&ctx, netlist, request) {
                    Ok(_) => {
                        self.add_occupancy(request);
                        routed_now.push(r);
                    }
                    Err(unroutable) => {
                        dropped[r] = true;
                        for pin in request.pins() {
                            netlist.remove_routed_sink(pin);
                        }
                        sink.emit(
                            Diagnostic::warning(
                                DiagnosticCode::new(Category::Routing, 1),
                                "sink could not be routed",
                            )
                            .with_subject(unroutable.net_name.clone())
                            .with_note(format!("no legal path to wire '{}'", unroutable.wire_name))
                            .with_note("request dropped for the remainder of the run"),
                        );
                        report.dropped.push(unroutable);
                    }
                }
            }

            let mut flagged = BTreeSet::new();
            for &r in &routed_now {
                let request = &mut requests[r];
                for wire in self.tracked_wires(&request.tree, request.root) {
                    if self.state.congestion.usage(wire)?.is_congested() {
                        flagged.insert(wire);
                    }
                }
                request.mark_all_routed();
            }

            let mut collected = BTreeSet::new();
            for &wire in &flagged {
                let usage = self.state.congestion.usage_mut(wire)?;
                usage.increment_history(self.config.history_factor);
                collected.extend(
                    usage
                        .occupants()
                        .iter()
                        .map(|id| id.as_raw() as usize)
                        .filter(|&r| !dropped[r]),
                );
            }
            for &r in &collected {
                self.update_sink_status(&mut requests[r])?;
            }

            sink.emit(
                Diagnostic::note(
                    DiagnosticCode::new(Category::Routing, 4),
                    format!(
                        "iteration {}: {} congested wires, {} requests to re-route",
                        self.state.iteration,
                        flagged.len(),
                        collected.len()
                    ),
                )
                .with_note(format!("present factor {:.3}", self.state.present_factor)),
            );
            report.congestion_history.push(IterationSummary {
                iteration: self.state.iteration,
                congested_wires: flagged.len(),
                rerouted_requests: collected.len(),
            });
            report.iterations = self.state.iteration;

            if flagged.is_empty() {
                report.converged = true;
                break;
            }
            if self.state.iteration >= self.config.max_iterations {
                report.converged = false;
                for &r in &collected {
                    for pin in requests[r].pins() {
                        netlist.remove_routed_sink(pin);
                    }
                }
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::new(Category::Routing, 2),
                        format!(
                            "routing did not converge after {} iterations ({} overused wires)",
                            self.state.iteration,
                            self.state.congestion.overused_count()
                        ),
                    )
                    .with_note(format!("{} nets left unrouted", collected.len()))
                    .with_help("raise max_iterations or relieve the congested region"),
                );
                held_back = collected;
                break;
            }

            self.state.advance(self.config);
            pending = collected.into_iter().collect();
        }

        for (r, request) in requests.iter_mut().enumerate() {
            if dropped[r] {
                continue;
            }
            if held_back.contains(&r) {
                report.congested.extend(request.nets.iter().copied());
                continue;
            }
            commit(netlist, self.fabric, request);
            report.routed.extend(request.nets.iter().copied());
        }
        Ok(report)
    }

    /// Wires of every route node below `root`, expanded to their nodes.
    /// Virtual wires are not tracked.
    fn tracked_wires(&self, tree: &RouteTree, root: RouteNodeId) -> BTreeSet<WireId> {
        tree.wires(root)
            .into_iter()
            .flat_map(|w| self.fabric.wires_in_node(w).iter().copied())
            .filter(|&w| self.fabric.wire(w).tile.is_some())
            .collect()
    }

    fn add_occupancy(&mut self, request: &RouteRequest) {
        let p = self.state.present_factor;
        for wire in self.tracked_wires(&request.tree, request.root) {
            self.state.congestion.add_route(wire, request.id, p);
        }
    }

    fn remove_occupancy(
        &mut self,
        request: &RouteRequest,
        root: RouteNodeId,
    ) -> PathweaveResult<()> {
        let p = self.state.present_factor;
        for wire in self.tracked_wires(&request.tree, root) {
            self.state.congestion.remove_route(wire, request.id, p)?;
        }
        Ok(())
    }

    fn rip_up(
        &mut self,
        netlist: &mut RouteNetlist,
        request: &mut RouteRequest,
    ) -> PathweaveResult<()> {
        self.remove_occupancy(request, request.root)?;
        for &s in &request.to_route {
            for &pin in &request.sinks[s].pins {
                netlist.remove_routed_sink(pin);
            }
        }
        let keep = request.routed_terminals();
        request.tree.prune(request.root, &keep);
        request.tree.unregister_leaves(request.root);
        Ok(())
    }

    /// Detaches every sink routed through a congested wire and queues it for
    /// the next pass.
    fn update_sink_status(&mut self, request: &mut RouteRequest) -> PathweaveResult<()> {
        let mut detach = BTreeSet::new();
        let mut stack = vec![request.root];
        while let Some(node) = stack.pop() {
            let congested = self
                .fabric
                .wires_in_node(request.tree.wire(node))
                .iter()
                .any(|&w| self.state.congestion.get(w).is_some_and(|u| u.is_congested()));
            if congested {
                for leaf in request.tree.leaves(node) {
                    if let Some(&s) = request.terminal_to_sink.get(leaf) {
                        detach.insert(s);
                    }
                }
                continue;
            }
            stack.extend(request.tree.children(node).iter().rev().copied());
        }

        // Sinks grown out of a detached subtree leave with it.
        let nested: Vec<usize> = detach
            .iter()
            .flat_map(|&s| request.tree.leaves(request.sinks[s].target).iter())
            .filter_map(|leaf| request.terminal_to_sink.get(leaf).copied())
            .collect();
        detach.extend(nested);

        for s in detach {
            let target = request.sinks[s].target;
            if request.tree.parent(target).is_none() {
                continue;
            }
            request.tree.disconnect(target);
            self.remove_occupancy(request, target)?;
            request.routed.remove(&s);
            request.to_route.push(s);
        }
        Ok(())
    }
}

/// Reports a run stopped by an internal error.
fn abort(sink: &DiagnosticSink, err: InternalError) -> RouteError {
    sink.emit(
        Diagnostic::error(DiagnosticCode::new(Category::Error, 1), "routing aborted")
            .with_note(err.to_string())
            .with_help("the fabric graph and the congestion state disagree"),
    );
    RouteError::from(err)
}

/// Hands the request's final trees to its net.
fn commit(netlist: &mut RouteNetlist, fabric: &FabricGraph, request: &mut RouteRequest) {
    let mut routes = Vec::new();
    match request.static_kind() {
        Some(kind) => {
            // One tree per constant driver.
            for branch in request.tree.children(request.root).to_vec() {
                request.tree.disconnect(branch);
                let head = request.tree.wire(branch);
                if let Some(candidate) = request.static_candidates.get(&head) {
                    materialize_static_source(netlist, fabric, kind, candidate);
                }
                routes.push(request.tree.extract(branch));
            }
        }
        None => routes.push(request.tree.extract(request.root)),
    }

    for tree in &routes {
        record_route_throughs(netlist, fabric, tree);
    }
    netlist.net_mut(request.net).routes = routes;
    for &net in &request.nets {
        netlist.net_mut(net).status = RouteStatus::FullyRouted;
    }
}

/// Configures the output mux of every site a committed tree routes through.
fn record_route_throughs(netlist: &mut RouteNetlist, fabric: &FabricGraph, tree: &RouteTree) {
    let Some(root) = tree.root() else {
        return;
    };
    for id in tree.iter(root) {
        let Some(conn) = tree.node(id).via else {
            continue;
        };
        match conn.mux {
            Some(mux) if conn.is_route_through() => {
                netlist.select_mux(mux, fabric.wire_name(conn.source));
            }
            _ => {}
        }
    }
}
