//! The placed netlist seen by the router.
//!
//! Defines cells (with optional BEL placement), pins (with the routing wire
//! their site pin touches), and nets (driver, sinks, class, aliases and route
//! status). [`RouteNetlist`] also owns the design-wide state the router
//! consults and updates: the wire reservation table, site mux selections,
//! BEL occupancy, and the BELs turned into constant sources.

use crate::ids::{CellId, NetId, PinId};
use crate::route_tree::RouteTree;
use pathweave_fabric::{
    BelId, FabricGraph, MuxId, SiteId, StaticKind, StaticSourceCandidate, WireId, WireKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The placed netlist handed to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteNetlist {
    /// All cells in the netlist.
    pub cells: Vec<Cell>,
    /// All nets in the netlist.
    pub nets: Vec<Net>,
    /// All pins in the netlist.
    pub pins: Vec<Pin>,
    /// BELs turned into VCC sources by the router.
    pub vcc_source_bels: BTreeSet<BelId>,
    /// BELs turned into GND sources by the router.
    pub gnd_source_bels: BTreeSet<BelId>,
    reserved: HashMap<WireId, NetId>,
    mux_selections: BTreeMap<MuxId, String>,
    bel_occupants: BTreeMap<BelId, CellId>,
    /// Auxiliary index: net name to ID (rebuilt on deserialization).
    #[serde(skip)]
    pub net_by_name: HashMap<String, NetId>,
}

impl RouteNetlist {
    /// Creates an empty netlist.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            nets: Vec::new(),
            pins: Vec::new(),
            vcc_source_bels: BTreeSet::new(),
            gnd_source_bels: BTreeSet::new(),
            reserved: HashMap::new(),
            mux_selections: BTreeMap::new(),
            bel_occupants: BTreeMap::new(),
            net_by_name: HashMap::new(),
        }
    }

    /// Adds a cell and returns its ID. A placed cell occupies its BEL.
    pub fn add_cell(&mut self, mut cell: Cell) -> CellId {
        let id = CellId::from_raw(self.cells.len() as u32);
        cell.id = id;
        if let Some(bel) = cell.bel {
            self.bel_occupants.insert(bel, id);
        }
        self.cells.push(cell);
        id
    }

    /// Adds a pin and returns its ID.
    pub fn add_pin(&mut self, mut pin: Pin) -> PinId {
        let id = PinId::from_raw(self.pins.len() as u32);
        pin.id = id;
        self.pins.push(pin);
        id
    }

    /// Adds a net and returns its ID. The driver and sink pins are pointed at
    /// the new net.
    pub fn add_net(&mut self, mut net: Net) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        net.id = id;
        for pin in net.driver.iter().chain(net.sinks.iter()) {
            self.pins[pin.as_raw() as usize].net = Some(id);
        }
        self.net_by_name.insert(net.name.clone(), id);
        self.nets.push(net);
        id
    }

    /// Declares `a` and `b` as aliases: two names for one physical signal.
    pub fn add_alias(&mut self, a: NetId, b: NetId) {
        if a == b {
            return;
        }
        if !self.net(a).aliases.contains(&b) {
            self.net_mut(a).aliases.push(b);
        }
        if !self.net(b).aliases.contains(&a) {
            self.net_mut(b).aliases.push(a);
        }
    }

    /// Returns every net reachable from `net` through alias links, `net`
    /// included.
    pub fn alias_set(&self, net: NetId) -> BTreeSet<NetId> {
        let mut set = BTreeSet::from([net]);
        let mut queue = vec![net];
        while let Some(n) = queue.pop() {
            for &alias in &self.net(n).aliases {
                if set.insert(alias) {
                    queue.push(alias);
                }
            }
        }
        set
    }

    /// Returns the cell with the given ID.
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.as_raw() as usize]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the net with the given ID.
    pub fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.as_raw() as usize]
    }

    /// Returns the pin with the given ID.
    pub fn pin(&self, id: PinId) -> &Pin {
        &self.pins[id.as_raw() as usize]
    }

    /// Looks up a net by name.
    pub fn net_by_name(&self, name: &str) -> Option<NetId> {
        self.net_by_name.get(name).copied()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Rebuilds auxiliary indices after deserialization.
    pub fn rebuild_indices(&mut self) {
        self.net_by_name.clear();
        for (i, net) in self.nets.iter().enumerate() {
            self.net_by_name
                .insert(net.name.clone(), NetId::from_raw(i as u32));
        }
    }

    /// Reserves `wire` for `net`. The first reservation of a wire wins;
    /// returns `false` if it already belongs to another net.
    pub fn reserve_wire(&mut self, wire: WireId, net: NetId) -> bool {
        *self.reserved.entry(wire).or_insert(net) == net
    }

    /// Returns the net a wire is reserved for, if any.
    pub fn reserved_for(&self, wire: WireId) -> Option<NetId> {
        self.reserved.get(&wire).copied()
    }

    /// Returns `true` unless `wire` is reserved for a net other than `net`.
    pub fn is_wire_available(&self, net: NetId, wire: WireId) -> bool {
        self.reserved.get(&wire).map_or(true, |&owner| owner == net)
    }

    /// Records a configuration value for a site mux.
    pub fn select_mux(&mut self, mux: MuxId, value: impl Into<String>) {
        self.mux_selections.insert(mux, value.into());
    }

    /// Returns the configured value of a site mux.
    pub fn mux_selection(&self, mux: MuxId) -> Option<&str> {
        self.mux_selections.get(&mux).map(String::as_str)
    }

    /// Returns `true` if a site mux has been configured.
    pub fn is_mux_selected(&self, mux: MuxId) -> bool {
        self.mux_selections.contains_key(&mux)
    }

    /// Returns all configured muxes of `site`, in mux order.
    pub fn site_mux_selections<'a>(
        &'a self,
        fabric: &'a FabricGraph,
        site: SiteId,
    ) -> impl Iterator<Item = (MuxId, &'a str)> + 'a {
        self.mux_selections
            .iter()
            .filter(move |(mux, _)| fabric.mux(**mux).site == site)
            .map(|(mux, value)| (*mux, value.as_str()))
    }

    /// Returns `true` if a cell is placed on `bel`.
    pub fn is_bel_used(&self, bel: BelId) -> bool {
        self.bel_occupants.contains_key(&bel)
    }

    /// Returns `true` if any BEL of `site` hosts a cell.
    pub fn is_site_used(&self, fabric: &FabricGraph, site: SiteId) -> bool {
        fabric.site(site).bels.iter().any(|&b| self.is_bel_used(b))
    }

    /// Returns `true` if a static-source candidate can still be claimed:
    /// its BEL is empty and none of its muxes are configured.
    pub fn is_static_source_free(&self, candidate: &StaticSourceCandidate) -> bool {
        !self.is_bel_used(candidate.bel)
            && !self.is_mux_selected(candidate.select)
            && !candidate.requires_free.iter().any(|&m| self.is_mux_selected(m))
    }

    /// Creates a router-owned cell placed on `bel` and returns its ID.
    pub fn place_pseudo_cell(&mut self, name: String, bel: BelId) -> CellId {
        self.add_cell(Cell {
            id: CellId::from_raw(0),
            name,
            bel: Some(bel),
            pseudo: true,
        })
    }

    /// Records `bel` as a constant source of the given polarity.
    pub fn add_static_source_bel(&mut self, kind: StaticKind, bel: BelId) {
        match kind {
            StaticKind::Vcc => self.vcc_source_bels.insert(bel),
            StaticKind::Gnd => self.gnd_source_bels.insert(bel),
        };
    }

    /// Marks a sink pin as reached by its net's route.
    pub fn add_routed_sink(&mut self, pin: PinId) {
        if let Some(net) = self.pin(pin).net {
            self.net_mut(net).routed_sinks.insert(pin);
        }
    }

    /// Withdraws a routed-sink notification.
    pub fn remove_routed_sink(&mut self, pin: PinId) {
        if let Some(net) = self.pin(pin).net {
            self.net_mut(net).routed_sinks.remove(&pin);
        }
    }

    /// Returns whether every net with sinks is fully routed.
    pub fn is_fully_routed(&self) -> bool {
        self.nets
            .iter()
            .filter(|n| !n.sinks.is_empty() && !n.intrasite)
            .all(|n| n.status == RouteStatus::FullyRouted)
    }
}

impl Default for RouteNetlist {
    fn default() -> Self {
        Self::new()
    }
}

/// A cell, optionally placed on a BEL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// The unique ID of this cell (assigned by [`RouteNetlist::add_cell`]).
    pub id: CellId,
    /// The instance name of this cell.
    pub name: String,
    /// The BEL this cell is placed on.
    pub bel: Option<BelId>,
    /// Whether the router created this cell (e.g., a constant source).
    pub pseudo: bool,
}

/// Direction of a pin relative to its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    /// The pin receives a signal.
    Input,
    /// The pin drives a signal.
    Output,
}

/// A cell pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    /// The unique ID of this pin (assigned by [`RouteNetlist::add_pin`]).
    pub id: PinId,
    /// The pin name on its cell (e.g., "D", "O").
    pub name: String,
    /// The cell this pin belongs to.
    pub cell: CellId,
    /// Signal direction.
    pub direction: PinDirection,
    /// The net connected to this pin.
    pub net: Option<NetId>,
    /// The routing wire adjacent to the site pin this cell pin maps to.
    /// `None` when the connection stays inside a site.
    pub wire: Option<WireId>,
}

/// The resource class of a net, deciding which wires it may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetClass {
    /// An ordinary signal.
    Logic,
    /// A clock distributed on the dedicated global network.
    GlobalClock,
    /// A clock routed on general interconnect.
    LocalClock,
    /// The net between a clock buffer and its driver.
    ClockBuffer,
    /// The constant-one net.
    Vcc,
    /// The constant-zero net.
    Gnd,
}

impl NetClass {
    /// Returns the constant polarity of a VCC/GND net.
    pub fn static_kind(self) -> Option<StaticKind> {
        match self {
            NetClass::Vcc => Some(StaticKind::Vcc),
            NetClass::Gnd => Some(StaticKind::Gnd),
            _ => None,
        }
    }

    /// Returns `true` for VCC and GND nets.
    pub fn is_static(self) -> bool {
        self.static_kind().is_some()
    }

    /// Decides whether a net of this class may enter a wire of `kind`.
    pub fn wire_access(self, kind: WireKind) -> WireAccess {
        let open = match self {
            NetClass::GlobalClock => kind.is_clock() || kind.is_clock_fanout(),
            NetClass::LocalClock => !kind.is_clock_fanout(),
            NetClass::ClockBuffer => true,
            NetClass::Logic => !kind.is_clock(),
            NetClass::Vcc | NetClass::Gnd => match (kind.tie_off(), self.static_kind()) {
                (Some(polarity), Some(own)) if polarity == own => {
                    return WireAccess::LocalTieOff(own);
                }
                (Some(_), _) => false,
                (None, _) => true,
            },
        };
        if open {
            WireAccess::Open
        } else {
            WireAccess::Closed
        }
    }

    /// Decides how the search prices the tree a net of this class already
    /// owns.
    pub fn reuse_policy(self) -> ReusePolicy {
        match self.static_kind() {
            Some(kind) => ReusePolicy::LocalBranches(kind),
            None => ReusePolicy::FreeTree,
        }
    }
}

/// Answer of [`NetClass::wire_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireAccess {
    /// The wire may be used.
    Open,
    /// The wire is reserved for other classes.
    Closed,
    /// A tie-off of the net's own polarity, usable only when the locality
    /// policy accepts it for the sink being routed.
    LocalTieOff(StaticKind),
}

/// Answer of [`NetClass::reuse_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReusePolicy {
    /// Every node of the tree is a free starting point.
    FreeTree,
    /// Constant nets: a driver branch is free when it starts at a tie-off
    /// local to the sink, and costs the configured reuse costs otherwise.
    LocalBranches(StaticKind),
}

/// Routing progress of a net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RouteStatus {
    /// No route has been committed.
    #[default]
    Unrouted,
    /// Some sinks are reached by a committed route.
    PartiallyRouted,
    /// A route reaching every sink has been committed.
    FullyRouted,
}

/// A net: one driver, many sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net (assigned by [`RouteNetlist::add_net`]).
    pub id: NetId,
    /// The name of this net.
    pub name: String,
    /// The resource class of this net.
    pub class: NetClass,
    /// The driving pin. Constant nets have none.
    pub driver: Option<PinId>,
    /// The driven pins.
    pub sinks: Vec<PinId>,
    /// Other nets carrying the same physical signal.
    pub aliases: Vec<NetId>,
    /// Whether the net never leaves its site.
    pub intrasite: bool,
    /// Routing progress.
    pub status: RouteStatus,
    /// Sink pins currently reached by the route.
    pub routed_sinks: BTreeSet<PinId>,
    /// Committed route trees. Constant nets commit one tree per source.
    pub routes: Vec<RouteTree>,
}

impl Net {
    /// Creates an unrouted net with no pins.
    pub fn new(name: impl Into<String>, class: NetClass) -> Self {
        Self {
            id: NetId::from_raw(0),
            name: name.into(),
            class,
            driver: None,
            sinks: Vec::new(),
            aliases: Vec::new(),
            intrasite: false,
            status: RouteStatus::Unrouted,
            routed_sinks: BTreeSet::new(),
            routes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(cell: CellId, name: &str, direction: PinDirection, wire: Option<WireId>) -> Pin {
        Pin {
            id: PinId::from_raw(0),
            name: name.into(),
            cell,
            direction,
            net: None,
            wire,
        }
    }

    fn two_pin_netlist() -> (RouteNetlist, NetId, PinId) {
        let mut nl = RouteNetlist::new();
        let c0 = nl.add_cell(Cell {
            id: CellId::from_raw(0),
            name: "drv".into(),
            bel: None,
            pseudo: false,
        });
        let c1 = nl.add_cell(Cell {
            id: CellId::from_raw(0),
            name: "ld".into(),
            bel: None,
            pseudo: false,
        });
        let p0 = nl.add_pin(pin(c0, "O", PinDirection::Output, Some(WireId::from_raw(2))));
        let p1 = nl.add_pin(pin(c1, "I", PinDirection::Input, Some(WireId::from_raw(3))));
        let mut net = Net::new("n0", NetClass::Logic);
        net.driver = Some(p0);
        net.sinks.push(p1);
        let n = nl.add_net(net);
        (nl, n, p1)
    }

    #[test]
    fn add_net_links_pins() {
        let (nl, n, p1) = two_pin_netlist();
        assert_eq!(nl.pin(p1).net, Some(n));
        assert_eq!(nl.net_by_name("n0"), Some(n));
        assert_eq!(nl.net_count(), 1);
        assert!(!nl.is_fully_routed());
    }

    #[test]
    fn routed_sink_notifications() {
        let (mut nl, n, p1) = two_pin_netlist();
        nl.add_routed_sink(p1);
        assert!(nl.net(n).routed_sinks.contains(&p1));
        nl.remove_routed_sink(p1);
        assert!(nl.net(n).routed_sinks.is_empty());
    }

    #[test]
    fn reservation_first_wins() {
        let mut nl = RouteNetlist::new();
        let a = NetId::from_raw(0);
        let b = NetId::from_raw(1);
        let w = WireId::from_raw(9);
        assert!(nl.is_wire_available(b, w));
        assert!(nl.reserve_wire(w, a));
        assert!(nl.reserve_wire(w, a));
        assert!(!nl.reserve_wire(w, b));
        assert_eq!(nl.reserved_for(w), Some(a));
        assert!(nl.is_wire_available(a, w));
        assert!(!nl.is_wire_available(b, w));
    }

    #[test]
    fn aliases_are_symmetric() {
        let mut nl = RouteNetlist::new();
        let a = nl.add_net(Net::new("a", NetClass::Logic));
        let b = nl.add_net(Net::new("b", NetClass::Logic));
        nl.add_alias(a, b);
        nl.add_alias(b, a);
        assert_eq!(nl.net(a).aliases, vec![b]);
        assert_eq!(nl.net(b).aliases, vec![a]);
    }

    #[test]
    fn alias_set_follows_chains() {
        let mut nl = RouteNetlist::new();
        let q = nl.add_net(Net::new("q", NetClass::Logic));
        let q_a = nl.add_net(Net::new("q_a", NetClass::Logic));
        let q_b = nl.add_net(Net::new("q_b", NetClass::Logic));
        let other = nl.add_net(Net::new("other", NetClass::Logic));
        nl.add_alias(q, q_a);
        nl.add_alias(q_a, q_b);
        let expected = BTreeSet::from([q, q_a, q_b]);
        assert_eq!(nl.alias_set(q), expected);
        assert_eq!(nl.alias_set(q_b), expected);
        assert_eq!(nl.alias_set(other), BTreeSet::from([other]));
    }

    #[test]
    fn static_source_availability() {
        let mut fabric = FabricGraph::new();
        let tile = fabric.add_tile("CLB", 0, 0);
        let site = fabric.add_site("SLICE_X0Y0", tile);
        let bel = fabric.add_bel("A6LUT", site);
        let select = fabric.add_mux("AUSED", site);
        let outmux = fabric.add_mux("AOUTMUX", site);
        let output_wire = fabric.add_wire("CLB_A", tile, WireKind::General);
        let candidate = StaticSourceCandidate {
            site,
            bel,
            output_wire,
            select,
            requires_free: vec![outmux],
        };

        let mut nl = RouteNetlist::new();
        assert!(nl.is_static_source_free(&candidate));
        assert!(!nl.is_site_used(&fabric, site));

        nl.select_mux(outmux, "A5Q");
        assert!(!nl.is_static_source_free(&candidate));
        assert_eq!(nl.mux_selection(outmux), Some("A5Q"));
        let at_site: Vec<_> = nl.site_mux_selections(&fabric, site).collect();
        assert_eq!(at_site, vec![(outmux, "A5Q")]);

        let mut nl = RouteNetlist::new();
        let cell = nl.place_pseudo_cell("StaticVccSource_SLICE_X0Y0/A6LUT".into(), bel);
        assert!(nl.cell(cell).pseudo);
        assert!(nl.is_bel_used(bel));
        assert!(nl.is_site_used(&fabric, site));
        assert!(!nl.is_static_source_free(&candidate));
    }

    #[test]
    fn net_class_polarity() {
        assert_eq!(NetClass::Vcc.static_kind(), Some(StaticKind::Vcc));
        assert!(NetClass::Gnd.is_static());
        assert!(!NetClass::GlobalClock.is_static());
    }

    #[test]
    fn wire_access_by_class() {
        use WireAccess::{Closed, LocalTieOff, Open};
        let vcc_tie = WireKind::TieOff(StaticKind::Vcc);
        let gnd_tie = WireKind::TieOff(StaticKind::Gnd);

        assert_eq!(NetClass::GlobalClock.wire_access(WireKind::Clock), Open);
        assert_eq!(NetClass::GlobalClock.wire_access(WireKind::ClockFanout), Open);
        assert_eq!(NetClass::GlobalClock.wire_access(WireKind::General), Closed);
        assert_eq!(NetClass::LocalClock.wire_access(WireKind::ClockFanout), Closed);
        assert_eq!(NetClass::LocalClock.wire_access(WireKind::Clock), Open);
        assert_eq!(NetClass::ClockBuffer.wire_access(WireKind::ClockFanout), Open);
        assert_eq!(NetClass::Logic.wire_access(WireKind::Clock), Closed);
        assert_eq!(NetClass::Logic.wire_access(WireKind::General), Open);

        assert_eq!(NetClass::Vcc.wire_access(vcc_tie), LocalTieOff(StaticKind::Vcc));
        assert_eq!(NetClass::Vcc.wire_access(gnd_tie), Closed);
        assert_eq!(NetClass::Gnd.wire_access(gnd_tie), LocalTieOff(StaticKind::Gnd));
        assert_eq!(NetClass::Gnd.wire_access(WireKind::General), Open);
    }

    #[test]
    fn only_constant_nets_price_their_branches() {
        assert_eq!(NetClass::Logic.reuse_policy(), ReusePolicy::FreeTree);
        assert_eq!(NetClass::GlobalClock.reuse_policy(), ReusePolicy::FreeTree);
        assert_eq!(
            NetClass::Gnd.reuse_policy(),
            ReusePolicy::LocalBranches(StaticKind::Gnd)
        );
    }

    #[test]
    fn serde_roundtrip() {
        let (mut nl, n, _) = two_pin_netlist();
        nl.reserve_wire(WireId::from_raw(3), n);
        let json = serde_json::to_string(&nl).unwrap();
        let mut back: RouteNetlist = serde_json::from_str(&json).unwrap();
        assert!(back.net_by_name.is_empty());
        back.rebuild_indices();
        assert_eq!(back.net_by_name("n0"), Some(n));
        assert_eq!(back.reserved_for(WireId::from_raw(3)), Some(n));
    }
}
