//! Congestion tracking for negotiated congestion routing.
//!
//! Every wire that has ever been occupied gets a [`WireUsage`] entry recording
//! which requests currently use it, a history multiplier that only grows,
//! and a present-congestion multiplier refreshed from the occupant count.
//! The cost of a wire is `base * history * present`.

use crate::ids::RequestId;
use pathweave_common::{InternalError, PathweaveResult};
use pathweave_config::RouterConfig;
use pathweave_fabric::WireId;
use std::collections::{BTreeMap, BTreeSet};

/// Per-wire congestion state.
#[derive(Debug, Clone)]
pub struct WireUsage {
    capacity: u32,
    base: f64,
    history: f64,
    present: f64,
    occupants: BTreeSet<RequestId>,
}

impl WireUsage {
    /// Creates an unoccupied entry.
    pub fn new(capacity: u32, base: f64) -> Self {
        Self {
            capacity,
            base,
            history: 1.0,
            present: 1.0,
            occupants: BTreeSet::new(),
        }
    }

    /// Returns the negotiated cost of routing through this wire.
    pub fn cost(&self) -> f64 {
        self.base * self.history * self.present
    }

    /// Records `request` as an occupant. A request counts once however many
    /// of its branches share the wire.
    pub fn add_route(&mut self, request: RequestId) {
        self.occupants.insert(request);
    }

    /// Removes `request` from the occupants.
    pub fn remove_route(&mut self, request: RequestId) {
        self.occupants.remove(&request);
    }

    /// Recomputes the present-congestion multiplier for factor `p`.
    pub fn update_present_congestion(&mut self, p: f64) {
        let occupants = self.occupants.len() as u32;
        self.present = if occupants < self.capacity {
            1.0
        } else if occupants == self.capacity {
            1.0 + p
        } else {
            1.0 + (occupants as f64 * p).max(0.0)
        };
    }

    /// Adds `(occupants - 1) * h` to the history multiplier.
    pub fn increment_history(&mut self, h: f64) {
        let excess = self.occupants.len() as f64 - 1.0;
        self.history += (excess * h).max(0.0);
    }

    /// Returns `true` if more requests use the wire than it can carry.
    pub fn is_congested(&self) -> bool {
        self.occupants.len() > self.capacity as usize
    }

    /// Returns the requests currently using the wire.
    pub fn occupants(&self) -> &BTreeSet<RequestId> {
        &self.occupants
    }

    /// Returns the number of requests the wire can carry.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the history multiplier.
    pub fn history(&self) -> f64 {
        self.history
    }

    /// Returns the present-congestion multiplier.
    pub fn present(&self) -> f64 {
        self.present
    }
}

/// Wire usage entries for a whole run, created lazily on first occupancy.
#[derive(Debug, Clone)]
pub struct CongestionTable {
    entries: BTreeMap<WireId, WireUsage>,
    capacity: u32,
    base_cost: f64,
}

impl CongestionTable {
    /// Creates an empty table whose entries get the given capacity and base
    /// cost.
    pub fn new(capacity: u32, base_cost: f64) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            base_cost,
        }
    }

    /// Creates an empty table from router settings.
    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.wire_capacity, config.base_wire_cost)
    }

    /// Returns the cost of `wire`; the base cost if it was never occupied.
    pub fn cost(&self, wire: WireId) -> f64 {
        self.entries
            .get(&wire)
            .map_or(self.base_cost, WireUsage::cost)
    }

    /// Records `request` on `wire` and refreshes its present congestion.
    pub fn add_route(&mut self, wire: WireId, request: RequestId, p: f64) {
        let (capacity, base) = (self.capacity, self.base_cost);
        let usage = self
            .entries
            .entry(wire)
            .or_insert_with(|| WireUsage::new(capacity, base));
        usage.add_route(request);
        usage.update_present_congestion(p);
    }

    /// Removes `request` from `wire` and refreshes its present congestion.
    pub fn remove_route(
        &mut self,
        wire: WireId,
        request: RequestId,
        p: f64,
    ) -> PathweaveResult<()> {
        let usage = self.usage_mut(wire)?;
        usage.remove_route(request);
        usage.update_present_congestion(p);
        Ok(())
    }

    /// Returns the entry of a wire expected to have been occupied.
    pub fn usage(&self, wire: WireId) -> PathweaveResult<&WireUsage> {
        self.entries
            .get(&wire)
            .ok_or_else(|| InternalError::new(format!("wire {wire} has no usage entry")))
    }

    /// Mutable variant of [`usage`](Self::usage).
    pub fn usage_mut(&mut self, wire: WireId) -> PathweaveResult<&mut WireUsage> {
        self.entries
            .get_mut(&wire)
            .ok_or_else(|| InternalError::new(format!("wire {wire} has no usage entry")))
    }

    /// Returns the entry of a wire if one exists.
    pub fn get(&self, wire: WireId) -> Option<&WireUsage> {
        self.entries.get(&wire)
    }

    /// Returns the congested wires in wire order.
    pub fn congested_wires(&self) -> Vec<WireId> {
        self.entries
            .iter()
            .filter(|(_, u)| u.is_congested())
            .map(|(&w, _)| w)
            .collect()
    }

    /// Returns the number of congested wires.
    pub fn overused_count(&self) -> usize {
        self.entries.values().filter(|u| u.is_congested()).count()
    }

    /// Iterates over all entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (WireId, &WireUsage)> {
        self.entries.iter().map(|(&w, u)| (w, u))
    }

    /// Refreshes the present congestion of every entry.
    pub fn refresh_present(&mut self, p: f64) {
        for usage in self.entries.values_mut() {
            usage.update_present_congestion(p);
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no wire has been occupied yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
