//! Route tree arenas representing partial and final physical routes.
//!
//! A [`RouteTree`] is an arena of [`RouteNode`]s linked by parent/child
//! indices. One arena may hold several free-standing trees at once: a routing
//! request keeps its growing main tree and the pre-built sink subtrees it
//! still has to reach in the same arena, and splices them together as sinks
//! are found.
//!
//! Each node records the [`Connection`] that drives it from its parent, so a
//! parent has at most one child per connection. Nodes also carry the search
//! costs assigned by the maze router and the set of registered terminal
//! leaves below them.

use crate::ids::RouteNodeId;
use pathweave_fabric::{Connection, WireId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single wire in a route tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteNode {
    /// The wire this node occupies.
    pub wire: WireId,
    /// The parent node, or `None` for a root.
    pub parent: Option<RouteNodeId>,
    /// The connection from the parent's wire to this wire.
    pub via: Option<Connection>,
    /// Child nodes in insertion order.
    pub children: Vec<RouteNodeId>,
    /// Accumulated wire-segment cost from the search origin.
    pub segment_cost: f64,
    /// Accumulated congestion cost from the search origin.
    pub congestion_cost: f64,
    /// Registered terminal leaves in this subtree, this node included.
    pub leaves: BTreeSet<RouteNodeId>,
}

impl RouteNode {
    fn new(wire: WireId, parent: Option<RouteNodeId>, via: Option<Connection>) -> Self {
        Self {
            wire,
            parent,
            via,
            children: Vec::new(),
            segment_cost: 0.0,
            congestion_cost: 0.0,
            leaves: BTreeSet::new(),
        }
    }

    /// Returns the total search cost of this node.
    pub fn cost(&self) -> f64 {
        self.segment_cost + self.congestion_cost
    }
}

/// Arena of route nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTree {
    nodes: Vec<Option<RouteNode>>,
    free: Vec<RouteNodeId>,
}

impl RouteTree {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: RouteNode) -> RouteNodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.as_raw() as usize] = Some(node);
                id
            }
            None => {
                let id = RouteNodeId::from_raw(self.nodes.len() as u32);
                self.nodes.push(Some(node));
                id
            }
        }
    }

    fn release(&mut self, id: RouteNodeId) {
        if self.nodes[id.as_raw() as usize].take().is_some() {
            self.free.push(id);
        }
    }

    /// Adds a free-standing root node for `wire`.
    pub fn add_root(&mut self, wire: WireId) -> RouteNodeId {
        self.alloc(RouteNode::new(wire, None, None))
    }

    /// Returns the node with the given ID, if it is live.
    pub fn get(&self, id: RouteNodeId) -> Option<&RouteNode> {
        self.nodes.get(id.as_raw() as usize).and_then(Option::as_ref)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn contains(&self, id: RouteNodeId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the node has been freed.
    pub fn node(&self, id: RouteNodeId) -> &RouteNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("route node {id} is not live"),
        }
    }

    fn node_mut(&mut self, id: RouteNodeId) -> &mut RouteNode {
        match self.nodes.get_mut(id.as_raw() as usize).and_then(Option::as_mut) {
            Some(node) => node,
            None => panic!("route node {id} is not live"),
        }
    }

    /// Returns the wire of a node.
    pub fn wire(&self, id: RouteNodeId) -> WireId {
        self.node(id).wire
    }

    /// Returns the parent of a node.
    pub fn parent(&self, id: RouteNodeId) -> Option<RouteNodeId> {
        self.node(id).parent
    }

    /// Returns the children of a node.
    pub fn children(&self, id: RouteNodeId) -> &[RouteNodeId] {
        &self.node(id).children
    }

    /// Returns the registered leaves below (and including) a node.
    pub fn leaves(&self, id: RouteNodeId) -> &BTreeSet<RouteNodeId> {
        &self.node(id).leaves
    }

    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns `true` if the arena has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the first live parentless node in index order.
    ///
    /// For a tree produced by [`extract`](Self::extract) this is its root.
    pub fn root(&self) -> Option<RouteNodeId> {
        self.nodes.iter().enumerate().find_map(|(i, n)| match n {
            Some(node) if node.parent.is_none() => Some(RouteNodeId::from_raw(i as u32)),
            _ => None,
        })
    }

    /// Sets the search costs of a node.
    pub fn set_costs(&mut self, id: RouteNodeId, segment: f64, congestion: f64) {
        let node = self.node_mut(id);
        node.segment_cost = segment;
        node.congestion_cost = congestion;
    }

    fn child_via(&self, parent: RouteNodeId, via: Option<Connection>) -> Option<RouteNodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.node(c).via == via)
    }

    fn ancestors(&self, id: RouteNodeId) -> Vec<RouteNodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// Returns the child of `parent` reached through `conn`, creating it if
    /// needed.
    pub fn connect(&mut self, parent: RouteNodeId, conn: Connection) -> RouteNodeId {
        if let Some(existing) = self.child_via(parent, Some(conn)) {
            return existing;
        }
        let child = self.alloc(RouteNode::new(conn.sink, Some(parent), Some(conn)));
        self.node_mut(parent).children.push(child);
        child
    }

    /// Splices the free-standing tree rooted at `subtree` under `parent`
    /// through `conn`.
    ///
    /// If `parent` already has a child keyed by `conn`, `subtree` replaces it
    /// as in [`replace`](Self::replace) and the merge pairs are returned.
    pub fn connect_subtree(
        &mut self,
        parent: RouteNodeId,
        conn: Connection,
        subtree: RouteNodeId,
    ) -> Vec<(RouteNodeId, RouteNodeId)> {
        if let Some(existing) = self.child_via(parent, Some(conn)) {
            return self.replace(existing, subtree);
        }
        {
            let node = self.node_mut(subtree);
            node.parent = Some(parent);
            node.via = Some(conn);
        }
        self.node_mut(parent).children.push(subtree);
        let leaves = self.node(subtree).leaves.clone();
        for a in self.ancestors(subtree) {
            self.node_mut(a).leaves.extend(leaves.iter().copied());
        }
        Vec::new()
    }

    /// Detaches `child` from its parent, leaving it as a free-standing tree.
    ///
    /// The registered leaves of the detached subtree are removed from its
    /// former ancestors.
    pub fn disconnect(&mut self, child: RouteNodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        let leaves = self.node(child).leaves.clone();
        for a in self.ancestors(child) {
            let set = &mut self.node_mut(a).leaves;
            for leaf in &leaves {
                set.remove(leaf);
            }
        }
        self.node_mut(parent).children.retain(|&c| c != child);
        let node = self.node_mut(child);
        node.parent = None;
        node.via = None;
    }

    /// Puts the free-standing tree rooted at `subtree` where `old` stands.
    ///
    /// `subtree` takes over `old`'s parent edge and position among its
    /// siblings. `old`'s children move onto `subtree`; a moved child whose
    /// connection already keys a child of the receiving node is merged into
    /// that child, recursively. `old` and every merged node are freed, and
    /// registered leaves naming them now name their survivors.
    ///
    /// Returns `(absorbed, survivor)` pairs, `(old, subtree)` first, so
    /// callers can re-point stored node references.
    pub fn replace(
        &mut self,
        old: RouteNodeId,
        subtree: RouteNodeId,
    ) -> Vec<(RouteNodeId, RouteNodeId)> {
        if old == subtree {
            return Vec::new();
        }
        let (parent, via) = {
            let node = self.node(old);
            (node.parent, node.via)
        };
        if let Some(p) = parent {
            let siblings = &mut self.node_mut(p).children;
            if let Some(slot) = siblings.iter_mut().find(|c| **c == old) {
                *slot = subtree;
            }
        }
        let old_leaves = self.node(old).leaves.clone();
        let old_children = std::mem::take(&mut self.node_mut(old).children);
        {
            let node = self.node_mut(subtree);
            node.parent = parent;
            node.via = via;
            node.leaves.extend(old_leaves.iter().copied());
        }
        let subtree_leaves = self.node(subtree).leaves.clone();
        for a in self.ancestors(subtree) {
            self.node_mut(a).leaves.extend(subtree_leaves.iter().copied());
        }

        let mut pairs = vec![(old, subtree)];
        for child in old_children {
            self.adopt(subtree, child, &mut pairs);
        }
        self.release(old);
        self.remap_leaves(subtree, &pairs);
        pairs
    }

    fn remap_leaves(&mut self, top: RouteNodeId, pairs: &[(RouteNodeId, RouteNodeId)]) {
        let mut ids: Vec<RouteNodeId> = self.iter(top).collect();
        ids.extend(self.ancestors(top));
        for id in ids {
            let leaves = &mut self.node_mut(id).leaves;
            for &(absorbed, survivor) in pairs {
                if leaves.remove(&absorbed) {
                    leaves.insert(survivor);
                }
            }
        }
    }

    fn adopt(
        &mut self,
        new_parent: RouteNodeId,
        child: RouteNodeId,
        pairs: &mut Vec<(RouteNodeId, RouteNodeId)>,
    ) {
        let via = self.node(child).via;
        match self.child_via(new_parent, via) {
            Some(existing) => {
                let grandchildren = std::mem::take(&mut self.node_mut(child).children);
                let leaves = std::mem::take(&mut self.node_mut(child).leaves);
                self.node_mut(existing).leaves.extend(leaves);
                pairs.push((child, existing));
                self.release(child);
                for g in grandchildren {
                    self.adopt(existing, g, pairs);
                }
            }
            None => {
                self.node_mut(child).parent = Some(new_parent);
                self.node_mut(new_parent).children.push(child);
            }
        }
    }

    /// Removes every branch below `root` that leads to no node in `keep`.
    ///
    /// `root` itself always survives. Registered leaves that no longer exist
    /// are dropped from the surviving nodes. Applying the same prune twice
    /// changes nothing.
    pub fn prune(&mut self, root: RouteNodeId, keep: &BTreeSet<RouteNodeId>) {
        self.prune_node(root, keep);
        let live: Vec<RouteNodeId> = self.iter(root).collect();
        for id in live {
            let stale: Vec<RouteNodeId> = self
                .node(id)
                .leaves
                .iter()
                .copied()
                .filter(|&l| !self.contains(l))
                .collect();
            let set = &mut self.node_mut(id).leaves;
            for leaf in stale {
                set.remove(&leaf);
            }
        }
    }

    fn prune_node(&mut self, id: RouteNodeId, keep: &BTreeSet<RouteNodeId>) -> bool {
        let children = self.children(id).to_vec();
        let mut reaches_keep = keep.contains(&id);
        for child in children {
            if self.prune_node(child, keep) {
                reaches_keep = true;
            } else {
                self.remove_subtree(child);
            }
        }
        reaches_keep
    }

    /// Detaches `id` and frees it together with all its descendants.
    pub fn remove_subtree(&mut self, id: RouteNodeId) {
        self.disconnect(id);
        let doomed: Vec<RouteNodeId> = self.iter(id).collect();
        for node in doomed {
            self.release(node);
        }
    }

    /// Registers `leaf` as a terminal on itself and every ancestor.
    pub fn register_leaf(&mut self, leaf: RouteNodeId) {
        let mut cur = Some(leaf);
        while let Some(id) = cur {
            let node = self.node_mut(id);
            node.leaves.insert(leaf);
            cur = node.parent;
        }
    }

    /// Clears the registered leaves of every node below `root`.
    pub fn unregister_leaves(&mut self, root: RouteNodeId) {
        let ids: Vec<RouteNodeId> = self.iter(root).collect();
        for id in ids {
            self.node_mut(id).leaves.clear();
        }
    }

    /// Depth-first, pre-order traversal of the tree rooted at `root`.
    ///
    /// Each call starts a fresh traversal.
    pub fn iter(&self, root: RouteNodeId) -> Iter<'_> {
        Iter {
            tree: self,
            stack: vec![root],
        }
    }

    /// Returns the wires of every node below `root`, in traversal order.
    pub fn wires(&self, root: RouteNodeId) -> Vec<WireId> {
        self.iter(root).map(|id| self.wire(id)).collect()
    }

    /// Copies the tree rooted at `root` into a new compact arena.
    ///
    /// The copy's root is node 0 and has no parent edge. Costs and
    /// registered leaves are preserved.
    pub fn extract(&self, root: RouteNodeId) -> RouteTree {
        let order: Vec<RouteNodeId> = self.iter(root).collect();
        let remap: BTreeMap<RouteNodeId, RouteNodeId> = order
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, RouteNodeId::from_raw(i as u32)))
            .collect();

        let nodes = order
            .iter()
            .map(|&id| {
                let src = self.node(id);
                let is_root = id == root;
                Some(RouteNode {
                    wire: src.wire,
                    parent: if is_root {
                        None
                    } else {
                        src.parent.and_then(|p| remap.get(&p).copied())
                    },
                    via: if is_root { None } else { src.via },
                    children: src
                        .children
                        .iter()
                        .filter_map(|c| remap.get(c).copied())
                        .collect(),
                    segment_cost: src.segment_cost,
                    congestion_cost: src.congestion_cost,
                    leaves: src
                        .leaves
                        .iter()
                        .filter_map(|l| remap.get(l).copied())
                        .collect(),
                })
            })
            .collect();

        RouteTree {
            nodes,
            free: Vec::new(),
        }
    }
}

/// Depth-first iterator over a route tree. See [`RouteTree::iter`].
pub struct Iter<'a> {
    tree: &'a RouteTree,
    stack: Vec<RouteNodeId>,
}

impl Iterator for Iter<'_> {
    type Item = RouteNodeId;

    fn next(&mut self) -> Option<RouteNodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(i: u32) -> WireId {
        WireId::from_raw(i)
    }

    fn pip(a: u32, b: u32) -> Connection {
        Connection::pip(w(a), w(b))
    }

    /// root(0) -> 1 -> 2, and 1 -> 3
    fn sample() -> (RouteTree, RouteNodeId, RouteNodeId, RouteNodeId, RouteNodeId) {
        let mut tree = RouteTree::new();
        let root = tree.add_root(w(0));
        let n1 = tree.connect(root, pip(0, 1));
        let n2 = tree.connect(n1, pip(1, 2));
        let n3 = tree.connect(n1, pip(1, 3));
        (tree, root, n1, n2, n3)
    }

    #[test]
    fn connect_reuses_child_for_same_connection() {
        let mut tree = RouteTree::new();
        let root = tree.add_root(w(0));
        let a = tree.connect(root, pip(0, 1));
        let b = tree.connect(root, pip(0, 1));
        assert_eq!(a, b);
        assert_eq!(tree.children(root).len(), 1);

        let c = tree.connect(root, Connection::direct(w(0), w(1)));
        assert_ne!(a, c);
        assert_eq!(tree.children(root).len(), 2);
    }

    #[test]
    fn iter_is_preorder_and_restartable() {
        let (tree, root, n1, n2, n3) = sample();
        let first: Vec<_> = tree.iter(root).collect();
        assert_eq!(first, vec![root, n1, n2, n3]);
        let second: Vec<_> = tree.iter(root).collect();
        assert_eq!(first, second);
        assert_eq!(tree.wires(root), vec![w(0), w(1), w(2), w(3)]);
    }

    #[test]
    fn register_and_unregister_leaves() {
        let (mut tree, root, n1, n2, n3) = sample();
        tree.register_leaf(n2);
        tree.register_leaf(n3);
        assert_eq!(tree.leaves(root).len(), 2);
        assert_eq!(tree.leaves(n1).len(), 2);
        assert!(tree.leaves(n2).contains(&n2));
        assert!(!tree.leaves(n2).contains(&n3));

        tree.unregister_leaves(root);
        assert!(tree.leaves(root).is_empty());
        assert!(tree.leaves(n2).is_empty());
    }

    #[test]
    fn disconnect_produces_free_standing_subtree() {
        let (mut tree, root, n1, n2, _n3) = sample();
        tree.register_leaf(n2);
        tree.disconnect(n1);
        assert_eq!(tree.parent(n1), None);
        assert!(tree.node(n1).via.is_none());
        assert!(tree.children(root).is_empty());
        assert!(tree.leaves(root).is_empty());
        assert!(tree.leaves(n1).contains(&n2));
    }

    #[test]
    fn prune_is_idempotent() {
        let (mut tree, root, n1, n2, n3) = sample();
        let keep: BTreeSet<_> = [n2].into_iter().collect();
        tree.prune(root, &keep);
        assert!(!tree.contains(n3));
        assert_eq!(tree.iter(root).collect::<Vec<_>>(), vec![root, n1, n2]);

        let before = tree.wires(root);
        tree.prune(root, &keep);
        assert_eq!(tree.wires(root), before);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn prune_with_empty_keep_leaves_only_root() {
        let (mut tree, root, _, _, _) = sample();
        tree.prune(root, &BTreeSet::new());
        assert_eq!(tree.len(), 1);
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn replace_relocates_children_and_merges_duplicates() {
        let (mut tree, root, n1, n2, n3) = sample();
        // Free-standing sink subtree 1 -> 2 -> 4 that will take n1's place.
        let sub = tree.add_root(w(1));
        let s2 = tree.connect(sub, pip(1, 2));
        let s4 = tree.connect(s2, pip(2, 4));
        tree.register_leaf(n3);

        let pairs = tree.replace(n1, sub);
        assert_eq!(pairs[0], (n1, sub));
        assert!(pairs.contains(&(n2, s2)));
        assert!(!tree.contains(n1));
        assert!(!tree.contains(n2));

        assert_eq!(tree.parent(sub), Some(root));
        assert_eq!(tree.node(sub).via, Some(pip(0, 1)));
        assert_eq!(tree.children(root), &[sub]);
        // n3 moved under sub, s2 kept, no duplicate child for 1 -> 2.
        assert_eq!(tree.children(sub), &[s2, n3]);
        assert_eq!(tree.children(s2), &[s4]);
        assert!(tree.leaves(sub).contains(&n3));
        assert!(tree.leaves(root).contains(&n3));
    }

    #[test]
    fn replace_renames_absorbed_leaves() {
        let (mut tree, root, n1, n2, n3) = sample();
        tree.register_leaf(n2);
        tree.register_leaf(n3);
        let sub = tree.add_root(w(1));
        let s2 = tree.connect(sub, pip(1, 2));

        tree.replace(n1, sub);
        for id in [root, sub, s2] {
            assert!(!tree.leaves(id).contains(&n1));
            assert!(!tree.leaves(id).contains(&n2));
        }
        assert_eq!(tree.leaves(root), &BTreeSet::from([s2, n3]));
        assert_eq!(tree.leaves(sub), &BTreeSet::from([s2, n3]));
        assert_eq!(tree.leaves(s2), &BTreeSet::from([s2]));

        // A freed slot comes back as a node nobody lists as a leaf.
        let fresh = tree.connect(s2, pip(2, 7));
        assert!([n1, n2].contains(&fresh));
        assert!(tree.leaves(fresh).is_empty());
        assert!(!tree.leaves(root).contains(&fresh));
    }

    #[test]
    fn replace_parentless_root() {
        let mut tree = RouteTree::new();
        let root = tree.add_root(w(0));
        let child = tree.connect(root, pip(0, 5));
        let sub = tree.add_root(w(0));
        tree.replace(root, sub);
        assert_eq!(tree.parent(sub), None);
        assert_eq!(tree.children(sub), &[child]);
        assert_eq!(tree.parent(child), Some(sub));
    }

    #[test]
    fn connect_subtree_splices_and_propagates_leaves() {
        let mut tree = RouteTree::new();
        let root = tree.add_root(w(0));
        let sub = tree.add_root(w(1));
        let leaf = tree.connect(sub, pip(1, 2));
        tree.register_leaf(leaf);

        let pairs = tree.connect_subtree(root, pip(0, 1), sub);
        assert!(pairs.is_empty());
        assert_eq!(tree.parent(sub), Some(root));
        assert!(tree.leaves(root).contains(&leaf));
    }

    #[test]
    fn freed_slots_are_reused() {
        let (mut tree, root, _n1, _n2, n3) = sample();
        tree.remove_subtree(n3);
        let again = tree.connect(root, pip(0, 9));
        assert_eq!(again, n3);
    }

    #[test]
    fn extract_makes_compact_copy() {
        let (mut tree, _root, n1, n2, n3) = sample();
        tree.set_costs(n2, 1.0, 2.5);
        tree.register_leaf(n2);
        tree.register_leaf(n3);

        let copy = tree.extract(n1);
        assert_eq!(copy.len(), 3);
        let root = copy.root().unwrap();
        assert_eq!(root.as_raw(), 0);
        assert!(copy.node(root).via.is_none());
        assert_eq!(copy.wires(root), vec![w(1), w(2), w(3)]);
        assert_eq!(copy.leaves(root).len(), 2);
        let copied_n2 = copy.children(root)[0];
        assert_eq!(copy.node(copied_n2).cost(), 3.5);
    }

    #[test]
    fn serde_roundtrip() {
        let (tree, root, ..) = sample();
        let json = serde_json::to_string(&tree).unwrap();
        let back: RouteTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.wires(root), tree.wires(root));
    }
}
