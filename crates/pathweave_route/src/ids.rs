//! Opaque ID newtypes for routing entities.
//!
//! [`CellId`], [`NetId`] and [`PinId`] are arena indices into the
//! [`RouteNetlist`](crate::data::RouteNetlist). [`RequestId`] identifies a
//! routing request for the lifetime of a run, and [`RouteNodeId`] indexes a
//! node inside a [`RouteTree`](crate::route_tree::RouteTree) arena.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a cell in the netlist.
    CellId
);

define_id!(
    /// Opaque, copyable ID for a net in the netlist.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a pin in the netlist.
    PinId
);

define_id!(
    /// Stable identity of a routing request within one run.
    RequestId
);

define_id!(
    /// Index of a node inside a route-tree arena.
    RouteNodeId
);
