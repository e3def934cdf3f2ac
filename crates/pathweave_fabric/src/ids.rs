//! Opaque ID newtypes for fabric entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`. IDs are dense indices into the owning
//! [`FabricGraph`](crate::FabricGraph), so ordering by ID is creation order.

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
    /// Opaque, copyable ID for a routing wire.
    WireId
);

define_id!(
    /// Opaque, copyable ID for a tile in the device grid.
    TileId
);

define_id!(
    /// Opaque, copyable ID for a site (placement location) within a tile.
    SiteId
);

define_id!(
    /// Opaque, copyable ID for a BEL (basic element of logic) within a site.
    BelId
);

define_id!(
    /// Opaque, copyable ID for a configurable multiplexer inside a site.
    MuxId
);

define_id!(
    /// Opaque, copyable ID for a group of electrically equivalent wires.
    NodeId
);
