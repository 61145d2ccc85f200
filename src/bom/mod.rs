//! Bill of materials
//!
//! Temporal, level-bounded read access over parent/child links.

mod traversal;

pub use traversal::{
    distinct_nodes, last_level, BomEntry, BomTraversal, TraversalDirection, TraversalOptions,
};
