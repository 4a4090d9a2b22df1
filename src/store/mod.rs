//! Graph Store: parent edges and per-node metadata over opaque string ids.

pub mod graph;
pub mod statements;
pub mod tsv;
pub mod types;

pub use graph::GraphStore;
pub use types::{Flag, NodeData, Rank, Statement, Subsumption};
