//! Graph services
//!
//! The `Graph` handle and the queries that run against it.

pub mod graph;
pub mod search;

pub use graph::{Graph, SaveReport};
pub use search::{GraphSummary, NodeQuery};
