//! Read-only views of the graph for export and inspection.
pub mod tree;

pub use tree::{format_trace, DependencyTree};
