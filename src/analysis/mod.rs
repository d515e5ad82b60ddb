//! Structural analysis of the calculation graph.
pub mod topology;

pub use topology::{check_for_cycles, DependencyIndex, ForwardMap};
