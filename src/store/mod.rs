//! Data held by the engine: parameter values, result envelopes and the node table.
pub mod parameters;
pub mod registry;
pub mod types;

pub use parameters::ParameterStore;
pub use registry::{Node, NodeRegistry};
pub use types::{ResultEnvelope, Value};
