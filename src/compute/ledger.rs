//! ledger.rs
//! Generation-tagged result snapshots and the engine's error type.

use crate::store::ResultEnvelope;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use self::error::{EngineError, Result};
mod error {
    use crate::compute::strategy::StrategyError;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum EngineError {
        #[error("Cyclic dependency detected involving '{node}'")]
        Structural { node: String },
        #[error("Parameter '{name}' is not present in the installed parameter store")]
        MissingParameter { name: String },
        #[error("Dependency '{dependency}' of node '{node}' is neither a node nor a parameter")]
        MissingDependency { node: String, dependency: String },
        #[error("Strategy for node '{node}' failed: {source}")]
        StrategyComputation {
            node: String,
            #[source]
            source: StrategyError,
        },
        #[error("Configuration error: {0}")]
        Configuration(String),
        #[error("Dependency tree export failed: {0}")]
        Export(String),
    }

    impl EngineError {
        /// The node the error is attributed to, if any.
        pub fn node(&self) -> Option<&str> {
            match self {
                EngineError::Structural { node }
                | EngineError::MissingDependency { node, .. }
                | EngineError::StrategyComputation { node, .. } => Some(node.as_str()),
                EngineError::MissingParameter { name } => Some(name.as_str()),
                EngineError::Configuration(_) | EngineError::Export(_) => None,
            }
        }
    }

    pub type Result<T> = std::result::Result<T, EngineError>;
}

/// One generation of computed results.
///
/// Entries are shared `Arc`s: cloning a snapshot (to archive it, to save a
/// baseline, or to seed the next pass) copies pointers, and a pass only
/// allocates for the entries it actually recomputes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    generation: u64,
    results: BTreeMap<String, Arc<ResultEnvelope>>,
}

impl Snapshot {
    /// An empty snapshot. Generation 0 is never produced by a pass.
    pub fn new() -> Self { Self::default() }

    pub(crate) fn next_generation(&self, generation: u64) -> Self {
        Self { generation, results: self.results.clone() }
    }

    pub fn generation(&self) -> u64 { self.generation }
    pub fn len(&self) -> usize { self.results.len() }
    pub fn is_empty(&self) -> bool { self.results.is_empty() }
    pub fn contains(&self, name: &str) -> bool { self.results.contains_key(name) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.results.keys().map(String::as_str) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ResultEnvelope>)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<ResultEnvelope>> { self.results.get(name) }

    pub fn scalar(&self, name: &str) -> Option<f64> { self.get(name)?.as_scalar() }

    pub(crate) fn insert(&mut self, name: &str, value: Arc<ResultEnvelope>) {
        self.results.insert(name.to_string(), value);
    }

    pub(crate) fn invalidate<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.results.remove(name);
        }
    }
}
