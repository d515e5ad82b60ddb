//! strategy.rs
//! The plug-in contract for node computations.

use crate::store::{ParameterStore, ResultEnvelope};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Declared dependency names. Most formulas read a handful of inputs, so these
/// stay inline.
pub type DependencyList = SmallVec<[String; 4]>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("input '{name}' is missing")]
    MissingInput { name: String },
    #[error("input '{name}' is invalid: {reason}")]
    InvalidInput { name: String, reason: String },
    #[error("numeric error: {0}")]
    Numeric(String),
}

/// A pure computation bound to a node.
///
/// `calculate` must depend only on the names returned by `dependencies` (read
/// either from the resolved map or from the parameter store). The engine's
/// selective recompute relies on that list being exhaustive and static.
pub trait Strategy: Send + Sync {
    fn dependencies(&self) -> DependencyList;

    fn calculate(
        &self,
        dependencies: &Dependencies,
        parameters: &ParameterStore,
    ) -> Result<ResultEnvelope, StrategyError>;

    /// Human-readable identifier used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Resolved values of a strategy's declared dependencies, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    values: BTreeMap<String, Arc<ResultEnvelope>>,
}

impl Dependencies {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, value: Arc<ResultEnvelope>) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn get(&self, name: &str) -> Result<&ResultEnvelope, StrategyError> {
        self.values
            .get(name)
            .map(|v| v.as_ref())
            .ok_or_else(|| StrategyError::MissingInput { name: name.to_string() })
    }

    pub fn scalar(&self, name: &str) -> Result<f64, StrategyError> {
        self.get(name)?.as_scalar().ok_or_else(|| StrategyError::InvalidInput {
            name: name.to_string(),
            reason: "expected a scalar".to_string(),
        })
    }

    pub fn series(&self, name: &str) -> Result<&[f64], StrategyError> {
        self.get(name)?.as_series().ok_or_else(|| StrategyError::InvalidInput {
            name: name.to_string(),
            reason: "expected a series".to_string(),
        })
    }

    /// Column `index` of a table-valued dependency (column 0 is the index column).
    pub fn column(&self, name: &str, index: usize) -> Result<&[f64], StrategyError> {
        let table = self.get(name)?.data.as_table().ok_or_else(|| StrategyError::InvalidInput {
            name: name.to_string(),
            reason: "expected a table".to_string(),
        })?;
        table.get(index).map(Vec::as_slice).ok_or_else(|| StrategyError::InvalidInput {
            name: name.to_string(),
            reason: format!("table has no column {index}"),
        })
    }
}

type CalcFn = dyn Fn(&Dependencies, &ParameterStore) -> Result<ResultEnvelope, StrategyError> + Send + Sync;

/// A strategy backed by a closure, for ad hoc nodes.
pub struct FnStrategy {
    dependencies: DependencyList,
    func: Box<CalcFn>,
}

impl FnStrategy {
    pub fn new<I, S, F>(dependencies: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Dependencies, &ParameterStore) -> Result<ResultEnvelope, StrategyError> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            func: Box::new(func),
        }
    }
}

impl Strategy for FnStrategy {
    fn dependencies(&self) -> DependencyList { self.dependencies.clone() }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        (self.func)(dependencies, parameters)
    }

    fn name(&self) -> &str { "FnStrategy" }
}
