//! parameters.rs
//! The parameter store: an immutable name -> value mapping replaced wholesale.

use super::types::Value;
use crate::compute::strategy::StrategyError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterStore {
    data: BTreeMap<String, Value>,
}

impl ParameterStore {
    pub fn new() -> Self { Self::default() }

    /// Builder-style insertion, used while assembling a store before it is installed.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn get(&self, name: &str) -> Option<&Value> { self.data.get(name) }
    pub fn contains(&self, name: &str) -> bool { self.data.contains_key(name) }
    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.data.keys().map(String::as_str) }

    /// Reads a scalar parameter, failing with a strategy-level error so
    /// formulas can simply use `?`.
    pub fn scalar(&self, name: &str) -> Result<f64, StrategyError> {
        let value = self.get(name).ok_or_else(|| StrategyError::MissingInput { name: name.to_string() })?;
        value.as_scalar().ok_or_else(|| StrategyError::InvalidInput {
            name: name.to_string(),
            reason: "expected a scalar".to_string(),
        })
    }

    /// Names present in `self` whose value is new or differs from `previous`.
    /// Names only present in `previous` are not reported.
    pub fn changed_since(&self, previous: &ParameterStore) -> BTreeSet<String> {
        self.data
            .iter()
            .filter(|(name, value)| !previous.data.get(name.as_str()).is_some_and(|old| old.same_as(value)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
