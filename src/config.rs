//! Engine configuration, constructed by the caller and passed in explicitly.

use crate::compute::ledger::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a recompute pass reacts to a failing node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the pass on the first failure; nothing is published.
    #[default]
    FailFast,
    /// Log the failure, leave the failing node and its dependents out of the
    /// new snapshot and publish everything else.
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of baseline slots available to `save_current_results`.
    pub baseline_slots: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { baseline_slots: 3, failure_policy: FailurePolicy::FailFast }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Configuration(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.baseline_slots == 0 {
            return Err(EngineError::Configuration("baseline_slots must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
