//! A synchronous, single-threaded incremental calculation engine.
//!
//! The engine owns the node table, the dependency index, the installed
//! parameter store and the result snapshots. Structural mutations are
//! validated before they are committed; recompute passes write into a working
//! snapshot that is only published once the pass completes.

use crate::analysis::{check_for_cycles, DependencyIndex};
use crate::compute::baseline::Baselines;
use crate::compute::ledger::{EngineError, Result, Snapshot};
use crate::compute::strategy::{Dependencies, Strategy, StrategyError};
use crate::config::{EngineConfig, FailurePolicy};
use crate::display::DependencyTree;
use crate::store::{NodeRegistry, ParameterStore, ResultEnvelope};
use crate::strategies::StrategyRegistry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one recompute pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Generation of the snapshot the pass published, or `None` if no pass ran.
    pub generation: Option<u64>,
    /// Nodes evaluated during the pass, in evaluation order.
    pub recomputed: Vec<String>,
    /// Failures tolerated under `FailurePolicy::BestEffort`.
    pub failures: Vec<(String, EngineError)>,
}

impl PassReport {
    pub fn ran(&self) -> bool { self.generation.is_some() }
    pub fn was_recomputed(&self, name: &str) -> bool { self.recomputed.iter().any(|n| n == name) }
}

/// Per-pass bookkeeping: which nodes already hold a fresh value in the
/// working snapshot, and which have failed.
#[derive(Default)]
struct Pass {
    fresh: HashSet<String>,
    failed: HashMap<String, EngineError>,
    order: Vec<String>,
}

pub struct Engine {
    config: EngineConfig,
    nodes: NodeRegistry,
    index: DependencyIndex,
    parameters: Option<ParameterStore>,
    current: Snapshot,
    old: Option<Snapshot>,
    baselines: Baselines,
    generation: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::from_valid_config(EngineConfig::default())
    }
}

impl Engine {
    /// Builds an empty engine, rejecting an invalid configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: EngineConfig) -> Self {
        let baselines = Baselines::new(config.baseline_slots);
        Self {
            config,
            nodes: NodeRegistry::new(),
            index: DependencyIndex::default(),
            parameters: None,
            current: Snapshot::new(),
            old: None,
            baselines,
            generation: 0,
        }
    }

    /// Builds an engine and registers every strategy of `registry`.
    pub fn with_registry(config: EngineConfig, registry: &StrategyRegistry) -> Result<Self> {
        let mut engine = Self::new(config)?;
        for (name, strategy) in registry.iter() {
            engine.register_or_update_node(name, Some(strategy.clone()))?;
        }
        Ok(engine)
    }

    // --- Structure ---

    /// Adds a node or replaces its strategy (`None` turns it into a leaf).
    ///
    /// The prospective graph is checked for cycles first; on failure nothing
    /// is changed. On success, undeclared dependency names become leaf nodes,
    /// the node's cached value is evicted from the current snapshot and the
    /// node is marked dirty.
    pub fn register_or_update_node(&mut self, name: &str, strategy: Option<Arc<dyn Strategy>>) -> Result<()> {
        let deps = strategy.as_ref().map(|s| s.dependencies()).unwrap_or_default();

        let mut prospective = self.index.forward().clone();
        for dep in &deps {
            prospective.entry(dep.clone()).or_default();
        }
        prospective.insert(name.to_string(), deps.clone());
        check_for_cycles(&prospective)?;

        let (node, created) = self.nodes.get_or_create(name);
        node.set_strategy(strategy, deps.clone());
        debug!(node = name, created, dependencies = deps.len(), "registered node");

        for dep in &deps {
            if self.nodes.get_or_create(dep).1 {
                debug!(node = dep.as_str(), dependent = name, "materialized leaf node");
            }
        }

        self.current.invalidate([name]);
        self.rebuild_index();
        Ok(())
    }

    /// Convenience for `register_or_update_node(name, None)`.
    pub fn register_leaf(&mut self, name: &str) -> Result<()> {
        self.register_or_update_node(name, None)
    }

    /// Removes a node. Nodes that still depend on it are marked dirty; on their
    /// next evaluation the name resolves through the parameter store, or fails
    /// with `MissingDependency`.
    pub fn delete_node(&mut self, name: &str) -> Result<()> {
        if !self.nodes.contains(name) {
            return Err(EngineError::Configuration(format!("cannot delete unknown node '{name}'")));
        }

        let mut prospective = self.index.forward().clone();
        prospective.remove(name);
        check_for_cycles(&prospective)?;

        let dependents: Vec<String> = self.index.affected_by(name).map(str::to_string).collect();
        self.nodes.remove(name);
        for dependent in &dependents {
            if let Some(node) = self.nodes.get_mut(dependent) {
                node.mark_dirty();
            }
        }
        self.current.invalidate([name]);
        self.rebuild_index();
        debug!(node = name, dependents = dependents.len(), "deleted node");
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.index = DependencyIndex::build(self.nodes.forward_map());
        debug!(nodes = self.nodes.count(), "rebuilt dependency index");
    }

    // --- Parameters & recomputation ---

    /// Installs a complete parameter store and recomputes what it affects.
    ///
    /// The first call recomputes every node. Later calls recompute the nodes
    /// transitively affected by changed parameter names, plus any dirty node
    /// and its dependents. If nothing changed and nothing is dirty, the store
    /// is swapped and no pass runs.
    pub fn update_parameters(&mut self, new_store: ParameterStore) -> Result<PassReport> {
        let mut seeds: BTreeSet<String> = match &self.parameters {
            None => self.nodes.names().map(str::to_string).collect(),
            Some(old) => {
                let changed = new_store.changed_since(old);
                debug!(changed = changed.len(), "diffed parameter store");
                let mut seeds: BTreeSet<String> =
                    changed.iter().flat_map(|n| self.index.affected_by(n)).map(str::to_string).collect();
                seeds.extend(
                    changed.into_iter().filter(|n| self.nodes.get(n).is_some_and(|node| node.is_leaf())),
                );
                seeds
            }
        };
        seeds.extend(self.dirty_nodes());
        let previous = self.parameters.replace(new_store);

        if seeds.is_empty() {
            debug!("parameter update changed nothing, no pass");
            return Ok(PassReport::default());
        }

        match self.run_pass(seeds) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.parameters = previous;
                Err(e)
            }
        }
    }

    /// Recomputes dirty nodes (new or hot-swapped) and everything depending
    /// on them, plus any node that has no cached value, using the installed
    /// parameters.
    pub fn run_calculations(&mut self) -> Result<PassReport> {
        if self.parameters.is_none() {
            return Err(EngineError::Configuration("no parameters installed".into()));
        }
        let mut seeds: BTreeSet<String> = self.dirty_nodes().collect();
        seeds.extend(self.nodes.names().filter(|n| !self.current.contains(n)).map(str::to_string));
        if seeds.is_empty() {
            return Ok(PassReport::default());
        }
        self.run_pass(seeds)
    }

    fn dirty_nodes(&self) -> impl Iterator<Item = String> + '_ {
        self.nodes.iter().filter(|n| n.is_dirty()).map(|n| n.name().to_string())
    }

    fn run_pass(&mut self, seeds: BTreeSet<String>) -> Result<PassReport> {
        let parameters = self
            .parameters
            .as_ref()
            .ok_or_else(|| EngineError::Configuration("no parameters installed".into()))?;

        let mut affected: BTreeSet<String> =
            seeds.iter().flat_map(|s| self.index.affected_by(s)).map(str::to_string).collect();
        affected.extend(seeds);
        affected.retain(|n| self.nodes.contains(n));

        for name in &affected {
            if let Some(node) = self.nodes.get_mut(name) {
                node.mark_dirty();
            }
        }

        let generation = self.generation + 1;
        let mut working = self.current.next_generation(generation);
        working.invalidate(affected.iter().map(String::as_str));
        debug!(generation, affected = affected.len(), "starting recompute pass");

        let mut pass = Pass::default();
        let mut failures = Vec::new();
        for name in &affected {
            if let Err(e) = self.calculate(name, parameters, &mut working, &mut pass) {
                match self.config.failure_policy {
                    FailurePolicy::FailFast => {
                        debug!(generation, node = name.as_str(), error = %e, "pass aborted");
                        return Err(e);
                    }
                    FailurePolicy::BestEffort => {
                        warn!(node = name.as_str(), error = %e, "node failed, continuing pass");
                        failures.push((name.clone(), e));
                    }
                }
            }
        }

        for name in &pass.fresh {
            if let Some(node) = self.nodes.get_mut(name) {
                node.mark_clean();
            }
        }

        let outgoing = std::mem::replace(&mut self.current, working);
        if !outgoing.is_empty() {
            self.old = Some(outgoing);
        }
        self.generation = generation;
        debug!(generation, recomputed = pass.order.len(), failed = failures.len(), "published snapshot");

        Ok(PassReport { generation: Some(generation), recomputed: pass.order, failures })
    }

    /// Evaluates one node into `working`, resolving dirty dependencies first.
    /// A clean node, or one already computed in this pass, returns its cached value.
    fn calculate(
        &self,
        name: &str,
        parameters: &ParameterStore,
        working: &mut Snapshot,
        pass: &mut Pass,
    ) -> Result<Arc<ResultEnvelope>> {
        if let Some(err) = pass.failed.get(name) {
            return Err(err.clone());
        }
        let Some(node) = self.nodes.get(name) else {
            return Err(EngineError::Configuration(format!("unknown node '{name}'")));
        };
        if !node.is_dirty() || pass.fresh.contains(name) {
            if let Some(cached) = working.get(name) {
                return Ok(cached.clone());
            }
        }

        let result = self.evaluate(name, parameters, working, pass);
        match result {
            Ok(envelope) => {
                let envelope = Arc::new(envelope);
                working.insert(name, envelope.clone());
                pass.fresh.insert(name.to_string());
                pass.order.push(name.to_string());
                Ok(envelope)
            }
            Err(e) => {
                pass.failed.insert(name.to_string(), e.clone());
                Err(e)
            }
        }
    }

    fn evaluate(
        &self,
        name: &str,
        parameters: &ParameterStore,
        working: &mut Snapshot,
        pass: &mut Pass,
    ) -> Result<ResultEnvelope> {
        let Some(strategy) = self.nodes.get(name).and_then(|n| n.strategy()) else {
            let value = parameters
                .get(name)
                .ok_or_else(|| EngineError::MissingParameter { name: name.to_string() })?;
            return Ok(ResultEnvelope::from_parameter(name, value.clone()));
        };

        // Only edges recorded in the index were checked for cycles.
        let mut resolved = Dependencies::new();
        for dep in self.index.dependencies_of(name) {
            let value = if self.nodes.contains(dep) {
                self.calculate(dep, parameters, working, pass)?
            } else if let Some(raw) = parameters.get(dep) {
                Arc::new(ResultEnvelope::from_parameter(dep, raw.clone()))
            } else {
                return Err(EngineError::MissingDependency { node: name.to_string(), dependency: dep.clone() });
            };
            resolved.insert(dep.as_str(), value);
        }

        let envelope = strategy
            .calculate(&resolved, parameters)
            .map_err(|source| EngineError::StrategyComputation { node: name.to_string(), source })?;
        if let Some(defect) = envelope.shape_error() {
            return Err(EngineError::StrategyComputation {
                node: name.to_string(),
                source: StrategyError::InvalidInput {
                    name: name.to_string(),
                    reason: format!("malformed result envelope: {defect}"),
                },
            });
        }
        Ok(envelope)
    }

    // --- Snapshots ---

    pub fn get_current_results(&self) -> &Snapshot { &self.current }
    pub fn get_old_results(&self) -> Option<&Snapshot> { self.old.as_ref() }

    pub fn save_current_results(&mut self, index: usize) -> Result<()> {
        self.baselines.save(index, &self.current)?;
        info!(slot = index, generation = self.current.generation(), "saved baseline");
        Ok(())
    }

    pub fn saved_results(&self, index: usize) -> Option<&Snapshot> { self.baselines.get(index) }

    /// Resets every baseline slot to an empty snapshot.
    pub fn clear_calculation_results(&mut self) {
        self.baselines.clear_all();
        info!(slots = self.baselines.len(), "cleared baselines");
    }

    // --- Inspection & export ---

    pub fn build_dependency_tree(&self, path: Option<&Path>) -> Result<DependencyTree> {
        let tree = DependencyTree::build(&self.index);
        if let Some(path) = path {
            tree.write_json(path)?;
            debug!(path = %path.display(), "exported dependency tree");
        }
        Ok(tree)
    }

    pub fn trace(&self, name: &str) -> String {
        crate::display::format_trace(&self.index, &self.current, name)
    }

    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn parameters(&self) -> Option<&ParameterStore> { self.parameters.as_ref() }
    pub fn dependency_index(&self) -> &DependencyIndex { &self.index }
    pub fn generation(&self) -> u64 { self.generation }
    pub fn node_count(&self) -> usize { self.nodes.count() }
    pub fn node_names(&self) -> impl Iterator<Item = &str> { self.nodes.names() }
    pub fn contains_node(&self, name: &str) -> bool { self.nodes.contains(name) }
    pub fn is_dirty(&self, name: &str) -> Option<bool> { self.nodes.get(name).map(|n| n.is_dirty()) }
    pub fn dependents_of(&self, name: &str) -> Vec<&str> { self.index.affected_by(name).collect() }
}
