use crate::compute::strategy::{DependencyList, Strategy};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named vertex of the calculation graph.
///
/// A node without a strategy is a leaf: its value is the parameter of the same
/// name. Nodes are created dirty so that their first pass always computes them.
#[derive(Clone)]
pub struct Node {
    name: String,
    strategy: Option<Arc<dyn Strategy>>,
    dependencies: DependencyList,
    dirty: bool,
}

impl Node {
    pub fn new(name: impl Into<String>, strategy: Option<Arc<dyn Strategy>>) -> Self {
        let dependencies = strategy.as_ref().map(|s| s.dependencies()).unwrap_or_default();
        Self { name: name.into(), strategy, dependencies, dirty: true }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn strategy(&self) -> Option<&Arc<dyn Strategy>> { self.strategy.as_ref() }
    pub fn is_leaf(&self) -> bool { self.strategy.is_none() }
    pub fn is_dirty(&self) -> bool { self.dirty }

    /// The dependency list captured when the strategy was bound. Later calls
    /// to `Strategy::dependencies` are never consulted.
    pub fn dependencies(&self) -> &[String] { &self.dependencies }

    /// Replaces the bound strategy and forces recomputation. `dependencies` is
    /// the list the caller validated for this strategy. The caller is also
    /// responsible for evicting the cached value from the current snapshot.
    pub(crate) fn set_strategy(&mut self, strategy: Option<Arc<dyn Strategy>>, dependencies: DependencyList) {
        self.strategy = strategy;
        self.dependencies = dependencies;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) { self.dirty = true; }

    pub(crate) fn mark_clean(&mut self) { self.dirty = false; }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Name-keyed node table. Names are unique by construction; iteration is in
/// name order so passes and exports are deterministic.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.nodes.len() }
    pub fn contains(&self, name: &str) -> bool { self.nodes.contains_key(name) }
    pub fn get(&self, name: &str) -> Option<&Node> { self.nodes.get(name) }
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> { self.nodes.get_mut(name) }
    pub fn names(&self) -> impl Iterator<Item = &str> { self.nodes.keys().map(String::as_str) }
    pub fn iter(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }

    /// Returns the node for `name`, creating a dirty leaf if it does not exist.
    /// The flag reports whether a node was created.
    pub fn get_or_create(&mut self, name: &str) -> (&mut Node, bool) {
        let created = !self.nodes.contains_key(name);
        let node = self
            .nodes
            .entry(name.to_string())
            .or_insert_with(|| Node::new(name, None));
        (node, created)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> { self.nodes.remove(name) }

    /// Forward dependency map of the whole graph, leaves mapping to nothing.
    pub fn forward_map(&self) -> BTreeMap<String, DependencyList> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.dependencies.clone()))
            .collect()
    }
}
