use crate::compute::ledger::{EngineError, Result};
use crate::compute::strategy::DependencyList;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Node name -> declared dependency names. Leaves map to an empty list.
pub type ForwardMap = BTreeMap<String, DependencyList>;

/// Forward and inverse views of the dependency graph.
///
/// The inverse side is transitive: for every name that appears as a
/// dependency anywhere (node or bare parameter), it holds every node whose
/// value may change when that name changes.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    forward: ForwardMap,
    inverse: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    pub fn build(forward: ForwardMap) -> Self {
        let inverse = {
            let mut direct: HashMap<&str, Vec<&str>> = HashMap::new();
            for (node, deps) in &forward {
                for dep in deps {
                    direct.entry(dep.as_str()).or_default().push(node.as_str());
                }
            }
            direct
                .keys()
                .map(|&name| (name.to_string(), downstream_from(&direct, name)))
                .collect()
        };

        Self { forward, inverse }
    }

    pub fn forward(&self) -> &ForwardMap { &self.forward }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.forward.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Every node transitively depending on `name` (not including `name` itself).
    pub fn affected_by(&self, name: &str) -> impl Iterator<Item = &str> {
        self.inverse.get(name).into_iter().flatten().map(String::as_str)
    }

    /// Nodes that no other node lists as a dependency.
    pub fn head_nodes(&self) -> Vec<&str> {
        self.forward
            .keys()
            .filter(|name| !self.inverse.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

fn downstream_from(direct: &HashMap<&str, Vec<&str>>, start: &str) -> BTreeSet<String> {
    let mut affected = BTreeSet::new();
    let mut queue: VecDeque<&str> = direct.get(start).into_iter().flatten().copied().collect();

    while let Some(node) = queue.pop_front() {
        if affected.insert(node.to_string()) {
            queue.extend(direct.get(node).into_iter().flatten().copied());
        }
    }
    affected
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Depth-first cycle check over every node of `forward`.
///
/// Names without a forward entry are leaves and terminate the walk. Reaching
/// a node that is still on the current path is reported as a structural error
/// naming that node.
pub fn check_for_cycles(forward: &ForwardMap) -> Result<()> {
    let mut state: HashMap<&str, VisitState> = HashMap::with_capacity(forward.len());
    for name in forward.keys() {
        if !state.contains_key(name.as_str()) {
            visit(name, forward, &mut state)?;
        }
    }
    Ok(())
}

fn visit<'a>(name: &'a str, forward: &'a ForwardMap, state: &mut HashMap<&'a str, VisitState>) -> Result<()> {
    match state.get(name) {
        Some(VisitState::Visited) => return Ok(()),
        Some(VisitState::Visiting) => return Err(EngineError::Structural { node: name.to_string() }),
        None => {
            state.insert(name, VisitState::Visiting);
        }
    }

    if let Some(deps) = forward.get(name) {
        for dep in deps {
            visit(dep, forward, state)?;
        }
    }

    state.insert(name, VisitState::Visited);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> ForwardMap {
        edges
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_inverse_index_is_transitive() {
        // rho -> R -> D -> Z, and E independent
        let idx = DependencyIndex::build(graph(&[
            ("R", &["rho"]),
            ("D", &["R"]),
            ("Z", &["D", "k"]),
            ("E", &["k"]),
        ]));

        let from_rho: Vec<_> = idx.affected_by("rho").collect();
        assert_eq!(from_rho, vec!["D", "R", "Z"]);
        let from_k: Vec<_> = idx.affected_by("k").collect();
        assert_eq!(from_k, vec!["E", "Z"]);
        assert_eq!(idx.affected_by("Z").count(), 0);
        assert_eq!(idx.dependencies_of("Z"), ["D".to_string(), "k".to_string()]);
    }

    #[test]
    fn test_head_nodes() {
        let idx = DependencyIndex::build(graph(&[("R", &["rho"]), ("D", &["R"]), ("rho", &[]), ("E", &[])]));
        assert_eq!(idx.head_nodes(), vec!["D", "E"]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let fwd = graph(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B", "C"])]);
        assert!(check_for_cycles(&fwd).is_ok());
    }

    #[test]
    fn test_cycle_detection_names_a_member() {
        let fwd = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"]), ("X", &["A"])]);
        match check_for_cycles(&fwd).unwrap_err() {
            EngineError::Structural { node } => assert!(["A", "B", "C"].contains(&node.as_str())),
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let fwd = graph(&[("A", &["A"])]);
        assert_eq!(check_for_cycles(&fwd).unwrap_err(), EngineError::Structural { node: "A".into() });
    }

    #[test]
    fn test_inverse_build_terminates_on_cycles() {
        let idx = DependencyIndex::build(graph(&[("A", &["B"]), ("B", &["A"])]));
        let from_a: Vec<_> = idx.affected_by("A").collect();
        assert_eq!(from_a, vec!["A", "B"]);
    }
}
