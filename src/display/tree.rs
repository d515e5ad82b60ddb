//! tree.rs
//! Dependency tree export (nested JSON) and a plain-text audit trace.

use crate::analysis::DependencyIndex;
use crate::compute::ledger::{EngineError, Result, Snapshot};
use crate::store::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

/// Nested `name -> { dependency -> { ... } }` mapping rooted at head nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTree(pub BTreeMap<String, DependencyTree>);

impl DependencyTree {
    pub fn build(index: &DependencyIndex) -> Self {
        let heads = index.head_nodes();
        Self(heads.into_iter().map(|h| (h.to_string(), Self::subtree(index, h))).collect())
    }

    fn subtree(index: &DependencyIndex, name: &str) -> Self {
        Self(
            index
                .dependencies_of(name)
                .iter()
                .map(|dep| (dep.clone(), Self::subtree(index, dep)))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&DependencyTree> { self.0.get(name) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn keys(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Export(e.to_string()))
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| EngineError::Export(format!("cannot create {}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| EngineError::Export(e.to_string()))?;
        writer.flush().map_err(|e| EngineError::Export(e.to_string()))
    }
}

/// Renders the dependency chain of `target` with the values held in `snapshot`.
/// Nodes already printed higher up are shown as references.
pub fn format_trace(index: &DependencyIndex, snapshot: &Snapshot, target: &str) -> String {
    let mut tracer = Tracer { index, snapshot, visited_at_level: HashMap::new(), output: String::new() };
    let _ = writeln!(tracer.output, "DEPENDENCY TRACE for node '{}':", target);
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_node(target, 1, "");
    tracer.output
}

struct Tracer<'a> {
    index: &'a DependencyIndex,
    snapshot: &'a Snapshot,
    visited_at_level: HashMap<&'a str, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, name: &'a str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}{} (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(name, level);

        let _ = writeln!(self.output, "{}[L{}] {}{}", prefix, level, name, self.format_value(name));

        let index = self.index;
        let deps = index.dependencies_of(name);
        let stem = Self::child_stem(prefix);
        for (i, dep) in deps.iter().enumerate() {
            let connector = if i == deps.len() - 1 { "`--" } else { "|--" };
            self.trace_node(dep, level + 1, &format!("{}{}", stem, connector));
        }
    }

    fn child_stem(prefix: &str) -> String {
        prefix.replace("|--", "|  ").replace("`--", "   ")
    }

    fn format_value(&self, name: &str) -> String {
        match self.snapshot.get(name).map(|env| &env.data) {
            None => " = <not computed>".to_string(),
            Some(Value::Scalar(v)) => format!(" = {:.4}", v),
            Some(Value::Series(v)) if v.len() == 1 => format!(" = {:.4}", v[0]),
            Some(Value::Series(v)) => format!(" = [len={}]", v.len()),
            Some(Value::Table(t)) => format!(" = [table {}x{}]", t.first().map_or(0, Vec::len), t.len()),
            Some(Value::Text(s)) => format!(" = \"{}\"", s),
        }
    }
}
