use crate::{QualifiedName, SymbolNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Directed dependency graph over qualified symbol names.
///
/// Edge `A -> B` means "A depends on / uses B". The reverse index (for each
/// name, the set of nodes that depend on it) is rebuilt fully on every
/// assembly; with single-file graphs the O(E) rebuild is cheaper than
/// incremental edge patching would be worth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: BTreeMap<QualifiedName, SymbolNode>,
    /// name -> nodes whose outgoing set contains that name. Keys include
    /// unresolved targets so deletion impact can look up dangling references.
    reverse: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from a flat symbol table.
    ///
    /// A name defined more than once keeps the last definition, matching
    /// Python rebinding semantics.
    pub fn build(symbols: impl IntoIterator<Item = SymbolNode>) -> Self {
        let mut graph = Self::new();
        for symbol in symbols {
            graph.nodes.insert(symbol.name.clone(), symbol);
        }
        graph.rebuild_reverse_index();
        graph
    }

    fn rebuild_reverse_index(&mut self) {
        self.reverse.clear();
        for (name, node) in &self.nodes {
            for dep in &node.depends_on {
                self.reverse
                    .entry(dep.clone())
                    .or_default()
                    .insert(name.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&SymbolNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SymbolNode> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut SymbolNode> {
        self.nodes.values_mut()
    }

    pub fn names(&self) -> BTreeSet<QualifiedName> {
        self.nodes.keys().cloned().collect()
    }

    /// Nodes that directly depend on `name`.
    pub fn dependents_of(&self, name: &QualifiedName) -> BTreeSet<QualifiedName> {
        self.reverse.get(name).cloned().unwrap_or_default()
    }

    /// Symbols whose defining line equals `line`.
    pub fn defined_on_line(&self, line: u32) -> Vec<&SymbolNode> {
        self.nodes.values().filter(|n| n.line == line).collect()
    }

    /// Function symbols whose definition span contains `line`.
    pub fn functions_spanning_line(&self, line: u32) -> Vec<&SymbolNode> {
        self.nodes
            .values()
            .filter(|n| {
                matches!(n.kind, crate::SymbolKind::Function) && n.spans_line(line)
            })
            .collect()
    }
}

/// Last-analyzed snapshot of one watched file.
///
/// Replaced wholesale after each successful analysis cycle; never partially
/// mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBaseline {
    pub path: String,
    pub text: String,
    /// Hex SHA-256 of `text`, used for a cheap no-change pre-check.
    pub content_hash: String,
    pub graph: DependencyGraph,
}

impl FileBaseline {
    pub fn new(
        path: impl Into<String>,
        text: impl Into<String>,
        content_hash: impl Into<String>,
        graph: DependencyGraph,
    ) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            content_hash: content_hash.into(),
            graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SymbolKind, SymbolNode};

    fn node(name: &str, line: u32, deps: &[&str]) -> SymbolNode {
        SymbolNode::new(QualifiedName::new(name), SymbolKind::Function, line, line)
            .with_dependencies(deps.iter().map(|d| QualifiedName::new(*d)).collect())
    }

    #[test]
    fn build_populates_reverse_index() {
        let graph = DependencyGraph::build([
            node("m.f", 1, &["m.g", "m.h"]),
            node("m.g", 5, &["m.h"]),
            node("m.h", 9, &[]),
        ]);

        let h = QualifiedName::new("m.h");
        let dependents = graph.dependents_of(&h);
        assert!(dependents.contains(&QualifiedName::new("m.f")));
        assert!(dependents.contains(&QualifiedName::new("m.g")));
        assert_eq!(dependents.len(), 2);
    }

    #[test]
    fn reverse_index_tracks_unresolved_targets() {
        let graph = DependencyGraph::build([node("m.f", 1, &["m.missing"])]);
        let missing = QualifiedName::new("m.missing");
        assert!(!graph.contains(&missing));
        assert_eq!(graph.dependents_of(&missing).len(), 1);
    }

    #[test]
    fn duplicate_definitions_keep_last() {
        let graph = DependencyGraph::build([node("m.x", 1, &["m.a"]), node("m.x", 7, &["m.b"])]);
        let x = graph.get(&QualifiedName::new("m.x")).unwrap();
        assert_eq!(x.line, 7);
        assert!(x.depends_on.contains(&QualifiedName::new("m.b")));
        assert!(!x.depends_on.contains(&QualifiedName::new("m.a")));
    }

    #[test]
    fn defined_on_line_matches_exact_line_only() {
        let graph = DependencyGraph::build([node("m.f", 3, &[])]);
        assert_eq!(graph.defined_on_line(3).len(), 1);
        assert!(graph.defined_on_line(4).is_empty());
    }
}
