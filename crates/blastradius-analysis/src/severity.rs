use blastradius_core::{DependencyGraph, Severity, SymbolKind};

/// Classify a symbol from its own outgoing-edge count: how many things it
/// uses, not how many things use it.
///
/// Boundaries are exact: a function with 5 dependencies is MEDIUM, 6 is
/// HIGH; a variable with 4 is LOW, 5 is MEDIUM.
pub fn classify(kind: SymbolKind, outgoing: usize) -> Severity {
    match kind {
        SymbolKind::Function => {
            if outgoing > 5 {
                Severity::High
            } else if outgoing >= 3 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        SymbolKind::Variable => {
            if outgoing > 4 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    }
}

/// Assign a severity tier to every node in the graph.
pub fn classify_graph(graph: &mut DependencyGraph) {
    for node in graph.nodes_mut() {
        node.severity = classify(node.kind, node.depends_on.len());
    }
}
