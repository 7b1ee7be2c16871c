use blastradius_core::{
    CrossLink, DependencyGraph, ImpactResult, LineSubgraph, PayloadEdge, PayloadNode,
    PayloadNodeKind, QualifiedName, Severity, SharedNode, SymbolKind,
};
use std::collections::{BTreeMap, BTreeSet};

/// Build one isolated subgraph per changed line plus the shared-node
/// overlaps across them.
///
/// Each subgraph is laid out in three tiers (changed line, functions,
/// variables), nodes sorted by name within a tier, so stacked subgraphs
/// keep aligned coordinates. Shared-node identity matches by
/// `QualifiedName` across the independently built subgraphs.
pub fn partition(
    graph: &DependencyGraph,
    impact: &ImpactResult,
) -> (Vec<LineSubgraph>, Vec<SharedNode>, Vec<CrossLink>) {
    let mut subgraphs = Vec::with_capacity(impact.per_line.len());
    let mut occurrences: BTreeMap<QualifiedName, BTreeSet<u32>> = BTreeMap::new();

    for line_impact in &impact.per_line {
        let members = line_impact.impacted();
        for name in &members {
            occurrences
                .entry(name.clone())
                .or_default()
                .insert(line_impact.line);
        }
        subgraphs.push(build_subgraph(
            graph,
            line_impact.line,
            &line_impact.seeds,
            &members,
        ));
    }

    let shared_nodes: Vec<SharedNode> = occurrences
        .into_iter()
        .filter(|(_, lines)| lines.len() >= 2)
        .map(|(name, lines)| SharedNode {
            name,
            lines: lines.into_iter().collect(),
        })
        .collect();

    let cross_links = shared_nodes
        .iter()
        .flat_map(|shared| {
            shared.lines.windows(2).map(|pair| CrossLink {
                name: shared.name.clone(),
                from_line: pair[0],
                to_line: pair[1],
            })
        })
        .collect();

    (subgraphs, shared_nodes, cross_links)
}

fn build_subgraph(
    graph: &DependencyGraph,
    line: u32,
    seeds: &BTreeSet<QualifiedName>,
    members: &BTreeSet<QualifiedName>,
) -> LineSubgraph {
    let line_id = format!("line:{line}");
    let mut nodes = vec![PayloadNode {
        id: line_id.clone(),
        kind: PayloadNodeKind::Line,
        severity: Severity::High,
        dependency_count: seeds.len(),
        line,
    }];

    // Tier ordering: functions before variables; members iterate in name
    // order already.
    for kind in [SymbolKind::Function, SymbolKind::Variable] {
        for name in members {
            let Some(node) = graph.get(name) else {
                continue;
            };
            if node.kind != kind {
                continue;
            }
            // Symbols defined on the changed line inherit the changed-line
            // severity; downstream symbols keep their classified tier.
            let severity = if seeds.contains(name) {
                Severity::High
            } else {
                node.severity
            };
            nodes.push(PayloadNode {
                id: name.as_str().to_string(),
                kind: node.kind.into(),
                severity,
                dependency_count: node.dependency_count(),
                line: node.line,
            });
        }
    }

    let mut edges: Vec<PayloadEdge> = seeds
        .iter()
        .map(|seed| PayloadEdge {
            from: line_id.clone(),
            to: seed.as_str().to_string(),
        })
        .collect();
    for name in members {
        let Some(node) = graph.get(name) else {
            continue;
        };
        for dep in &node.depends_on {
            if members.contains(dep) {
                edges.push(PayloadEdge {
                    from: name.as_str().to_string(),
                    to: dep.as_str().to_string(),
                });
            }
        }
    }

    LineSubgraph { line, nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagate::propagate_lines;
    use blastradius_core::SymbolNode;

    fn func(name: &str, line: u32, deps: &[&str]) -> SymbolNode {
        SymbolNode::new(QualifiedName::new(name), SymbolKind::Function, line, line)
            .with_dependencies(deps.iter().map(|d| QualifiedName::new(*d)).collect())
    }

    fn var(name: &str, line: u32) -> SymbolNode {
        SymbolNode::new(QualifiedName::new(name), SymbolKind::Variable, line, line)
    }

    fn shared_graph() -> DependencyGraph {
        DependencyGraph::build([
            func("m.helper", 1, &[]),
            func("m.a", 3, &["m.helper"]),
            func("m.b", 5, &["m.helper"]),
            var("m.lonely", 7),
        ])
    }

    #[test]
    fn subgraph_tiers_start_with_the_changed_line() {
        let graph = shared_graph();
        let impact = propagate_lines(&graph, &[3]);
        let (subgraphs, _, _) = partition(&graph, &impact);

        let nodes = &subgraphs[0].nodes;
        assert_eq!(nodes[0].kind, PayloadNodeKind::Line);
        assert_eq!(nodes[0].id, "line:3");
        assert_eq!(nodes[0].severity, Severity::High);
        // Functions follow, in name order.
        assert_eq!(nodes[1].id, "m.a");
        assert_eq!(nodes[2].id, "m.helper");
    }

    #[test]
    fn seed_symbols_take_the_changed_line_severity() {
        let graph = shared_graph();
        let impact = propagate_lines(&graph, &[3]);
        let (subgraphs, _, _) = partition(&graph, &impact);

        let seed = subgraphs[0].nodes.iter().find(|n| n.id == "m.a").unwrap();
        assert_eq!(seed.severity, Severity::High);
        let helper = subgraphs[0]
            .nodes
            .iter()
            .find(|n| n.id == "m.helper")
            .unwrap();
        assert_eq!(helper.severity, Severity::Low);
    }

    #[test]
    fn shared_helper_appears_once_with_both_lines() {
        let graph = shared_graph();
        let impact = propagate_lines(&graph, &[3, 5]);
        let (subgraphs, shared, links) = partition(&graph, &impact);

        assert!(subgraphs[0].nodes.iter().any(|n| n.id == "m.helper"));
        assert!(subgraphs[1].nodes.iter().any(|n| n.id == "m.helper"));

        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].name, QualifiedName::new("m.helper"));
        assert_eq!(shared[0].lines, vec![3, 5]);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].from_line, 3);
        assert_eq!(links[0].to_line, 5);
    }

    #[test]
    fn symbols_in_only_one_subgraph_are_not_shared() {
        let graph = shared_graph();
        // Line 7 impacts only m.lonely; line 3 impacts a + helper.
        let impact = propagate_lines(&graph, &[3, 7]);
        let (_, shared, _) = partition(&graph, &impact);
        assert!(shared.is_empty());
    }

    #[test]
    fn edges_stay_inside_the_subgraph() {
        let graph = DependencyGraph::build([
            func("m.f", 1, &["m.g", "m.external"]),
            func("m.g", 3, &[]),
        ]);
        let impact = propagate_lines(&graph, &[1]);
        let (subgraphs, _, _) = partition(&graph, &impact);

        let edges = &subgraphs[0].edges;
        assert!(edges
            .iter()
            .any(|e| e.from == "line:1" && e.to == "m.f"));
        assert!(edges.iter().any(|e| e.from == "m.f" && e.to == "m.g"));
        assert!(!edges.iter().any(|e| e.to == "m.external"));
    }
}
