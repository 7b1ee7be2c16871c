use blastradius_core::{DependencyGraph, ImpactResult, LineImpact, QualifiedName};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Compute the full impact of a set of changed lines.
///
/// Per line: seed set = symbols whose defining line equals the line number
/// (possibly empty), downstream set = every node transitively reached
/// through the seeds' uses relation. The aggregate union preserves
/// provenance: each affected symbol remembers which changed line(s)
/// produced it.
pub fn propagate_lines(graph: &DependencyGraph, lines: &[u32]) -> ImpactResult {
    let mut per_line = Vec::with_capacity(lines.len());
    let mut aggregate: BTreeMap<QualifiedName, BTreeSet<u32>> = BTreeMap::new();

    for &line in lines {
        let seeds: BTreeSet<QualifiedName> = graph
            .defined_on_line(line)
            .into_iter()
            .map(|n| n.name.clone())
            .collect();

        let reached = forward_reachable(graph, &seeds);
        let downstream: BTreeSet<QualifiedName> =
            reached.difference(&seeds).cloned().collect();

        for name in seeds.iter().chain(downstream.iter()) {
            aggregate.entry(name.clone()).or_default().insert(line);
        }
        per_line.push(LineImpact {
            line,
            seeds,
            downstream,
        });
    }

    debug!(
        lines = lines.len(),
        affected = aggregate.len(),
        "impact propagation complete"
    );

    ImpactResult {
        per_line,
        aggregate,
        deletion_impact: BTreeSet::new(),
    }
}

/// Every node reachable from the seeds by following outgoing dependency
/// edges. Iterative BFS with an explicit frontier queue; the visited set
/// makes traversal cycle-safe, each node entering the queue at most once.
/// Dependency targets that never became nodes (unresolved references) are
/// not reached.
pub fn forward_reachable(
    graph: &DependencyGraph,
    seeds: &BTreeSet<QualifiedName>,
) -> BTreeSet<QualifiedName> {
    let mut visited: BTreeSet<QualifiedName> = seeds
        .iter()
        .filter(|s| graph.contains(s))
        .cloned()
        .collect();
    let mut frontier: VecDeque<QualifiedName> = visited.iter().cloned().collect();

    while let Some(current) = frontier.pop_front() {
        let Some(node) = graph.get(&current) else {
            continue;
        };
        for dep in &node.depends_on {
            if graph.contains(dep) && visited.insert(dep.clone()) {
                frontier.push_back(dep.clone());
            }
        }
    }
    visited
}

/// Every node reachable from the seeds by following the reverse-edge index:
/// the nodes that depend on a seed, transitively.
pub fn reverse_reachable(
    graph: &DependencyGraph,
    seeds: &BTreeSet<QualifiedName>,
) -> BTreeSet<QualifiedName> {
    let mut visited: BTreeSet<QualifiedName> = seeds
        .iter()
        .filter(|s| graph.contains(s))
        .cloned()
        .collect();
    let mut frontier: VecDeque<QualifiedName> = visited.iter().cloned().collect();

    while let Some(current) = frontier.pop_front() {
        for dependent in graph.dependents_of(&current) {
            if visited.insert(dependent.clone()) {
                frontier.push_back(dependent);
            }
        }
    }
    visited
}

/// Symbols in the new graph that depended on a deleted name, expanded
/// transitively over the reverse index. Deleted names are no longer nodes,
/// so the first hop goes through the dangling-reference entries of the
/// reverse index.
pub fn deletion_impact(
    graph: &DependencyGraph,
    deleted: &BTreeSet<QualifiedName>,
) -> BTreeSet<QualifiedName> {
    let mut seeds = BTreeSet::new();
    for name in deleted {
        seeds.extend(graph.dependents_of(name));
    }
    reverse_reachable(graph, &seeds)
}
