use crate::baseline::{content_hash, InMemoryBaselineStore};
use crate::{diff, partition, propagate, severity};
use blastradius_core::{
    AnalysisOutcome, AnalysisReport, BaselineStore, BlastRadiusError, DependencyGraph,
    FileBaseline, ImpactResult, LineImpact, QualifiedName, Result, VisualizationPayload,
};
use blastradius_parser::{extract_symbols, module_name_for};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The incremental dependency-graph engine.
///
/// One `on_file_changed` call runs a full analysis cycle: extract, build,
/// diff against the baseline, propagate, classify, partition. Cycles for
/// different paths run in parallel against independent baseline entries;
/// cycles for the same path serialize on a per-path lock so a cycle never
/// diffs against a half-replaced baseline.
pub struct AnalysisEngine {
    store: Arc<dyn BaselineStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AnalysisEngine {
    pub fn new(store: Arc<dyn BaselineStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBaselineStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn BaselineStore> {
        &self.store
    }

    /// Drop all per-path state for a file that left the watched set: its
    /// baseline and its serialization lock. A later save is treated as a
    /// first observation again.
    pub fn forget(&self, path: &str) {
        self.store.remove(path);
        self.locks.remove(path);
    }

    /// Analyze one save event for `path`.
    ///
    /// The baseline is replaced wholesale only after the report is fully
    /// built; a parse failure leaves it untouched and is reported as
    /// `Failed` rather than an engine error.
    pub async fn on_file_changed(&self, path: &str, new_text: &str) -> Result<AnalysisOutcome> {
        let lock = self
            .locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let hash = content_hash(new_text);
        let module = module_name_for(path);

        let Some(baseline) = self.store.get(path) else {
            // First observation: seed the baseline, report nothing.
            let graph = match self.parse_and_build(&module, new_text) {
                Ok(graph) => graph,
                Err(outcome) => return Ok(outcome),
            };
            debug!(path, nodes = graph.len(), "baseline seeded");
            self.store
                .put(FileBaseline::new(path, new_text, hash, graph));
            return Ok(AnalysisOutcome::NoChange);
        };

        if baseline.content_hash == hash {
            return Ok(AnalysisOutcome::NoChange);
        }

        let new_graph = match self.parse_and_build(&module, new_text) {
            Ok(graph) => graph,
            Err(outcome) => return Ok(outcome),
        };

        let change_set = diff::detect(&baseline.text, new_text, &baseline.graph, &new_graph);
        if change_set.is_empty() && baseline.graph == new_graph {
            return Ok(AnalysisOutcome::NoChange);
        }

        let mut impact = if change_set.reorder_only {
            reorder_impact(&new_graph, &change_set.changed_lines)
        } else {
            propagate::propagate_lines(&new_graph, &change_set.changed_lines)
        };
        if !change_set.deleted.is_empty() {
            impact.deletion_impact = propagate::deletion_impact(&new_graph, &change_set.deleted);
        }

        let (subgraphs, shared_nodes, cross_links) = partition::partition(&new_graph, &impact);
        let payload = VisualizationPayload {
            file: path.to_string(),
            changed_lines: change_set.changed_lines.clone(),
            subgraphs,
            shared_nodes,
            cross_links,
        };

        info!(
            path,
            lines = change_set.changed_lines.len(),
            added = change_set.added.len(),
            deleted = change_set.deleted.len(),
            modified = change_set.modified.len(),
            affected = impact.aggregate.len(),
            reorder_only = change_set.reorder_only,
            "analysis cycle complete"
        );

        let report = AnalysisReport {
            file: path.to_string(),
            change_set,
            impact,
            payload,
            insight: None,
        };

        self.store
            .put(FileBaseline::new(path, new_text, hash, new_graph));

        Ok(AnalysisOutcome::Analyzed(Box::new(report)))
    }

    fn parse_and_build(
        &self,
        module: &str,
        text: &str,
    ) -> std::result::Result<DependencyGraph, AnalysisOutcome> {
        match extract_symbols(module, text) {
            Ok(symbols) => {
                let mut graph = DependencyGraph::build(symbols);
                severity::classify_graph(&mut graph);
                Ok(graph)
            }
            Err(BlastRadiusError::Parse(message)) => {
                warn!(module, %message, "skipping analysis for unparseable save");
                Err(AnalysisOutcome::Failed(message))
            }
            Err(other) => {
                warn!(module, error = %other, "extraction failed");
                Err(AnalysisOutcome::Failed(other.to_string()))
            }
        }
    }
}

/// Impact for a reorder-only save: no propagation, just the functions whose
/// spans contain the reordered lines.
fn reorder_impact(graph: &DependencyGraph, lines: &[u32]) -> ImpactResult {
    let mut per_line = Vec::with_capacity(lines.len());
    let mut aggregate: BTreeMap<QualifiedName, BTreeSet<u32>> = BTreeMap::new();

    for &line in lines {
        let seeds: BTreeSet<QualifiedName> = graph
            .functions_spanning_line(line)
            .into_iter()
            .map(|n| n.name.clone())
            .collect();
        for name in &seeds {
            aggregate.entry(name.clone()).or_default().insert(line);
        }
        per_line.push(LineImpact {
            line,
            seeds,
            downstream: BTreeSet::new(),
        });
    }

    ImpactResult {
        per_line,
        aggregate,
        deletion_impact: BTreeSet::new(),
    }
}
