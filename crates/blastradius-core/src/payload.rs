use crate::{ChangeSet, ImpactResult, QualifiedName, Severity, SharedNode, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node kind in the visualization payload. The synthetic changed-line node
/// forms tier 0 of each per-line subgraph; functions and variables follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadNodeKind {
    Line,
    Function,
    Variable,
}

impl From<SymbolKind> for PayloadNodeKind {
    fn from(kind: SymbolKind) -> Self {
        match kind {
            SymbolKind::Function => PayloadNodeKind::Function,
            SymbolKind::Variable => PayloadNodeKind::Variable,
        }
    }
}

/// One node in a per-line subgraph.
///
/// Field names and shapes are consumed by an independently evolving
/// renderer; do not rename without versioning the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadNode {
    pub id: String,
    pub kind: PayloadNodeKind,
    pub severity: Severity,
    pub dependency_count: usize,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadEdge {
    pub from: String,
    pub to: String,
}

/// Isolated node/edge subgraph scoped to one changed line's impact set,
/// ordered changed line -> functions -> variables so stacked subgraphs
/// align.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSubgraph {
    pub line: u32,
    pub nodes: Vec<PayloadNode>,
    pub edges: Vec<PayloadEdge>,
}

/// Synthetic edge linking two occurrences of a shared node across per-line
/// subgraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossLink {
    pub name: QualifiedName,
    pub from_line: u32,
    pub to_line: u32,
}

/// Serialized payload handed to the visualization collaborator per cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualizationPayload {
    pub file: String,
    pub changed_lines: Vec<u32>,
    pub subgraphs: Vec<LineSubgraph>,
    pub shared_nodes: Vec<SharedNode>,
    pub cross_links: Vec<CrossLink>,
}

/// One impacted symbol as seen by the insight collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactedSymbol {
    pub name: QualifiedName,
    pub kind: SymbolKind,
    pub severity: Severity,
}

/// Read-only snapshot sent to the narrative-insight service. The engine
/// never depends on the response; the annotation is appended to the report
/// as opaque text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightSnapshot {
    pub file: String,
    pub changed_lines: Vec<u32>,
    pub change_set: ChangeSet,
    pub impacted: Vec<ImpactedSymbol>,
}

/// Everything produced by one successful analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub file: String,
    pub change_set: ChangeSet,
    pub impact: ImpactResult,
    pub payload: VisualizationPayload,
    /// Narrative annotation from the insight collaborator, attached by the
    /// caller after the cycle completes.
    pub insight: Option<String>,
}

impl AnalysisReport {
    /// Snapshot for the insight collaborator: every impacted symbol across
    /// the per-line subgraphs, deduplicated, changed-line nodes excluded.
    pub fn insight_snapshot(&self) -> InsightSnapshot {
        let mut impacted: BTreeMap<String, ImpactedSymbol> = BTreeMap::new();
        for subgraph in &self.payload.subgraphs {
            for node in &subgraph.nodes {
                let kind = match node.kind {
                    PayloadNodeKind::Function => SymbolKind::Function,
                    PayloadNodeKind::Variable => SymbolKind::Variable,
                    PayloadNodeKind::Line => continue,
                };
                impacted
                    .entry(node.id.clone())
                    .or_insert_with(|| ImpactedSymbol {
                        name: QualifiedName::new(&node.id),
                        kind,
                        severity: node.severity,
                    });
            }
        }

        InsightSnapshot {
            file: self.file.clone(),
            changed_lines: self.payload.changed_lines.clone(),
            change_set: self.change_set.clone(),
            impacted: impacted.into_values().collect(),
        }
    }
}

/// Outcome of one save event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    /// Baseline and new text converged; nothing downstream ran.
    NoChange,
    Analyzed(Box<AnalysisReport>),
    /// The new text failed to parse; the baseline was left untouched.
    Failed(String),
}

impl AnalysisOutcome {
    pub fn is_no_change(&self) -> bool {
        matches!(self, AnalysisOutcome::NoChange)
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Analyzed(report) => Some(report),
            _ => None,
        }
    }
}
