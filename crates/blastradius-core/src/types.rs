use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Dot-delimited path uniquely identifying a symbol across nested scopes,
/// e.g. `module.class.function.variable`.
///
/// Identity is structural: a rename produces a new `QualifiedName` and is
/// treated as delete + add by the change detector.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Join scope segments into a qualified name. Empty segments are skipped.
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let joined: Vec<&str> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        Self(joined.join("."))
    }

    /// Qualify `child` under this name.
    pub fn child(&self, child: &str) -> Self {
        if self.0.is_empty() {
            Self(child.to_string())
        } else {
            Self(format!("{}.{}", self.0, child))
        }
    }

    /// The unqualified trailing segment.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Variable => write!(f, "variable"),
        }
    }
}

/// Severity tier assigned by the classifier. Ordering is semantic:
/// `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// Line-level and symbol-level deltas for one save event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changed line numbers in the new text, ascending, 1-based.
    pub changed_lines: Vec<u32>,
    pub added: BTreeSet<QualifiedName>,
    pub deleted: BTreeSet<QualifiedName>,
    pub modified: BTreeSet<QualifiedName>,
    /// True when the save only reordered existing lines; propagation is
    /// skipped and impact is limited to the enclosing functions.
    pub reorder_only: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed_lines.is_empty()
            && self.added.is_empty()
            && self.deleted.is_empty()
            && self.modified.is_empty()
    }
}

/// Impact computed for a single changed line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineImpact {
    pub line: u32,
    /// Symbols whose defining line equals the changed line.
    pub seeds: BTreeSet<QualifiedName>,
    /// Symbols transitively reached through the seeds' dependencies.
    pub downstream: BTreeSet<QualifiedName>,
}

impl LineImpact {
    /// Seed set union downstream set.
    pub fn impacted(&self) -> BTreeSet<QualifiedName> {
        self.seeds.union(&self.downstream).cloned().collect()
    }
}

/// Full propagation result across all changed lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactResult {
    pub per_line: Vec<LineImpact>,
    /// Union across lines, with provenance: which changed line(s) produced
    /// each affected symbol.
    pub aggregate: BTreeMap<QualifiedName, BTreeSet<u32>>,
    /// Symbols in the new graph that depended (transitively) on a deleted
    /// symbol.
    pub deletion_impact: BTreeSet<QualifiedName>,
}

/// A symbol impacted by two or more changed lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedNode {
    pub name: QualifiedName,
    /// Contributing changed lines, ascending.
    pub lines: Vec<u32>,
}
