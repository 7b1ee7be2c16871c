use crate::{QualifiedName, Severity, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One symbol definition extracted from a source file.
///
/// `depends_on` may reference names that never became nodes (unresolved or
/// external references); traversal treats those as leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: QualifiedName,
    pub kind: SymbolKind,
    /// Defining line, 1-based.
    pub line: u32,
    /// Last line of the definition span (equals `line` for single-line
    /// definitions such as assignments).
    pub end_line: u32,
    pub depends_on: BTreeSet<QualifiedName>,
    pub severity: Severity,
}

impl SymbolNode {
    pub fn new(name: QualifiedName, kind: SymbolKind, line: u32, end_line: u32) -> Self {
        Self {
            name,
            kind,
            line,
            end_line,
            depends_on: BTreeSet::new(),
            severity: Severity::Low,
        }
    }

    pub fn with_dependencies(mut self, deps: BTreeSet<QualifiedName>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Size of the outgoing edge set: how many things this symbol uses.
    pub fn dependency_count(&self) -> usize {
        self.depends_on.len()
    }

    /// Whether `line` falls inside this symbol's definition span.
    pub fn spans_line(&self, line: u32) -> bool {
        self.line <= line && line <= self.end_line
    }
}
