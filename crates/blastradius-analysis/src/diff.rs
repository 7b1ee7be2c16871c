use blastradius_core::{ChangeSet, DependencyGraph, QualifiedName};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;
use tracing::debug;

/// Compare two versions of a file: line-level text diff plus symbol deltas
/// between the old and new dependency graphs.
///
/// A line counts as changed independent of whether it falls inside a known
/// symbol's span. Deltas are set differences on `QualifiedName`; a symbol
/// present in both versions is modified when its outgoing edge set or
/// defining line differs.
pub fn detect(
    old_text: &str,
    new_text: &str,
    old_graph: &DependencyGraph,
    new_graph: &DependencyGraph,
) -> ChangeSet {
    let changed_lines = changed_lines(old_text, new_text);
    let reorder_only = !changed_lines.is_empty() && is_reorder_only(old_text, new_text);

    let old_names = old_graph.names();
    let new_names = new_graph.names();

    let added: BTreeSet<QualifiedName> = new_names.difference(&old_names).cloned().collect();
    let deleted: BTreeSet<QualifiedName> = old_names.difference(&new_names).cloned().collect();
    let modified: BTreeSet<QualifiedName> = new_names
        .intersection(&old_names)
        .filter(|name| match (old_graph.get(name), new_graph.get(name)) {
            (Some(old), Some(new)) => {
                old.depends_on != new.depends_on || old.line != new.line
            }
            _ => false,
        })
        .cloned()
        .collect();

    debug!(
        lines = changed_lines.len(),
        added = added.len(),
        deleted = deleted.len(),
        modified = modified.len(),
        reorder_only,
        "change detection complete"
    );

    ChangeSet {
        changed_lines,
        added,
        deleted,
        modified,
        reorder_only,
    }
}

/// New-side line numbers touched by the edit: inserted or rewritten lines
/// count directly; a pure deletion marks the new-side line at the deletion
/// point, clamped to the end of the file.
fn changed_lines(old_text: &str, new_text: &str) -> Vec<u32> {
    let new_line_count = new_text.lines().count() as u32;
    let diff = TextDiff::from_lines(old_text, new_text);

    let mut changed = BTreeSet::new();
    let mut new_pos: u32 = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => new_pos += 1,
            ChangeTag::Insert => {
                new_pos += 1;
                changed.insert(new_pos);
            }
            ChangeTag::Delete => {
                if new_line_count > 0 {
                    changed.insert((new_pos + 1).min(new_line_count));
                }
            }
        }
    }
    changed.into_iter().collect()
}

/// True when the save merely reordered existing lines: same line count and
/// an identical multiset of stripped, non-empty lines.
fn is_reorder_only(old_text: &str, new_text: &str) -> bool {
    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();
    if old_lines.len() != new_lines.len() {
        return false;
    }

    let strip_sort = |lines: &[&str]| -> Vec<String> {
        let mut stripped: Vec<String> = lines
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        stripped.sort();
        stripped
    };

    strip_sort(&old_lines) == strip_sort(&new_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastradius_core::{SymbolKind, SymbolNode};

    fn node(name: &str, line: u32, deps: &[&str]) -> SymbolNode {
        SymbolNode::new(QualifiedName::new(name), SymbolKind::Function, line, line)
            .with_dependencies(deps.iter().map(|d| QualifiedName::new(*d)).collect())
    }

    #[test]
    fn identical_text_reports_no_changed_lines() {
        let graph = DependencyGraph::build([node("m.f", 1, &[])]);
        let change = detect("a\nb\n", "a\nb\n", &graph, &graph);
        assert!(change.is_empty());
        assert!(!change.reorder_only);
    }

    #[test]
    fn rewritten_line_is_reported_at_its_new_position() {
        let change = detect(
            "a\nb\nc\n",
            "a\nB\nc\n",
            &DependencyGraph::new(),
            &DependencyGraph::new(),
        );
        assert_eq!(change.changed_lines, vec![2]);
    }

    #[test]
    fn deletion_marks_the_following_new_line() {
        let change = detect(
            "a\nb\nc\n",
            "a\nc\n",
            &DependencyGraph::new(),
            &DependencyGraph::new(),
        );
        assert_eq!(change.changed_lines, vec![2]);
    }

    #[test]
    fn trailing_deletion_clamps_to_last_line() {
        let change = detect(
            "a\nb\nc\n",
            "a\nb\n",
            &DependencyGraph::new(),
            &DependencyGraph::new(),
        );
        assert_eq!(change.changed_lines, vec![2]);
    }

    #[test]
    fn symbol_deltas_partition_added_deleted_modified() {
        let old = DependencyGraph::build([
            node("m.kept", 1, &["m.a"]),
            node("m.retuned", 3, &["m.a"]),
            node("m.gone", 5, &[]),
        ]);
        let new = DependencyGraph::build([
            node("m.kept", 1, &["m.a"]),
            node("m.retuned", 3, &["m.b"]),
            node("m.fresh", 5, &[]),
        ]);

        let change = detect("x\n", "y\n", &old, &new);
        assert_eq!(
            change.added.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            vec!["m.fresh"]
        );
        assert_eq!(
            change.deleted.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            vec!["m.gone"]
        );
        assert_eq!(
            change
                .modified
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
            vec!["m.retuned"]
        );
    }

    #[test]
    fn moved_definition_counts_as_modified() {
        let old = DependencyGraph::build([node("m.f", 2, &[])]);
        let new = DependencyGraph::build([node("m.f", 4, &[])]);
        let change = detect("x\n", "y\n", &old, &new);
        assert!(change.modified.contains(&QualifiedName::new("m.f")));
    }

    #[test]
    fn swapped_lines_flag_reorder_only() {
        let change = detect(
            "a = 1\nb = 2\n",
            "b = 2\na = 1\n",
            &DependencyGraph::new(),
            &DependencyGraph::new(),
        );
        assert!(change.reorder_only);
        assert!(!change.changed_lines.is_empty());
    }

    #[test]
    fn content_edits_are_not_reorder_only() {
        let change = detect(
            "a = 1\nb = 2\n",
            "a = 9\nb = 2\n",
            &DependencyGraph::new(),
            &DependencyGraph::new(),
        );
        assert!(!change.reorder_only);
    }
}
