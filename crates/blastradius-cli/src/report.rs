use anyhow::{Context, Result};
use blastradius_core::{AnalysisReport, Severity};
use colored::Colorize;
use std::path::{Path, PathBuf};

fn paint(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::High => severity.to_string().red().bold(),
        Severity::Medium => severity.to_string().yellow(),
        Severity::Low => severity.to_string().green(),
    }
}

/// Print a per-cycle summary to the terminal.
pub fn print_summary(report: &AnalysisReport) {
    println!();
    println!(
        "{} {}",
        "changed".bold(),
        report.file.as_str().cyan().bold()
    );
    println!(
        "  lines: {:?}  added: {}  deleted: {}  modified: {}",
        report.change_set.changed_lines,
        report.change_set.added.len(),
        report.change_set.deleted.len(),
        report.change_set.modified.len(),
    );
    if report.change_set.reorder_only {
        println!("  {}", "reorder-only save; no propagation".dimmed());
    }

    for subgraph in &report.payload.subgraphs {
        println!("  line {}:", subgraph.line);
        for node in subgraph.nodes.iter().filter(|n| !n.id.starts_with("line:")) {
            println!(
                "    {} {} ({} deps)",
                paint(node.severity),
                node.id,
                node.dependency_count
            );
        }
    }

    if !report.impact.deletion_impact.is_empty() {
        let names: Vec<&str> = report
            .impact
            .deletion_impact
            .iter()
            .map(|n| n.as_str())
            .collect();
        println!(
            "  {} {}",
            "broken by deletion:".red().bold(),
            names.join(", ")
        );
    }

    if let Some(insight) = &report.insight {
        println!("  {}", "insight".bold());
        for line in insight.lines() {
            println!("    {line}");
        }
    }
}

/// Write the visualization payload next to the analyzed file (or into the
/// configured output directory) as `<stem>_impact.json`.
pub fn write_payload(report: &AnalysisReport, output_dir: Option<&Path>) -> Result<PathBuf> {
    let source = Path::new(&report.file);
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("impact");
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let path = dir.join(format!("{stem}_impact.json"));
    let json = serde_json::to_string_pretty(&report.payload)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
