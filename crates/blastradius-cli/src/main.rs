mod insight;
mod report;
mod watcher;

use anyhow::{Context, Result};
use blastradius_analysis::AnalysisEngine;
use blastradius_core::{AnalysisOutcome, InsightProvider, Settings};
use clap::Parser;
use colored::Colorize;
use ignore::WalkBuilder;
use insight::InsightClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use watcher::{ProjectWatcher, SaveEvent};

#[derive(Parser)]
#[command(name = "blastradius")]
#[command(about = "Watch a project and report the blast radius of every save", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory to watch
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Configuration file (TOML)
    #[arg(long, default_value = "blastradius.toml")]
    config: PathBuf,

    /// Override the configured debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Skip the narrative-insight collaborator even when a key is present
    #[arg(long)]
    no_insight: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(ms) = cli.debounce_ms {
        settings.debounce_ms = ms;
    }

    let engine = Arc::new(AnalysisEngine::in_memory());
    let insight: Option<Arc<dyn InsightProvider>> = if cli.no_insight {
        None
    } else {
        match &settings.insight {
            Some(cfg) => InsightClient::from_env(cfg)?
                .map(|client| Arc::new(client) as Arc<dyn InsightProvider>),
            None => None,
        }
    };

    seed_baselines(&engine, &cli.path, &settings).await?;
    println!(
        "{} {} ({} files tracked)",
        "watching".bold(),
        cli.path.display().to_string().cyan(),
        engine.store().len()
    );

    let (tx, rx) = crossbeam_channel::unbounded::<SaveEvent>();
    let project_watcher = ProjectWatcher::new(cli.path.clone(), &settings);
    std::thread::spawn(move || {
        if let Err(e) = project_watcher.watch(tx) {
            warn!(error = %e, "watcher stopped");
        }
    });

    loop {
        let event = match tokio::task::block_in_place(|| rx.recv()) {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            SaveEvent::Saved { path, text } => {
                handle_save(&engine, insight.as_deref(), &settings, &path, &text).await;
            }
            SaveEvent::Removed { path } => {
                let key = path.to_string_lossy();
                engine.forget(&key);
                info!(path = %key, "dropped state for removed file");
            }
        }
    }
    Ok(())
}

/// Walk the project once at startup so the first real save diffs against a
/// baseline instead of being swallowed as a first observation.
async fn seed_baselines(
    engine: &AnalysisEngine,
    root: &Path,
    settings: &Settings,
) -> Result<()> {
    for entry in WalkBuilder::new(root).build() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let tracked = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| settings.tracks_extension(e));
        if !tracked {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let key = path.to_string_lossy();
                if let Err(e) = engine.on_file_changed(&key, &text).await {
                    warn!(path = %key, error = %e, "failed to seed baseline");
                }
            }
            Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    Ok(())
}

async fn handle_save(
    engine: &AnalysisEngine,
    insight: Option<&dyn InsightProvider>,
    settings: &Settings,
    path: &Path,
    text: &str,
) {
    let key = path.to_string_lossy();
    match engine.on_file_changed(&key, text).await {
        Ok(AnalysisOutcome::NoChange) => debug!(path = %key, "no change"),
        Ok(AnalysisOutcome::Failed(message)) => {
            println!(
                "{} {}: {}",
                "skipped".yellow().bold(),
                key,
                message.dimmed()
            );
        }
        Ok(AnalysisOutcome::Analyzed(mut analysis)) => {
            if let Some(provider) = insight {
                match provider.annotate(&analysis.insight_snapshot()).await {
                    Ok(text) => analysis.insight = Some(text),
                    Err(e) => warn!(path = %key, error = %e, "insight annotation failed"),
                }
            }
            report::print_summary(&analysis);
            match report::write_payload(&analysis, settings.output_dir.as_deref()) {
                Ok(out) => info!(path = %out.display(), "visualization payload written"),
                Err(e) => warn!(error = %e, "failed to write visualization payload"),
            }
        }
        Err(e) => warn!(path = %key, error = %e, "analysis cycle failed"),
    }
}
