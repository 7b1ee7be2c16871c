use blastradius_core::{Result, Settings};
use crossbeam_channel::Sender as CbSender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// A debounced save event for one tracked file.
#[derive(Debug, Clone)]
pub enum SaveEvent {
    /// The file was written; carries the text read after the quiet period.
    Saved { path: PathBuf, text: String },
    /// The file disappeared from disk.
    Removed { path: PathBuf },
}

/// Recursive watcher over a project root. Raw filesystem notifications are
/// coalesced per path: a burst of writes inside the debounce window becomes
/// one `Saved` event carrying the settled contents.
pub struct ProjectWatcher {
    root: PathBuf,
    debounce: Duration,
    extensions: Vec<String>,
}

impl ProjectWatcher {
    pub fn new(root: PathBuf, settings: &Settings) -> Self {
        Self {
            root,
            debounce: Duration::from_millis(settings.debounce_ms),
            extensions: settings.extensions.clone(),
        }
    }

    fn tracks(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// Blocking watch loop. Emits debounced `SaveEvent`s to `tx` until the
    /// receiving side hangs up.
    pub fn watch(&self, tx: CbSender<SaveEvent>) -> Result<()> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher = Watcher::new(raw_tx, notify::Config::default())
            .map_err(|e| blastradius_core::BlastRadiusError::Watch(e.to_string()))?;
        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| blastradius_core::BlastRadiusError::Watch(e.to_string()))?;

        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

        loop {
            match raw_rx.recv_timeout(self.debounce) {
                Ok(Ok(event)) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    for path in event.paths.into_iter().filter(|p| self.tracks(p)) {
                        pending.insert(path, Instant::now());
                    }
                }
                Ok(Err(e)) => {
                    error!(error = ?e, "watch backend error");
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    warn!("watch backend disconnected");
                    break;
                }
            }

            let now = Instant::now();
            let settled: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, seen)| now.duration_since(**seen) >= self.debounce)
                .map(|(path, _)| path.clone())
                .collect();

            for path in settled {
                pending.remove(&path);
                let event = if path.exists() {
                    match fs::read_to_string(&path) {
                        Ok(text) => SaveEvent::Saved { path, text },
                        Err(e) => {
                            // Editors swap files around on save; skip the
                            // transient state and wait for the next event.
                            debug!(path = %path.display(), error = %e, "skipping unreadable file");
                            continue;
                        }
                    }
                } else {
                    SaveEvent::Removed { path }
                };
                if tx.send(event).is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
