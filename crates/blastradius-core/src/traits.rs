use crate::{FileBaseline, InsightSnapshot, Result};
use async_trait::async_trait;

/// Per-path baseline storage. One entry per watched file, replaced
/// wholesale after each successful analysis cycle.
///
/// An explicit store object (rather than process-global state) keeps the
/// engine testable; implementations must be safe to share across cycles for
/// different paths.
pub trait BaselineStore: Send + Sync {
    fn get(&self, path: &str) -> Option<FileBaseline>;
    fn put(&self, baseline: FileBaseline);
    fn remove(&self, path: &str);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Narrative-insight collaborator. Receives a read-only snapshot of a
/// completed cycle and returns free-text risk commentary; the engine never
/// feeds the response back into its own graph state.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn annotate(&self, snapshot: &InsightSnapshot) -> Result<String>;
}
