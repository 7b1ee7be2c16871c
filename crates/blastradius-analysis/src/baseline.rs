use blastradius_core::{BaselineStore, FileBaseline};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a file's text, stored with the baseline for a cheap
/// no-change pre-check before parsing.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory baseline store: one entry per watched path, held for the
/// process lifetime. Entries for different paths are independent, so
/// cycles for different files never contend.
#[derive(Default)]
pub struct InMemoryBaselineStore {
    entries: DashMap<String, FileBaseline>,
}

impl InMemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn get(&self, path: &str) -> Option<FileBaseline> {
        self.entries.get(path).map(|entry| entry.clone())
    }

    fn put(&self, baseline: FileBaseline) {
        self.entries.insert(baseline.path.clone(), baseline);
    }

    fn remove(&self, path: &str) {
        self.entries.remove(path);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastradius_core::DependencyGraph;

    #[test]
    fn put_replaces_wholesale() {
        let store = InMemoryBaselineStore::new();
        let hash_one = content_hash("x = 1\n");
        store.put(FileBaseline::new(
            "app.py",
            "x = 1\n",
            hash_one.clone(),
            DependencyGraph::new(),
        ));
        store.put(FileBaseline::new(
            "app.py",
            "x = 2\n",
            content_hash("x = 2\n"),
            DependencyGraph::new(),
        ));

        assert_eq!(store.len(), 1);
        let baseline = store.get("app.py").unwrap();
        assert_eq!(baseline.text, "x = 2\n");
        assert_ne!(baseline.content_hash, hash_one);
    }

    #[test]
    fn paths_are_independent() {
        let store = InMemoryBaselineStore::new();
        store.put(FileBaseline::new(
            "a.py",
            "",
            content_hash(""),
            DependencyGraph::new(),
        ));
        assert!(store.get("b.py").is_none());
        store.remove("a.py");
        assert!(store.is_empty());
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
