use crate::{BlastRadiusError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine and collaborator configuration, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// File extensions eligible for analysis.
    pub extensions: Vec<String>,
    /// Quiet period used to coalesce bursts of writes into one save event.
    pub debounce_ms: u64,
    /// Where per-cycle visualization payloads are written. Defaults to the
    /// watched project root.
    pub output_dir: Option<PathBuf>,
    pub insight: Option<InsightSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightSettings {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            debounce_ms: 400,
            output_dir: None,
            insight: None,
        }
    }
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| BlastRadiusError::Config(e.to_string()))
    }

    pub fn tracks_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_track_python() {
        let settings = Settings::default();
        assert!(settings.tracks_extension("py"));
        assert!(!settings.tracks_extension("rs"));
        assert_eq!(settings.debounce_ms, 400);
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/blastradius.toml")).unwrap();
        assert_eq!(settings.extensions, vec!["py".to_string()]);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blastradius.toml");
        std::fs::write(
            &path,
            "extensions = [\"py\", \"pyi\"]\ndebounce_ms = 150\n\n[insight]\nmodel = \"claude-sonnet-4-20250514\"\nmax_tokens = 4096\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.tracks_extension("pyi"));
        assert_eq!(settings.debounce_ms, 150);
        assert_eq!(settings.insight.unwrap().max_tokens, 4096);
    }
}
