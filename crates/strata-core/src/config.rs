//! Configuration for the indexer core.
//!
//! Reads `strata.json` from a project directory and provides typed access to
//! all recognized options. Falls back to defaults when the file is missing
//! or malformed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Options recognized by the parsers and registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Reserved: wire a TypeScript language server for type enrichment.
    #[serde(default)]
    pub use_ts_server: bool,
    /// JSON files that get dedicated structural handling.
    #[serde(default = "default_special_files")]
    pub special_files: Vec<String>,
    /// Treat JSON files as content collections and strip embedded markup.
    #[serde(default)]
    pub content_only: bool,
    /// Cap on content items extracted per JSON file; 0 means no limit.
    #[serde(default)]
    pub max_content_items: usize,
    #[serde(default)]
    pub project_path: PathBuf,
}

fn default_special_files() -> Vec<String> {
    vec![
        "package.json".to_string(),
        "tsconfig.json".to_string(),
        "composer.json".to_string(),
    ]
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            use_ts_server: false,
            special_files: default_special_files(),
            content_only: false,
            max_content_items: 0,
            project_path: PathBuf::new(),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from `strata.json` inside the given directory.
    /// Returns defaults (with `project_path` set) if the file doesn't exist
    /// or can't be parsed.
    pub fn load(project_dir: &Path) -> Self {
        let config_path = project_dir.join("strata.json");
        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_json::from_str::<IndexerConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(
                        file_path = %config_path.display(),
                        error = %e,
                        "failed to parse config, using defaults"
                    );
                    IndexerConfig::default()
                }
            },
            Err(_) => IndexerConfig::default(),
        };
        if config.project_path.as_os_str().is_empty() {
            config.project_path = project_dir.to_path_buf();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let cfg = IndexerConfig::default();
        assert!(!cfg.use_ts_server);
        assert!(!cfg.content_only);
        assert_eq!(cfg.max_content_items, 0);
        assert_eq!(
            cfg.special_files,
            vec!["package.json", "tsconfig.json", "composer.json"]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert_eq!(cfg.project_path, dir.path());
        assert!(!cfg.content_only);
    }

    #[test]
    fn test_load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({
            "content_only": true,
            "max_content_items": 500,
            "special_files": ["package.json"]
        });
        fs::write(dir.path().join("strata.json"), config.to_string()).unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert!(cfg.content_only);
        assert_eq!(cfg.max_content_items, 500);
        assert_eq!(cfg.special_files, vec!["package.json"]);
        assert_eq!(cfg.project_path, dir.path());
    }

    #[test]
    fn test_load_malformed_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("strata.json"), "{not json").unwrap();
        let cfg = IndexerConfig::load(dir.path());
        assert_eq!(cfg.special_files.len(), 3);
    }

    #[test]
    fn test_roundtrip() {
        let original = IndexerConfig {
            use_ts_server: true,
            special_files: vec!["package.json".to_string()],
            content_only: true,
            max_content_items: 42,
            project_path: PathBuf::from("/proj"),
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: IndexerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
