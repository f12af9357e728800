//! Common test utilities and helpers

#![allow(dead_code)]

use dynarun::config::DynarunConfig;
use std::fs;
use std::path::Path;

/// Write `files` (relative path, content) under `root`, creating parents
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// Configuration rooted in a scratch directory with a fake instrumenter
pub fn test_config(temp_dir: &Path) -> DynarunConfig {
    DynarunConfig {
        temp_dir: temp_dir.to_path_buf(),
        interpreter: "python".to_string(),
        instrumenter: vec!["instrument".to_string()],
        workers: Some(2),
        max_jobs_per_worker: 2,
        ..DynarunConfig::default()
    }
}

/// Value of `key` in the `env` of a recorded command
pub fn env_value<'a>(command: &'a dynarun::subprocess::ProcessCommand, key: &str) -> Option<&'a str> {
    command.env.get(key).map(String::as_str)
}
