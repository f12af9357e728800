use crate::error::{DynarunError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Substring filters excluding paths from instrumentation
///
/// Read from a JSON object with optional `title` and `content` string lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    /// Matched against directory paths and file names
    pub title: Vec<String>,
    /// Matched against file contents
    pub content: Vec<String>,
}

impl IgnoreRules {
    pub fn new(title: Vec<String>, content: Vec<String>) -> Self {
        Self { title, content }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            let code = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorCode::IGNORE_FILE_NOT_FOUND
            } else {
                ErrorCode::IGNORE_FILE_MALFORMED
            };
            DynarunError::ignore_file(code, path, e.to_string()).with_source(e)
        })?;

        let rules: IgnoreRules = serde_json::from_str(&raw).map_err(|e| {
            DynarunError::ignore_file(ErrorCode::IGNORE_FILE_MALFORMED, path, e.to_string())
                .with_source(e)
        })?;

        info!("Ignoring files with title containing: {:?}", rules.title);
        if !rules.content.is_empty() {
            info!("Ignoring files with content containing: {:?}", rules.content);
        }
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// Whether a directory path (relative to the walk root) is excluded
    pub fn ignores_dir(&self, relative: &Path) -> bool {
        let path = relative.to_string_lossy();
        self.title.iter().any(|t| path.contains(t.as_str()))
    }

    pub fn ignores_name(&self, name: &str) -> bool {
        self.title.iter().any(|t| name.contains(t.as_str()))
    }

    pub fn ignores_content(&self, content: &str) -> bool {
        self.content.iter().any(|c| content.contains(c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_partial_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ignore.json");
        std::fs::write(&path, r#"{"title": ["skip_me", "vendor"]}"#).unwrap();

        let rules = IgnoreRules::load(&path).await.unwrap();
        assert_eq!(rules.title, vec!["skip_me", "vendor"]);
        assert!(rules.content.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = IgnoreRules::load(&dir.path().join("absent.json")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IGNORE_FILE_NOT_FOUND);
        assert!(err.to_string().contains("Error reading ignore file"));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ignore.json");
        std::fs::write(&path, r#"{"title": "not-a-list"}"#).unwrap();

        let err = IgnoreRules::load(&path).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IGNORE_FILE_MALFORMED);
    }

    #[test]
    fn test_matching() {
        let rules = IgnoreRules::new(vec!["skip_me".into()], vec!["DO NOT INSTRUMENT".into()]);
        assert!(rules.ignores_dir(Path::new("a/skip_me_dir")));
        assert!(!rules.ignores_dir(Path::new("a/ok")));
        assert!(rules.ignores_name("skip_me.py"));
        assert!(rules.ignores_content("# DO NOT INSTRUMENT\nx = 1"));
        assert!(!IgnoreRules::default().ignores_name("anything.py"));
    }
}
