//! Coverage aggregation
//!
//! Coverage is counted per file, per line, per analysis. Maps from separate
//! runs combine by adding counts, so merging is commutative and associative
//! with the empty map as identity.

use crate::error::{DynarunError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Hit counts for one line, keyed by analysis name
pub type LineCoverage = BTreeMap<String, u64>;

/// Coverage for one file, keyed by line number
pub type FileCoverage = BTreeMap<u32, LineCoverage>;

/// `{ "<file>": { "<line>": { "<analysis>": count } } }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageMap {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` hits for `analysis` at `file:line`
    pub fn record(&mut self, file: impl Into<String>, line: u32, analysis: impl Into<String>, count: u64) {
        let slot = self
            .files
            .entry(file.into())
            .or_default()
            .entry(line)
            .or_default()
            .entry(analysis.into())
            .or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Hits recorded for `analysis` at `file:line`; missing entries are zero
    pub fn hits(&self, file: &str, line: u32, analysis: &str) -> u64 {
        self.files
            .get(file)
            .and_then(|lines| lines.get(&line))
            .and_then(|analyses| analyses.get(analysis))
            .copied()
            .unwrap_or(0)
    }

    /// Combine with `other`, consuming `self`
    pub fn merge(mut self, other: &CoverageMap) -> Self {
        merge(&mut self, other);
        self
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn file(&self, file: &str) -> Option<&FileCoverage> {
        self.files.get(file)
    }

    /// Sum of every count in the map, saturating
    pub fn total_hits(&self) -> u64 {
        self.files
            .values()
            .flat_map(|lines| lines.values())
            .flat_map(|analyses| analyses.values())
            .fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_SERIALIZATION_ERROR,
                "Failed to serialize coverage",
                None,
            )
            .with_source(e)
        })
    }
}

/// Add every count in `incoming` into `base`
pub fn merge<'a>(base: &'a mut CoverageMap, incoming: &CoverageMap) -> &'a mut CoverageMap {
    for (file, lines) in &incoming.files {
        let base_lines = base.files.entry(file.clone()).or_default();
        for (line, analyses) in lines {
            let base_analyses = base_lines.entry(*line).or_default();
            for (analysis, count) in analyses {
                let slot = base_analyses.entry(analysis.clone()).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
        }
    }
    base
}

/// Merge every `*.json` coverage file in `dir`
///
/// A missing directory yields an empty map. Files are read in name order.
pub async fn gather_coverage(dir: &Path) -> Result<CoverageMap> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No coverage directory at {}", dir.display());
            return Ok(CoverageMap::new());
        }
        Err(e) => {
            return Err(DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to read coverage directory",
                Some(dir.to_path_buf()),
            )
            .with_source(e))
        }
    };

    let mut files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut merged = CoverageMap::new();
    for path in &files {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to read coverage file",
                Some(path.clone()),
            )
            .with_source(e)
        })?;
        let map: CoverageMap = serde_json::from_str(&content).map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_DESERIALIZATION_ERROR,
                format!("Invalid coverage data in {}", path.display()),
                Some(path.clone()),
            )
            .with_source(e)
        })?;
        merge(&mut merged, &map);
    }

    if files.is_empty() {
        warn!("Coverage was requested but {} holds no coverage files", dir.display());
    } else {
        debug!(
            "Merged {} coverage files from {} ({} hits)",
            files.len(),
            dir.display(),
            merged.total_hits()
        );
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample(entries: &[(&str, u32, &str, u64)]) -> CoverageMap {
        let mut map = CoverageMap::new();
        for (file, line, analysis, count) in entries {
            map.record(*file, *line, *analysis, *count);
        }
        map
    }

    #[test]
    fn test_merge_adds_overlapping_counts() {
        let mut base = sample(&[("a.py", 1, "Trace", 2), ("a.py", 2, "Trace", 1)]);
        let incoming = sample(&[("a.py", 1, "Trace", 3), ("b.py", 7, "Calls", 4)]);

        merge(&mut base, &incoming);

        assert_eq!(base.hits("a.py", 1, "Trace"), 5);
        assert_eq!(base.hits("a.py", 2, "Trace"), 1);
        assert_eq!(base.hits("b.py", 7, "Calls"), 4);
        assert_eq!(base.hits("b.py", 8, "Calls"), 0);
        assert_eq!(base.total_hits(), 10);
    }

    #[test]
    fn test_merge_saturates() {
        let base = sample(&[("a.py", 1, "Trace", u64::MAX - 1)]);
        let merged = base.merge(&sample(&[("a.py", 1, "Trace", 10)]));
        assert_eq!(merged.hits("a.py", 1, "Trace"), u64::MAX);
    }

    #[test]
    fn test_json_shape_uses_string_keys() {
        let map = sample(&[("src/app.py", 12, "Trace", 3)]);
        let json: serde_json::Value = serde_json::from_str(&map.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["src/app.py"]["12"]["Trace"], 3);

        let parsed = CoverageMap::from_json(r#"{"x.py": {"4": {"A": 1}}}"#).unwrap();
        assert_eq!(parsed.hits("x.py", 4, "A"), 1);
    }

    #[tokio::test]
    async fn test_gather_coverage_merges_every_json_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("coverage-1.json"),
            r#"{"a.py": {"1": {"Trace": 1}}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("coverage-2.json"),
            r#"{"a.py": {"1": {"Trace": 2}}, "b.py": {"3": {"Trace": 1}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not coverage").unwrap();

        let merged = gather_coverage(dir.path()).await.unwrap();
        assert_eq!(merged.hits("a.py", 1, "Trace"), 3);
        assert_eq!(merged.files().collect::<Vec<_>>(), vec!["a.py", "b.py"]);
    }

    #[tokio::test]
    async fn test_gather_coverage_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let merged = gather_coverage(&dir.path().join("absent")).await.unwrap();
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn test_gather_coverage_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = gather_coverage(dir.path()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_DESERIALIZATION_ERROR);
        assert!(err.to_string().contains("broken.json"));
    }

    fn coverage_strategy() -> impl Strategy<Value = CoverageMap> {
        prop::collection::vec(
            ("[ab]\\.py", 1u32..5, "[XY]", 0u64..1_000),
            0..12,
        )
        .prop_map(|entries| {
            let mut map = CoverageMap::new();
            for (file, line, analysis, count) in entries {
                map.record(file, line, analysis, count);
            }
            map
        })
    }

    proptest! {
        #[test]
        fn prop_merge_is_commutative(a in coverage_strategy(), b in coverage_strategy()) {
            prop_assert_eq!(a.clone().merge(&b), b.merge(&a));
        }

        #[test]
        fn prop_merge_is_associative(
            a in coverage_strategy(),
            b in coverage_strategy(),
            c in coverage_strategy(),
        ) {
            let left = a.clone().merge(&b).merge(&c);
            let right = a.merge(&b.merge(&c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_empty_map_is_identity(a in coverage_strategy()) {
            prop_assert_eq!(a.clone().merge(&CoverageMap::new()), a.clone());
            prop_assert_eq!(CoverageMap::new().merge(&a), a);
        }

        #[test]
        fn prop_merge_never_decreases_counts(a in coverage_strategy(), b in coverage_strategy()) {
            let merged = a.clone().merge(&b);
            prop_assert_eq!(merged.total_hits(), a.total_hits() + b.total_hits());
        }
    }
}
