//! Per-session filesystem layout
//!
//! Every path is keyed by the session id so concurrent sessions never share
//! a directory.

use crate::error::{DynarunError, ErrorCode, Result};
use crate::plugin::PluginSpec;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::SessionId;

pub const OUTPUT_DIR_PREFIX: &str = "dynarun_output-";
pub const COVERAGE_DIR_PREFIX: &str = "dynarun_coverage-";
pub const ANALYSES_FILE_PREFIX: &str = "dynarun_analyses-";

pub fn output_dir(root: &Path, id: &SessionId) -> PathBuf {
    root.join(format!("{OUTPUT_DIR_PREFIX}{id}"))
}

pub fn coverage_dir(root: &Path, id: &SessionId) -> PathBuf {
    root.join(format!("{COVERAGE_DIR_PREFIX}{id}"))
}

pub fn analyses_file(temp_dir: &Path, id: &SessionId) -> PathBuf {
    temp_dir.join(format!("{ANALYSES_FILE_PREFIX}{id}.txt"))
}

/// Delete `dir` if present, then create it empty
pub async fn recreate_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        debug!("Discarding previous contents of {}", dir.display());
        tokio::fs::remove_dir_all(dir).await.map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to remove existing directory",
                Some(dir.to_path_buf()),
            )
            .with_source(e)
        })?;
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        DynarunError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            "Failed to create directory",
            Some(dir.to_path_buf()),
        )
        .with_source(e)
    })
}

/// Write one canonical spec per line, replacing any existing file
pub async fn write_analyses_file(path: &Path, specs: &[PluginSpec]) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path).await.map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to remove stale analyses file",
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })?;
    }

    let mut content = specs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    tokio::fs::write(path, content).await.map_err(|e| {
        DynarunError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            "Failed to write analyses file",
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;
    debug!("Wrote {} analysis specs to {}", specs.len(), path.display());
    Ok(())
}
