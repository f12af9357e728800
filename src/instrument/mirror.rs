use crate::error::{common, DynarunError, ErrorCode, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::MIRROR_DIR;

/// Copy the tree under `root` into `<root>/<MIRROR_DIR>`, replacing any
/// previous mirror, and return the mirror's path
///
/// The copy is complete when this returns.
pub async fn mirror_tree(root: &Path) -> Result<PathBuf> {
    let root = root.to_path_buf();
    let mirror = root.join(MIRROR_DIR);

    let target = mirror.clone();
    tokio::task::spawn_blocking(move || copy_tree(&root, &target))
        .await
        .map_err(|e| {
            DynarunError::storage_with_code(ErrorCode::STORAGE_IO_ERROR, "Mirror copy task failed", None)
                .with_source(e)
        })??;

    info!("Mirrored source tree into {}", mirror.display());
    Ok(mirror)
}

fn copy_tree(root: &Path, mirror: &Path) -> Result<()> {
    if mirror.exists() {
        debug!("Removing previous mirror {}", mirror.display());
        std::fs::remove_dir_all(mirror).map_err(|e| io_error("remove", mirror, e))?;
    }
    std::fs::create_dir_all(mirror).map_err(|e| io_error("create", mirror, e))?;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == MIRROR_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to walk source tree",
                e.path().map(Path::to_path_buf),
            )
            .with_source(e)
        })?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let destination = mirror.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination).map_err(|e| io_error("create", &destination, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &destination).map_err(|e| io_error("copy", entry.path(), e))?;
        }
    }
    Ok(())
}

fn io_error(operation: &str, path: &Path, source: std::io::Error) -> DynarunError {
    common::storage_io_error(path, operation).with_source(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mirror_copies_tree_and_skips_itself() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        std::fs::write(root.join("pkg/mod.py"), "x = 1").unwrap();
        std::fs::write(root.join("main.py"), "import pkg").unwrap();

        let mirror = mirror_tree(root).await.unwrap();
        assert_eq!(mirror, root.join(MIRROR_DIR));
        assert_eq!(std::fs::read_to_string(mirror.join("pkg/mod.py")).unwrap(), "x = 1");
        assert!(mirror.join("main.py").is_file());
        assert!(!mirror.join(MIRROR_DIR).exists());
    }

    #[tokio::test]
    async fn test_mirror_replaces_previous_copy() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("main.py"), "").unwrap();
        std::fs::create_dir_all(root.join(MIRROR_DIR)).unwrap();
        std::fs::write(root.join(MIRROR_DIR).join("stale.py"), "").unwrap();

        let mirror = mirror_tree(root).await.unwrap();
        assert!(!mirror.join("stale.py").exists());
        assert!(mirror.join("main.py").is_file());
    }
}
