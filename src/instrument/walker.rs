use crate::error::{DynarunError, ErrorCode, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{IgnoreRules, Ignored, MIRROR_DIR};

/// Source files selected for instrumentation, plus everything skipped
#[derive(Debug, Default)]
pub struct WalkResult {
    pub sources: Vec<PathBuf>,
    pub ignored: Vec<Ignored>,
}

/// Walk `root` depth-first, applying `rules` to every source file with
/// extension `extension`
///
/// An excluded directory is skipped with its whole subtree. Content rules are
/// checked only for files that passed the title rules. A mirror directory
/// directly under `root` is never walked.
pub fn collect_sources(root: &Path, rules: &IgnoreRules, extension: &str) -> Result<WalkResult> {
    let mut result = WalkResult::default();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                "Failed to walk source tree",
                e.path().map(Path::to_path_buf),
            )
            .with_source(e)
        })?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if entry.file_type().is_dir() {
            if entry.depth() == 0 {
                continue;
            }
            if entry.depth() == 1 && entry.file_name() == MIRROR_DIR {
                walker.skip_current_dir();
                continue;
            }
            if rules.ignores_dir(relative) {
                info!("Ignoring directory {}", path.display());
                result.ignored.push(Ignored::Directory(path.to_path_buf()));
                walker.skip_current_dir();
            }
            continue;
        }

        if path.extension().map_or(true, |ext| ext != extension) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if rules.ignores_name(&name) {
            info!("Ignoring file {}", path.display());
            result.ignored.push(Ignored::File(path.to_path_buf()));
            continue;
        }

        if !rules.content.is_empty() {
            match std::fs::read(path) {
                Ok(bytes) if rules.ignores_content(&String::from_utf8_lossy(&bytes)) => {
                    info!("Ignoring file {} by content", path.display());
                    result.ignored.push(Ignored::Content(path.to_path_buf()));
                    continue;
                }
                Ok(_) => {}
                Err(e) => warn!("Could not read {} for content rules: {}", path.display(), e),
            }
        }

        debug!("Selected {}", path.display());
        result.sources.push(path.to_path_buf());
    }

    Ok(result)
}
