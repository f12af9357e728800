use crate::config::DynarunConfig;
use crate::error::{DynarunError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The program a session executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// A standalone program file
    Program { path: PathBuf },
    /// An importable module, found as `path` beneath search root `root`
    Module {
        name: String,
        root: PathBuf,
        path: PathBuf,
    },
}

impl Entry {
    /// The source file that will run first
    pub fn source_file(&self) -> &Path {
        match self {
            Entry::Program { path } | Entry::Module { path, .. } => path,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, Entry::Module { .. })
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Program { path } => write!(f, "{}", path.display()),
            Entry::Module { name, .. } => write!(f, "{name}"),
        }
    }
}

/// Resolves an entry string to a program file or a module
///
/// An existing file is a program. Otherwise a dotted name `a.b.c` is a
/// module when `a/b/c.<ext>` or `a/b/c/<package init file>` exists under one
/// of the search roots, tried in order.
#[derive(Debug, Clone)]
pub struct EntryResolver {
    search_paths: Vec<PathBuf>,
    source_extension: String,
    package_init_file: String,
}

impl EntryResolver {
    pub fn new(
        search_paths: Vec<PathBuf>,
        source_extension: impl Into<String>,
        package_init_file: impl Into<String>,
    ) -> Self {
        Self {
            search_paths,
            source_extension: source_extension.into(),
            package_init_file: package_init_file.into(),
        }
    }

    /// Search the configured module paths, then the working directory
    pub fn from_config(config: &DynarunConfig) -> Self {
        let mut search_paths = config.module_paths.clone();
        if let Ok(cwd) = std::env::current_dir() {
            search_paths.push(cwd);
        }
        Self::new(
            search_paths,
            config.source_extension.clone(),
            config.package_init_file.clone(),
        )
    }

    pub fn resolve(&self, entry: &str) -> Result<Entry> {
        let candidate = Path::new(entry);
        if candidate.is_file() {
            let path = std::path::absolute(candidate)
                .map_err(|e| DynarunError::entry_not_found(entry).with_source(e))?;
            debug!("Entry {} is a program file", path.display());
            return Ok(Entry::Program { path });
        }

        if is_module_name(entry) {
            if let Some((root, path)) = self.find_module(entry) {
                debug!("Entry {} is a module at {}", entry, path.display());
                return Ok(Entry::Module {
                    name: entry.to_string(),
                    root,
                    path,
                });
            }
        }

        Err(DynarunError::entry_not_found(entry))
    }

    fn find_module(&self, name: &str) -> Option<(PathBuf, PathBuf)> {
        let relative: PathBuf = name.split('.').collect();
        self.search_paths.iter().find_map(|root| {
            let base = root.join(&relative);
            let module_file = base.with_extension(&self.source_extension);
            if module_file.is_file() {
                return Some((root.clone(), module_file));
            }
            let package_init = base.join(&self.package_init_file);
            package_init
                .is_file()
                .then(|| (root.clone(), package_init))
        })
    }
}

fn is_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
