//! Runtime configuration
//!
//! Configuration is read from a TOML file (explicit path, or `config.toml` in
//! the platform config directory) and then overridden by `DYNARUN_*`
//! environment variables.

use crate::error::{common, DynarunError, ErrorCode, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Instrumenter invoked once per source file
pub const DEFAULT_INSTRUMENTER: &[&str] = &["python", "-m", "dynapyt.instrument.instrument"];

/// Jobs a worker runs before it is retired and replaced
pub const DEFAULT_MAX_JOBS_PER_WORKER: usize = 5;

/// Get the platform configuration directory for dynarun
pub fn get_global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "dynarun", "dynarun").map(|dirs| dirs.config_dir().to_path_buf())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DynarunConfig {
    /// Root for analyses files and default output/coverage directories
    pub temp_dir: PathBuf,
    /// Interpreter used to run program and module entries
    pub interpreter: String,
    /// Argv prefix of the external instrumentation tool
    pub instrumenter: Vec<String>,
    /// Extension (without dot) identifying instrumentable source files
    pub source_extension: String,
    /// File that marks a directory as an importable package
    pub package_init_file: String,
    /// Worker count; defaults to available parallelism
    pub workers: Option<usize>,
    pub max_jobs_per_worker: usize,
    /// Extra search paths for module entries
    pub module_paths: Vec<PathBuf>,
}

impl Default for DynarunConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            interpreter: "python".to_string(),
            instrumenter: DEFAULT_INSTRUMENTER.iter().map(|s| s.to_string()).collect(),
            source_extension: "py".to_string(),
            package_init_file: "__init__.py".to_string(),
            workers: None,
            max_jobs_per_worker: DEFAULT_MAX_JOBS_PER_WORKER,
            module_paths: Vec::new(),
        }
    }
}

impl DynarunConfig {
    /// Load configuration: explicit file, then the global config file, then defaults.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(common::config_not_found(path));
                }
                Self::from_file(path)?
            }
            None => match get_global_config_dir().map(|dir| dir.join("config.toml")) {
                Some(global) if global.exists() => Self::from_file(&global)?,
                _ => Self::default(),
            },
        };

        config.merge_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| common::config_not_found(path).with_source(e))?;
        let config: DynarunConfig = toml::from_str(&content)
            .map_err(|e| DynarunError::from(e).with_context(path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn merge_env_vars(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("DYNARUN_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }

        if let Ok(interpreter) = std::env::var("DYNARUN_INTERPRETER") {
            self.interpreter = interpreter;
        }

        if let Ok(instrumenter) = std::env::var("DYNARUN_INSTRUMENTER") {
            self.instrumenter = shell_words::split(&instrumenter).map_err(|e| {
                DynarunError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("DYNARUN_INSTRUMENTER is not a valid command line: {instrumenter}"),
                )
                .with_source(e)
            })?;
        }

        if let Ok(workers) = std::env::var("DYNARUN_WORKERS") {
            self.workers = Some(parse_count("DYNARUN_WORKERS", &workers)?);
        }

        if let Ok(max_jobs) = std::env::var("DYNARUN_MAX_JOBS_PER_WORKER") {
            self.max_jobs_per_worker = parse_count("DYNARUN_MAX_JOBS_PER_WORKER", &max_jobs)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.instrumenter.is_empty() {
            return Err(DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "instrumenter command must not be empty",
            ));
        }
        if self.max_jobs_per_worker == 0 {
            return Err(DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "max_jobs_per_worker must be at least 1",
            ));
        }
        if self.workers == Some(0) {
            return Err(DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "workers must be at least 1",
            ));
        }
        Ok(())
    }

    /// Worker count, falling back to the machine's available parallelism
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        })
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|e| {
        DynarunError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("{name} must be a positive integer, got '{value}'"),
        )
        .with_source(e)
    })
}
