//! Batch instrumentation of a source tree
//!
//! The driver walks a directory, filters it through an ignore file and runs
//! the external instrumenter once per remaining source file over a bounded
//! [`WorkerPool`]. A failing file never aborts the batch; failures are
//! collected in the [`BatchReport`].

pub mod driver;
pub mod ignore;
pub mod mirror;
pub mod pool;
pub mod walker;

pub use driver::InstrumentationDriver;
pub use ignore::IgnoreRules;
pub use mirror::mirror_tree;
pub use pool::{PoolMetrics, WorkerPool};
pub use walker::{collect_sources, WalkResult};

use crate::subprocess::ProcessCommand;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory created under the root when instrumenting an external copy
pub const MIRROR_DIR: &str = "dynarun_analysis";

/// A path excluded from instrumentation and the rule that excluded it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ignored {
    /// Directory path matched a title rule; its subtree was not walked
    Directory(PathBuf),
    /// File name matched a title rule
    File(PathBuf),
    /// File content matched a content rule
    Content(PathBuf),
}

impl Ignored {
    pub fn path(&self) -> &Path {
        match self {
            Ignored::Directory(path) | Ignored::File(path) | Ignored::Content(path) => path,
        }
    }
}

/// One source file to transform
#[derive(Debug, Clone)]
pub struct InstrumentationJob {
    pub source_file: PathBuf,
    pub command: ProcessCommand,
    /// Analysis the file is instrumented for, also passed in `command`
    pub analysis_spec: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        source_file: PathBuf,
        duration: Duration,
    },
    Failed {
        source_file: PathBuf,
        reason: String,
        /// `None` when the instrumenter could not be spawned or was killed
        exit_code: Option<i32>,
    },
}

impl JobOutcome {
    pub fn source_file(&self) -> &Path {
        match self {
            JobOutcome::Succeeded { source_file, .. } | JobOutcome::Failed { source_file, .. } => {
                source_file
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Parameters of one instrumentation batch
#[derive(Debug, Clone)]
pub struct InstrumentRequest {
    pub root_dir: PathBuf,
    /// Analysis spec forwarded verbatim to the instrumenter
    pub analysis_spec: String,
    pub ignore_file: Option<PathBuf>,
    /// Module search paths forwarded to the instrumenter
    pub module_paths: Option<String>,
    /// Instrument a mirror copy instead of the tree itself
    pub external_copy: bool,
}

impl InstrumentRequest {
    pub fn new(root_dir: impl Into<PathBuf>, analysis_spec: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            analysis_spec: analysis_spec.into(),
            ignore_file: None,
            module_paths: None,
            external_copy: false,
        }
    }

    pub fn with_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = Some(path.into());
        self
    }

    pub fn with_module_paths(mut self, paths: impl Into<String>) -> Self {
        self.module_paths = Some(paths.into());
        self
    }

    pub fn with_external_copy(mut self, external_copy: bool) -> Self {
        self.external_copy = external_copy;
        self
    }
}

/// Result of a batch; outcomes are sorted by source path
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Tree that was instrumented (the mirror for external copies)
    pub root: PathBuf,
    pub outcomes: Vec<JobOutcome>,
    pub ignored: Vec<Ignored>,
    pub duration: Duration,
    pub metrics: PoolMetrics,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_success())
    }
}
