//! Analysis sessions
//!
//! A session is one end-to-end run of an entry program under a set of
//! analyses. It owns a fresh identifier, an output directory, an optional
//! coverage directory and the analyses file read by instrumented code. The
//! [`SessionManager`] drives the phases in order: directory setup, initial
//! configuration, analysis activation, entry execution and teardown.

pub mod entry;
pub mod layout;
pub mod lifecycle;
pub mod manager;
pub mod program;

pub use entry::{Entry, EntryResolver};
pub use lifecycle::LifecycleScope;
pub use manager::SessionManager;
pub use program::{EntryStatus, InjectedContext, ProcessProgramLoader, ProgramInvocation, ProgramLoader};

use crate::coverage::CoverageMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Caller-supplied knobs for a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Free-form label carried into the report
    pub name: Option<String>,
    pub coverage: bool,
    /// Parent of the coverage directory; defaults to the configured temp dir
    pub coverage_root: Option<PathBuf>,
    /// Parent of the output directory; defaults to the configured temp dir
    pub output_root: Option<PathBuf>,
    /// Plugin spec of an initial configuration run before the entry
    pub init: Option<String>,
    pub entry_args: Vec<String>,
}

/// Everything needed to start a session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Program path or dotted module name
    pub entry: String,
    /// Plugin specs of the analyses to activate, in activation order
    pub analyses: Vec<String>,
    pub options: SessionOptions,
}

impl SessionRequest {
    pub fn new<I, S>(entry: impl Into<String>, analyses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entry: entry.into(),
            analyses: analyses.into_iter().map(Into::into).collect(),
            options: SessionOptions::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn with_coverage(mut self, coverage: bool) -> Self {
        self.options.coverage = coverage;
        self
    }

    pub fn with_coverage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.coverage_root = Some(root.into());
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.output_root = Some(root.into());
        self
    }

    pub fn with_init(mut self, spec: impl Into<String>) -> Self {
        self.options.init = Some(spec.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.entry_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Context of a running session, shared by reference with every phase
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub name: Option<String>,
    pub output_dir: PathBuf,
    pub coverage_dir: Option<PathBuf>,
    pub analyses_file: PathBuf,
    pub entry: Entry,
    /// The entry exactly as the caller wrote it
    pub entry_arg: String,
    pub entry_args: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Argument vector observed by the entry: the caller's entry string,
    /// then its args
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.entry_arg.clone())
            .chain(self.entry_args.iter().cloned())
            .collect()
    }

    pub fn injected_context(&self) -> InjectedContext {
        InjectedContext {
            session_id: self.id,
            is_main: true,
            entry_file: self.entry.source_file().to_path_buf(),
            output_dir: self.output_dir.clone(),
            coverage_dir: self.coverage_dir.clone(),
            analyses_file: self.analyses_file.clone(),
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entry: String,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_dir: Option<PathBuf>,
    pub analyses_file: PathBuf,
    pub entry_status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMap>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn succeeded(&self) -> bool {
        self.entry_status.success()
    }
}
