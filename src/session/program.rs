//! Running the entry program
//!
//! The orchestrator never executes target code itself. It hands a
//! [`ProgramInvocation`] to a [`ProgramLoader`], which runs the entry with
//! exactly the given argument vector and exposes the [`InjectedContext`] to
//! it. [`ProcessProgramLoader`] does this by launching the configured
//! interpreter and passing the context as environment variables.

use crate::error::{DynarunError, ErrorCode, Result};
use crate::plugin::HookDispatcher;
use crate::subprocess::{ExitStatus, ProcessCommandBuilder, StdioMode, SubprocessManager};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{Entry, SessionId};

pub const ENV_SESSION_ID: &str = "DYNARUN_SESSION_ID";
pub const ENV_COVERAGE: &str = "DYNARUN_COVERAGE";
pub const ENV_OUTPUT_DIR: &str = "DYNARUN_OUTPUT_DIR";
pub const ENV_ANALYSES_FILE: &str = "DYNARUN_ANALYSES_FILE";
pub const ENV_MAIN: &str = "DYNARUN_MAIN";
pub const ENV_ENTRY_FILE: &str = "DYNARUN_ENTRY_FILE";

/// Identity and location values the entry program can observe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedContext {
    pub session_id: SessionId,
    /// The entry runs as the main program
    pub is_main: bool,
    pub entry_file: PathBuf,
    pub output_dir: PathBuf,
    pub coverage_dir: Option<PathBuf>,
    pub analyses_file: PathBuf,
}

impl InjectedContext {
    /// Context rendered as environment variables, in a stable order
    ///
    /// The coverage variable is present only when coverage is enabled.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (ENV_SESSION_ID, self.session_id.to_string()),
            (ENV_OUTPUT_DIR, self.output_dir.display().to_string()),
            (ENV_ANALYSES_FILE, self.analyses_file.display().to_string()),
            (ENV_ENTRY_FILE, self.entry_file.display().to_string()),
        ];
        if self.is_main {
            vars.push((ENV_MAIN, "1".to_string()));
        }
        if let Some(dir) = &self.coverage_dir {
            vars.push((ENV_COVERAGE, dir.display().to_string()));
        }
        vars
    }
}

#[derive(Debug, Clone)]
pub struct ProgramInvocation {
    pub entry: Entry,
    /// `argv[0]` is the entry; the rest are caller-supplied arguments
    pub argv: Vec<String>,
    pub context: InjectedContext,
}

impl ProgramInvocation {
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// How the entry program ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Succeeded,
    Failed { exit_code: i32 },
    Signaled { signal: i32 },
}

impl EntryStatus {
    pub fn success(&self) -> bool {
        matches!(self, EntryStatus::Succeeded)
    }
}

impl From<ExitStatus> for EntryStatus {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => EntryStatus::Succeeded,
            ExitStatus::Error(exit_code) => EntryStatus::Failed { exit_code },
            ExitStatus::Signal(signal) => EntryStatus::Signaled { signal },
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Succeeded => write!(f, "succeeded"),
            EntryStatus::Failed { exit_code } => write!(f, "failed with exit code {exit_code}"),
            EntryStatus::Signaled { signal } => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Runs an entry program with an injected context
///
/// A program that runs and fails is an `Ok` with a failed [`EntryStatus`];
/// `Err` means the program could not be run at all. Loaders that execute the
/// program in-process forward its hook events through `hooks`.
#[async_trait]
pub trait ProgramLoader: Send + Sync {
    async fn run(
        &self,
        invocation: &ProgramInvocation,
        hooks: &mut HookDispatcher<'_>,
    ) -> Result<EntryStatus>;
}

/// Runs the entry through an interpreter subprocess
///
/// Programs run as `<interpreter> <file> args...`, modules as
/// `<interpreter> -m <module> args...` from their search root. The child
/// shares this process's stdin, stdout and stderr unless the loader is quiet.
pub struct ProcessProgramLoader {
    subprocess: SubprocessManager,
    interpreter: String,
    stdio: StdioMode,
}

impl ProcessProgramLoader {
    pub fn new(subprocess: SubprocessManager, interpreter: impl Into<String>) -> Self {
        Self {
            subprocess,
            interpreter: interpreter.into(),
            stdio: StdioMode::Inherit,
        }
    }

    /// Close the child's stdin and discard its output
    pub fn quiet(mut self) -> Self {
        self.stdio = StdioMode::Capture;
        self
    }

    fn build_command(&self, invocation: &ProgramInvocation) -> crate::subprocess::ProcessCommand {
        let mut builder = ProcessCommandBuilder::new(&self.interpreter);
        builder = match &invocation.entry {
            Entry::Program { path } => builder.arg(&path.display().to_string()),
            Entry::Module { name, root, .. } => builder.arg("-m").arg(name).current_dir(root),
        };
        builder = builder.args(invocation.args());
        if self.stdio == StdioMode::Inherit {
            builder = builder.inherit_stdio();
        }

        if invocation.context.coverage_dir.is_none() {
            builder = builder.env_remove(ENV_COVERAGE);
        }
        builder.envs(invocation.context.env_vars()).build()
    }
}

#[async_trait]
impl ProgramLoader for ProcessProgramLoader {
    /// Hooks fire inside the child process, which reads the analyses file
    async fn run(
        &self,
        invocation: &ProgramInvocation,
        _hooks: &mut HookDispatcher<'_>,
    ) -> Result<EntryStatus> {
        let command = self.build_command(invocation);
        debug!("Running entry: {}", command.display());

        let output = self.subprocess.runner().run(command).await.map_err(|e| {
            DynarunError::session_with_code(
                ErrorCode::SESSION_ENTRY_FAILED,
                format!("Could not run entry {}", invocation.entry),
                Some(invocation.context.session_id.to_string()),
            )
            .with_source(DynarunError::from(e))
        })?;

        let status = EntryStatus::from(output.status);
        if !status.success() {
            warn!("Entry {} {}", invocation.entry, status);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(entry: Entry, coverage_dir: Option<PathBuf>) -> ProgramInvocation {
        let entry_file = entry.source_file().to_path_buf();
        ProgramInvocation {
            argv: vec![entry.to_string(), "--flag".into(), "value".into()],
            entry,
            context: InjectedContext {
                session_id: SessionId::new(),
                is_main: true,
                entry_file,
                output_dir: PathBuf::from("/tmp/out"),
                coverage_dir,
                analyses_file: PathBuf::from("/tmp/analyses.txt"),
            },
        }
    }

    #[tokio::test]
    async fn test_program_entry_command_and_env() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("python")
            .with_args(|args| args == &["/work/app.py", "--flag", "value"])
            .returns_success()
            .finish();

        let loader = ProcessProgramLoader::new(subprocess, "python").quiet();
        let run = invocation(
            Entry::Program {
                path: PathBuf::from("/work/app.py"),
            },
            Some(PathBuf::from("/tmp/cov")),
        );
        let status = loader.run(&run, &mut HookDispatcher::new(&mut [])).await.unwrap();
        assert_eq!(status, EntryStatus::Succeeded);

        let history = mock.get_call_history();
        let env = &history[0].env;
        assert_eq!(env.get(ENV_MAIN).map(String::as_str), Some("1"));
        assert_eq!(env.get(ENV_ENTRY_FILE).map(String::as_str), Some("/work/app.py"));
        assert_eq!(env.get(ENV_COVERAGE).map(String::as_str), Some("/tmp/cov"));
        assert!(history[0].env_remove.is_empty());
    }

    #[tokio::test]
    async fn test_module_entry_strips_stale_coverage() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("python3")
            .with_args(|args| args == &["-m", "pkg.tool", "--flag", "value"])
            .returns_exit_code(3)
            .finish();

        let loader = ProcessProgramLoader::new(subprocess, "python3").quiet();
        let run = invocation(
            Entry::Module {
                name: "pkg.tool".into(),
                root: PathBuf::from("/work"),
                path: PathBuf::from("/work/pkg/tool.py"),
            },
            None,
        );
        let status = loader.run(&run, &mut HookDispatcher::new(&mut [])).await.unwrap();
        assert_eq!(status, EntryStatus::Failed { exit_code: 3 });

        let history = mock.get_call_history();
        assert_eq!(history[0].working_dir, Some(PathBuf::from("/work")));
        assert!(!history[0].env.contains_key(ENV_COVERAGE));
        assert_eq!(history[0].env_remove, vec![ENV_COVERAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_unrunnable_interpreter_is_session_error() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("python").fails_to_spawn().finish();

        let loader = ProcessProgramLoader::new(subprocess, "python").quiet();
        let run = invocation(
            Entry::Program {
                path: PathBuf::from("/work/app.py"),
            },
            None,
        );
        let err = loader.run(&run, &mut HookDispatcher::new(&mut [])).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SESSION_ENTRY_FAILED);
    }

    #[tokio::test]
    async fn test_entry_shares_caller_stdio_unless_quiet() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("python").returns_success().finish();
        let run = invocation(
            Entry::Program {
                path: PathBuf::from("/work/app.py"),
            },
            None,
        );

        ProcessProgramLoader::new(subprocess.clone(), "python")
            .run(&run, &mut HookDispatcher::new(&mut []))
            .await
            .unwrap();
        ProcessProgramLoader::new(subprocess, "python")
            .quiet()
            .run(&run, &mut HookDispatcher::new(&mut []))
            .await
            .unwrap();

        let history = mock.get_call_history();
        assert_eq!(history[0].stdio, StdioMode::Inherit);
        assert_eq!(history[1].stdio, StdioMode::Capture);
    }

    #[tokio::test]
    async fn test_entry_output_reaches_caller_directly() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("entry.sh");
        std::fs::write(&script, "echo \"$DYNARUN_MAIN\"\nexit 5\n").unwrap();

        let loader = ProcessProgramLoader::new(SubprocessManager::production(), "sh");
        let run = invocation(Entry::Program { path: script }, None);
        let status = loader.run(&run, &mut HookDispatcher::new(&mut [])).await.unwrap();
        assert_eq!(status, EntryStatus::Failed { exit_code: 5 });
    }
}
