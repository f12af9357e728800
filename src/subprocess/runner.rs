use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::error::ProcessError;

/// Where a child's standard streams are connected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// stdin is closed; stdout and stderr are collected into [`ProcessOutput`]
    #[default]
    Capture,
    /// The child shares this process's stdin, stdout and stderr
    Inherit,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Variables stripped from the inherited parent environment
    pub env_remove: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl ProcessCommand {
    /// The command line as it would be typed in a shell, for logs and errors
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, shell_words::join(&self.args))
        }
    }

    fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        for key in &self.env_remove {
            cmd.env_remove(key);
        }
        cmd.envs(&self.env);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match self.stdio {
            StdioMode::Capture => {
                cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            StdioMode::Inherit => {
                cmd.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Result of a finished child; streams are empty under [`StdioMode::Inherit`]
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            return ExitStatus::Success;
        }
        if let Some(code) = status.code() {
            return ExitStatus::Error(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signal(signal);
            }
        }
        ExitStatus::Error(1)
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "exit code 0"),
            ExitStatus::Error(code) => write!(f, "exit code {code}"),
            ExitStatus::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        debug!("Executing subprocess: {}", command.display());
        trace!(
            "env overrides {:?}, removals {:?}, cwd {:?}, stdio {:?}",
            command.env,
            command.env_remove,
            command.working_dir,
            command.stdio
        );
        let started = Instant::now();

        let mut child = command.to_tokio().spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessError::CommandNotFound(command.program.clone()),
            _ => ProcessError::Io(e),
        })?;

        let (status, stdout, stderr) = match command.stdio {
            StdioMode::Inherit => (child.wait().await?, String::new(), String::new()),
            StdioMode::Capture => {
                let output = child.wait_with_output().await?;
                (
                    output.status,
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                )
            }
        };

        let output = ProcessOutput {
            status: ExitStatus::from(status),
            stdout,
            stderr,
            duration: started.elapsed(),
        };
        debug!(
            "Subprocess finished with {} in {:?}: {}",
            output.status,
            output.duration,
            command.program
        );
        if !output.status.success() && !output.stderr.is_empty() {
            trace!("Stderr: {}", output.stderr);
        }
        Ok(output)
    }
}
