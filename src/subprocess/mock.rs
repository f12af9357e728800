use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Scripted [`ProcessRunner`] that records every command it is given
///
/// Expectations are tried in registration order; the first whose program
/// and argument matcher accept the command decides the result.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<Expectation>>>,
    calls: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct Expectation {
    program: String,
    args: Option<ArgsMatcher>,
    /// `None` simulates a program that cannot be spawned
    status: Option<ExitStatus>,
}

impl Expectation {
    fn accepts(&self, command: &ProcessCommand) -> bool {
        self.program == command.program && self.args.as_ref().map_or(true, |m| m(&command.args))
    }
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: Expectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an expectation for `program`; it succeeds unless configured otherwise
    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: Expectation {
                program: program.to_string(),
                args: None,
                status: Some(ExitStatus::Success),
            },
        }
    }

    /// Every command run so far, in call order
    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.clone());

        let expectations = self.expectations.lock().unwrap();
        let Some(expectation) = expectations.iter().find(|e| e.accepts(&command)) else {
            return Err(ProcessError::Unexpected(command.display()));
        };
        match &expectation.status {
            Some(status) => Ok(ProcessOutput {
                status: status.clone(),
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            }),
            None => Err(ProcessError::CommandNotFound(command.program.clone())),
        }
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args = Some(Box::new(matcher));
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.status = Some(match code {
            0 => ExitStatus::Success,
            code => ExitStatus::Error(code),
        });
        self
    }

    pub fn returns_success(self) -> Self {
        self.returns_exit_code(0)
    }

    /// Simulate a program that cannot be spawned
    pub fn fails_to_spawn(mut self) -> Self {
        self.expectation.status = None;
        self
    }

    pub fn finish(self) {
        self.runner.expectations.lock().unwrap().push(self.expectation);
    }
}
