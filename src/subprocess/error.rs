use crate::error::{DynarunError, ErrorCode};

/// Failure to run a child at all; a child that runs and exits non-zero is
/// reported through [`super::ExitStatus`] instead
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No mock expectation for {0}")]
    Unexpected(String),
}

impl From<ProcessError> for DynarunError {
    fn from(err: ProcessError) -> Self {
        let (code, command) = match &err {
            ProcessError::CommandNotFound(program) => {
                (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(program.clone()))
            }
            ProcessError::Io(_) => (ErrorCode::EXEC_SPAWN_FAILED, None),
            ProcessError::Unexpected(command) => (ErrorCode::EXEC_GENERIC, Some(command.clone())),
        };
        DynarunError::execution_with_code(code, err.to_string(), command).with_source(err)
    }
}
