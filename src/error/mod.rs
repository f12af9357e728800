use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::{common, ErrorExt};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for dynarun
#[derive(Error, Debug)]
pub enum DynarunError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Handler '{spec}' is {found}, expected {expected}")]
    TypeMismatch {
        code: u16,
        spec: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("[E{code:04}] Could not load '{spec}': {message}")]
    Load {
        code: u16,
        spec: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Could not find entry {entry}")]
    EntryNotFound { code: u16, entry: String },

    #[error("[E{code:04}] Error reading ignore file {}: {message}", path.display())]
    IgnoreFile {
        code: u16,
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Session error: {message}")]
    Session {
        code: u16,
        message: String,
        session_id: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl DynarunError {
    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn type_mismatch(spec: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            code: ErrorCode::CONFIG_TYPE_MISMATCH,
            spec: spec.into(),
            expected,
            found,
        }
    }

    /// Create a load error for a plugin spec
    pub fn load(code: u16, spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            code,
            spec: spec.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn entry_not_found(entry: impl Into<String>) -> Self {
        Self::EntryNotFound {
            code: ErrorCode::ENTRY_NOT_FOUND,
            entry: entry.into(),
        }
    }

    pub fn ignore_file(code: u16, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IgnoreFile {
            code,
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a session error with specific code and session ID
    pub fn session_with_code(
        code: u16,
        message: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self::Session {
            code,
            message: message.into(),
            session_id,
            source: None,
        }
    }

    /// Create a storage error with default code
    pub fn storage(message: impl Into<String>) -> Self {
        Self::storage_with_code(ErrorCode::STORAGE_GENERIC, message, None)
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create an execution error with specific code
    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        command: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Load { source: src, .. }
            | Self::IgnoreFile { source: src, .. }
            | Self::Session { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Execution { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::TypeMismatch { .. } | Self::EntryNotFound { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Load { message, .. }
            | Self::IgnoreFile { message, .. }
            | Self::Session { message, .. }
            | Self::Storage { message, .. }
            | Self::Execution { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::TypeMismatch { .. } | Self::EntryNotFound { .. } => {}
        }
        self
    }

    /// Attach the session this error belongs to
    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        if let Self::Session { session_id, .. } = &mut self {
            *session_id = Some(id.into());
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::TypeMismatch { .. } => 2,
            Self::Load { .. } => 3,
            Self::EntryNotFound { .. } => 4,
            Self::IgnoreFile { .. } => 5,
            Self::Session { .. } => 6,
            Self::Storage { .. } => 7,
            Self::Execution { .. } => 8,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::TypeMismatch { code, .. }
            | Self::Load { code, .. }
            | Self::EntryNotFound { code, .. }
            | Self::IgnoreFile { code, .. }
            | Self::Session { code, .. }
            | Self::Storage { code, .. }
            | Self::Execution { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::TypeMismatch {
                spec,
                expected,
                found,
                ..
            } => format!("'{}' is {} but {} was required", spec, found, expected),
            Self::Load { spec, message, .. } => format!("Cannot load '{}': {}", spec, message),
            Self::EntryNotFound { entry, .. } => format!("Could not find entry {}", entry),
            Self::IgnoreFile { path, message, .. } => {
                format!("Error reading ignore file {}: {}", path.display(), message)
            }
            Self::Session {
                message,
                session_id,
                ..
            } => {
                if let Some(id) = session_id {
                    format!("Session {} error: {}", id, message)
                } else {
                    format!("Session error: {}", message)
                }
            }
            Self::Storage { message, path, .. } => {
                if let Some(p) = path {
                    format!("Storage error at {}: {}", p.display(), message)
                } else {
                    format!("Storage error: {}", message)
                }
            }
            Self::Execution {
                message, command, ..
            } => {
                if let Some(cmd) = command {
                    format!("Command '{}' failed: {}", cmd, message)
                } else {
                    format!("Execution error: {}", message)
                }
            }
        }
    }
}

/// Type alias for Results using DynarunError
pub type Result<T> = std::result::Result<T, DynarunError>;

impl From<std::io::Error> for DynarunError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::STORAGE_NOT_FOUND, "File or directory not found"),
            ErrorKind::PermissionDenied => {
                (ErrorCode::STORAGE_PERMISSION_DENIED, "Permission denied")
            }
            ErrorKind::AlreadyExists => (ErrorCode::STORAGE_ALREADY_EXISTS, "Already exists"),
            _ => (ErrorCode::STORAGE_IO_ERROR, "IO operation failed"),
        };

        DynarunError::storage_with_code(code, message, None).with_source(err)
    }
}

impl From<serde_json::Error> for DynarunError {
    fn from(err: serde_json::Error) -> Self {
        DynarunError::config_with_code(ErrorCode::CONFIG_INVALID_JSON, "Invalid JSON syntax")
            .with_source(err)
    }
}

impl From<toml::de::Error> for DynarunError {
    fn from(err: toml::de::Error) -> Self {
        DynarunError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax")
            .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation_and_chaining() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "coverage.json");
        let err = DynarunError::storage("Cannot read coverage file")
            .with_source(io_err)
            .with_context("while gathering coverage");

        assert_eq!(err.code(), ErrorCode::STORAGE_GENERIC);
        assert!(err.to_string().contains("[E6000]"));
        assert!(err.user_message().contains("while gathering coverage"));
    }

    #[test]
    fn test_exit_codes() {
        let err = DynarunError::config_with_code(ErrorCode::CONFIG_INIT_NOT_FOUND, "init config not found");
        assert_eq!(err.code(), ErrorCode::CONFIG_INIT_NOT_FOUND);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(DynarunError::entry_not_found("x").exit_code(), 4);
    }

    #[test]
    fn test_io_error_conversion() {
        let err: DynarunError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.code(), ErrorCode::STORAGE_PERMISSION_DENIED);
    }

    #[test]
    fn test_session_id_attached() {
        let err = DynarunError::session_with_code(ErrorCode::SESSION_HOOK_FAILED, "hook failed", None)
            .with_session("abc");
        assert_eq!(err.user_message(), "Session abc error: hook failed");
    }
}
