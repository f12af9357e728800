use super::{DynarunError, ErrorCode};
use std::path::{Path, PathBuf};

/// Extension trait for mapping foreign errors into [`DynarunError`]
pub trait ErrorExt<T> {
    fn to_storage_error(self, message: impl Into<String>) -> Result<T, DynarunError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_storage_error(self, message: impl Into<String>) -> Result<T, DynarunError> {
        self.map_err(|e| DynarunError::storage(message).with_source(e))
    }
}

/// Helper functions for common error scenarios
pub mod common {
    use super::*;

    /// Create a not found error for configuration
    pub fn config_not_found(path: impl AsRef<Path>) -> DynarunError {
        DynarunError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
    }

    /// Create a storage IO error bound to a path
    pub fn storage_io_error(path: impl Into<PathBuf>, operation: &str) -> DynarunError {
        let path = path.into();
        DynarunError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            format!("Failed to {} {}", operation, path.display()),
            Some(path),
        )
    }

    /// Create the error raised when an init reference cannot be resolved
    pub fn init_config_not_found(spec: &str) -> DynarunError {
        DynarunError::config_with_code(
            ErrorCode::CONFIG_INIT_NOT_FOUND,
            format!("init config not found: {}", spec),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_storage_error_keeps_source() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let err = result.to_storage_error("write failed").unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_GENERIC);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_storage_io_error_mentions_path() {
        let err = common::storage_io_error("/tmp/out", "create");
        assert!(err.user_message().contains("/tmp/out"));
    }
}
