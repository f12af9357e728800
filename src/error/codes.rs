/// Error code registry for dynarun
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Plugin load errors
/// - 3000-3999: Entry resolution errors
/// - 4000-4999: Ignore-rule errors
/// - 5000-5999: Session errors
/// - 6000-6999: Storage errors
/// - 7000-7999: Execution errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_INVALID_JSON: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_INIT_NOT_FOUND: u16 = 1006;
    pub const CONFIG_TYPE_MISMATCH: u16 = 1010;

    // Plugin load errors (2000-2999)
    pub const LOAD_GENERIC: u16 = 2000;
    pub const LOAD_MODULE_NOT_FOUND: u16 = 2001;
    pub const LOAD_CLASS_NOT_FOUND: u16 = 2002;
    pub const LOAD_INVALID_SPEC: u16 = 2003;
    pub const LOAD_CONSTRUCTION_FAILED: u16 = 2004;

    // Entry errors (3000-3999)
    pub const ENTRY_NOT_FOUND: u16 = 3001;

    // Ignore-rule errors (4000-4999)
    pub const IGNORE_FILE_NOT_FOUND: u16 = 4001;
    pub const IGNORE_FILE_MALFORMED: u16 = 4002;

    // Session errors (5000-5999)
    pub const SESSION_GENERIC: u16 = 5000;
    pub const SESSION_SETUP_FAILED: u16 = 5001;
    pub const SESSION_HOOK_FAILED: u16 = 5002;
    pub const SESSION_ENTRY_FAILED: u16 = 5003;

    // Storage errors (6000-6999)
    pub const STORAGE_GENERIC: u16 = 6000;
    pub const STORAGE_IO_ERROR: u16 = 6001;
    pub const STORAGE_PERMISSION_DENIED: u16 = 6002;
    pub const STORAGE_NOT_FOUND: u16 = 6004;
    pub const STORAGE_ALREADY_EXISTS: u16 = 6005;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 6011;
    pub const STORAGE_DESERIALIZATION_ERROR: u16 = 6012;

    // Execution errors (7000-7999)
    pub const EXEC_GENERIC: u16 = 7000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 7001;
    pub const EXEC_SPAWN_FAILED: u16 = 7007;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_TOML => "Configuration file is not valid TOML",
        ErrorCode::CONFIG_INVALID_JSON => "Invalid JSON",
        ErrorCode::CONFIG_INVALID_VALUE => "Invalid configuration value",
        ErrorCode::CONFIG_INIT_NOT_FOUND => "Initial configuration class not found",
        ErrorCode::CONFIG_TYPE_MISMATCH => "Handler does not provide the requested capability",

        ErrorCode::LOAD_GENERIC => "Plugin could not be loaded",
        ErrorCode::LOAD_MODULE_NOT_FOUND => "Plugin module not found",
        ErrorCode::LOAD_CLASS_NOT_FOUND => "Plugin class not found in module",
        ErrorCode::LOAD_INVALID_SPEC => "Malformed plugin spec",
        ErrorCode::LOAD_CONSTRUCTION_FAILED => "Plugin constructor rejected its configuration",

        ErrorCode::ENTRY_NOT_FOUND => "Entry is neither a module nor an existing file",

        ErrorCode::IGNORE_FILE_NOT_FOUND => "Ignore file not found",
        ErrorCode::IGNORE_FILE_MALFORMED => "Ignore file is not valid JSON",

        ErrorCode::SESSION_GENERIC => "General session error",
        ErrorCode::SESSION_SETUP_FAILED => "Initial configuration setup failed",
        ErrorCode::SESSION_HOOK_FAILED => "Analysis lifecycle hook failed",
        ErrorCode::SESSION_ENTRY_FAILED => "Entry program could not be started",

        ErrorCode::STORAGE_GENERIC => "General storage error",
        ErrorCode::STORAGE_IO_ERROR => "I/O error",
        ErrorCode::STORAGE_PERMISSION_DENIED => "Permission denied",
        ErrorCode::STORAGE_NOT_FOUND => "File or directory not found",
        ErrorCode::STORAGE_ALREADY_EXISTS => "Already exists",
        ErrorCode::STORAGE_SERIALIZATION_ERROR => "Serialization failed",
        ErrorCode::STORAGE_DESERIALIZATION_ERROR => "Deserialization failed",

        ErrorCode::EXEC_GENERIC => "General execution error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "Command not found",
        ErrorCode::EXEC_SPAWN_FAILED => "Failed to spawn subprocess",
        _ => "Unrecognized error code",
    }
}
