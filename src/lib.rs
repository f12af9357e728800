//! # dynarun
//!
//! Orchestration core for dynamic program analysis.
//!
//! ## Usage
//!
//! ```bash
//! dynarun run --entry app.py --analysis pkg.analyses.Trace -- --app-flag
//! dynarun instrument --directory src --analysis pkg.analyses.Trace --ignore ignore.json
//! ```
//!
//! ## Modules
//!
//! - `session` - Session lifecycle: directories, hooks and entry execution
//! - `plugin` - Plugin spec parsing and handler resolution
//! - `instrument` - Parallel batch instrumentation of a source tree
//! - `coverage` - Merging of per-process coverage maps
//! - `subprocess` - Process execution abstraction with a mock for tests
//! - `config` - Configuration file and environment overrides
//! - `error` - Coded error type shared by every module
pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod instrument;
pub mod plugin;
pub mod session;
pub mod subprocess;
