//! CLI command handlers
//!
//! Argument parsing lives in [`args`], per-command handlers in [`commands`],
//! and [`router`] maps parsed arguments to handlers.

pub mod args;
pub mod commands;
pub mod router;

pub use args::{get_log_level, Cli, Commands};
pub use router::execute_command;
