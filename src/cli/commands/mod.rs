//! Command implementation modules
//!
//! Each handler returns the process exit code for a completed command; errors
//! are propagated to `main` for reporting.

pub mod instrument;
pub mod run;

pub use instrument::{run_instrument_command, InstrumentArgs};
pub use run::{run_session_command, RunArgs};
