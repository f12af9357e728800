//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run dynamic analyses over programs and instrument source trees
#[derive(Parser)]
#[command(name = "dynarun")]
#[command(about = "dynarun - Orchestrate dynamic analysis sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an entry program under a set of analyses
    #[command(name = "run")]
    Run {
        /// Program file or dotted module name to execute
        #[arg(short, long)]
        entry: String,

        /// Analysis spec, e.g. "pkg.mod.Analysis;key=value" (repeatable)
        #[arg(short, long = "analysis", value_name = "SPEC", required = true)]
        analyses: Vec<String>,

        /// Label for the session
        #[arg(long)]
        name: Option<String>,

        /// Collect coverage into a per-session directory
        #[arg(long)]
        coverage: bool,

        /// Root for the coverage directory (defaults to the temp dir)
        #[arg(long, value_name = "DIR", requires = "coverage")]
        coverage_dir: Option<PathBuf>,

        /// Initial configuration spec run before the entry
        #[arg(long, value_name = "SPEC")]
        init: Option<String>,

        /// Root for the output directory (defaults to the temp dir)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print the session report as JSON
        #[arg(long)]
        json: bool,

        /// Arguments passed to the entry
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Instrument every source file under a directory
    #[command(name = "instrument")]
    Instrument {
        /// Root of the source tree
        #[arg(short, long)]
        directory: PathBuf,

        /// Analysis spec forwarded to the instrumenter
        #[arg(short, long, value_name = "SPEC")]
        analysis: String,

        /// Module search paths forwarded to the instrumenter
        #[arg(short, long, value_name = "PATHS")]
        module: Option<String>,

        /// Instrument a copy of the tree instead of the tree itself
        #[arg(long)]
        external_dir: bool,

        /// JSON file with "title" and "content" ignore rules
        #[arg(short, long, value_name = "FILE")]
        ignore: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}

/// Map the `-v` count to a tracing filter
pub fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,tokio=debug", // -vvv shows everything including dependencies
    }
}
